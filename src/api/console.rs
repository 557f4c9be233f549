//! `Console`: text output.

use std::io::Write;
use crate::{
    env::Environment,
    error::{Error, Result},
    ffi::FfiItem,
    value::Value,
};

pub const FUNCTIONS: &[FfiItem] = &[
    FfiItem::new("__Console_print", "print", &["msg"], print),
];

pub fn register(env: &mut Environment) -> Result<Value> {
    env.register_functions("Console", FUNCTIONS)
}

fn print(env: &mut Environment) -> Result<()> {
    let text = env.render(env.arg(0)?)?;
    writeln!(env.output(), "{}", text)
        .and_then(|()| env.output().flush())
        .map_err(|err| Error::io(format!("Cannot write to output: {}.", err)))
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, io, rc::Rc};
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Clone, Default)]
    struct Capture(Rc<RefCell<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn prints_rendered_value() {
        let capture = Capture::default();
        let mut env = Environment::new().with_output(capture.clone());
        let console = register(&mut env).unwrap();

        let greeting = env.make_string("hello").unwrap();
        env.call("__Console_print", &[greeting]).unwrap();
        let print = env.dict_get(console, "print").unwrap();
        env.call_value(print, &[Value::Float(0.5)]).unwrap();

        assert_eq!(String::from_utf8(capture.0.borrow().clone()).unwrap(), "hello\n0.500000\n");
    }
}
