use std::fmt::Write;
use crate::{
    env::Environment,
    error::Result,
    gc::Handle,
    value::Value,
};

impl Environment {
    /// The printed representation of `value`, as written by `Console.print`.
    ///
    /// Strings are quoted only when nested inside an array or dictionary. A container reached
    /// again while it is still being printed renders as `[...]` or `{...}`.
    pub fn render(&self, value: Value) -> Result<String> {
        let mut printer = Printer {
            env: self,
            buf: String::new(),
            open: Vec::new(),
        };
        printer.value(value, false)?;
        Ok(printer.buf)
    }
}

struct Printer<'a> {
    env: &'a Environment,
    buf: String,
    // Containers currently being printed, outermost first
    open: Vec<Handle>,
}

impl Printer<'_> {
    fn value(&mut self, value: Value, nested: bool) -> Result<()> {
        match value {
            Value::Nil => self.buf.push_str("nil"),
            Value::Bool(x) => self.buf.push_str(if x { "true" } else { "false" }),
            Value::Int(x) => {
                let _ = write!(self.buf, "{}", x);
            },
            Value::Float(x) => {
                let _ = write!(self.buf, "{:.6}", x);
            },
            Value::Str(_) => {
                let s = self.env.as_str(value)?;
                if nested {
                    self.buf.push('"');
                    self.buf.push_str(s);
                    self.buf.push('"');
                } else {
                    self.buf.push_str(s);
                }
            },
            Value::Array(handle) => {
                if self.open.contains(&handle) {
                    self.buf.push_str("[...]");
                    return Ok(());
                }
                self.open.push(handle);
                self.buf.push('[');
                for i in 0..self.env.array_len(value)? {
                    if i > 0 {
                        self.buf.push_str(", ");
                    }
                    let item = self.env.array_get(value, i)?;
                    self.value(item, true)?;
                }
                self.buf.push(']');
                self.open.pop();
            },
            Value::Dict(handle) => {
                if self.open.contains(&handle) {
                    self.buf.push_str("{...}");
                    return Ok(());
                }
                self.open.push(handle);
                self.buf.push('{');
                for i in 0..self.env.dict_len(value)? {
                    if i > 0 {
                        self.buf.push_str(", ");
                    }
                    self.buf.push_str(&self.env.dict_key_at(value, i)?);
                    self.buf.push_str(": ");
                    let field = self.env.dict_value_at(value, i)?;
                    self.value(field, true)?;
                }
                self.buf.push('}');
                self.open.pop();
            },
            Value::Func(_) | Value::Native(_) => self.buf.push_str("<func>"),
        }
        Ok(())
    }
}
