//! Loading scripts from disk.
//!
//! A script file is either source text or a bytecode image. The two are told apart by the
//! magic header at the start of the file, so callers never need to know which one they have.

pub mod bytecode;

use std::{fs, path::Path, rc::Rc};
use tracing::debug;
use crate::{
    env::Environment,
    error::{Error, ErrorKind, Result},
    function::{Function, ScriptFunction},
    gc::Object,
    value::Value,
};
use self::bytecode::Image;

/// Prefix identifying a bytecode image.
pub const BYTECODE_MAGIC: &[u8] = b"Ember Bytecode";

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Format {
    Source,
    Bytecode,
}

impl Format {
    /// Files shorter than the magic header are source.
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.len() >= BYTECODE_MAGIC.len() && &bytes[..BYTECODE_MAGIC.len()] == BYTECODE_MAGIC {
            Format::Bytecode
        } else {
            Format::Source
        }
    }
}

impl Environment {
    /// Load a script file and bind each of its functions as a global. Returns the bound names.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<Vec<String>> {
        let path = path.as_ref();
        let bytes = self
            .check_usable()
            .and_then(|()| read_file(path))
            .map_err(|err| self.record(err))?;
        self.load_bytes(&path.display().to_string(), &bytes)
    }

    /// Load a script that is already in memory. `file` names it in diagnostics.
    pub fn load_bytes(&mut self, file: &str, bytes: &[u8]) -> Result<Vec<String>> {
        let result = self
            .check_usable()
            .and_then(|()| self.route(file, bytes));
        result.map_err(|err| {
            let err = match err.file() {
                Some(_) => err,
                None => err.at_file(file),
            };
            self.record(err)
        })
    }

    fn route(&mut self, file: &str, bytes: &[u8]) -> Result<Vec<String>> {
        let format = Format::detect(bytes);
        debug!(file, ?format, len = bytes.len(), "loading script");
        match format {
            Format::Bytecode => self.register_bytecode(bytes),
            Format::Source => match std::str::from_utf8(bytes) {
                Ok(source) => self.register_source(file, source),
                Err(_) => Err(Error::io(format!("File {} is not valid UTF-8 text.", file))),
            },
        }
    }

    /// Compile source text with the installed compiler and bind its functions.
    pub fn register_source(&mut self, file: &str, source: &str) -> Result<Vec<String>> {
        let compiler = self.compiler().ok_or_else(|| Error::new(
            ErrorKind::Unsupported,
            format!("No source compiler installed to load {}.", file),
        ))?;
        let functions = compiler.compile(file, source)?;
        self.bind_functions(functions)
    }

    /// Decode a bytecode image and bind its functions.
    pub fn register_bytecode(&mut self, bytes: &[u8]) -> Result<Vec<String>> {
        let image = Image::decode(bytes)?;
        debug!(source = %image.source, functions = image.functions.len(), "decoded bytecode");
        self.bind_functions(image.functions)
    }

    fn bind_functions(&mut self, functions: Vec<ScriptFunction>) -> Result<Vec<String>> {
        let mut names = Vec::with_capacity(functions.len());
        for func in functions {
            let name = func.name.clone();
            if let Ok(Value::Native(_)) = self.get_global(&name) {
                debug!(function = %name, "script function replaces a native global");
            }
            let handle = self.alloc(Object::Func(Function::Script(Rc::new(func))))?;
            self.set_global(&name, Value::Func(handle));
            names.push(name);
        }
        Ok(names)
    }

    /// The compiled form of a script function value.
    pub fn script_function(&self, callable: Value) -> Result<Rc<ScriptFunction>> {
        match self.function(callable)? {
            Function::Script(func) => Ok(func),
            Function::Native(_) => Err(Error::type_mismatch("Value is a native function, not a script function.")),
        }
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
            Error::io(format!("Cannot open file {}.", path.display()))
        },
        _ => Error::io(format!("Cannot read file {}: {}.", path.display(), err)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_input_is_source() {
        assert_eq!(Format::detect(b""), Format::Source);
        assert_eq!(Format::detect(b"Ember"), Format::Source);
        assert_eq!(Format::detect(b"Ember Bytecod"), Format::Source);
    }

    #[test]
    fn magic_prefix_is_bytecode() {
        assert_eq!(Format::detect(b"Ember Bytecode"), Format::Bytecode);
        assert_eq!(Format::detect(b"Ember Bytecode 1.0\n"), Format::Bytecode);
        assert_eq!(Format::detect(b"ember bytecode 1.0\n"), Format::Source);
    }

    #[test]
    fn source_without_compiler_is_unsupported() {
        let mut env = Environment::new();
        let err = env.load_bytes("a.em", b"func main() {}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert_eq!(err.file(), Some("a.em"));
    }

    #[test]
    fn invalid_utf8_source_is_io() {
        let mut env = Environment::new();
        let err = env.load_bytes("a.em", &[0xff, 0xfe, 0x00]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
