//! The precompiled script image.
//!
//! The header and every function record are newline-terminated text lines; only the code
//! payload is raw bytes, located by the `Bytecode Size` line that precedes it.

use std::str;
use crate::{
    error::{Error, Result},
    function::ScriptFunction,
};
use super::BYTECODE_MAGIC;

const VERSION: &str = "1.0";

/// A decoded bytecode file.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    pub source: String,
    pub functions: Vec<ScriptFunction>,
}

impl Image {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            functions: Vec::new(),
        }
    }

    pub fn with_function(mut self, func: ScriptFunction) -> Self {
        self.functions.push(func);
        self
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor { bytes, pos: 0 };

        let header = cursor.line()?;
        let version = header
            .as_bytes()
            .strip_prefix(BYTECODE_MAGIC)
            .and_then(|rest| rest.strip_prefix(b" "));
        if version != Some(VERSION.as_bytes()) {
            return Err(Error::malformed(format!("Unsupported bytecode header \"{}\".", header)));
        }

        cursor.label("Source")?;
        let source = cursor.line()?.to_owned();
        cursor.label("Number Of Functions")?;
        let count = cursor.number("function count")?;

        let mut functions = Vec::new();
        for _ in 0..count {
            cursor.label("Begin Function")?;
            cursor.label("Name")?;
            let name = cursor.line()?.to_owned();
            cursor.label("Parameters")?;
            let param_count = cursor.number("parameter count")?;
            let params = (0..param_count)
                .map(|_| cursor.line().map(str::to_owned))
                .collect::<Result<Vec<_>>>()?;
            cursor.label("Temporary Size")?;
            let temp_size = cursor.number("temporary size")?;
            cursor.label("Bytecode Size")?;
            let size = cursor.number("bytecode size")?;
            let code = cursor.take(size as usize)?.to_vec();
            if !cursor.line()?.is_empty() {
                return Err(Error::malformed(format!("Function {} is longer than its bytecode size.", name)));
            }
            cursor.label("End Function")?;

            functions.push(ScriptFunction {
                name,
                params,
                temp_size,
                code,
                file: source.clone(),
            });
        }

        if !cursor.at_end() {
            return Err(Error::malformed(format!(
                "{} trailing byte(s) after the last function.",
                bytes.len() - cursor.pos,
            )));
        }

        Ok(Self { source, functions })
    }

    pub fn encode(&self) -> Vec<u8> {
        fn line(out: &mut Vec<u8>, text: &str) {
            out.extend_from_slice(text.as_bytes());
            out.push(b'\n');
        }

        let mut out = Vec::new();

        out.extend_from_slice(BYTECODE_MAGIC);
        line(&mut out, &format!(" {}", VERSION));
        line(&mut out, "Source");
        line(&mut out, &self.source);
        line(&mut out, "Number Of Functions");
        line(&mut out, &self.functions.len().to_string());
        for func in &self.functions {
            line(&mut out, "Begin Function");
            line(&mut out, "Name");
            line(&mut out, &func.name);
            line(&mut out, "Parameters");
            line(&mut out, &func.params.len().to_string());
            for param in &func.params {
                line(&mut out, param);
            }
            line(&mut out, "Temporary Size");
            line(&mut out, &func.temp_size.to_string());
            line(&mut out, "Bytecode Size");
            line(&mut out, &func.code.len().to_string());
            out.extend_from_slice(&func.code);
            line(&mut out, "");
            line(&mut out, "End Function");
        }
        out
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let rest = &self.bytes[self.pos..];
        if rest.len() < len {
            return Err(Error::malformed(format!(
                "Payload of {} byte(s) overruns the image ({} left).",
                len,
                rest.len(),
            )));
        }
        self.pos += len;
        Ok(&rest[..len])
    }

    fn line(&mut self) -> Result<&'a str> {
        let rest = &self.bytes[self.pos..];
        let end = rest
            .iter()
            .position(|b| *b == b'\n')
            .ok_or_else(|| Error::malformed("Unexpected end of bytecode."))?;
        self.pos += end + 1;
        let line = &rest[..end];
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        str::from_utf8(line).map_err(|_| Error::malformed("Header line is not valid UTF-8."))
    }

    fn label(&mut self, expected: &str) -> Result<()> {
        let found = self.line()?;
        if found == expected {
            Ok(())
        } else {
            Err(Error::malformed(format!("Expected \"{}\", found \"{}\".", expected, found)))
        }
    }

    fn number(&mut self, what: &str) -> Result<u32> {
        let text = self.line()?;
        text.trim()
            .parse()
            .map_err(|_| Error::malformed(format!("Invalid {} \"{}\".", what, text)))
    }
}
