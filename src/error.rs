use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Error)]
pub enum ErrorKind {
    #[error("type mismatch")]
    TypeMismatch,
    #[error("index out of range")]
    Index,
    #[error("no such key")]
    Key,
    #[error("i/o failure")]
    Io,
    #[error("out of memory")]
    OutOfMemory,
    #[error("unbalanced pin/unpin")]
    PinImbalance,
    #[error("too many pinned values")]
    PinOverflow,
    #[error("wrong number of arguments")]
    Arity,
    #[error("undefined global")]
    Undefined,
    #[error("call stack overflow")]
    StackOverflow,
    #[error("stale value handle")]
    StaleHandle,
    #[error("malformed bytecode")]
    MalformedBytecode,
    #[error("unsupported operation")]
    Unsupported,
    #[error("runtime error")]
    Runtime,
}

impl ErrorKind {
    /// Fatal errors leave the environment unusable.
    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorKind::OutOfMemory | ErrorKind::PinImbalance)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    file: Option<String>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            file: None,
        }
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch, message)
    }

    pub fn index(index: usize, len: usize) -> Self {
        Self::new(ErrorKind::Index, format!("Index {} out of range (size {}).", index, len))
    }

    pub fn key(key: &str) -> Self {
        Self::new(ErrorKind::Key, format!("Key \"{}\" not found.", key))
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    pub fn out_of_memory() -> Self {
        Self::new(ErrorKind::OutOfMemory, "Out-of-memory.")
    }

    pub fn pin_imbalance(expected: usize, found: usize) -> Self {
        Self::new(
            ErrorKind::PinImbalance,
            format!("Pin stack depth {} does not match {} at callback exit.", found, expected),
        )
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedBytecode, message)
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Runtime, message)
    }

    pub fn at_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn is_fatal(&self) -> bool {
        self.kind.is_fatal()
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: kind.to_string(),
            file: None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}: {}", file, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for Error {}
