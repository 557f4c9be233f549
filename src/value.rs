use std::fmt;
use crate::{
    error::{Error, Result},
    gc::Handle,
};

/// A dynamically typed runtime value.
///
/// Scalars live inline. Every other variant is a handle into the environment's heap and stays
/// valid only while its object is reachable from a global, a call frame or a pin.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Handle),
    Array(Handle),
    Dict(Handle),
    Func(Handle),
    Native(Handle),
}

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum Tag {
    Nil,
    Bool,
    Int,
    Float,
    String,
    Array,
    Dict,
    Function,
    NativeFunction,
}

impl Tag {
    /// Noun used in diagnostics, e.g. "Argument (0: x) not an integer."
    pub fn noun(self) -> &'static str {
        match self {
            Tag::Nil => "nil",
            Tag::Bool => "a boolean",
            Tag::Int => "an integer",
            Tag::Float => "a float",
            Tag::String => "a string",
            Tag::Array => "an array",
            Tag::Dict => "a dictionary",
            Tag::Function => "a function",
            Tag::NativeFunction => "a native function",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Tag::Nil => "nil",
            Tag::Bool => "bool",
            Tag::Int => "int",
            Tag::Float => "float",
            Tag::String => "string",
            Tag::Array => "array",
            Tag::Dict => "dict",
            Tag::Function => "func",
            Tag::NativeFunction => "native func",
        };
        write!(f, "{}", name)
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Nil
    }
}

impl Value {
    pub fn tag(&self) -> Tag {
        match self {
            Value::Nil => Tag::Nil,
            Value::Bool(_) => Tag::Bool,
            Value::Int(_) => Tag::Int,
            Value::Float(_) => Tag::Float,
            Value::Str(_) => Tag::String,
            Value::Array(_) => Tag::Array,
            Value::Dict(_) => Tag::Dict,
            Value::Func(_) => Tag::Function,
            Value::Native(_) => Tag::NativeFunction,
        }
    }

    pub fn handle(&self) -> Option<Handle> {
        match self {
            Value::Str(h)
            | Value::Array(h)
            | Value::Dict(h)
            | Value::Func(h)
            | Value::Native(h) => Some(*h),
            Value::Nil | Value::Bool(_) | Value::Int(_) | Value::Float(_) => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Func(_) | Value::Native(_))
    }

    pub fn as_int(&self) -> Result<i64> {
        match self {
            Value::Int(x) => Ok(*x),
            _ => Err(mismatch("Value", *self, Tag::Int)),
        }
    }

    pub fn as_float(&self) -> Result<f64> {
        match self {
            Value::Float(x) => Ok(*x),
            _ => Err(mismatch("Value", *self, Tag::Float)),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(x) => Ok(*x),
            _ => Err(mismatch("Value", *self, Tag::Bool)),
        }
    }

    /// Accepts either numeric tag, widening integers.
    pub fn as_number(&self) -> Result<f64> {
        match self {
            Value::Int(x) => Ok(*x as f64),
            Value::Float(x) => Ok(*x),
            _ => Err(Error::type_mismatch("Value is not a number.")),
        }
    }

    pub fn expect_tag(self, tag: Tag) -> Result<Self> {
        if self.tag() == tag {
            Ok(self)
        } else {
            Err(mismatch("Value", self, tag))
        }
    }
}

fn mismatch(what: &str, found: Value, expected: Tag) -> Error {
    Error::type_mismatch(format!("{} not {} (found {}).", what, expected.noun(), found.tag()))
}

impl From<i64> for Value {
    fn from(x: i64) -> Self {
        Value::Int(x)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(x: bool) -> Self {
        Value::Bool(x)
    }
}
