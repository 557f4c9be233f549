use tracing::{error, trace};
use crate::{
    error::{Error, ErrorKind, Result},
    function::Function,
    value::{Tag, Value},
};
use super::Environment;

/// One active call. Everything in it is a collector root.
#[derive(Debug)]
pub(crate) struct Frame {
    callee: Value,
    args: Vec<Value>,
    ret: Value,
    pub(crate) pin_base: usize,
}

impl Frame {
    pub(crate) fn roots(&self) -> impl Iterator<Item=Value> + '_ {
        std::iter::once(self.callee)
            .chain(std::iter::once(self.ret))
            .chain(self.args.iter().copied())
    }
}

impl Environment {
    /// Call the function bound to a global name.
    pub fn call(&mut self, name: &str, args: &[Value]) -> Result<Value> {
        let callee = self.get_global(name).map_err(|err| self.record(err))?;
        self.call_value(callee, args)
    }

    /// Call a function value with a fresh frame holding `args`.
    ///
    /// Failures are recorded in the error channel before being returned.
    pub fn call_value(&mut self, callee: Value, args: &[Value]) -> Result<Value> {
        let result = self.invoke(callee, args);
        result.map_err(|err| self.record(err))
    }

    fn invoke(&mut self, callee: Value, args: &[Value]) -> Result<Value> {
        self.check_usable()?;

        let function = self.function(callee)?;
        let (name, arity) = match &function {
            Function::Script(func) => (func.name.clone(), func.arity()),
            Function::Native(id) => {
                let native = self.native(*id);
                (native.name.as_str().to_owned(), native.arity())
            },
        };
        if args.len() != arity {
            return Err(Error::new(
                ErrorKind::Arity,
                format!("Function {} expects {} argument(s) but got {}.", name, arity, args.len()),
            ));
        }
        if self.frames.len() >= self.config.max_frames {
            return Err(Error::new(
                ErrorKind::StackOverflow,
                format!("Call depth exceeded {} frames while calling {}.", self.config.max_frames, name),
            ));
        }

        trace!(function = %name, depth = self.frames.len(), "call");
        let pin_base = self.pins.len();
        self.frames.push(Frame {
            callee,
            args: args.to_vec(),
            ret: Value::Nil,
            pin_base,
        });

        let outcome = match &function {
            Function::Native(id) => {
                let callback = self.native(*id).callback.clone();
                callback(self)
            },
            Function::Script(func) => match self.interpreter() {
                Some(interpreter) => interpreter.execute(self, func),
                None => Err(Error::new(
                    ErrorKind::Unsupported,
                    format!("No interpreter installed to run {}.", name),
                )),
            },
        };

        let frame = self.frames
            .pop()
            .ok_or_else(|| Error::runtime("Call stack underflow."))?;

        let depth = self.pins.len();
        if depth != frame.pin_base {
            self.pins.truncate(frame.pin_base);
            error!(function = %name, expected = frame.pin_base, found = depth, "unbalanced pin stack");
            return Err(Error::pin_imbalance(frame.pin_base, depth));
        }

        outcome.map(|()| frame.ret)
    }

    fn frame(&self) -> Result<&Frame> {
        self.frames
            .last()
            .ok_or_else(|| Error::runtime("No function call is active."))
    }

    fn frame_mut(&mut self) -> Result<&mut Frame> {
        self.frames
            .last_mut()
            .ok_or_else(|| Error::runtime("No function call is active."))
    }

    /// Depth of the call stack.
    pub fn call_depth(&self) -> usize {
        self.frames.len()
    }

    pub fn arg_count(&self) -> Result<usize> {
        Ok(self.frame()?.args.len())
    }

    pub fn arg(&self, index: usize) -> Result<Value> {
        let frame = self.frame()?;
        frame.args
            .get(index)
            .copied()
            .ok_or_else(|| Error::index(index, frame.args.len()))
    }

    fn param_name(&self, index: usize) -> String {
        self.frame()
            .and_then(|frame| self.signature(frame.callee))
            .ok()
            .and_then(|(_, params)| params.get(index).cloned())
            .unwrap_or_else(|| "?".to_owned())
    }

    pub(crate) fn arg_mismatch(&self, index: usize, expected: &str) -> Error {
        Error::type_mismatch(format!(
            "Argument ({}: {}) not {}.",
            index,
            self.param_name(index),
            expected,
        ))
    }

    /// Fetch an argument, failing with `TypeMismatch` unless it carries `tag`.
    pub fn arg_checked(&self, index: usize, tag: Tag) -> Result<Value> {
        let value = self.arg(index)?;
        if value.tag() == tag {
            Ok(value)
        } else {
            Err(self.arg_mismatch(index, tag.noun()))
        }
    }

    pub fn arg_int(&self, index: usize) -> Result<i64> {
        self.arg_checked(index, Tag::Int)?.as_int()
    }

    pub fn arg_float(&self, index: usize) -> Result<f64> {
        self.arg_checked(index, Tag::Float)?.as_float()
    }

    /// Either numeric tag, widened to a float.
    pub fn arg_number(&self, index: usize) -> Result<f64> {
        match self.arg(index)? {
            Value::Int(x) => Ok(x as f64),
            Value::Float(x) => Ok(x),
            _ => Err(self.arg_mismatch(index, "a number")),
        }
    }

    pub fn arg_string(&self, index: usize) -> Result<String> {
        let value = self.arg_checked(index, Tag::String)?;
        self.as_str(value).map(str::to_owned)
    }

    pub fn arg_array(&self, index: usize) -> Result<Value> {
        self.arg_checked(index, Tag::Array)
    }

    pub fn arg_dict(&self, index: usize) -> Result<Value> {
        self.arg_checked(index, Tag::Dict)
    }

    /// Script and native functions both qualify.
    pub fn arg_func(&self, index: usize) -> Result<Value> {
        let value = self.arg(index)?;
        if value.is_callable() {
            Ok(value)
        } else {
            Err(self.arg_mismatch(index, Tag::Function.noun()))
        }
    }

    /// The return slot of the active frame.
    pub fn return_value(&self) -> Result<Value> {
        Ok(self.frame()?.ret)
    }

    pub fn set_return(&mut self, value: Value) -> Result<()> {
        self.frame_mut()?.ret = value;
        Ok(())
    }

    pub fn set_return_int(&mut self, x: i64) -> Result<()> {
        self.set_return(Value::Int(x))
    }

    pub fn set_return_float(&mut self, x: f64) -> Result<()> {
        self.set_return(Value::Float(x))
    }

    pub fn set_return_string(&mut self, s: impl Into<String>) -> Result<Value> {
        self.frame()?;
        let value = self.make_string(s)?;
        self.set_return(value)?;
        Ok(value)
    }

    /// Returns the new empty array so the callback can fill it in place.
    pub fn set_return_array(&mut self) -> Result<Value> {
        self.frame()?;
        let value = self.make_empty_array()?;
        self.set_return(value)?;
        Ok(value)
    }

    /// Returns the new empty dictionary so the callback can fill it in place.
    pub fn set_return_dict(&mut self) -> Result<Value> {
        self.frame()?;
        let value = self.make_empty_dict()?;
        self.set_return(value)?;
        Ok(value)
    }
}
