//! Exposing host functions to scripts.
//!
//! A native function is stored once, as a single heap object. The global binding and the field
//! of its module dictionary are two references to that same object, so `Math.abs` and the
//! global it was registered under can never disagree.

use std::rc::Rc;
use internment::Intern;
use tracing::debug;
use crate::{
    env::Environment,
    error::{Error, ErrorKind, Result},
    function::{Function, NativeFunction},
    gc::Object,
    value::{Tag, Value},
};

/// One row of a module's function table.
#[derive(Copy, Clone)]
pub struct FfiItem {
    pub global: &'static str,
    pub field: &'static str,
    pub params: &'static [&'static str],
    pub func: fn(&mut Environment) -> Result<()>,
}

impl FfiItem {
    pub const fn new(
        global: &'static str,
        field: &'static str,
        params: &'static [&'static str],
        func: fn(&mut Environment) -> Result<()>,
    ) -> Self {
        Self {
            global,
            field,
            params,
            func,
        }
    }
}

// Registration failures are recorded in the error channel before being returned.
impl Environment {
    /// Bind a fresh empty dictionary under `name` to hold a module's functions.
    pub fn register_module(&mut self, name: &str) -> Result<Value> {
        let module = self.make_empty_dict()?;
        self.set_global(name, module);
        debug!(module = name, "registered module");
        Ok(module)
    }

    /// Create a native function and bind it under `global`. Returns the callable value.
    pub fn define_native<F>(&mut self, global: &str, params: &[&str], callback: F) -> Result<Value>
    where
        F: Fn(&mut Environment) -> Result<()> + 'static,
    {
        let id = self.push_native(NativeFunction {
            name: Intern::new(global.to_owned()),
            params: params
                .iter()
                .map(|param| Intern::new((*param).to_owned()))
                .collect(),
            callback: Rc::new(callback),
        });
        let callable = Value::Native(self.alloc(Object::Func(Function::Native(id)))?);
        self.set_global(global, callable);
        Ok(callable)
    }

    /// Insert `callable` into `module` under `field`.
    pub fn bind_into_module(&mut self, module: Value, field: &str, callable: Value) -> Result<()> {
        let checked = if callable.is_callable() {
            module.expect_tag(Tag::Dict).map(drop)
        } else {
            Err(Error::type_mismatch(format!(
                "Cannot bind {} as {}: not a function.",
                callable.tag(),
                field,
            )))
        };
        checked
            .and_then(|()| self.dict_set(module, field, callable))
            .map_err(|err| self.record(err))
    }

    /// Register a native function under `global` and expose it as `module.field`.
    pub fn register_native<F>(
        &mut self,
        module: Value,
        global: &str,
        field: &str,
        arity: usize,
        params: &[&str],
        callback: F,
    ) -> Result<Value>
    where
        F: Fn(&mut Environment) -> Result<()> + 'static,
    {
        let checked = if arity == params.len() {
            module.expect_tag(Tag::Dict).map(drop)
        } else {
            Err(Error::new(
                ErrorKind::Arity,
                format!("{} declares {} parameter(s) but names {}.", global, arity, params.len()),
            ))
        };
        checked.map_err(|err| self.record(err))?;

        self.define_native(global, params, callback)?;
        // Resolve through the global table so both views hold the same object.
        let callable = self.get_global(global).map_err(|err| self.record(err))?;
        self.bind_into_module(module, field, callable)?;

        debug!(global, field, arity, "registered native function");
        Ok(callable)
    }

    /// Create module `name` and register every item of `table` into it.
    pub fn register_functions(&mut self, name: &str, table: &[FfiItem]) -> Result<Value> {
        let module = self.register_module(name)?;
        for item in table {
            self.register_native(module, item.global, item.field, item.params.len(), item.params, item.func)?;
        }
        Ok(module)
    }

    /// The registration record behind a native function value.
    pub fn native_function(&self, callable: Value) -> Result<&NativeFunction> {
        match self.function(callable)? {
            Function::Native(id) => Ok(self.native(id)),
            Function::Script(func) => Err(Error::type_mismatch(format!("{} is not a native function.", func.name))),
        }
    }
}
