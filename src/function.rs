use std::{fmt, rc::Rc};
use crate::{
    env::Environment,
    error::Result,
    Ident,
};

/// Host callback behind a native function. It reads its arguments and sets its return value
/// through the environment it is handed.
pub type NativeFn = Rc<dyn Fn(&mut Environment) -> Result<()>>;

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub struct NativeId(pub(crate) usize);

/// Registered once per environment, never modified afterwards.
#[derive(Clone)]
pub struct NativeFunction {
    pub name: Ident,
    pub params: Vec<Ident>,
    pub callback: NativeFn,
}

impl NativeFunction {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name.as_str())
            .field("params", &self.params.iter().map(|p| p.as_str()).collect::<Vec<_>>())
            .finish()
    }
}

/// A compiled script function. The payload is opaque to the runtime and only meaningful to the
/// installed `Interpreter`.
#[derive(Clone, Debug, PartialEq)]
pub struct ScriptFunction {
    pub name: String,
    pub params: Vec<String>,
    pub temp_size: u32,
    pub code: Vec<u8>,
    pub file: String,
}

impl ScriptFunction {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

#[derive(Clone, Debug)]
pub enum Function {
    Script(Rc<ScriptFunction>),
    Native(NativeId),
}

/// Turns source text into script functions. Supplied by the host.
pub trait SourceCompiler {
    fn compile(&self, file: &str, source: &str) -> Result<Vec<ScriptFunction>>;
}

/// Executes a script function inside the frame the environment pushed for it.
///
/// Follows the same convention as native callbacks: arguments come from `Environment::arg` and
/// the result goes to `Environment::set_return`.
pub trait Interpreter {
    fn execute(&self, env: &mut Environment, func: &ScriptFunction) -> Result<()>;
}
