//! `System`: loading further scripts and running shell commands.

use std::process::Command;
use tracing::debug;
use crate::{
    env::Environment,
    error::{Error, Result},
    ffi::FfiItem,
    value::Value,
};

pub const FUNCTIONS: &[FfiItem] = &[
    FfiItem::new("__System_import", "import", &["file"], import),
    FfiItem::new("__System_shell", "shell", &["cmd"], shell),
];

pub fn register(env: &mut Environment) -> Result<Value> {
    env.register_functions("System", FUNCTIONS)
}

/// Loads a script file and returns the names of the functions it defined.
fn import(env: &mut Environment) -> Result<()> {
    let file = env.arg_string(0)?;
    let names = env.load_file(&file)?;

    let mut scope = env.roots();
    let list = scope.make_empty_array()?;
    let slot = scope.pin(list)?;
    for name in names {
        let name = scope.make_string(name)?;
        let list = scope.get(slot)?;
        scope.array_push(list, name)?;
    }
    let list = scope.get(slot)?;
    scope.set_return(list)
}

/// Exit code of the command, or -1 if it was killed by a signal.
fn shell(env: &mut Environment) -> Result<()> {
    let cmd = env.arg_string(0)?;
    debug!(%cmd, "running shell command");

    let status = if cfg!(windows) {
        Command::new("cmd").args(["/C", cmd.as_str()]).status()
    } else {
        Command::new("sh").args(["-c", cmd.as_str()]).status()
    };
    let status = status.map_err(|err| Error::io(format!("Cannot run command \"{}\": {}.", cmd, err)))?;
    env.set_return_int(status.code().map_or(-1, i64::from))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn shell_reports_exit_code() {
        let mut env = Environment::new();
        register(&mut env).unwrap();

        let ok = env.make_string("true").unwrap();
        assert_eq!(env.call("__System_shell", &[ok]).unwrap(), Value::Int(0));
        let code = env.make_string("exit 3").unwrap();
        assert_eq!(env.call("__System_shell", &[code]).unwrap(), Value::Int(3));
    }
}
