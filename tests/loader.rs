use std::fs;
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use ember::{
    api, Environment, ErrorKind, Image, Interpreter, Result, ScriptFunction, SourceCompiler, Value,
};

/// One function per line: `name param...`. The line itself becomes the code payload.
struct LineCompiler;

impl SourceCompiler for LineCompiler {
    fn compile(&self, file: &str, source: &str) -> Result<Vec<ScriptFunction>> {
        Ok(source
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let mut words = line.split_whitespace().map(str::to_owned);
                ScriptFunction {
                    name: words.next().unwrap_or_default(),
                    params: words.collect(),
                    temp_size: 0,
                    code: line.as_bytes().to_vec(),
                    file: file.to_owned(),
                }
            })
            .collect())
    }
}

/// Payloads of the form `import <file>` import another script; anything else sums its
/// integer arguments.
struct ToyInterpreter;

impl Interpreter for ToyInterpreter {
    fn execute(&self, env: &mut Environment, func: &ScriptFunction) -> Result<()> {
        let code = String::from_utf8_lossy(&func.code).into_owned();
        if let Some(file) = code.strip_prefix("import ") {
            let mut scope = env.roots();
            let file = scope.make_string(file)?;
            let slot = scope.pin(file)?;
            let file = scope.get(slot)?;
            let names = scope.call("__System_import", &[file])?;
            return scope.set_return(names);
        }

        let mut sum = 0;
        for i in 0..env.arg_count()? {
            sum += env.arg_int(i)?;
        }
        env.set_return_int(sum)
    }
}

fn env() -> Environment {
    let mut env = Environment::new()
        .with_compiler(LineCompiler)
        .with_interpreter(ToyInterpreter);
    api::register_all(&mut env).unwrap();
    env
}

fn write(dir: &TempDir, name: &str, bytes: &[u8]) -> String {
    let path = dir.path().join(name);
    fs::write(&path, bytes).unwrap();
    path.display().to_string()
}

fn bytecode(func: &str, params: &[&str], code: &[u8]) -> Vec<u8> {
    Image::new("compiled.em")
        .with_function(ScriptFunction {
            name: func.to_owned(),
            params: params.iter().map(|p| (*p).to_owned()).collect(),
            temp_size: 1,
            code: code.to_vec(),
            file: "compiled.em".to_owned(),
        })
        .encode()
}

#[test]
fn source_files_go_through_the_compiler() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "main.em", b"add a b\nzero\n");
    let mut env = env();

    assert_eq!(env.load_file(&file).unwrap(), vec!["add", "zero"]);
    assert_eq!(env.call("add", &[Value::Int(2), Value::Int(3)]).unwrap(), Value::Int(5));
    assert_eq!(env.call("zero", &[]).unwrap(), Value::Int(0));
}

#[test]
fn bytecode_files_skip_the_compiler() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "main.emc", &bytecode("triple", &["a", "b", "c"], &[0, 1, 2]));
    // No compiler installed: only the bytecode path can succeed.
    let mut env = Environment::new().with_interpreter(ToyInterpreter);

    assert_eq!(env.load_file(&file).unwrap(), vec!["triple"]);
    let triple = env.get_global("triple").unwrap();
    let func = env.script_function(triple).unwrap();
    assert_eq!(func.code, vec![0, 1, 2]);
    assert_eq!(func.file, "compiled.em");
    assert_eq!(
        env.call("triple", &[Value::Int(1), Value::Int(1), Value::Int(1)]).unwrap(),
        Value::Int(3),
    );
}

#[test]
fn empty_file_is_empty_source() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "empty.em", b"");

    assert_eq!(env().load_file(&file).unwrap(), Vec::<String>::new());
    let err = Environment::new().load_file(&file).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
}

#[test]
fn missing_file_is_recoverable() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.em");
    let mut env = env();

    let err = env.load_file(&missing).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert_eq!(err.message(), format!("Cannot open file {}.", missing.display()));
    assert_eq!(env.last_error(), Some(&err));
    assert!(env.fatal_error().is_none());
}

#[test]
fn corrupt_bytecode_names_the_file() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "bad.emc", b"Ember Bytecode 1.0\nSource\n");
    let mut env = env();

    let err = env.load_file(&file).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedBytecode);
    assert_eq!(err.file(), Some(file.as_str()));
}

#[test]
fn script_functions_need_an_interpreter() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "main.emc", &bytecode("f", &[], b""));
    let mut env = Environment::new();

    env.load_file(&file).unwrap();
    assert_eq!(env.call("f", &[]).unwrap_err().kind(), ErrorKind::Unsupported);
}

#[test]
fn import_is_reentrant() {
    let dir = TempDir::new().unwrap();
    let inner = write(&dir, "inner.em", b"helper x\n");
    let outer = dir.path().join("outer.emc");
    fs::write(&outer, bytecode("load_inner", &[], format!("import {}", inner).as_bytes())).unwrap();
    let mut env = env();

    env.load_file(&outer).unwrap();
    let names = env.call("load_inner", &[]).unwrap();
    assert_eq!(env.render(names).unwrap(), "[\"helper\"]");
    assert_eq!(env.call("helper", &[Value::Int(7)]).unwrap(), Value::Int(7));
    assert_eq!(env.pin_depth(), 0);
    assert_eq!(env.call_depth(), 0);
}

#[test]
fn import_is_reachable_through_system_module() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "lib.em", b"one\n");
    let mut env = env();

    let system = env.get_global("System").unwrap();
    let import = env.dict_get(system, "import").unwrap();
    let path = env.make_string(file).unwrap();
    env.call_value(import, &[path]).unwrap();
    assert!(env.has_global("one"));
}

#[test]
fn script_names_do_not_collide_with_standard_natives() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "shadow.em", b"print msg\nimport file\n");
    let mut env = env();

    assert_eq!(env.load_file(&file).unwrap(), vec!["print", "import"]);
    assert!(matches!(env.get_global("print"), Ok(Value::Func(_))));
    for (module, global, field) in [("Console", "__Console_print", "print"), ("System", "__System_import", "import")] {
        let module = env.get_global(module).unwrap();
        let native = env.get_global(global).unwrap();
        assert!(matches!(native, Value::Native(_)));
        assert_eq!(env.dict_get(module, field).unwrap(), native);
    }
}
