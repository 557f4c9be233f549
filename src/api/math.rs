//! `Math`: numeric helpers. Every function accepts integers and floats alike.

use crate::{
    env::Environment,
    error::{Error, Result},
    ffi::FfiItem,
    value::Value,
};

pub const FUNCTIONS: &[FfiItem] = &[
    FfiItem::new("__Math_abs", "abs", &["x"], abs),
    FfiItem::new("__Math_sqrt", "sqrt", &["x"], sqrt),
    FfiItem::new("__Math_sin", "sin", &["x"], sin),
    FfiItem::new("__Math_cos", "cos", &["x"], cos),
    FfiItem::new("__Math_tan", "tan", &["x"], tan),
    FfiItem::new("__Math_random", "random", &[], random),
];

pub fn register(env: &mut Environment) -> Result<Value> {
    env.register_functions("Math", FUNCTIONS)
}

/// Keeps the integer or float tag of its argument.
fn abs(env: &mut Environment) -> Result<()> {
    match env.arg(0)? {
        Value::Int(x) => {
            let y = x
                .checked_abs()
                .ok_or_else(|| Error::runtime(format!("abs({}) overflows an integer.", x)))?;
            env.set_return_int(y)
        },
        Value::Float(x) => env.set_return_float(x.abs()),
        _ => Err(env.arg_mismatch(0, "a number")),
    }
}

/// Negative input gives NaN.
fn sqrt(env: &mut Environment) -> Result<()> {
    let x = env.arg_number(0)?;
    env.set_return_float(x.sqrt())
}

fn sin(env: &mut Environment) -> Result<()> {
    let x = env.arg_number(0)?;
    env.set_return_float(x.sin())
}

fn cos(env: &mut Environment) -> Result<()> {
    let x = env.arg_number(0)?;
    env.set_return_float(x.cos())
}

fn tan(env: &mut Environment) -> Result<()> {
    let x = env.arg_number(0)?;
    env.set_return_float(x.tan())
}

fn random(env: &mut Environment) -> Result<()> {
    let x = env.random();
    env.set_return_float(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, error::ErrorKind};

    fn env() -> Environment {
        let mut env = Environment::new();
        register(&mut env).unwrap();
        env
    }

    #[test]
    fn abs_keeps_tag() {
        let mut env = env();
        assert_eq!(env.call("__Math_abs", &[Value::Int(-5)]).unwrap(), Value::Int(5));
        assert_eq!(env.call("__Math_abs", &[Value::Float(-2.5)]).unwrap(), Value::Float(2.5));
    }

    #[test]
    fn abs_of_min_int_is_an_error() {
        let mut env = env();
        let err = env.call("__Math_abs", &[Value::Int(i64::MIN)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Runtime);
        assert!(env.fatal_error().is_none());
    }

    #[test]
    fn sqrt_normalizes_to_float() {
        let mut env = env();
        assert_eq!(env.call("__Math_sqrt", &[Value::Int(4)]).unwrap(), Value::Float(2.0));
        match env.call("__Math_sqrt", &[Value::Float(-1.0)]).unwrap() {
            Value::Float(x) => assert!(x.is_nan()),
            other => panic!("expected a float, got {:?}", other),
        }
    }

    #[test]
    fn strings_are_rejected() {
        let mut env = env();
        let s = env.make_string("4").unwrap();
        for name in ["__Math_abs", "__Math_sqrt", "__Math_sin", "__Math_cos", "__Math_tan"] {
            let err = env.call(name, &[s]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::TypeMismatch);
            assert_eq!(err.message(), "Argument (0: x) not a number.");
        }
    }

    #[test]
    fn random_is_seeded_per_environment() {
        let draw = |seed| {
            let mut env = Environment::with_config(Config::default().with_seed(seed));
            register(&mut env).unwrap();
            (0..4)
                .map(|_| env.call("__Math_random", &[]).unwrap().as_float().unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(draw(7), draw(7));
        assert_ne!(draw(7), draw(8));
        assert!(draw(7).iter().all(|x| (0.0..1.0).contains(x)));
    }
}
