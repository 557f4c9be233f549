//! Ember: the host-interop core of a small embeddable scripting runtime.
//!
//! An [`Environment`] owns a garbage-collected heap of dynamically typed [`Value`]s, a global
//! namespace and a call stack. Hosts register native functions into it (grouped into module
//! dictionaries), load scripts from source or bytecode files and call script-visible functions.

pub mod api;
pub mod config;
pub mod env;
pub mod error;
pub mod ffi;
pub mod function;
pub mod gc;
pub mod loader;
pub mod print;
pub mod value;

use std::sync::Once;

pub use self::{
    config::Config,
    env::{
        roots::{RootScope, Rooted, Slot},
        Environment,
    },
    error::{Error, ErrorKind, Result},
    ffi::FfiItem,
    function::{Interpreter, ScriptFunction, SourceCompiler},
    gc::{Handle, Stats},
    loader::{bytecode::Image, Format, BYTECODE_MAGIC},
    value::{Tag, Value},
};

pub type Ident = internment::Intern<String>;

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber filtered by `RUST_LOG`. Does nothing when the variable is unset.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}
