//! The standard host modules: `Math`, `Console` and `System`.

pub mod console;
pub mod math;
pub mod system;

use tracing::debug;
use crate::{env::Environment, error::Result};

/// Install every standard module into `env`.
pub fn register_all(env: &mut Environment) -> Result<()> {
    math::register(env)?;
    console::register(env)?;
    system::register(env)?;
    debug!("standard modules installed");
    Ok(())
}
