//! Keeping values alive across native code.
//!
//! The collector only sees values reachable from globals, call frames, the pin stack and host
//! roots. A native callback that holds a heap value in a local across an allocation must pin a
//! slot for it first. [`RootScope`] does this with a guard that unwinds its pins on every exit
//! path; [`Environment::pin_local`] / [`Environment::unpin_local`] are the raw push/pop pair.

use std::{
    ops::{Deref, DerefMut},
    rc::Rc,
};
use tracing::trace;
use crate::{
    error::{Error, ErrorKind, Result},
    value::Value,
};
use super::Environment;

/// A position on the pin stack.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Slot(usize);

impl Environment {
    pub fn pin_depth(&self) -> usize {
        self.pins.len()
    }

    fn pin_base(&self) -> usize {
        self.frames
            .last()
            .map_or(0, |frame| frame.pin_base)
    }

    /// Push `value` onto the pin stack.
    pub fn pin_local(&mut self, value: Value) -> Result<Slot> {
        if self.pins.len() - self.pin_base() >= self.config.max_pins {
            return Err(Error::new(
                ErrorKind::PinOverflow,
                format!("More than {} values pinned in one frame.", self.config.max_pins),
            ));
        }
        self.pins.push(value);
        trace!(depth = self.pins.len(), "pin");
        Ok(Slot(self.pins.len() - 1))
    }

    /// Pop `slot`, which must be the most recent pin of the active frame.
    pub fn unpin_local(&mut self, slot: Slot) -> Result<()> {
        let top = self.pins.len().checked_sub(1);
        if top != Some(slot.0) || slot.0 < self.pin_base() {
            return Err(Error::new(
                ErrorKind::PinImbalance,
                format!("Unpinned slot {} out of order (pin stack depth {}).", slot.0, self.pins.len()),
            ));
        }
        self.pins.pop();
        trace!(depth = self.pins.len(), "unpin");
        Ok(())
    }

    pub fn pinned(&self, slot: Slot) -> Result<Value> {
        self.pins
            .get(slot.0)
            .copied()
            .ok_or_else(|| dead_slot(slot))
    }

    pub fn set_pinned(&mut self, slot: Slot, value: Value) -> Result<()> {
        match self.pins.get_mut(slot.0) {
            Some(pinned) => {
                *pinned = value;
                Ok(())
            },
            None => Err(dead_slot(slot)),
        }
    }

    /// Open a scope whose pins are released when it is dropped.
    pub fn roots(&mut self) -> RootScope<'_> {
        let base = self.pins.len();
        RootScope {
            env: self,
            base,
        }
    }

    pub fn with_roots<T, F>(&mut self, f: F) -> T
    where
        F: FnOnce(&mut RootScope<'_>) -> T,
    {
        let mut scope = self.roots();
        f(&mut scope)
    }

    /// Keep `value` alive from host code until every clone of the returned handle is dropped.
    pub fn root(&mut self, value: Value) -> Rooted {
        let rc = Rc::new(());
        self.rooted.push((rc.clone(), value));
        Rooted {
            _rc: rc,
            value,
        }
    }
}

fn dead_slot(slot: Slot) -> Error {
    Error::new(ErrorKind::PinImbalance, format!("Slot {} is no longer pinned.", slot.0))
}

/// Guard over the pin stack.
///
/// Derefs to the environment, so callbacks use it in place of `&mut Environment`. Dropping it
/// truncates the pin stack back to where it was when the scope opened.
pub struct RootScope<'env> {
    env: &'env mut Environment,
    base: usize,
}

impl RootScope<'_> {
    /// Pin an empty slot to be written later.
    pub fn slot(&mut self) -> Result<Slot> {
        self.env.pin_local(Value::Nil)
    }

    pub fn pin(&mut self, value: Value) -> Result<Slot> {
        self.env.pin_local(value)
    }

    pub fn get(&self, slot: Slot) -> Result<Value> {
        self.env.pinned(slot)
    }

    pub fn set(&mut self, slot: Slot, value: Value) -> Result<()> {
        self.env.set_pinned(slot, value)
    }

    /// Pins held by this scope.
    pub fn len(&self) -> usize {
        self.env.pins.len().saturating_sub(self.base)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for RootScope<'_> {
    fn drop(&mut self) {
        self.env.pins.truncate(self.base);
    }
}

impl Deref for RootScope<'_> {
    type Target = Environment;

    fn deref(&self) -> &Self::Target {
        self.env
    }
}

impl DerefMut for RootScope<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.env
    }
}

/// A host-held root, the counterpart of a pin that outlives any single call.
#[derive(Clone, Debug)]
pub struct Rooted {
    _rc: Rc<()>,
    value: Value,
}

impl Rooted {
    pub fn value(&self) -> Value {
        self.value
    }
}
