//! Digital signal lines with synchronous edge propagation.
//!
//! A [`SignalLine`] models a single wire (or narrow shared bus) connecting
//! devices. It provides:
//! 1. **Drivers of record:** Mutation only through [`Driver`] handles registered
//!    at setup; a plain line accepts exactly one, wired lines any number.
//! 2. **Explicit combining:** Shared lines declare wired-AND or wired-OR
//!    (open-collector) semantics at construction, never implicitly.
//! 3. **Edge suppression:** Observers are notified only when the effective
//!    level actually changes, synchronously and depth-first, before the
//!    driving `set` call returns.
//!
//! The framework is single-threaded by contract; lines are shared with
//! `Rc<RefCell<...>>` handles and are not `Send`.

use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::Rc;

use tracing::trace;

use crate::common::SetupError;

/// A signal level: `0` is low, nonzero is high. Narrow shared buses use the
/// full byte, with wired combining applied bitwise.
pub type Level = u8;

/// Logic-low level.
pub const LOW: Level = 0;
/// Logic-high level for boolean wires.
///
/// All bits are set so that a driven high is indistinguishable from a
/// released open-collector contribution under wired-AND combining.
pub const HIGH: Level = 0xFF;

/// How multiple driver contributions combine into the line's effective level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combine {
    /// Exactly one driver of record; its value is the line's value.
    Single,
    /// Open-collector wired-AND: released drivers contribute all-ones.
    WiredAnd,
    /// Open-collector wired-OR: released drivers contribute zero.
    WiredOr,
}

type ObserverFn = Box<dyn FnMut(Level)>;

struct Inner {
    name: String,
    combine: Combine,
    /// Level seen when no driver is registered (plain lines only).
    undriven: Level,
    drivers: Vec<Level>,
    /// Last level delivered to observers; used to suppress redundant edges.
    delivered: Level,
    observers: Vec<ObserverFn>,
    delivering: bool,
}

impl Inner {
    fn effective(&self) -> Level {
        match self.combine {
            Combine::Single => self.drivers.first().copied().unwrap_or(self.undriven),
            Combine::WiredAnd => self.drivers.iter().fold(0xFF, |acc, &d| acc & d),
            Combine::WiredOr => self.drivers.iter().fold(0x00, |acc, &d| acc | d),
        }
    }
}

/// A shared handle to one signal line.
///
/// Cloning the handle shares the underlying wire; the line itself lives as
/// long as any handle (or registered driver) does.
#[derive(Clone)]
pub struct SignalLine {
    inner: Rc<RefCell<Inner>>,
}

impl fmt::Debug for SignalLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("SignalLine")
            .field("name", &inner.name)
            .field("level", &inner.effective())
            .field("drivers", &inner.drivers.len())
            .field("observers", &inner.observers.len())
            .finish()
    }
}

impl SignalLine {
    fn with_combine(name: &str, combine: Combine, undriven: Level) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                name: name.to_owned(),
                combine,
                undriven,
                drivers: Vec::new(),
                delivered: undriven,
                observers: Vec::new(),
                delivering: false,
            })),
        }
    }

    /// Creates a plain single-driver line resting at `initial`.
    pub fn new(name: &str, initial: Level) -> Self {
        Self::with_combine(name, Combine::Single, initial)
    }

    /// Creates an open-collector wired-AND line (released drivers read high).
    pub fn wired_and(name: &str) -> Self {
        Self::with_combine(name, Combine::WiredAnd, 0xFF)
    }

    /// Creates an open-collector wired-OR line (released drivers read low).
    pub fn wired_or(name: &str) -> Self {
        Self::with_combine(name, Combine::WiredOr, 0x00)
    }

    /// Returns the line's name.
    pub fn name(&self) -> String {
        self.inner.borrow().name.clone()
    }

    /// Returns the current effective level.
    ///
    /// This reflects the most recent driver write immediately, even when read
    /// from inside an observer callback of the same propagation step.
    pub fn level(&self) -> Level {
        self.inner.borrow().effective()
    }

    /// Returns whether the current effective level is nonzero.
    pub fn is_high(&self) -> bool {
        self.level() != LOW
    }

    /// Registers a driver of record for this line.
    ///
    /// On a plain line this may be called once; a second registration is
    /// `SetupError::AmbiguousDriver`, rejecting ambiguous ownership at setup.
    /// Wired lines accept any number of drivers; a new driver starts released
    /// (contributing the combine identity) so registration never glitches the
    /// line.
    pub fn driver(&self) -> Result<Driver, SetupError> {
        let mut inner = self.inner.borrow_mut();
        let initial = match inner.combine {
            Combine::Single => {
                if !inner.drivers.is_empty() {
                    return Err(SetupError::AmbiguousDriver(inner.name.clone()));
                }
                inner.undriven
            }
            Combine::WiredAnd => 0xFF,
            Combine::WiredOr => 0x00,
        };
        inner.drivers.push(initial);
        let slot = inner.drivers.len() - 1;
        drop(inner);
        Ok(Driver {
            line: self.clone(),
            slot,
        })
    }

    /// Registers an observer invoked with the new level on every effective
    /// transition.
    ///
    /// Observers run synchronously inside the driving `set` call. An observer
    /// may write other lines (propagation completes depth-first); it must not
    /// re-borrow the device that is currently driving, which reads its own
    /// line back with [`SignalLine::level`] instead.
    pub fn on_change(&self, f: impl FnMut(Level) + 'static) {
        self.inner.borrow_mut().observers.push(Box::new(f));
    }

    /// Delivers pending edges to observers until the line is stable.
    ///
    /// Re-entrant writes to this line while delivery is in progress only
    /// update the driver contribution; the active loop picks the new
    /// effective level up on its next pass, so observer recursion on a
    /// feedback wire stays bounded.
    fn deliver<'a>(&'a self, mut inner: std::cell::RefMut<'a, Inner>) {
        if inner.delivering {
            return;
        }
        inner.delivering = true;
        loop {
            let eff = inner.effective();
            if eff == inner.delivered {
                break;
            }
            inner.delivered = eff;
            trace!(line = %inner.name, level = eff, "signal edge");
            let mut observers = mem::take(&mut inner.observers);
            drop(inner);
            for obs in &mut observers {
                obs(eff);
            }
            inner = self.inner.borrow_mut();
            // Observers registered during delivery land behind the originals.
            let added = mem::replace(&mut inner.observers, observers);
            inner.observers.extend(added);
        }
        inner.delivering = false;
    }
}

/// Exclusive write handle for one driver of record on a [`SignalLine`].
///
/// The handle *is* the registered driver identity, so a write from an
/// unregistered driver cannot be expressed at all. The checked step is
/// [`SignalLine::driver`] at setup.
pub struct Driver {
    line: SignalLine,
    slot: usize,
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("line", &self.line.inner.borrow().name)
            .field("slot", &self.slot)
            .finish()
    }
}

impl Driver {
    /// Updates this driver's contribution and propagates any resulting edge.
    ///
    /// Observers of the line are invoked synchronously before this call
    /// returns; writes that do not change the effective level notify nobody.
    pub fn set(&self, level: Level) {
        let mut inner = self.line.inner.borrow_mut();
        inner.drivers[self.slot] = level;
        self.line.deliver(inner);
    }

    /// Drives the boolean high/low convenience levels.
    pub fn set_bool(&self, high: bool) {
        self.set(if high { HIGH } else { LOW });
    }

    /// Returns the line this driver is registered on.
    pub fn line(&self) -> &SignalLine {
        &self.line
    }
}
