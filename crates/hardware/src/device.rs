//! Device trait, lifecycle, and cross-reference resolution.
//!
//! A device is the base unit of simulation: it owns its sub-resources (signal
//! lines it drives, address-space handlers it installs), participates in the
//! construction → start → reset lifecycle, and composes into a tree. This
//! module provides:
//! 1. **The [`Device`] trait:** tag, start, reset, step, and snapshot hooks,
//!    with passive defaults so reactive devices implement almost nothing.
//! 2. **Lifecycle states:** The board-level state machine devices move through.
//! 3. **[`StartCtx`]:** Name-based lookup of peer devices during start, handing
//!    out *weak* handles so cross-tree references never become ownership.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::common::{CoreFault, SetupError, SnapshotError, SnapshotReader, SnapshotWriter};

/// Shared ownership handle used by the board and scheduler.
pub type DeviceCell = Rc<RefCell<dyn Device>>;

/// Weak cross-reference handle resolved by name during start.
///
/// Holding one never extends a device's lifetime; upgrade at the point of use.
pub type DeviceRef = Weak<RefCell<dyn Device>>;

/// Lifecycle states of a board and its devices.
///
/// Construction is pure (no cross-device access); resources are installed and
/// peers resolved during `Started`; `Resetting` re-enters the initial state
/// without tearing down installed ranges or lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Object graph built; no I/O performed yet.
    Constructed,
    /// Resources installed, cross-references resolved, initial levels asserted.
    Started,
    /// Steady state; receives step and notify calls.
    Running,
    /// Transiently re-entering the defined initial state.
    Resetting,
}

/// The base unit of simulation.
///
/// All methods except [`Device::tag`] have defaults suitable for a passive
/// device that only reacts to signal edges and bus accesses.
pub trait Device {
    /// Returns the device's full, stable tag (e.g. `"kbd"`, `"kbd:mcu"`).
    fn tag(&self) -> &str;

    /// Resolves cross-references and asserts initial state.
    ///
    /// Called once, parent before children, after the whole tree is
    /// constructed. Any peer named here must exist; a miss is fatal.
    fn start(&mut self, _ctx: &mut StartCtx<'_>) -> Result<(), SetupError> {
        Ok(())
    }

    /// Re-enters the defined initial state.
    ///
    /// Installed address ranges and registered lines survive; only mutable
    /// state returns to its power-on values. Must be idempotent.
    fn reset(&mut self) {}

    /// Advances the device by one quantum of simulated execution.
    ///
    /// Autonomous devices return `Ok(Some(cycles))` for the cost of the step;
    /// passive devices keep the default `Ok(None)` and are never scheduled.
    fn step(&mut self) -> Result<Option<u64>, CoreFault> {
        Ok(None)
    }

    /// Declares the device's persistent state as named fields.
    fn save(&self, _w: &mut SnapshotWriter) {}

    /// Restores the device's persistent state from named fields.
    fn load(&mut self, _r: &SnapshotReader<'_>) -> Result<(), SnapshotError> {
        Ok(())
    }

    /// Downcast hook for the debug console's CPU-specific views.
    fn as_cpu_mut(&mut self) -> Option<&mut crate::cpu::CpuCore> {
        None
    }
}

impl fmt::Debug for dyn Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device").field("tag", &self.tag()).finish()
    }
}

/// Name-resolution context passed to [`Device::start`].
///
/// Lookups return weak handles: a device may call a peer at run time but never
/// owns it, preserving the tree-ownership invariant.
#[derive(Debug)]
pub struct StartCtx<'a> {
    registry: &'a BTreeMap<String, DeviceCell>,
}

impl<'a> StartCtx<'a> {
    pub(crate) fn new(registry: &'a BTreeMap<String, DeviceCell>) -> Self {
        Self { registry }
    }

    /// Resolves a peer device by tag.
    ///
    /// A missing tag is a fatal configuration error, surfaced now rather than
    /// deferred to run time.
    pub fn lookup(&self, tag: &str) -> Result<DeviceRef, SetupError> {
        self.registry
            .get(tag)
            .map(Rc::downgrade)
            .ok_or_else(|| SetupError::UnresolvedRef(tag.to_owned()))
    }
}
