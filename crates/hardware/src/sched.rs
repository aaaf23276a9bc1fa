//! Deterministic cycle-slice scheduler.
//!
//! The scheduler advances simulated time by stepping autonomous devices in
//! registration order, one cycle slice at a time. Causality never depends on
//! the slice length: signal propagation is synchronous inside the writing
//! device's own step, so an observer always sees an edge before it steps past
//! the corresponding simulated time. Purely reactive devices impose no
//! ordering constraint and are never stepped.

use tracing::trace;

use crate::common::CoreFault;
use crate::device::DeviceCell;

struct Entry {
    tag: String,
    dev: DeviceCell,
    /// Local clock: how far this device has advanced, in cycles.
    local: u64,
    /// Set once the device reports itself passive; never stepped again.
    passive: bool,
}

/// Advances simulated time over a fixed set of devices.
///
/// Stepping order is registration order, which the board fixes at
/// configuration time; together with synchronous signal propagation this
/// makes every run bit-exact for identical input histories.
pub struct Scheduler {
    entries: Vec<Entry>,
    now: u64,
    slice: u64,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("devices", &self.entries.len())
            .field("now", &self.now)
            .field("slice", &self.slice)
            .finish()
    }
}

impl Scheduler {
    /// Creates an empty scheduler with the given slice length in cycles.
    pub fn new(slice: u64) -> Self {
        Self {
            entries: Vec::new(),
            now: 0,
            slice: slice.max(1),
        }
    }

    /// Registers a device; order of registration is stepping order.
    pub fn add(&mut self, tag: &str, dev: DeviceCell) {
        self.entries.push(Entry {
            tag: tag.to_owned(),
            dev,
            local: 0,
            passive: false,
        });
    }

    /// Returns the global simulated time in cycles.
    pub const fn now(&self) -> u64 {
        self.now
    }

    /// Advances all autonomous devices by `cycles` cycles of simulated time.
    ///
    /// Each device is stepped until its local clock reaches the end of the
    /// current slice; a step's cycle cost may overshoot the slice boundary,
    /// in which case the surplus is honored in later slices. A device fault
    /// aborts the run immediately with the fault's diagnostic context.
    pub fn run_for(&mut self, cycles: u64) -> Result<(), CoreFault> {
        let target = self.now + cycles;
        while self.now < target {
            let slice_end = (self.now + self.slice).min(target);
            for entry in &mut self.entries {
                if entry.passive {
                    continue;
                }
                while entry.local < slice_end {
                    match entry.dev.borrow_mut().step()? {
                        Some(cost) => entry.local += cost.max(1),
                        None => {
                            trace!(tag = %entry.tag, "device is passive; descheduled");
                            entry.passive = true;
                            break;
                        }
                    }
                }
            }
            self.now = slice_end;
        }
        Ok(())
    }

    /// Returns `(tag, local clock)` pairs for snapshot capture.
    pub fn clocks(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|e| (e.tag.as_str(), e.local))
    }

    /// Restores one device's local clock from a snapshot.
    pub(crate) fn set_clock(&mut self, tag: &str, local: u64) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.tag == tag) {
            entry.local = local;
            entry.passive = false;
        }
    }

    /// Restores the global clock from a snapshot.
    pub(crate) fn set_now(&mut self, now: u64) {
        self.now = now;
    }
}
