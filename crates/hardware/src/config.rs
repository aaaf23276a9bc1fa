//! Framework configuration.
//!
//! This module defines the knobs of the simulation framework itself. It provides:
//! 1. **Defaults:** Baseline constants (open-bus value, scheduler slice length).
//! 2. **Structure:** A serde-deserializable [`Config`] the embedding layer can
//!    supply from JSON, or construct with `Config::default()`.
//!
//! Machine topology (which devices exist and how they are wired) is deliberately
//! *not* configured here; that is the external driver layer's job.

use serde::Deserialize;

/// Default configuration constants for the framework.
mod defaults {
    /// Value returned for reads that no installed range claims.
    ///
    /// Real buses float when nothing drives them; most boards read floating
    /// lines as all-ones, so the default open-bus value is `0xFF`.
    pub const OPEN_BUS: u8 = 0xFF;

    /// Scheduler time-slice length in cycles.
    ///
    /// Autonomous devices are advanced in slices of this many cycles; smaller
    /// slices interleave devices more finely at the cost of loop overhead.
    /// Signal propagation is synchronous regardless of slice length, so this
    /// only affects the granularity of relative progress, never causality.
    pub const SCHED_SLICE: u64 = 64;
}

/// Root configuration for the framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Value returned by address-space reads that no handler claims.
    pub open_bus: u8,
    /// Scheduler time-slice length in cycles.
    pub sched_slice: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            open_bus: defaults::OPEN_BUS,
            sched_slice: defaults::SCHED_SLICE,
        }
    }
}
