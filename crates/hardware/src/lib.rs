//! Deterministic device/signal/bus hardware simulation framework.
//!
//! This crate implements a bit-exact, cycle-counted board simulation core with the following:
//! 1. **Signals:** Single-driver and open-collector wired lines with synchronous edge delivery.
//! 2. **Buses:** Masked, priority-ordered memory-mapped address spaces with open-bus reads.
//! 3. **Devices:** A tagged device tree with a construct/start/reset lifecycle and weak cross-references.
//! 4. **CPU:** A table-driven core engine parameterized by variant descriptors and decode overrides.
//! 5. **Scheduling:** Registration-order cycle-slice stepping with per-device local clocks.
//! 6. **State:** Flat named-field snapshots, debug views, and a text command console.

/// Memory-mapped address spaces (installation, masking, open bus).
pub mod bus;
/// Common types (error taxonomy, snapshot containers).
pub mod common;
/// Framework configuration (defaults, serde structures).
pub mod config;
/// Table-driven CPU core engine and the reference variant family.
pub mod cpu;
/// Debug views and the text command console.
pub mod debug;
/// Device trait, lifecycle states, and start-time name resolution.
pub mod device;
/// Reference peripheral devices (keyboard handshake controller).
pub mod devices;
/// The board: device tree, lifecycle driver, save/restore.
pub mod machine;
/// Deterministic cycle-slice scheduler.
pub mod sched;
/// Signal lines, drivers of record, and edge observers.
pub mod signal;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// Top-level machine type; construct with `Board::new`, wire, then `start`.
pub use crate::machine::Board;
/// Table-driven CPU core; instantiate from a `cpu::family` variant.
pub use crate::cpu::CpuCore;
