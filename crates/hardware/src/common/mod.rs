//! Common types shared across the simulation framework.
//!
//! This module provides the building blocks every component depends on:
//! 1. **Errors:** The setup/run-time/snapshot failure taxonomy.
//! 2. **Snapshots:** The flat named-field state capture model.

/// Error types for setup, run-time, and snapshot failures.
pub mod error;

/// Named-field snapshot containers, writer, and reader.
pub mod snapshot;

pub use error::{BoardError, CoreFault, SetupError, SnapshotError};
pub use snapshot::{BoardSnapshot, DeviceSnapshot, SnapshotReader, SnapshotWriter};
