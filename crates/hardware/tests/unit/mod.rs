//! # Unit Components
//!
//! This module serves as the central hub for the unit tests of the
//! simulation framework, organized one file per framework module.


/// Unit tests for address spaces: masking, priorities, overlap rejection,
/// open-bus reads, and ROM/RAM backings.
pub mod bus;

/// Unit tests for the device tree and lifecycle: registration order, tag
/// uniqueness, start-time name resolution, and lifecycle guards.
pub mod device;




/// Unit tests for snapshot capture and bit-identical restore.
pub mod snapshot;


/// Unit tests for configuration defaults and deserialization.
pub mod config;
