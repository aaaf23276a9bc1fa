//! Flat named-field snapshot model.
//!
//! Every device exposes its persistent state as an ordered list of named `u64`
//! fields. The external save-state collaborator reads and writes these fields
//! verbatim; the framework guarantees that restoring all of them reproduces
//! bit-identical future behavior. This module provides:
//! 1. **Containers:** [`DeviceSnapshot`] and [`BoardSnapshot`], serde-serializable.
//! 2. **Writer:** [`SnapshotWriter`], used by `Device::save` to declare fields.
//! 3. **Reader:** [`SnapshotReader`], used by `Device::load` with missing-field errors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::SnapshotError;

/// Captured state of a single device: ordered `(name, value)` pairs.
///
/// Field order is the order the device declared them in `save`; restore is
/// by name, so reordering fields across versions is tolerated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    fields: Vec<(String, u64)>,
}

impl DeviceSnapshot {
    /// Returns the value of a named field, if present.
    pub fn get(&self, name: &str) -> Option<u64> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, v)| v)
    }

    /// Returns the ordered field list.
    pub fn fields(&self) -> &[(String, u64)] {
        &self.fields
    }
}

/// Captured state of an entire board: one [`DeviceSnapshot`] per device tag,
/// plus the scheduler's clocks so restored timing is exact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    /// Per-device snapshots keyed by full device tag.
    pub devices: BTreeMap<String, DeviceSnapshot>,
    /// Per-device local clocks keyed by full device tag.
    pub clocks: BTreeMap<String, u64>,
    /// Global simulated time in cycles.
    pub now: u64,
}

/// Collects the named fields a device declares during `save`.
#[derive(Debug, Default)]
pub struct SnapshotWriter {
    snap: DeviceSnapshot,
}

impl SnapshotWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares one named field.
    pub fn field(&mut self, name: &str, value: u64) {
        self.snap.fields.push((name.to_owned(), value));
    }

    /// Finishes the capture and returns the snapshot.
    pub fn finish(self) -> DeviceSnapshot {
        self.snap
    }
}

/// Reads named fields back out of a [`DeviceSnapshot`] during `load`.
///
/// A field the device expects but the snapshot lacks is a
/// [`SnapshotError::MissingField`]; partial restores are never silently
/// accepted, since they would break the bit-identical-continuation guarantee.
#[derive(Debug)]
pub struct SnapshotReader<'a> {
    tag: &'a str,
    snap: &'a DeviceSnapshot,
}

impl<'a> SnapshotReader<'a> {
    /// Creates a reader over one device's snapshot.
    pub fn new(tag: &'a str, snap: &'a DeviceSnapshot) -> Self {
        Self { tag, snap }
    }

    /// Returns a required field, or a missing-field error naming the device.
    pub fn field(&self, name: &str) -> Result<u64, SnapshotError> {
        self.snap
            .get(name)
            .ok_or_else(|| SnapshotError::MissingField {
                tag: self.tag.to_owned(),
                field: name.to_owned(),
            })
    }
}
