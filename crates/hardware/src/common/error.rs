//! Error taxonomy for the simulation framework.
//!
//! This module defines the three failure families the framework distinguishes:
//! 1. **Setup errors:** Inconsistent configuration (overlapping ranges, unresolved
//!    references, ambiguous line ownership). Fatal, reported before the board runs.
//! 2. **Core faults:** Internal inconsistencies at run time (an opcode with no
//!    handler). Fatal, carry the device tag and program counter for diagnostics.
//! 3. **Snapshot errors:** Malformed or incomplete saved state on restore.
//!
//! Expected hardware conditions (open-bus reads, undriven pins) are *not* errors
//! and never appear here; they have defined, deterministic values.

use thiserror::Error;

/// Configuration-time errors, detected and reported before a board enters `Running`.
///
/// None of these are recovered from: a board whose setup fails is discarded.
/// Silent recovery from inconsistent wiring is exactly the class of bug this
/// taxonomy exists to prevent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    /// A device tag was registered twice on the same board.
    #[error("device tag `{0}` is already registered")]
    DuplicateTag(String),

    /// A named cross-device reference did not resolve during start.
    #[error("unresolved device reference `{0}`")]
    UnresolvedRef(String),

    /// A parent tag named in `add_device` does not exist yet.
    ///
    /// Devices are registered parent-before-children; a missing parent means
    /// the tree is being built out of order.
    #[error("parent device `{0}` is not registered")]
    UnknownParent(String),

    /// Two installed address ranges overlap at the same priority.
    ///
    /// Overlap is permitted only with distinct priorities; anything else would
    /// silently shadow one handler at run time.
    #[error(
        "address ranges {first_start:#x}..={first_end:#x} and {second_start:#x}..={second_end:#x} \
         overlap at priority {priority} in space `{space}`"
    )]
    OverlappingRanges {
        /// Name of the address space rejecting the install.
        space: String,
        /// Start of the previously installed range.
        first_start: u32,
        /// End (inclusive) of the previously installed range.
        first_end: u32,
        /// Start of the range being installed.
        second_start: u32,
        /// End (inclusive) of the range being installed.
        second_end: u32,
        /// The shared priority that made the overlap ambiguous.
        priority: u8,
    },

    /// An installed range does not fit the space's address mask.
    #[error("range {start:#x}..={end:#x} exceeds the {bits}-bit address width of space `{space}`")]
    RangeOutOfBounds {
        /// Name of the address space rejecting the install.
        space: String,
        /// Start of the offending range.
        start: u32,
        /// End (inclusive) of the offending range.
        end: u32,
        /// Address width of the space in bits.
        bits: u8,
    },

    /// A second driver was registered on a line configured for a single driver of record.
    ///
    /// Shared mutation requires an explicit wired-AND/OR combine rule at line
    /// construction; two drivers on a plain line is ambiguous ownership.
    #[error("signal line `{0}` already has a driver of record")]
    AmbiguousDriver(String),

    /// A variant's override list names the same opcode slot twice.
    #[error("variant `{variant}` overrides opcode {opcode:#04x} more than once")]
    DuplicateOverride {
        /// Name of the variant whose override list is malformed.
        variant: &'static str,
        /// The opcode slot that was listed twice.
        opcode: u8,
    },

    /// An address space name was registered twice on the same board.
    #[error("address space `{0}` is already registered")]
    DuplicateSpace(String),

    /// A lifecycle operation was invoked from the wrong state.
    #[error("invalid lifecycle transition: {0}")]
    Lifecycle(String),
}

/// Fatal run-time internal errors.
///
/// These indicate a construction bug (a corrupted or incomplete decode table),
/// not a recoverable hardware condition, and abort the simulation with enough
/// context to locate the faulty device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreFault {
    /// An opcode was fetched for which no handler is registered.
    #[error("{tag}: no handler for opcode {opcode:#04x} at pc {pc:#06x}")]
    UnhandledOpcode {
        /// Tag of the device that hit the hole.
        tag: String,
        /// Program counter at the time of the fetch.
        pc: u32,
        /// The unhandled opcode value.
        opcode: u8,
    },
}

/// Umbrella error for board-level operations.
///
/// `Board::run_for` can fail as a lifecycle misuse (setup family) or as a
/// device fault (run-time family); restore additionally as a snapshot error.
/// Callers that care about the family match on the variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    /// Configuration or lifecycle misuse.
    #[error(transparent)]
    Setup(#[from] SetupError),

    /// Fatal device fault during stepping.
    #[error(transparent)]
    Fault(#[from] CoreFault),

    /// Malformed or incomplete snapshot on restore.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Errors raised while restoring a captured snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    /// The snapshot has no entry for a device present on the board.
    #[error("snapshot is missing device `{0}`")]
    MissingDevice(String),

    /// A device's snapshot lacks a field the device expects.
    #[error("snapshot for `{tag}` is missing field `{field}`")]
    MissingField {
        /// Tag of the device being restored.
        tag: String,
        /// Name of the absent field.
        field: String,
    },
}
