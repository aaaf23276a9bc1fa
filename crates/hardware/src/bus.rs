//! Memory-mapped address spaces.
//!
//! An [`AddressSpace`] routes masked addresses to installed handlers. It provides:
//! 1. **Installation:** `(range, priority, handler)` bindings at setup, with
//!    overlap rejection — two ranges may only overlap under distinct,
//!    explicitly ordered priorities, never by silent shadowing.
//! 2. **Masking:** A global mask derived from the declared address width is
//!    applied before every lookup, so mirrored decodes come for free.
//! 3. **Open bus:** Reads that no range claims return a defined value instead
//!    of failing; real hardware floats, it does not throw.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::common::SetupError;

/// Default open-bus value when none is configured; floating lines read high.
const OPEN_BUS_DEFAULT: u8 = 0xFF;

/// Run-time handler for an installed address range.
///
/// Offsets passed in are relative to the range's start, after masking.
pub trait BusHandler {
    /// Reads one byte at the given range-relative offset.
    fn read(&mut self, offset: u32) -> u8;
    /// Writes one byte at the given range-relative offset.
    fn write(&mut self, offset: u32, value: u8);
}

/// An inclusive address range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddrRange {
    /// First address of the range.
    pub start: u32,
    /// Last address of the range (inclusive).
    pub end: u32,
}

impl AddrRange {
    /// Creates a new inclusive range.
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Returns whether the range contains the given (already masked) address.
    const fn contains(&self, addr: u32) -> bool {
        addr >= self.start && addr <= self.end
    }

    const fn overlaps(&self, other: &Self) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

enum Backing {
    /// Read/write memory owned by the space.
    Ram(Vec<u8>),
    /// Read-only memory; writes are dropped.
    Rom(Vec<u8>),
    /// A device handler; shared so one device can serve several ranges.
    Handler(Rc<RefCell<dyn BusHandler>>),
}

struct Binding {
    range: AddrRange,
    priority: u8,
    backing: Backing,
}

/// A memory-mapped register/bus dispatch table.
///
/// Created per logical bus (e.g. a CPU's program space and data space are two
/// separate `AddressSpace` values). Installation happens at setup and fails
/// fast on ambiguity; `read`/`write` at run time never fail.
pub struct AddressSpace {
    name: String,
    addr_bits: u8,
    mask: u32,
    open_bus: u8,
    bindings: Vec<Binding>,
}

impl fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressSpace")
            .field("name", &self.name)
            .field("addr_bits", &self.addr_bits)
            .field("bindings", &self.bindings.len())
            .finish()
    }
}

impl AddressSpace {
    /// Creates an empty space with a global mask of `addr_bits` bits.
    pub fn new(name: &str, addr_bits: u8) -> Self {
        debug_assert!(addr_bits >= 1 && addr_bits <= 32);
        Self {
            name: name.to_owned(),
            addr_bits,
            mask: ((1u64 << addr_bits) - 1) as u32,
            open_bus: OPEN_BUS_DEFAULT,
            bindings: Vec::new(),
        }
    }

    /// Sets the value returned for unclaimed reads.
    pub fn with_open_bus(mut self, value: u8) -> Self {
        self.open_bus = value;
        self
    }

    /// Returns the space's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the global address mask.
    pub const fn mask(&self) -> u32 {
        self.mask
    }

    fn check_range(&self, range: AddrRange, priority: u8) -> Result<(), SetupError> {
        if range.end < range.start || range.end > self.mask {
            return Err(SetupError::RangeOutOfBounds {
                space: self.name.clone(),
                start: range.start,
                end: range.end,
                bits: self.addr_bits,
            });
        }
        for existing in &self.bindings {
            if existing.range.overlaps(&range) && existing.priority == priority {
                return Err(SetupError::OverlappingRanges {
                    space: self.name.clone(),
                    first_start: existing.range.start,
                    first_end: existing.range.end,
                    second_start: range.start,
                    second_end: range.end,
                    priority,
                });
            }
        }
        Ok(())
    }

    fn bind(&mut self, range: AddrRange, priority: u8, backing: Backing) -> Result<(), SetupError> {
        self.check_range(range, priority)?;
        self.bindings.push(Binding {
            range,
            priority,
            backing,
        });
        // Highest priority first, then lowest start for stable lookups.
        self.bindings
            .sort_by(|a, b| b.priority.cmp(&a.priority).then(a.range.start.cmp(&b.range.start)));
        Ok(())
    }

    /// Installs a device handler over a range at the given priority.
    ///
    /// Overlapping an existing range at the *same* priority is a setup error;
    /// a higher priority explicitly shadows lower-priority ranges beneath it.
    pub fn install(
        &mut self,
        range: AddrRange,
        priority: u8,
        handler: Rc<RefCell<dyn BusHandler>>,
    ) -> Result<(), SetupError> {
        self.bind(range, priority, Backing::Handler(handler))
    }

    /// Installs read-only memory over a range at priority 0.
    ///
    /// The image is truncated or zero-padded to the range length.
    pub fn install_rom(&mut self, range: AddrRange, image: &[u8]) -> Result<(), SetupError> {
        let len = (range.end - range.start + 1) as usize;
        let mut bytes = image.to_vec();
        bytes.resize(len, 0);
        self.bind(range, 0, Backing::Rom(bytes))
    }

    /// Installs zero-initialized read/write memory over a range at priority 0.
    pub fn install_ram(&mut self, range: AddrRange) -> Result<(), SetupError> {
        let len = (range.end - range.start + 1) as usize;
        self.bind(range, 0, Backing::Ram(vec![0; len]))
    }

    fn find(&mut self, masked: u32) -> Option<&mut Binding> {
        // Bindings are sorted by descending priority, so the first hit wins.
        self.bindings.iter_mut().find(|b| b.range.contains(masked))
    }

    /// Reads one byte; unclaimed addresses return the open-bus value.
    pub fn read(&mut self, addr: u32) -> u8 {
        let masked = addr & self.mask;
        let open_bus = self.open_bus;
        match self.find(masked) {
            Some(binding) => {
                let offset = masked - binding.range.start;
                match &mut binding.backing {
                    Backing::Ram(bytes) | Backing::Rom(bytes) => bytes[offset as usize],
                    Backing::Handler(h) => h.borrow_mut().read(offset),
                }
            }
            None => {
                trace!(space = %self.name, addr = masked, "open-bus read");
                open_bus
            }
        }
    }

    /// Writes one byte; unclaimed addresses and ROM ranges drop the write.
    pub fn write(&mut self, addr: u32, value: u8) {
        let masked = addr & self.mask;
        match self.find(masked) {
            Some(binding) => {
                let offset = masked - binding.range.start;
                match &mut binding.backing {
                    Backing::Ram(bytes) => bytes[offset as usize] = value,
                    Backing::Rom(_) => {
                        trace!(space = %self.name, addr = masked, "write to rom dropped");
                    }
                    Backing::Handler(h) => h.borrow_mut().write(offset, value),
                }
            }
            None => {
                trace!(space = %self.name, addr = masked, value, "unmapped write dropped");
            }
        }
    }
}
