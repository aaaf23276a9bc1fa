//! # Address Space Tests
//!
//! Masking, priority ordering, overlap rejection, open-bus reads, and
//! ROM/RAM backings.

use std::cell::RefCell;
use std::rc::Rc;

use boardsim_core::bus::{AddrRange, AddressSpace, BusHandler};
use boardsim_core::common::SetupError;
use pretty_assertions::assert_eq;
use rstest::rstest;

/// Handler that records accesses and answers with a constant.
struct Probe {
    answer: u8,
    reads: Vec<u32>,
    writes: Vec<(u32, u8)>,
}

impl Probe {
    fn shared(answer: u8) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            answer,
            reads: Vec::new(),
            writes: Vec::new(),
        }))
    }
}

impl BusHandler for Probe {
    fn read(&mut self, offset: u32) -> u8 {
        self.reads.push(offset);
        self.answer
    }

    fn write(&mut self, offset: u32, value: u8) {
        self.writes.push((offset, value));
    }
}

// ──────────────────────────────────────────────────────────
// Installation
// ──────────────────────────────────────────────────────────

#[test]
fn test_same_priority_overlap_is_rejected() {
    let mut space = AddressSpace::new("data", 8);
    space.install_ram(AddrRange::new(0x00, 0x7F)).unwrap();
    let err = space.install_ram(AddrRange::new(0x40, 0xBF)).unwrap_err();
    assert_eq!(
        err,
        SetupError::OverlappingRanges {
            space: "data".to_owned(),
            first_start: 0x00,
            first_end: 0x7F,
            second_start: 0x40,
            second_end: 0xBF,
            priority: 0,
        }
    );
}

#[test]
fn test_distinct_priority_overlap_is_allowed() {
    let mut space = AddressSpace::new("data", 8);
    space.install_ram(AddrRange::new(0x00, 0xFF)).unwrap();
    let probe = Probe::shared(0xAA);
    space.install(AddrRange::new(0x10, 0x1F), 1, probe).unwrap();
}

#[test]
fn test_range_beyond_mask_is_rejected() {
    let mut space = AddressSpace::new("data", 8);
    let err = space.install_ram(AddrRange::new(0x00, 0x1FF)).unwrap_err();
    assert_eq!(
        err,
        SetupError::RangeOutOfBounds {
            space: "data".to_owned(),
            start: 0x00,
            end: 0x1FF,
            bits: 8,
        }
    );
}

// ──────────────────────────────────────────────────────────
// Dispatch
// ──────────────────────────────────────────────────────────

#[test]
fn test_higher_priority_shadows_lower() {
    let mut space = AddressSpace::new("data", 8);
    space.install_ram(AddrRange::new(0x00, 0xFF)).unwrap();
    let probe = Probe::shared(0xAA);
    let handler: Rc<RefCell<dyn BusHandler>> = probe.clone();
    space
        .install(AddrRange::new(0x10, 0x1F), 1, handler)
        .unwrap();

    space.write(0x00, 0x55);
    assert_eq!(space.read(0x00), 0x55);

    // Inside the shadowed window the handler answers, not the RAM.
    assert_eq!(space.read(0x15), 0xAA);
    assert_eq!(probe.borrow().reads, vec![0x05]);
}

#[test]
fn test_handler_offsets_are_range_relative() {
    let mut space = AddressSpace::new("io", 16);
    let probe = Probe::shared(0);
    let handler: Rc<RefCell<dyn BusHandler>> = probe.clone();
    space
        .install(AddrRange::new(0x4000, 0x40FF), 0, handler)
        .unwrap();

    space.write(0x4010, 0x12);
    assert_eq!(probe.borrow().writes, vec![(0x10, 0x12)]);
}

#[test]
fn test_global_mask_mirrors_decodes() {
    let mut space = AddressSpace::new("data", 8);
    space.install_ram(AddrRange::new(0x00, 0xFF)).unwrap();
    space.write(0x12, 0x34);
    // Bits above the declared width are ignored.
    assert_eq!(space.read(0x0112), 0x34);
}

// ──────────────────────────────────────────────────────────
// Open bus and ROM
// ──────────────────────────────────────────────────────────

#[rstest]
#[case::default_floating(None, 0xFF)]
#[case::grounded(Some(0x00), 0x00)]
#[case::pattern(Some(0x5A), 0x5A)]
fn test_unmapped_read_returns_open_bus(#[case] configured: Option<u8>, #[case] expect: u8) {
    let mut space = match configured {
        Some(value) => AddressSpace::new("data", 8).with_open_bus(value),
        None => AddressSpace::new("data", 8),
    };
    space.install_ram(AddrRange::new(0x00, 0x3F)).unwrap();
    assert_eq!(space.read(0x80), expect);
}

#[test]
fn test_unmapped_write_is_dropped() {
    let mut space = AddressSpace::new("data", 8);
    space.install_ram(AddrRange::new(0x00, 0x3F)).unwrap();
    space.write(0x80, 0x77);
    assert_eq!(space.read(0x80), 0xFF);
}

#[test]
fn test_rom_reads_image_and_ignores_writes() {
    let mut space = AddressSpace::new("prog", 8);
    space
        .install_rom(AddrRange::new(0x00, 0x0F), &[0xDE, 0xAD])
        .unwrap();

    assert_eq!(space.read(0x00), 0xDE);
    assert_eq!(space.read(0x01), 0xAD);
    // Image shorter than the range is zero-padded.
    assert_eq!(space.read(0x02), 0x00);

    space.write(0x00, 0x11);
    assert_eq!(space.read(0x00), 0xDE);
}
