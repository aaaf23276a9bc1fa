//! # Snapshot Tests
//!
//! Bit-identical continuation after save/restore, serde round trips,
//! missing-device/field rejection, and reset idempotence.

use boardsim_core::common::{BoardError, BoardSnapshot, SnapshotError, SnapshotWriter};
use boardsim_core::cpu::family;
use pretty_assertions::assert_eq;

use crate::common::board_with_cpu;

/// Counting loop: keeps adding and latching the accumulator forever.
const COUNTING_LOOP: [u8; 8] = [
    family::OP_LDA,
    0x01,
    family::OP_ADD,
    0x03,
    family::OP_OUT,
    family::OP_JMP,
    0x02,
    0x00,
];

#[test]
fn test_restore_continues_bit_identically() {
    let tb = board_with_cpu(&family::m100(), &COUNTING_LOOP);
    let mut original = tb.board;
    original.run_for(500).unwrap();
    let snap = original.save_state();
    original.run_for(500).unwrap();
    let expected = original.save_state();

    // A fresh board restored from the snapshot replays the same future.
    let tb = board_with_cpu(&family::m100(), &COUNTING_LOOP);
    let mut restored = tb.board;
    restored.load_state(&snap).unwrap();
    restored.run_for(500).unwrap();

    assert_eq!(restored.save_state(), expected);
}

#[test]
fn test_snapshot_round_trips_through_json() {
    let tb = board_with_cpu(&family::m100(), &COUNTING_LOOP);
    let mut board = tb.board;
    board.run_for(100).unwrap();

    let snap = board.save_state();
    let json = serde_json::to_string(&snap).unwrap();
    let back: BoardSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(back, snap);
}

#[test]
fn test_snapshot_captures_named_cpu_fields() {
    let tb = board_with_cpu(&family::m100(), &COUNTING_LOOP);
    let mut board = tb.board;
    board.run_for(50).unwrap();

    let snap = board.save_state();
    let cpu = &snap.devices["mcu"];
    assert!(cpu.get("pc").is_some());
    assert!(cpu.get("a").is_some());
    assert_eq!(cpu.get("no_such_field"), None);
    assert_eq!(snap.now, 50);
    assert_eq!(snap.clocks["mcu"], 50);
}

#[test]
fn test_missing_device_is_rejected() {
    let tb = board_with_cpu(&family::m100(), &COUNTING_LOOP);
    let mut board = tb.board;
    let err = board.load_state(&BoardSnapshot::default()).unwrap_err();
    assert_eq!(
        err,
        BoardError::Snapshot(SnapshotError::MissingDevice("mcu".to_owned()))
    );
}

#[test]
fn test_missing_field_is_rejected() {
    let tb = board_with_cpu(&family::m100(), &COUNTING_LOOP);
    let mut board = tb.board;

    let mut snap = BoardSnapshot::default();
    let mut w = SnapshotWriter::new();
    w.field("pc", 0);
    snap.devices.insert("mcu".to_owned(), w.finish());

    let err = board.load_state(&snap).unwrap_err();
    assert_eq!(
        err,
        BoardError::Snapshot(SnapshotError::MissingField {
            tag: "mcu".to_owned(),
            field: "ret".to_owned(),
        })
    );
}

#[test]
fn test_reset_is_idempotent_under_snapshot() {
    let tb = board_with_cpu(&family::m100(), &COUNTING_LOOP);
    let mut board = tb.board;
    board.run_for(123).unwrap();

    board.reset().unwrap();
    let once = board.save_state();
    board.reset().unwrap();
    let twice = board.save_state();

    assert_eq!(once, twice);
}
