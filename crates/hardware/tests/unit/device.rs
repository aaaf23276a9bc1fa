//! # Device Tree and Lifecycle Tests
//!
//! Registration ordering, tag uniqueness, start-time name resolution, and
//! lifecycle guards on board operations.

use std::cell::RefCell;
use std::rc::Rc;

use boardsim_core::common::{BoardError, SetupError};
use boardsim_core::device::{Device, DeviceCell, DeviceRef, Lifecycle, StartCtx};
use boardsim_core::{Board, Config};
use pretty_assertions::assert_eq;

/// Minimal device recording its lifecycle calls.
struct Recorder {
    tag: String,
    /// Peer tag to resolve during start, if any.
    wants: Option<String>,
    peer: Option<DeviceRef>,
    started: bool,
    resets: u32,
}

impl Recorder {
    fn shared(tag: &str, wants: Option<&str>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            tag: tag.to_owned(),
            wants: wants.map(str::to_owned),
            peer: None,
            started: false,
            resets: 0,
        }))
    }
}

impl Device for Recorder {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn start(&mut self, ctx: &mut StartCtx<'_>) -> Result<(), SetupError> {
        if let Some(wants) = &self.wants {
            self.peer = Some(ctx.lookup(wants)?);
        }
        self.started = true;
        Ok(())
    }

    fn reset(&mut self) {
        self.resets += 1;
    }
}

// ──────────────────────────────────────────────────────────
// Tree construction
// ──────────────────────────────────────────────────────────

#[test]
fn test_duplicate_tag_is_rejected() {
    let mut board = Board::new(Config::default());
    board
        .add_device(None, Recorder::shared("kbd", None))
        .unwrap();
    let err = board
        .add_device(None, Recorder::shared("kbd", None))
        .unwrap_err();
    assert_eq!(err, SetupError::DuplicateTag("kbd".to_owned()));
}

#[test]
fn test_child_requires_registered_parent() {
    let mut board = Board::new(Config::default());
    let err = board
        .add_device(Some("kbd"), Recorder::shared("kbd:mcu", None))
        .unwrap_err();
    assert_eq!(err, SetupError::UnknownParent("kbd".to_owned()));

    board
        .add_device(None, Recorder::shared("kbd", None))
        .unwrap();
    board
        .add_device(Some("kbd"), Recorder::shared("kbd:mcu", None))
        .unwrap();
}

#[test]
fn test_duplicate_space_is_rejected() {
    let mut board = Board::new(Config::default());
    board.create_space("prog", 12).unwrap();
    let err = board.create_space("prog", 8).unwrap_err();
    assert_eq!(err, SetupError::DuplicateSpace("prog".to_owned()));
}

// ──────────────────────────────────────────────────────────
// Start and name resolution
// ──────────────────────────────────────────────────────────

#[test]
fn test_start_walks_devices_and_resets_once() {
    let mut board = Board::new(Config::default());
    let parent = Recorder::shared("kbd", None);
    let child = Recorder::shared("kbd:mcu", Some("kbd"));
    let parent_dev: DeviceCell = parent.clone();
    let child_dev: DeviceCell = child.clone();
    board.add_device(None, parent_dev).unwrap();
    board.add_device(Some("kbd"), child_dev).unwrap();

    board.start().unwrap();

    assert!(parent.borrow().started);
    assert!(child.borrow().started);
    assert_eq!(parent.borrow().resets, 1);
    assert_eq!(board.lifecycle(), Lifecycle::Running);

    // The resolved peer upgrades to the live device.
    let peer = child.borrow().peer.clone().unwrap();
    assert_eq!(peer.upgrade().unwrap().borrow().tag(), "kbd");
}

#[test]
fn test_unresolved_reference_fails_start() {
    let mut board = Board::new(Config::default());
    board
        .add_device(None, Recorder::shared("cpu", Some("ghost")))
        .unwrap();
    assert_eq!(
        board.start().unwrap_err(),
        SetupError::UnresolvedRef("ghost".to_owned())
    );
    // The board never reached Running.
    assert!(matches!(
        board.run_for(1).unwrap_err(),
        BoardError::Setup(SetupError::Lifecycle(_))
    ));
}

// ──────────────────────────────────────────────────────────
// Lifecycle guards
// ──────────────────────────────────────────────────────────

#[test]
fn test_run_before_start_is_a_lifecycle_error() {
    let mut board = Board::new(Config::default());
    assert!(matches!(
        board.run_for(10).unwrap_err(),
        BoardError::Setup(SetupError::Lifecycle(_))
    ));
}

#[test]
fn test_reset_before_start_is_a_lifecycle_error() {
    let mut board = Board::new(Config::default());
    assert!(matches!(
        board.reset().unwrap_err(),
        SetupError::Lifecycle(_)
    ));
}

#[test]
fn test_add_device_after_start_is_rejected() {
    let mut board = Board::new(Config::default());
    board
        .add_device(None, Recorder::shared("kbd", None))
        .unwrap();
    board.start().unwrap();
    assert!(matches!(
        board
            .add_device(None, Recorder::shared("late", None))
            .unwrap_err(),
        SetupError::Lifecycle(_)
    ));
}

#[test]
fn test_reset_is_repeatable_from_running() {
    let mut board = Board::new(Config::default());
    let dev = Recorder::shared("kbd", None);
    let cell: DeviceCell = dev.clone();
    board.add_device(None, cell).unwrap();
    board.start().unwrap();

    board.reset().unwrap();
    board.reset().unwrap();
    assert_eq!(dev.borrow().resets, 3);
    assert_eq!(board.lifecycle(), Lifecycle::Running);
}
