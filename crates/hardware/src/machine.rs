//! The board: device tree, lifecycle, and whole-machine state capture.
//!
//! A [`Board`] is the root owner of a simulated machine. It provides:
//! 1. **Device tree:** Devices registered pre-order under hierarchical tags
//!    (`"kbd"`, `"kbd:mcu"`), parent before child, each tag unique. Ownership
//!    always flows down the tree; cross-references are weak and name-resolved.
//! 2. **Lifecycle:** `Constructed → Started → Running`, with reset re-entering
//!    the initial state at any point after start. Configuration errors cannot
//!    survive into `Running`.
//! 3. **Capture:** `save_state`/`load_state` over every device plus the
//!    scheduler's clocks; a full restore continues bit-identically.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::debug;

use crate::bus::AddressSpace;
use crate::common::{BoardError, BoardSnapshot, SetupError, SnapshotError, SnapshotReader, SnapshotWriter};
use crate::config::Config;
use crate::device::{DeviceCell, Lifecycle, StartCtx};
use crate::sched::Scheduler;

/// A complete simulated machine.
pub struct Board {
    config: Config,
    /// Registration (pre-order) order; also the stepping order.
    pub(crate) order: Vec<DeviceCell>,
    pub(crate) by_tag: BTreeMap<String, DeviceCell>,
    pub(crate) spaces: BTreeMap<String, Rc<RefCell<AddressSpace>>>,
    pub(crate) sched: Scheduler,
    pub(crate) lifecycle: Lifecycle,
}

impl std::fmt::Debug for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Board")
            .field("devices", &self.order.len())
            .field("spaces", &self.spaces.len())
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}

impl Board {
    /// Creates an empty board with the given framework configuration.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            order: Vec::new(),
            by_tag: BTreeMap::new(),
            spaces: BTreeMap::new(),
            sched: Scheduler::new(config.sched_slice),
            lifecycle: Lifecycle::Constructed,
        }
    }

    /// Returns the framework configuration.
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the current lifecycle state.
    pub const fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Returns the global simulated time in cycles.
    pub const fn now(&self) -> u64 {
        self.sched.now()
    }

    /// Looks up a registered device by full tag.
    pub fn device(&self, tag: &str) -> Option<DeviceCell> {
        self.by_tag.get(tag).cloned()
    }

    /// Looks up a registered address space by name.
    pub fn space(&self, name: &str) -> Option<Rc<RefCell<AddressSpace>>> {
        self.spaces.get(name).cloned()
    }

    fn require(&self, state: Lifecycle, op: &str) -> Result<(), SetupError> {
        if self.lifecycle == state {
            Ok(())
        } else {
            Err(SetupError::Lifecycle(format!(
                "{op} requires {state:?}, board is {:?}",
                self.lifecycle
            )))
        }
    }

    /// Registers a device into the tree.
    ///
    /// `parent` is `None` for a top-level device, or the tag of an already
    /// registered device; registering a child before its parent is a setup
    /// error, which is what makes cycles structurally impossible. Tags must
    /// be unique across the whole board.
    pub fn add_device(&mut self, parent: Option<&str>, dev: DeviceCell) -> Result<(), SetupError> {
        self.require(Lifecycle::Constructed, "add_device")?;
        let tag = dev.borrow().tag().to_owned();
        if self.by_tag.contains_key(&tag) {
            return Err(SetupError::DuplicateTag(tag));
        }
        if let Some(parent) = parent {
            if !self.by_tag.contains_key(parent) {
                return Err(SetupError::UnknownParent(parent.to_owned()));
            }
        }
        debug!(tag = %tag, parent = parent.unwrap_or("-"), "device registered");
        self.sched.add(&tag, Rc::clone(&dev));
        self.by_tag.insert(tag, Rc::clone(&dev));
        self.order.push(dev);
        Ok(())
    }

    /// Registers an already built address space under its own name.
    pub fn add_space(
        &mut self,
        space: AddressSpace,
    ) -> Result<Rc<RefCell<AddressSpace>>, SetupError> {
        self.require(Lifecycle::Constructed, "add_space")?;
        let name = space.name().to_owned();
        if self.spaces.contains_key(&name) {
            return Err(SetupError::DuplicateSpace(name));
        }
        let space = Rc::new(RefCell::new(space));
        self.spaces.insert(name, Rc::clone(&space));
        Ok(space)
    }

    /// Creates and registers an address space with the configured open-bus value.
    pub fn create_space(
        &mut self,
        name: &str,
        addr_bits: u8,
    ) -> Result<Rc<RefCell<AddressSpace>>, SetupError> {
        self.add_space(AddressSpace::new(name, addr_bits).with_open_bus(self.config.open_bus))
    }

    /// Starts the board: resolves cross-references and enters the initial state.
    ///
    /// Devices start in registration order, parent before children, each with
    /// a name-resolution context over the full tree. Any failure aborts before
    /// the board ever runs. A successful start ends with a reset pass so every
    /// device asserts its defined power-on state (including reset-installed
    /// decode entries) before the first step.
    pub fn start(&mut self) -> Result<(), SetupError> {
        self.require(Lifecycle::Constructed, "start")?;
        for dev in &self.order {
            let mut ctx = StartCtx::new(&self.by_tag);
            dev.borrow_mut().start(&mut ctx)?;
        }
        self.lifecycle = Lifecycle::Started;
        self.reset()
    }

    /// Re-enters the defined initial state without tearing anything down.
    ///
    /// Installed address ranges, registered lines, and snapshotted key state
    /// survive; mutable device state returns to power-on values. Idempotent:
    /// two consecutive resets leave the board in the same state as one.
    pub fn reset(&mut self) -> Result<(), SetupError> {
        if self.lifecycle == Lifecycle::Constructed {
            return Err(SetupError::Lifecycle(
                "reset requires a started board".to_owned(),
            ));
        }
        self.lifecycle = Lifecycle::Resetting;
        for dev in &self.order {
            dev.borrow_mut().reset();
        }
        self.lifecycle = Lifecycle::Running;
        Ok(())
    }

    /// Advances simulated time by `cycles` cycles.
    pub fn run_for(&mut self, cycles: u64) -> Result<(), BoardError> {
        self.require(Lifecycle::Running, "run_for")?;
        self.sched.run_for(cycles)?;
        Ok(())
    }

    /// Captures the whole machine as flat named fields.
    ///
    /// The container is serde-serializable; encoding and persistence belong
    /// to the embedding layer.
    pub fn save_state(&self) -> BoardSnapshot {
        let mut snap = BoardSnapshot::default();
        for dev in &self.order {
            let dev = dev.borrow();
            let mut w = SnapshotWriter::new();
            dev.save(&mut w);
            snap.devices.insert(dev.tag().to_owned(), w.finish());
        }
        for (tag, local) in self.sched.clocks() {
            snap.clocks.insert(tag.to_owned(), local);
        }
        snap.now = self.sched.now();
        snap
    }

    /// Restores a captured snapshot into a started board.
    ///
    /// Every registered device must be present in the snapshot with every
    /// field it expects; a partial restore is rejected rather than leaving
    /// the machine in a mixed state.
    pub fn load_state(&mut self, snap: &BoardSnapshot) -> Result<(), BoardError> {
        if self.lifecycle == Lifecycle::Constructed {
            return Err(SetupError::Lifecycle(
                "load_state requires a started board".to_owned(),
            )
            .into());
        }
        for dev in &self.order {
            let mut dev = dev.borrow_mut();
            let tag = dev.tag().to_owned();
            let entry = snap
                .devices
                .get(&tag)
                .ok_or_else(|| SnapshotError::MissingDevice(tag.clone()))?;
            let reader = SnapshotReader::new(&tag, entry);
            dev.load(&reader)?;
        }
        for (tag, &local) in &snap.clocks {
            self.sched.set_clock(tag, local);
        }
        self.sched.set_now(snap.now);
        self.lifecycle = Lifecycle::Running;
        Ok(())
    }
}
