//! Matrix keyboard controller with a bidirectional serial handshake.
//!
//! The controller scans a key matrix through a row-drive latch and talks to
//! its host over two serial lines (`kdat`, `kclk`). The handshake is the
//! interesting part: the data line is driven from both ends, and an interrupt
//! is raised exactly when the two ends *disagree* — one side holding the line
//! low while the other leaves it high. Edge suppression on the interrupt line
//! guarantees the host sees each disagreement once, no matter how many port
//! writes reproduce the same levels.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::bus::BusHandler;
use crate::common::{SetupError, SnapshotError, SnapshotReader, SnapshotWriter};
use crate::device::Device;
use crate::signal::{Driver, SignalLine, HIGH, LOW};

/// Number of scan rows the drive latch addresses.
pub const ROWS: usize = 13;

/// Row-drive bits of the second port latch.
const P2_ROWS: u8 = 0x1f;
/// Status LED output, inverted: latch bit high means LED off.
const P2_LED: u8 = 0x20;
/// Serial data output to the host.
const P2_KDAT: u8 = 0x40;
/// Serial clock output to the host.
const P2_KCLK: u8 = 0x80;

/// When the interrupt line deasserts after a handshake disagreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgreementPolicy {
    /// Stay asserted through the acknowledge (both ends low); deassert only
    /// when the line returns to idle (both ends high).
    #[default]
    Hold,
    /// Deassert as soon as both ends agree, low or high.
    Clear,
}

/// A scanned-matrix keyboard controller.
///
/// Reactive device: it never steps, all behavior is driven by bus writes from
/// the controller's firmware side and by edges on the host's data line.
pub struct KeyboardController {
    tag: String,
    policy: AgreementPolicy,
    /// Pressed-key bitmap per row; column bit set means key down.
    matrix: [u8; ROWS],
    row_drive: u16,
    port2: u8,
    host_kdat: SignalLine,
    kdat_out: SignalLine,
    kdat_driver: Driver,
    kclk_out: SignalLine,
    kclk_driver: Driver,
    irq: SignalLine,
    irq_driver: Driver,
    led: Option<Box<dyn FnMut(bool)>>,
}

impl std::fmt::Debug for KeyboardController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyboardController")
            .field("tag", &self.tag)
            .field("policy", &self.policy)
            .field("row_drive", &self.row_drive)
            .field("port2", &self.port2)
            .finish()
    }
}

impl KeyboardController {
    /// Creates a controller attached to the host's data line.
    ///
    /// Returned shared so it can be installed as a bus handler and registered
    /// with the board; the host-side data observer is hooked up here, against
    /// a weak handle, so the line never owns the device.
    pub fn new(
        tag: &str,
        policy: AgreementPolicy,
        host_kdat: SignalLine,
    ) -> Result<Rc<RefCell<Self>>, SetupError> {
        let kdat_out = SignalLine::new(&format!("{tag}:kdat"), HIGH);
        let kdat_driver = kdat_out.driver()?;
        let kclk_out = SignalLine::new(&format!("{tag}:kclk"), HIGH);
        let kclk_driver = kclk_out.driver()?;
        let irq = SignalLine::new(&format!("{tag}:irq"), LOW);
        let irq_driver = irq.driver()?;

        let this = Rc::new(RefCell::new(Self {
            tag: tag.to_owned(),
            policy,
            matrix: [0; ROWS],
            row_drive: 0,
            port2: P2_LED | P2_KDAT | P2_KCLK,
            host_kdat: host_kdat.clone(),
            kdat_out,
            kdat_driver,
            kclk_out,
            kclk_driver,
            irq,
            irq_driver,
            led: None,
        }));

        let weak: Weak<RefCell<Self>> = Rc::downgrade(&this);
        host_kdat.on_change(move |_| {
            if let Some(dev) = weak.upgrade() {
                // A host edge can arrive while the controller is mid-write
                // (the write drove kdat and the host reacted synchronously).
                // Skip the recompute then: the port write finishes with its
                // own `update_handshake`, which reads the host level fresh.
                if let Ok(mut dev) = dev.try_borrow_mut() {
                    dev.update_handshake();
                }
            }
        });

        Ok(this)
    }

    /// Installs the status LED output callback (called with `true` for lit).
    pub fn on_led(&mut self, f: impl FnMut(bool) + 'static) {
        self.led = Some(Box::new(f));
    }

    /// Presses or releases one key of the matrix.
    pub fn set_key(&mut self, row: usize, col: u8, pressed: bool) {
        if let Some(bits) = self.matrix.get_mut(row) {
            if pressed {
                *bits |= 1 << col;
            } else {
                *bits &= !(1 << col);
            }
        }
    }

    /// The controller's serial data output line.
    pub fn kdat_line(&self) -> &SignalLine {
        &self.kdat_out
    }

    /// The controller's serial clock output line.
    pub fn kclk_line(&self) -> &SignalLine {
        &self.kclk_out
    }

    /// The handshake interrupt line toward the host.
    pub fn irq_line(&self) -> &SignalLine {
        &self.irq
    }

    /// First port latch: low eight row-drive bits.
    fn write_port1(&mut self, value: u8) {
        self.row_drive = (self.row_drive & 0x1f00) | u16::from(value);
    }

    /// Second port latch: high row-drive bits, LED, and the serial pair.
    fn write_port2(&mut self, value: u8) {
        let prev = self.port2;
        self.port2 = value;
        self.row_drive = (self.row_drive & 0x00ff) | (u16::from(value & P2_ROWS) << 8);

        if (prev ^ value) & P2_LED != 0 {
            // Latch bit high turns the LED off.
            let lit = value & P2_LED == 0;
            trace!(tag = %self.tag, lit, "status led");
            if let Some(led) = &mut self.led {
                led(lit);
            }
        }

        self.kclk_driver.set_bool(value & P2_KCLK != 0);
        self.kdat_driver.set_bool(value & P2_KDAT != 0);
        self.update_handshake();
    }

    /// Recomputes the handshake interrupt from both ends of the data line.
    ///
    /// Disagreement (exactly one end low) asserts; idle (both high) always
    /// deasserts; the acknowledge state (both low) deasserts only under
    /// [`AgreementPolicy::Clear`].
    fn update_handshake(&mut self) {
        let mcu_low = self.port2 & P2_KDAT == 0;
        let host_low = !self.host_kdat.is_high();
        if mcu_low != host_low {
            self.irq_driver.set(HIGH);
        } else if !mcu_low || self.policy == AgreementPolicy::Clear {
            self.irq_driver.set(LOW);
        }
    }

    /// Column bits read back from the matrix: the OR of every driven row.
    fn scan(&self) -> u8 {
        let mut cols = 0;
        for (row, &bits) in self.matrix.iter().enumerate() {
            if self.row_drive & (1 << row) != 0 {
                cols |= bits;
            }
        }
        cols
    }
}

impl BusHandler for KeyboardController {
    fn read(&mut self, _offset: u32) -> u8 {
        self.scan()
    }

    fn write(&mut self, offset: u32, value: u8) {
        match offset {
            0 => self.write_port1(value),
            1 => self.write_port2(value),
            _ => {
                trace!(tag = %self.tag, offset, value, "write to unknown port dropped");
            }
        }
    }
}

impl Device for KeyboardController {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn reset(&mut self) {
        // Key state is physical and survives reset; latches do not.
        self.row_drive = 0;
        self.port2 = P2_LED | P2_KDAT | P2_KCLK;
        self.kdat_driver.set(HIGH);
        self.kclk_driver.set(HIGH);
        self.irq_driver.set(LOW);
    }

    fn save(&self, w: &mut SnapshotWriter) {
        w.field("row_drive", u64::from(self.row_drive));
        w.field("port2", u64::from(self.port2));
        w.field("irq", u64::from(self.irq.level()));
        for (row, &bits) in self.matrix.iter().enumerate() {
            w.field(&format!("row{row}"), u64::from(bits));
        }
    }

    fn load(&mut self, r: &SnapshotReader<'_>) -> Result<(), SnapshotError> {
        self.row_drive = r.field("row_drive")? as u16;
        self.port2 = r.field("port2")? as u8;
        for row in 0..ROWS {
            self.matrix[row] = r.field(&format!("row{row}"))? as u8;
        }
        self.kdat_driver.set_bool(self.port2 & P2_KDAT != 0);
        self.kclk_driver.set_bool(self.port2 & P2_KCLK != 0);
        let irq = r.field("irq")? as u8;
        self.irq_driver.set(irq);
        Ok(())
    }
}
