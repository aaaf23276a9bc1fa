//! Table-driven CPU core engine.
//!
//! One engine serves a whole family of microcontroller variants that differ
//! only in pin counts, memory widths, and a handful of opcode behaviors. It
//! provides:
//! 1. **Variant configuration:** An immutable [`VariantDescriptor`] plus a
//!    base decode table with per-variant override and fixed-decode lists,
//!    applied at construction — never conditionals in the shared execute path.
//! 2. **Stepping:** One instruction per step; inputs are sampled at exactly
//!    one point (the step boundary) so identical input histories always
//!    produce identical output histories.
//! 3. **Pins:** Per-pin output lines with synchronous propagation, a parallel
//!    output latch, and sampled input/interrupt lines.
//!
//! Adding a family member means adding a descriptor and a short override list
//! in [`family`]; the engine itself never changes.

/// Reference microcontroller family built on this engine.
pub mod family;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::bus::AddressSpace;
use crate::common::{CoreFault, SetupError, SnapshotError, SnapshotReader, SnapshotWriter};
use crate::debug::DisasmLine;
use crate::device::Device;
use crate::signal::{Driver, Level, SignalLine, LOW};

/// Program address the core vectors to when it accepts an interrupt.
pub const IRQ_VECTOR: u32 = 0x0004;

/// Handler function for one opcode slot.
pub type OpExec = fn(&mut CpuCore);

/// One decode-table slot: mnemonic, operand length, cycle cost, and handler.
#[derive(Debug, Clone, Copy)]
pub struct OpSlot {
    /// Mnemonic used by the disassembly view.
    pub mnemonic: &'static str,
    /// Number of operand bytes following the opcode.
    pub operand_len: u8,
    /// Cycle cost charged to the scheduler for this operation.
    pub cycles: u8,
    /// The operation handler.
    pub exec: OpExec,
}

/// Immutable parameters distinguishing one family member from another.
///
/// Fixed at construction, never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantDescriptor {
    /// Variant name (e.g. `"m200"`).
    pub name: &'static str,
    /// Number of individually driven output pins (`R` lines).
    pub output_pins: u8,
    /// Width of the sampled input port in bits (`K` inputs).
    pub input_pins: u8,
    /// Program counter width in bits.
    pub pc_bits: u8,
    /// Working register (accumulator/output latch) width in bits.
    pub byte_bits: u8,
    /// Index register width in bits.
    pub index_bits: u8,
    /// Program address-space width in bits.
    pub prog_addr_bits: u8,
    /// Data address-space width in bits.
    pub data_addr_bits: u8,
}

/// A family member: descriptor plus decode-table deltas over the base.
///
/// `overrides` replace or add general decode slots at construction.
/// `fixed_on_reset` entries are installed into the fixed-decode table by the
/// variant's reset sequence and are consulted before the general table.
#[derive(Debug, Clone, Copy)]
pub struct Variant {
    /// Immutable hardware parameters.
    pub desc: VariantDescriptor,
    /// The shared base decode table as `(opcode, slot)` pairs.
    pub base: &'static [(u8, OpSlot)],
    /// Per-variant replacements/additions over the base table.
    pub overrides: &'static [(u8, OpSlot)],
    /// Fixed-decode entries installed at reset.
    pub fixed_on_reset: &'static [(u8, OpSlot)],
}

/// A table-driven CPU core device.
///
/// Owns its output signal lines and a program/data [`AddressSpace`] pair; the
/// external driver layer wires peers to the lines and installs handlers into
/// the spaces before the board starts.
pub struct CpuCore {
    tag: String,
    desc: VariantDescriptor,
    table: [Option<OpSlot>; 256],
    fixed: [Option<OpSlot>; 256],
    fixed_on_reset: &'static [(u8, OpSlot)],

    prog: Rc<RefCell<AddressSpace>>,
    data: Rc<RefCell<AddressSpace>>,

    pub(crate) pc: u32,
    pub(crate) ret: u32,
    pub(crate) a: u16,
    pub(crate) x: u8,
    pub(crate) y: u8,
    pub(crate) carry: bool,
    pub(crate) o_latch: u8,
    pub(crate) halted: bool,
    pub(crate) in_irq: bool,
    pub(crate) k_sample: u8,
    irq_sample: bool,

    r_lines: Vec<SignalLine>,
    r_drivers: Vec<Driver>,
    o_line: SignalLine,
    o_driver: Driver,
    k_line: Option<SignalLine>,
    irq_line: Option<SignalLine>,
}

impl fmt::Debug for CpuCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpuCore")
            .field("tag", &self.tag)
            .field("variant", &self.desc.name)
            .field("pc", &self.pc)
            .field("halted", &self.halted)
            .finish()
    }
}

impl CpuCore {
    /// Creates a core for the given variant over the supplied address spaces.
    ///
    /// The decode table is assembled here: base entries first, then the
    /// variant's overrides. A duplicate within the override list is a setup
    /// error — it means the variant declaration itself is inconsistent.
    pub fn new(
        tag: &str,
        variant: &Variant,
        prog: Rc<RefCell<AddressSpace>>,
        data: Rc<RefCell<AddressSpace>>,
    ) -> Result<Self, SetupError> {
        let mut table = [None; 256];
        for &(opcode, slot) in variant.base {
            table[opcode as usize] = Some(slot);
        }
        for (i, &(opcode, slot)) in variant.overrides.iter().enumerate() {
            if variant.overrides[..i].iter().any(|&(op, _)| op == opcode) {
                return Err(SetupError::DuplicateOverride {
                    variant: variant.desc.name,
                    opcode,
                });
            }
            table[opcode as usize] = Some(slot);
        }

        let mut r_lines = Vec::new();
        let mut r_drivers = Vec::new();
        for i in 0..variant.desc.output_pins {
            let line = SignalLine::new(&format!("{tag}:r{i}"), LOW);
            r_drivers.push(line.driver()?);
            r_lines.push(line);
        }
        let o_line = SignalLine::new(&format!("{tag}:o"), LOW);
        let o_driver = o_line.driver()?;

        Ok(Self {
            tag: tag.to_owned(),
            desc: variant.desc,
            table,
            fixed: [None; 256],
            fixed_on_reset: variant.fixed_on_reset,
            prog,
            data,
            pc: 0,
            ret: 0,
            a: 0,
            x: 0,
            y: 0,
            carry: false,
            o_latch: 0,
            halted: false,
            in_irq: false,
            k_sample: 0,
            irq_sample: false,
            r_lines,
            r_drivers,
            o_line,
            o_driver,
            k_line: None,
            irq_line: None,
        })
    }

    /// Wires the sampled input port to a line.
    pub fn attach_input_port(&mut self, line: SignalLine) {
        self.k_line = Some(line);
    }

    /// Wires the interrupt request input to a line (active high).
    pub fn attach_irq_line(&mut self, line: SignalLine) {
        self.irq_line = Some(line);
    }

    /// Returns the variant descriptor.
    pub const fn descriptor(&self) -> &VariantDescriptor {
        &self.desc
    }

    /// Returns one of the individually driven output lines.
    pub fn r_line(&self, index: usize) -> Option<&SignalLine> {
        self.r_lines.get(index)
    }

    /// Returns the parallel output latch line.
    pub const fn o_line(&self) -> &SignalLine {
        &self.o_line
    }

    /// Returns the current program counter.
    pub const fn pc(&self) -> u32 {
        self.pc
    }

    /// Returns the accumulator.
    pub const fn a(&self) -> u16 {
        self.a
    }

    /// Returns the index register.
    pub const fn x(&self) -> u8 {
        self.x
    }

    /// Returns the RAM address register.
    pub const fn y(&self) -> u8 {
        self.y
    }

    /// Returns the carry flag.
    pub const fn carry(&self) -> bool {
        self.carry
    }

    /// Returns whether the core has executed a halt operation.
    pub const fn halted(&self) -> bool {
        self.halted
    }

    pub(crate) const fn byte_mask(&self) -> u16 {
        (1 << self.desc.byte_bits) - 1
    }

    const fn index_mask(&self) -> u8 {
        (1 << self.desc.index_bits) - 1
    }

    const fn pc_mask(&self) -> u32 {
        (1 << self.desc.pc_bits) - 1
    }

    const fn input_mask(&self) -> u8 {
        ((1u16 << self.desc.input_pins) - 1) as u8
    }

    /// Fetches one byte at the program counter and advances it.
    pub(crate) fn fetch8(&mut self) -> u8 {
        let prog_mask = (1u32 << self.desc.prog_addr_bits) - 1;
        let byte = self.prog.borrow_mut().read(self.pc & prog_mask);
        self.pc = (self.pc + 1) & self.pc_mask();
        byte
    }

    pub(crate) fn set_pc(&mut self, value: u32) {
        self.pc = value & self.pc_mask();
    }

    /// Sets the accumulator, masking to the variant's working width.
    ///
    /// Callers compute full-width results; the truncation to `byte_bits`
    /// happens here, in one place, for every family member.
    pub(crate) fn set_a(&mut self, value: u16) {
        self.a = value & self.byte_mask();
    }

    pub(crate) fn set_x(&mut self, value: u8) {
        self.x = value & self.index_mask();
    }

    /// Effective data address: index register selects the page, `Y` the cell.
    pub(crate) fn data_addr(&self) -> u32 {
        let addr = (u32::from(self.x) << 4) | u32::from(self.y & 0x0F);
        addr & ((1u32 << self.desc.data_addr_bits) - 1)
    }

    pub(crate) fn read_data(&mut self, addr: u32) -> u8 {
        self.data.borrow_mut().read(addr)
    }

    pub(crate) fn write_data(&mut self, addr: u32, value: u8) {
        self.data.borrow_mut().write(addr, value);
    }

    /// Drives one output pin; indexes beyond the variant's pin count are
    /// unconnected pins and the write is a defined no-op.
    pub(crate) fn drive_r(&mut self, index: usize, high: bool) {
        if let Some(driver) = self.r_drivers.get(index) {
            driver.set_bool(high);
        }
    }

    /// Latches the accumulator into the output port and drives its line.
    pub(crate) fn latch_output(&mut self) {
        self.o_latch = (self.a & self.byte_mask()) as u8;
        self.o_driver.set(self.o_latch);
    }

    /// Samples the input and interrupt lines.
    ///
    /// This is the only point in the step algorithm where inputs are read;
    /// everything after it operates on the latched samples.
    fn sample_inputs(&mut self) {
        self.k_sample = self
            .k_line
            .as_ref()
            .map_or(0, |line| line.level() & self.input_mask());
        self.irq_sample = self.irq_line.as_ref().is_some_and(SignalLine::is_high);
    }

    fn decode(&self, opcode: u8) -> Option<OpSlot> {
        // Fixed entries (installed by the variant's reset sequence) shadow
        // the general table.
        self.fixed[opcode as usize].or(self.table[opcode as usize])
    }

    fn execute_one(&mut self) -> Result<u64, CoreFault> {
        let fetch_pc = self.pc;
        let opcode = self.fetch8();
        let Some(slot) = self.decode(opcode) else {
            return Err(CoreFault::UnhandledOpcode {
                tag: self.tag.clone(),
                pc: fetch_pc,
                opcode,
            });
        };
        (slot.exec)(self);
        Ok(u64::from(slot.cycles))
    }

    /// Produces a table-driven disassembly listing for the debug view.
    pub fn disassemble(&self, addr: u32, count: usize) -> Vec<DisasmLine> {
        let prog_mask = (1u32 << self.desc.prog_addr_bits) - 1;
        let mut out = Vec::with_capacity(count);
        let mut pos = addr & prog_mask;
        for _ in 0..count {
            let opcode = self.prog.borrow_mut().read(pos);
            let (text, len) = match self.decode(opcode) {
                Some(slot) => {
                    let mut text = slot.mnemonic.to_owned();
                    for i in 1..=u32::from(slot.operand_len) {
                        let operand = self.prog.borrow_mut().read((pos + i) & prog_mask);
                        text.push_str(&format!(" ${operand:02x}"));
                    }
                    (text, 1 + u32::from(slot.operand_len))
                }
                None => (format!("db ${opcode:02x}"), 1),
            };
            let bytes = (0..len)
                .map(|i| self.prog.borrow_mut().read((pos + i) & prog_mask))
                .collect();
            out.push(DisasmLine {
                addr: pos,
                bytes,
                text,
            });
            pos = (pos + len) & prog_mask;
        }
        out
    }
}

impl Device for CpuCore {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn reset(&mut self) {
        self.pc = 0;
        self.ret = 0;
        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.carry = false;
        self.o_latch = 0;
        self.halted = false;
        self.in_irq = false;
        self.k_sample = 0;
        self.irq_sample = false;
        // Changed/added fixed instructions are a property of the variant's
        // reset sequence, so the fixed table is rebuilt here, not in `new`.
        self.fixed = [None; 256];
        for &(opcode, slot) in self.fixed_on_reset {
            self.fixed[opcode as usize] = Some(slot);
        }
        for driver in &self.r_drivers {
            driver.set(LOW);
        }
        self.o_driver.set(LOW);
    }

    fn step(&mut self) -> Result<Option<u64>, CoreFault> {
        self.sample_inputs();

        if self.halted {
            if self.irq_sample {
                trace!(tag = %self.tag, "interrupt wakes halted core");
                self.halted = false;
            } else {
                return Ok(Some(1));
            }
        }

        if self.irq_sample && !self.in_irq {
            self.in_irq = true;
            self.ret = self.pc;
            self.set_pc(IRQ_VECTOR);
            return Ok(Some(2));
        }

        self.execute_one().map(Some)
    }

    fn save(&self, w: &mut SnapshotWriter) {
        w.field("pc", u64::from(self.pc));
        w.field("ret", u64::from(self.ret));
        w.field("a", u64::from(self.a));
        w.field("x", u64::from(self.x));
        w.field("y", u64::from(self.y));
        w.field("carry", u64::from(self.carry));
        w.field("o_latch", u64::from(self.o_latch));
        w.field("halted", u64::from(self.halted));
        w.field("in_irq", u64::from(self.in_irq));
        for (i, line) in self.r_lines.iter().enumerate() {
            w.field(&format!("r{i}"), u64::from(line.level()));
        }
    }

    fn load(&mut self, r: &SnapshotReader<'_>) -> Result<(), SnapshotError> {
        self.pc = r.field("pc")? as u32;
        self.ret = r.field("ret")? as u32;
        self.a = r.field("a")? as u16;
        self.x = r.field("x")? as u8;
        self.y = r.field("y")? as u8;
        self.carry = r.field("carry")? != 0;
        self.o_latch = r.field("o_latch")? as u8;
        self.halted = r.field("halted")? != 0;
        self.in_irq = r.field("in_irq")? != 0;
        for (i, driver) in self.r_drivers.iter().enumerate() {
            let level = r.field(&format!("r{i}"))? as Level;
            driver.set(level);
        }
        self.o_driver.set(self.o_latch);
        Ok(())
    }

    fn as_cpu_mut(&mut self) -> Option<&mut CpuCore> {
        Some(self)
    }
}
