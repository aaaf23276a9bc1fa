//! The `m` microcontroller family: shared base table plus variant deltas.
//!
//! Every member executes the same base instruction set; members differ only
//! in their [`VariantDescriptor`] and short override/fixed-decode lists. The
//! ladder runs:
//! - [`m40`]: 4-bit working register, the narrowest member.
//! - [`m100`]: 8-bit baseline, 2K program, 3-bit index.
//! - [`m200`]: 4K program, 4-bit index; redefines the index load to discard
//!   its lowest bit and gains a fixed transfer opcode at reset.
//! - [`m270`]: electrically reduced `m200` (one fewer output pin), no opcode
//!   changes.

use super::{CpuCore, OpSlot, Variant, VariantDescriptor};

/// `NOP` — no operation.
pub const OP_NOP: u8 = 0x00;
/// `LDA #imm` — load accumulator immediate.
pub const OP_LDA: u8 = 0x01;
/// `TAY` — transfer accumulator low nibble to the RAM address register.
pub const OP_TAY: u8 = 0x02;
/// `LDX #imm` — load index register immediate.
pub const OP_LDX: u8 = 0x03;
/// `STA` — store accumulator at the effective data address.
pub const OP_STA: u8 = 0x04;
/// `LDM` — load accumulator from the effective data address.
pub const OP_LDM: u8 = 0x05;
/// `ADD #imm` — add immediate to the accumulator, setting carry.
pub const OP_ADD: u8 = 0x06;
/// `JMP abs` — absolute jump (little-endian 16-bit target).
pub const OP_JMP: u8 = 0x07;
/// `BRC rel` — branch by a signed offset if carry is set.
pub const OP_BRC: u8 = 0x08;
/// `SETR` — drive the output pin selected by `Y` high.
pub const OP_SETR: u8 = 0x09;
/// `RSTR` — drive the output pin selected by `Y` low.
pub const OP_RSTR: u8 = 0x0a;
/// `TXA` — fixed-decode transfer of the index register to the accumulator.
///
/// Empty on most members; the `m200` reset sequence installs a handler here.
pub const OP_TXA: u8 = 0x0b;
/// `OUT` — latch the accumulator into the parallel output port.
pub const OP_OUT: u8 = 0x0c;
/// `INP` — load the sampled input port into the accumulator.
pub const OP_INP: u8 = 0x0d;
/// `HALT` — stop executing until an interrupt arrives.
pub const OP_HALT: u8 = 0x0e;
/// `CLC` — clear carry.
pub const OP_CLC: u8 = 0x0f;
/// `SEC` — set carry.
pub const OP_SEC: u8 = 0x10;
/// `CALL abs` — save the return address and jump.
pub const OP_CALL: u8 = 0x11;
/// `RETN` — return from a call or interrupt.
pub const OP_RETN: u8 = 0x12;

fn op_nop(_cpu: &mut CpuCore) {}

fn op_lda(cpu: &mut CpuCore) {
    let imm = cpu.fetch8();
    cpu.set_a(u16::from(imm));
}

fn op_tay(cpu: &mut CpuCore) {
    cpu.y = (cpu.a as u8) & 0x0f;
}

fn op_ldx(cpu: &mut CpuCore) {
    let imm = cpu.fetch8();
    cpu.set_x(imm);
}

fn op_sta(cpu: &mut CpuCore) {
    let addr = cpu.data_addr();
    let value = cpu.a as u8;
    cpu.write_data(addr, value);
}

fn op_ldm(cpu: &mut CpuCore) {
    let addr = cpu.data_addr();
    let value = cpu.read_data(addr);
    cpu.set_a(u16::from(value));
}

fn op_add(cpu: &mut CpuCore) {
    // Full-width sum first; the accumulator write truncates to the variant's
    // working width and the carry reflects overflow past that width.
    let imm = u16::from(cpu.fetch8());
    let sum = cpu.a + imm;
    cpu.carry = sum > cpu.byte_mask();
    cpu.set_a(sum);
}

fn op_jmp(cpu: &mut CpuCore) {
    let lo = u32::from(cpu.fetch8());
    let hi = u32::from(cpu.fetch8());
    cpu.set_pc((hi << 8) | lo);
}

fn op_brc(cpu: &mut CpuCore) {
    let offset = cpu.fetch8() as i8;
    if cpu.carry {
        let target = cpu.pc.wrapping_add_signed(i32::from(offset));
        cpu.set_pc(target);
    }
}

fn op_setr(cpu: &mut CpuCore) {
    let index = usize::from(cpu.y);
    cpu.drive_r(index, true);
}

fn op_rstr(cpu: &mut CpuCore) {
    let index = usize::from(cpu.y);
    cpu.drive_r(index, false);
}

fn op_out(cpu: &mut CpuCore) {
    cpu.latch_output();
}

fn op_inp(cpu: &mut CpuCore) {
    let sample = cpu.k_sample;
    cpu.set_a(u16::from(sample));
}

fn op_halt(cpu: &mut CpuCore) {
    cpu.halted = true;
}

fn op_clc(cpu: &mut CpuCore) {
    cpu.carry = false;
}

fn op_sec(cpu: &mut CpuCore) {
    cpu.carry = true;
}

fn op_call(cpu: &mut CpuCore) {
    let lo = u32::from(cpu.fetch8());
    let hi = u32::from(cpu.fetch8());
    cpu.ret = cpu.pc;
    cpu.set_pc((hi << 8) | lo);
}

fn op_retn(cpu: &mut CpuCore) {
    cpu.set_pc(cpu.ret);
    cpu.in_irq = false;
}

/// `m200` index load: fetch as usual, then discard the lowest bit.
fn op_ldx_m200(cpu: &mut CpuCore) {
    op_ldx(cpu);
    cpu.x >>= 1;
}

/// Fixed-decode transfer installed by the `m200` reset sequence.
fn op_txa(cpu: &mut CpuCore) {
    let x = cpu.x;
    cpu.set_a(u16::from(x));
}

const fn slot(mnemonic: &'static str, operand_len: u8, cycles: u8, exec: super::OpExec) -> OpSlot {
    OpSlot {
        mnemonic,
        operand_len,
        cycles,
        exec,
    }
}

/// The shared base decode table. Opcode `0x0b` is deliberately absent: it
/// only exists on members whose reset sequence installs a fixed entry there.
pub const BASE_OPS: &[(u8, OpSlot)] = &[
    (OP_NOP, slot("nop", 0, 1, op_nop)),
    (OP_LDA, slot("lda", 1, 2, op_lda)),
    (OP_TAY, slot("tay", 0, 1, op_tay)),
    (OP_LDX, slot("ldx", 1, 2, op_ldx)),
    (OP_STA, slot("sta", 0, 2, op_sta)),
    (OP_LDM, slot("ldm", 0, 2, op_ldm)),
    (OP_ADD, slot("add", 1, 2, op_add)),
    (OP_JMP, slot("jmp", 2, 3, op_jmp)),
    (OP_BRC, slot("brc", 1, 2, op_brc)),
    (OP_SETR, slot("setr", 0, 1, op_setr)),
    (OP_RSTR, slot("rstr", 0, 1, op_rstr)),
    (OP_OUT, slot("out", 0, 1, op_out)),
    (OP_INP, slot("inp", 0, 1, op_inp)),
    (OP_HALT, slot("halt", 0, 1, op_halt)),
    (OP_CLC, slot("clc", 0, 1, op_clc)),
    (OP_SEC, slot("sec", 0, 1, op_sec)),
    (OP_CALL, slot("call", 2, 3, op_call)),
    (OP_RETN, slot("retn", 0, 3, op_retn)),
];

/// Decode deltas of the expanded member over the base table.
const M200_OVERRIDES: &[(u8, OpSlot)] = &[(OP_LDX, slot("ldx", 1, 2, op_ldx_m200))];

/// Fixed-decode entries the expanded member's reset sequence installs.
const M200_FIXED: &[(u8, OpSlot)] = &[(OP_TXA, slot("txa", 0, 1, op_txa))];

/// 4-bit member: narrowest working register, 1K program, 128-byte data.
pub const fn m40() -> Variant {
    Variant {
        desc: VariantDescriptor {
            name: "m40",
            output_pins: 7,
            input_pins: 4,
            pc_bits: 10,
            byte_bits: 4,
            index_bits: 3,
            prog_addr_bits: 10,
            data_addr_bits: 7,
        },
        base: BASE_OPS,
        overrides: &[],
        fixed_on_reset: &[],
    }
}

/// Baseline member: 8-bit working register, 2K program, 3-bit index.
pub const fn m100() -> Variant {
    Variant {
        desc: VariantDescriptor {
            name: "m100",
            output_pins: 7,
            input_pins: 4,
            pc_bits: 11,
            byte_bits: 8,
            index_bits: 3,
            prog_addr_bits: 11,
            data_addr_bits: 7,
        },
        base: BASE_OPS,
        overrides: &[],
        fixed_on_reset: &[],
    }
}

/// Expanded member: 4K program, 256-byte data, 4-bit index.
///
/// Differences over the baseline are purely table deltas: the index load
/// drops its lowest bit (one ROM address line feeds the index pair shifted),
/// and reset installs a fixed `txa` at `0x0b`.
pub const fn m200() -> Variant {
    Variant {
        desc: VariantDescriptor {
            name: "m200",
            output_pins: 7,
            input_pins: 4,
            pc_bits: 12,
            byte_bits: 8,
            index_bits: 4,
            prog_addr_bits: 12,
            data_addr_bits: 8,
        },
        base: BASE_OPS,
        overrides: M200_OVERRIDES,
        fixed_on_reset: M200_FIXED,
    }
}

/// High-voltage sibling of [`m200`]: one output pin repurposed as a
/// programming pin, otherwise identical.
pub const fn m270() -> Variant {
    let base = m200();
    Variant {
        desc: VariantDescriptor {
            name: "m270",
            output_pins: 6,
            input_pins: base.desc.input_pins,
            pc_bits: base.desc.pc_bits,
            byte_bits: base.desc.byte_bits,
            index_bits: base.desc.index_bits,
            prog_addr_bits: base.desc.prog_addr_bits,
            data_addr_bits: base.desc.data_addr_bits,
        },
        base: base.base,
        overrides: base.overrides,
        fixed_on_reset: base.fixed_on_reset,
    }
}
