//! Test harness: assembles a minimal board around one CPU core.

use std::cell::RefCell;
use std::rc::Rc;

use boardsim_core::bus::AddrRange;
use boardsim_core::cpu::{CpuCore, Variant};
use boardsim_core::device::DeviceCell;
use boardsim_core::signal::{Driver, SignalLine, LOW};
use boardsim_core::{Board, Config};

/// Installs a `tracing` subscriber reading `RUST_LOG`; safe to call per test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A started single-CPU board with external input and interrupt drivers.
pub struct TestBoard {
    /// The board, already started (lifecycle `Running`).
    pub board: Board,
    /// Typed handle to the CPU for register inspection.
    pub cpu: Rc<RefCell<CpuCore>>,
    /// Drives the CPU's sampled input port.
    pub input: Driver,
    /// Drives the CPU's interrupt request line.
    pub irq: Driver,
}

/// Builds a board with one CPU of the given variant, the program image in
/// ROM at address zero, and RAM covering the whole data space.
pub fn board_with_cpu(variant: &Variant, program: &[u8]) -> TestBoard {
    let mut board = Board::new(Config::default());

    let prog_end = (1u32 << variant.desc.prog_addr_bits) - 1;
    let data_end = (1u32 << variant.desc.data_addr_bits) - 1;
    let prog = board.create_space("prog", variant.desc.prog_addr_bits).unwrap();
    let data = board.create_space("data", variant.desc.data_addr_bits).unwrap();
    prog.borrow_mut()
        .install_rom(AddrRange::new(0, prog_end), program)
        .unwrap();
    data.borrow_mut()
        .install_ram(AddrRange::new(0, data_end))
        .unwrap();

    let mut cpu = CpuCore::new("mcu", variant, prog, data).unwrap();

    let input_line = SignalLine::new("k", LOW);
    let input = input_line.driver().unwrap();
    cpu.attach_input_port(input_line);

    let irq_line = SignalLine::new("irq", LOW);
    let irq = irq_line.driver().unwrap();
    cpu.attach_irq_line(irq_line);

    let cpu = Rc::new(RefCell::new(cpu));
    let dev: DeviceCell = cpu.clone();
    board.add_device(None, dev).unwrap();
    board.start().unwrap();

    TestBoard {
        board,
        cpu,
        input,
        irq,
    }
}
