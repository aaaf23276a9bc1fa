//! Read-only debug views and the text command console.
//!
//! The console is a thin bridge: it parses text commands, calls the same
//! public operations any embedder could call, and renders the results as
//! lines. It owns no simulation state of its own, so attaching or detaching
//! a front end can never perturb determinism. Views reuse the snapshot field
//! model for registers and go through the ordinary address-space read path
//! for memory.

use std::fmt;

use crate::common::{SnapshotError, SnapshotWriter};
use crate::machine::Board;

/// One line of table-driven disassembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisasmLine {
    /// Address of the first byte.
    pub addr: u32,
    /// Raw bytes of the instruction.
    pub bytes: Vec<u8>,
    /// Rendered mnemonic and operands.
    pub text: String,
}

impl fmt::Display for DisasmLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes: Vec<String> = self.bytes.iter().map(|b| format!("{b:02x}")).collect();
        write!(f, "{:04x}:  {:<9}  {}", self.addr, bytes.join(" "), self.text)
    }
}

/// Parses a console number: `0x`/`$` prefix for hex, bare digits for decimal.
fn parse_num(s: &str) -> Option<u64> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix('$')) {
        u64::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

impl Board {
    /// Returns a device's registers as ordered `(name, value)` pairs.
    ///
    /// This is the device's own snapshot field list, read without mutating
    /// anything.
    pub fn state_view(&self, tag: &str) -> Result<Vec<(String, u64)>, SnapshotError> {
        let dev = self
            .by_tag
            .get(tag)
            .ok_or_else(|| SnapshotError::MissingDevice(tag.to_owned()))?;
        let mut w = SnapshotWriter::new();
        dev.borrow().save(&mut w);
        Ok(w.finish().fields().to_vec())
    }

    /// Returns a byte window of a named address space.
    ///
    /// Reads go through the normal dispatch path, so handler-backed registers
    /// and open-bus holes render exactly as the CPU would see them.
    pub fn memory_view(&self, space: &str, base: u32, len: usize) -> Option<Vec<u8>> {
        let space = self.spaces.get(space)?;
        let mut space = space.borrow_mut();
        Some((0..len).map(|i| space.read(base + i as u32)).collect())
    }

    /// Executes one text console command and returns the output lines.
    ///
    /// Command errors come back as lines too; the console never panics and
    /// never aborts the simulation (a device fault during `step` is reported
    /// and leaves the board stopped at the faulting cycle).
    pub fn execute(&mut self, cmd: &str) -> Vec<String> {
        let tokens: Vec<&str> = cmd.split_whitespace().collect();
        match tokens.as_slice() {
            [] => Vec::new(),
            ["help"] => vec![
                "help                      show this help".to_owned(),
                "regs <tag>                dump a device's registers".to_owned(),
                "mem <space> <addr> <len>  dump a byte window".to_owned(),
                "dasm <tag> <addr> <n>     disassemble n slots".to_owned(),
                "step <n>                  advance n cycles".to_owned(),
                "reset                     reset the board".to_owned(),
            ],
            ["regs", tag] => match self.state_view(tag) {
                Ok(fields) => fields
                    .iter()
                    .map(|(name, value)| format!("{name:<10} = {value:#x}"))
                    .collect(),
                Err(e) => vec![format!("error: {e}")],
            },
            ["mem", space, addr, len] => {
                let (Some(addr), Some(len)) = (parse_num(addr), parse_num(len)) else {
                    return vec!["error: bad number".to_owned()];
                };
                match self.memory_view(space, addr as u32, len as usize) {
                    Some(bytes) => bytes
                        .chunks(16)
                        .enumerate()
                        .map(|(row, chunk)| {
                            let hex: Vec<String> =
                                chunk.iter().map(|b| format!("{b:02x}")).collect();
                            format!("{:04x}: {}", addr as u32 + (row as u32) * 16, hex.join(" "))
                        })
                        .collect(),
                    None => vec![format!("error: no address space `{space}`")],
                }
            }
            ["dasm", tag, addr, count] => {
                let (Some(addr), Some(count)) = (parse_num(addr), parse_num(count)) else {
                    return vec!["error: bad number".to_owned()];
                };
                let Some(dev) = self.device(tag) else {
                    return vec![format!("error: no device `{tag}`")];
                };
                let mut dev = dev.borrow_mut();
                match dev.as_cpu_mut() {
                    Some(cpu) => cpu
                        .disassemble(addr as u32, count as usize)
                        .iter()
                        .map(ToString::to_string)
                        .collect(),
                    None => vec![format!("error: `{tag}` is not a cpu")],
                }
            }
            ["step", n] => {
                let Some(n) = parse_num(n) else {
                    return vec!["error: bad number".to_owned()];
                };
                match self.run_for(n) {
                    Ok(()) => vec![format!("stepped to cycle {}", self.now())],
                    Err(e) => vec![format!("error: {e}")],
                }
            }
            ["reset"] => match self.reset() {
                Ok(()) => vec!["board reset".to_owned()],
                Err(e) => vec![format!("error: {e}")],
            },
            _ => vec![format!("unknown command `{}`; try `help`", tokens[0])],
        }
    }
}
