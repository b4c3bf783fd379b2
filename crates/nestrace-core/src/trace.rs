//! Instruction-boundary trace lines
//!
//! A [`TraceLine`] snapshots the machine just before an instruction executes:
//! its address and encoded bytes, the CPU registers, the PPU position and the
//! CPU cycle count. `Display` renders the compact conformance format:
//!
//! ```text
//! C000 4C F5 C5 A:00 X:00 Y:00 P:00100100 SP:FD PPU:  0, 21 CYC:7
//! ```
//!
//! [`TraceLine::nestest`] renders the column layout of the published
//! `nestest.log` so the two can be compared line by line.

use std::fmt;

use crate::bus::Bus;
use crate::cpu::{AddressingMode, Cpu, Mnemonic, OpcodeTable};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceLine {
    pub pc: u16,
    /// Encoded instruction; only the first `len` bytes are meaningful.
    pub bytes: [u8; 3],
    pub len: u8,
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub p: u8,
    pub sp: u8,
    pub scanline: u16,
    pub dot: u16,
    pub cycles: u64,
}

impl TraceLine {
    /// Snapshot the instruction at the CPU's program counter. Uses
    /// side-effect-free reads only.
    pub fn capture(cpu: &Cpu, bus: &Bus) -> Self {
        let regs = cpu.registers();
        let pc = regs.pc;
        let opcode = bus.peek(pc);
        let len = OpcodeTable::get(opcode).byte_len() as u8;
        let mut bytes = [opcode, 0, 0];
        for (i, byte) in bytes.iter_mut().enumerate().take(len as usize).skip(1) {
            *byte = bus.peek(pc.wrapping_add(i as u16));
        }
        Self {
            pc,
            bytes,
            len,
            a: regs.a,
            x: regs.x,
            y: regs.y,
            p: cpu.p(),
            sp: regs.sp,
            scanline: bus.ppu().scanline(),
            dot: bus.ppu().dot(),
            cycles: cpu.total_cycles(),
        }
    }

    pub fn opcode(&self) -> u8 {
        self.bytes[0]
    }

    pub fn instruction_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    fn hex_bytes(&self) -> String {
        self.instruction_bytes()
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Assembly for the instruction, e.g. `LDA ($80),Y` or `BNE $C72A`.
    /// Undocumented opcodes use the names common in 6502 test logs.
    pub fn disassembly(&self) -> String {
        let info = OpcodeTable::get(self.opcode());
        let name = match info.mnemonic {
            Mnemonic::ISC => "ISB",
            m => m.name(),
        };
        let lo = self.bytes[1];
        let word = u16::from_le_bytes([self.bytes[1], self.bytes[2]]);
        let operand = match info.mode {
            AddressingMode::Implied => String::new(),
            AddressingMode::Accumulator => "A".to_string(),
            AddressingMode::Immediate => format!("#${:02X}", lo),
            AddressingMode::ZeroPage => format!("${:02X}", lo),
            AddressingMode::ZeroPageX => format!("${:02X},X", lo),
            AddressingMode::ZeroPageY => format!("${:02X},Y", lo),
            AddressingMode::Relative => {
                let target = self.pc.wrapping_add(2).wrapping_add(lo as i8 as u16);
                format!("${:04X}", target)
            }
            AddressingMode::Absolute => format!("${:04X}", word),
            AddressingMode::AbsoluteX => format!("${:04X},X", word),
            AddressingMode::AbsoluteY => format!("${:04X},Y", word),
            AddressingMode::Indirect => format!("(${:04X})", word),
            AddressingMode::IndirectX => format!("(${:02X},X)", lo),
            AddressingMode::IndirectY => format!("(${:02X}),Y", lo),
        };
        if operand.is_empty() {
            name.to_string()
        } else {
            format!("{} {}", name, operand)
        }
    }

    /// Render in `nestest.log` column layout.
    pub fn nestest(&self) -> String {
        let marker = if OpcodeTable::is_documented(self.opcode()) { ' ' } else { '*' };
        format!(
            "{:04X}  {:<8} {}{:<31} A:{:02X} X:{:02X} Y:{:02X} P:{:02X} SP:{:02X} PPU:{:>3},{:>3} CYC:{}",
            self.pc,
            self.hex_bytes(),
            marker,
            self.disassembly(),
            self.a,
            self.x,
            self.y,
            self.p,
            self.sp,
            self.scanline,
            self.dot,
            self.cycles,
        )
    }
}

impl fmt::Display for TraceLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04X} {:<8} A:{:02X} X:{:02X} Y:{:02X} P:{:08b} SP:{:02X} PPU:{:>3},{:>3} CYC:{}",
            self.pc,
            self.hex_bytes(),
            self.a,
            self.x,
            self.y,
            self.p,
            self.sp,
            self.scanline,
            self.dot,
            self.cycles,
        )
    }
}
