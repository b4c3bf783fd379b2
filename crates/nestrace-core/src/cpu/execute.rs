//! Instruction semantics
//!
//! `execute` applies one decoded instruction. Operand bytes have already
//! been consumed, so `registers.pc` points at the next instruction.

use super::opcodes::{AddressingMode, Mnemonic, OpcodeInfo};
use super::{Bus, Cpu, Operand, StatusFlags, IRQ_VECTOR};

/// Bits OR-ed into ANE/LXA operands by most 2A03 dies.
const UNSTABLE_MAGIC: u8 = 0xEE;

impl Cpu {
    /// Run `info` against `operand`. Returns extra cycles beyond the base
    /// cost and page penalty, which only taken branches produce.
    pub(super) fn execute(&mut self, bus: &mut impl Bus, info: &OpcodeInfo, operand: Operand) -> u32 {
        use Mnemonic::*;

        let addr = operand.address;
        match info.mnemonic {
            // Loads and stores
            LDA => {
                let v = bus.read(addr);
                self.set_a(v);
            }
            LDX => {
                let v = bus.read(addr);
                self.set_x(v);
            }
            LDY => {
                let v = bus.read(addr);
                self.set_y(v);
            }
            STA => bus.write(addr, self.registers.a),
            STX => bus.write(addr, self.registers.x),
            STY => bus.write(addr, self.registers.y),

            // Transfers
            TAX => self.set_x(self.registers.a),
            TAY => self.set_y(self.registers.a),
            TXA => self.set_a(self.registers.x),
            TYA => self.set_a(self.registers.y),
            TSX => self.set_x(self.registers.sp),
            TXS => self.registers.sp = self.registers.x,

            // Stack
            PHA => self.push(bus, self.registers.a),
            PHP => {
                let pushed = self.status.bits() | StatusFlags::BREAK | StatusFlags::UNUSED;
                self.push(bus, pushed);
            }
            PLA => {
                let v = self.pull(bus);
                self.set_a(v);
            }
            PLP => {
                let v = self.pull(bus);
                self.status = StatusFlags::from_stack(v);
            }

            // Logic and arithmetic
            AND => {
                let v = bus.read(addr);
                self.set_a(self.registers.a & v);
            }
            ORA => {
                let v = bus.read(addr);
                self.set_a(self.registers.a | v);
            }
            EOR => {
                let v = bus.read(addr);
                self.set_a(self.registers.a ^ v);
            }
            ADC => {
                let v = bus.read(addr);
                self.add_with_carry(v);
            }
            SBC | USBC => {
                let v = bus.read(addr);
                self.add_with_carry(!v);
            }
            BIT => {
                let v = bus.read(addr);
                self.status.set_zero(self.registers.a & v == 0);
                self.status.set_overflow(v & 0x40 != 0);
                self.status.set_negative(v & 0x80 != 0);
            }
            CMP => {
                let v = bus.read(addr);
                self.compare(self.registers.a, v);
            }
            CPX => {
                let v = bus.read(addr);
                self.compare(self.registers.x, v);
            }
            CPY => {
                let v = bus.read(addr);
                self.compare(self.registers.y, v);
            }

            // Increments and decrements
            INC => {
                self.modify(bus, info.mode, addr, |cpu, v| {
                    let r = v.wrapping_add(1);
                    cpu.set_zn(r);
                    r
                });
            }
            DEC => {
                self.modify(bus, info.mode, addr, |cpu, v| {
                    let r = v.wrapping_sub(1);
                    cpu.set_zn(r);
                    r
                });
            }
            INX => self.set_x(self.registers.x.wrapping_add(1)),
            INY => self.set_y(self.registers.y.wrapping_add(1)),
            DEX => self.set_x(self.registers.x.wrapping_sub(1)),
            DEY => self.set_y(self.registers.y.wrapping_sub(1)),

            // Shifts
            ASL => self.modify(bus, info.mode, addr, Cpu::asl),
            LSR => self.modify(bus, info.mode, addr, Cpu::lsr),
            ROL => self.modify(bus, info.mode, addr, Cpu::rol),
            ROR => self.modify(bus, info.mode, addr, Cpu::ror),

            // Jumps and calls
            JMP => self.registers.pc = addr,
            JSR => {
                let ret = self.registers.pc.wrapping_sub(1);
                self.push_word(bus, ret);
                self.registers.pc = addr;
            }
            RTS => {
                self.registers.pc = self.pull_word(bus).wrapping_add(1);
            }
            RTI => {
                let p = self.pull(bus);
                self.status = StatusFlags::from_stack(p);
                self.registers.pc = self.pull_word(bus);
            }
            BRK => {
                // Skip the padding byte.
                self.registers.pc = self.registers.pc.wrapping_add(1);
                self.interrupt(bus, IRQ_VECTOR, true);
            }

            // Branches
            BCC => return self.branch(!self.status.carry(), operand),
            BCS => return self.branch(self.status.carry(), operand),
            BNE => return self.branch(!self.status.zero(), operand),
            BEQ => return self.branch(self.status.zero(), operand),
            BPL => return self.branch(!self.status.negative(), operand),
            BMI => return self.branch(self.status.negative(), operand),
            BVC => return self.branch(!self.status.overflow(), operand),
            BVS => return self.branch(self.status.overflow(), operand),

            // Flags
            CLC => self.status.set_carry(false),
            SEC => self.status.set_carry(true),
            CLI => self.status.set_interrupt(false),
            SEI => self.status.set_interrupt(true),
            CLD => self.status.set_decimal(false),
            SED => self.status.set_decimal(true),
            CLV => self.status.set_overflow(false),

            NOP => {
                // Multi-byte NOPs still perform their operand read.
                if !matches!(info.mode, AddressingMode::Implied) {
                    bus.read(addr);
                }
            }

            // Undocumented, stable
            LAX => {
                let v = bus.read(addr);
                self.set_a(v);
                self.registers.x = v;
            }
            SAX => bus.write(addr, self.registers.a & self.registers.x),
            SLO => {
                let r = self.read_modify_write(bus, addr, Cpu::asl);
                self.set_a(self.registers.a | r);
            }
            RLA => {
                let r = self.read_modify_write(bus, addr, Cpu::rol);
                self.set_a(self.registers.a & r);
            }
            SRE => {
                let r = self.read_modify_write(bus, addr, Cpu::lsr);
                self.set_a(self.registers.a ^ r);
            }
            RRA => {
                let r = self.read_modify_write(bus, addr, Cpu::ror);
                self.add_with_carry(r);
            }
            DCP => {
                let r = self.read_modify_write(bus, addr, |_, v| v.wrapping_sub(1));
                self.compare(self.registers.a, r);
            }
            ISC => {
                let r = self.read_modify_write(bus, addr, |_, v| v.wrapping_add(1));
                self.add_with_carry(!r);
            }
            ANC => {
                let v = bus.read(addr);
                self.set_a(self.registers.a & v);
                self.status.set_carry(self.status.negative());
            }
            ALR => {
                let v = bus.read(addr);
                let r = self.registers.a & v;
                self.registers.a = Cpu::lsr(self, r);
            }
            ARR => {
                let v = bus.read(addr);
                let carry_in = u8::from(self.status.carry()) << 7;
                let r = ((self.registers.a & v) >> 1) | carry_in;
                self.set_a(r);
                let bit6 = r & 0x40 != 0;
                let bit5 = r & 0x20 != 0;
                self.status.set_carry(bit6);
                self.status.set_overflow(bit6 ^ bit5);
            }
            SBX => {
                let v = bus.read(addr);
                let ax = self.registers.a & self.registers.x;
                self.status.set_carry(ax >= v);
                self.set_x(ax.wrapping_sub(v));
            }
            LAS => {
                let v = bus.read(addr) & self.registers.sp;
                self.registers.sp = v;
                self.registers.x = v;
                self.set_a(v);
            }

            // Undocumented, unstable
            ANE => {
                let v = bus.read(addr);
                self.set_a((self.registers.a | UNSTABLE_MAGIC) & self.registers.x & v);
            }
            LXA => {
                let v = bus.read(addr);
                let r = (self.registers.a | UNSTABLE_MAGIC) & v;
                self.registers.x = r;
                self.set_a(r);
            }
            SHA => {
                let value = self.registers.a & self.registers.x;
                self.store_high_and(bus, operand, value, self.registers.y);
            }
            SHX => self.store_high_and(bus, operand, self.registers.x, self.registers.y),
            SHY => self.store_high_and(bus, operand, self.registers.y, self.registers.x),
            TAS => {
                self.registers.sp = self.registers.a & self.registers.x;
                self.store_high_and(bus, operand, self.registers.sp, self.registers.y);
            }

            JAM => {
                // Park on the opcode so resuming re-executes the jam.
                self.registers.pc = self.registers.pc.wrapping_sub(1);
                self.halted = true;
                tracing::warn!(pc = format_args!("{:04X}", self.registers.pc), "cpu jammed");
            }
        }
        0
    }

    fn set_zn(&mut self, value: u8) {
        self.status.set_zero(value == 0);
        self.status.set_negative(value & 0x80 != 0);
    }

    fn set_a(&mut self, value: u8) {
        self.registers.a = value;
        self.set_zn(value);
    }

    fn set_x(&mut self, value: u8) {
        self.registers.x = value;
        self.set_zn(value);
    }

    fn set_y(&mut self, value: u8) {
        self.registers.y = value;
        self.set_zn(value);
    }

    /// Binary ADC; SBC is ADC of the complemented operand.
    fn add_with_carry(&mut self, value: u8) {
        let a = self.registers.a;
        let sum = u16::from(a) + u16::from(value) + u16::from(self.status.carry());
        let result = sum as u8;
        self.status.set_carry(sum > 0xFF);
        self.status.set_overflow((a ^ result) & (value ^ result) & 0x80 != 0);
        self.set_a(result);
    }

    fn compare(&mut self, register: u8, value: u8) {
        self.status.set_carry(register >= value);
        self.set_zn(register.wrapping_sub(value));
    }

    fn asl(&mut self, value: u8) -> u8 {
        self.status.set_carry(value & 0x80 != 0);
        let r = value << 1;
        self.set_zn(r);
        r
    }

    fn lsr(&mut self, value: u8) -> u8 {
        self.status.set_carry(value & 0x01 != 0);
        let r = value >> 1;
        self.set_zn(r);
        r
    }

    fn rol(&mut self, value: u8) -> u8 {
        let carry_in = u8::from(self.status.carry());
        self.status.set_carry(value & 0x80 != 0);
        let r = (value << 1) | carry_in;
        self.set_zn(r);
        r
    }

    fn ror(&mut self, value: u8) -> u8 {
        let carry_in = u8::from(self.status.carry()) << 7;
        self.status.set_carry(value & 0x01 != 0);
        let r = (value >> 1) | carry_in;
        self.set_zn(r);
        r
    }

    /// Apply `f` to the accumulator or to memory, depending on `mode`.
    fn modify(
        &mut self,
        bus: &mut impl Bus,
        mode: AddressingMode,
        addr: u16,
        f: impl FnOnce(&mut Cpu, u8) -> u8,
    ) {
        if mode == AddressingMode::Accumulator {
            let a = self.registers.a;
            self.registers.a = f(self, a);
        } else {
            self.read_modify_write(bus, addr, f);
        }
    }

    fn read_modify_write(
        &mut self,
        bus: &mut impl Bus,
        addr: u16,
        f: impl FnOnce(&mut Cpu, u8) -> u8,
    ) -> u8 {
        let v = bus.read(addr);
        let r = f(self, v);
        bus.write(addr, r);
        r
    }

    fn branch(&mut self, taken: bool, operand: Operand) -> u32 {
        if !taken {
            return 0;
        }
        self.registers.pc = operand.address;
        if operand.page_crossed {
            2
        } else {
            1
        }
    }

    /// SHA/SHX/SHY/TAS store `value & (base_high + 1)`. When indexing
    /// carried into the next page, the stored byte also replaces the high
    /// byte of the target address.
    fn store_high_and(&mut self, bus: &mut impl Bus, operand: Operand, value: u8, index: u8) {
        let base = operand.address.wrapping_sub(u16::from(index));
        let high = ((base >> 8) as u8).wrapping_add(1);
        let stored = value & high;
        let target = if operand.page_crossed {
            (u16::from(stored) << 8) | (operand.address & 0x00FF)
        } else {
            operand.address
        };
        bus.write(target, stored);
    }
}
