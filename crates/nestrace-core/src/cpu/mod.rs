//! CPU module - 2A03 (6502 variant) interpreter
//!
//! The NES uses a modified 6502 without decimal mode: the D flag can be set,
//! cleared and pushed, but ADC/SBC always operate in binary.
//!
//! The interpreter is instruction-stepped. Each [`Cpu::step`] services a
//! pending interrupt or executes one whole instruction and returns the number
//! of CPU cycles it consumed, including page-crossing, branch and OAM DMA
//! penalties. The caller is responsible for advancing the PPU clock by the
//! returned amount.

use std::fmt;
use std::time::Instant;

mod execute;
pub mod opcodes;
pub mod profile;

pub use opcodes::{AddressingMode, Mnemonic, OpcodeInfo, OpcodeTable, OPCODES};
pub use profile::OpcodeProfiler;

/// Non-maskable interrupt vector
pub const NMI_VECTOR: u16 = 0xFFFA;
/// Reset vector
pub const RESET_VECTOR: u16 = 0xFFFC;
/// IRQ / BRK vector
pub const IRQ_VECTOR: u16 = 0xFFFE;
/// Base address of the hardware stack page
pub const STACK_BASE: u16 = 0x0100;
/// Cycles spent entering an interrupt handler
pub const INTERRUPT_CYCLES: u32 = 7;
/// Cycles the CPU has consumed once the reset sequence completes
pub const RESET_CYCLES: u64 = 7;
/// Cycles the CPU is stalled by an OAM DMA transfer (plus one on odd cycles)
pub const OAM_DMA_CYCLES: u32 = 513;

/// Memory interface seen by the CPU.
///
/// Only `read` and `write` are required. The remaining hooks let a system
/// bus report interrupt lines and DMA activity; a flat test memory can ignore
/// them.
pub trait Bus {
    fn read(&mut self, address: u16) -> u8;
    fn write(&mut self, address: u16, value: u8);

    /// Returns true once per NMI edge and clears it.
    fn poll_nmi(&mut self) -> bool {
        false
    }

    /// Level of the maskable interrupt line.
    fn irq_asserted(&self) -> bool {
        false
    }

    /// Returns true once after a write to the OAM DMA register.
    fn take_dma_request(&mut self) -> bool {
        false
    }
}

/// 2A03 CPU registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuRegisters {
    pub a: u8,    // Accumulator
    pub x: u8,    // X index register
    pub y: u8,    // Y index register
    pub sp: u8,   // Stack pointer, offset into $0100-$01FF
    pub pc: u16,  // Program counter
}

impl Default for CpuRegisters {
    fn default() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            sp: 0xFD,
            pc: 0,
        }
    }
}

/// CPU status flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusFlags(u8);

impl StatusFlags {
    pub const CARRY: u8 = 0b00000001;
    pub const ZERO: u8 = 0b00000010;
    pub const INTERRUPT: u8 = 0b00000100;
    pub const DECIMAL: u8 = 0b00001000;
    pub const BREAK: u8 = 0b00010000;
    pub const UNUSED: u8 = 0b00100000;
    pub const OVERFLOW: u8 = 0b01000000;
    pub const NEGATIVE: u8 = 0b10000000;

    /// Power-on value: interrupts disabled, unused bit set.
    pub const POWER_ON: u8 = Self::INTERRUPT | Self::UNUSED;

    pub fn new(flags: u8) -> Self {
        Self(flags)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn contains(&self, mask: u8) -> bool {
        (self.0 & mask) != 0
    }

    pub fn set(&mut self, mask: u8, val: bool) {
        self.0 = if val { self.0 | mask } else { self.0 & !mask };
    }

    pub fn carry(&self) -> bool {
        self.contains(Self::CARRY)
    }

    pub fn zero(&self) -> bool {
        self.contains(Self::ZERO)
    }

    pub fn interrupt(&self) -> bool {
        self.contains(Self::INTERRUPT)
    }

    pub fn decimal(&self) -> bool {
        self.contains(Self::DECIMAL)
    }

    pub fn overflow(&self) -> bool {
        self.contains(Self::OVERFLOW)
    }

    pub fn negative(&self) -> bool {
        self.contains(Self::NEGATIVE)
    }

    pub fn set_carry(&mut self, val: bool) {
        self.set(Self::CARRY, val);
    }

    pub fn set_zero(&mut self, val: bool) {
        self.set(Self::ZERO, val);
    }

    pub fn set_interrupt(&mut self, val: bool) {
        self.set(Self::INTERRUPT, val);
    }

    pub fn set_decimal(&mut self, val: bool) {
        self.set(Self::DECIMAL, val);
    }

    pub fn set_overflow(&mut self, val: bool) {
        self.set(Self::OVERFLOW, val);
    }

    pub fn set_negative(&mut self, val: bool) {
        self.set(Self::NEGATIVE, val);
    }

    /// Value as loaded by PLP/RTI: B is not a real flip-flop, U reads as 1.
    fn from_stack(value: u8) -> Self {
        Self((value & !Self::BREAK) | Self::UNUSED)
    }
}

impl Default for StatusFlags {
    fn default() -> Self {
        Self(Self::POWER_ON)
    }
}

impl fmt::Display for StatusFlags {
    /// Renders the flags as eight binary digits, N first.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08b}", self.0)
    }
}

/// Effective operand computed by the addressing-mode resolver.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Operand {
    /// Effective address. For immediates, the address of the operand byte.
    pub address: u16,
    /// Indexed address landed in a different page than its base.
    pub page_crossed: bool,
}

/// 2A03 CPU
#[derive(Debug, Clone)]
pub struct Cpu {
    registers: CpuRegisters,
    status: StatusFlags,
    halted: bool,
    total_cycles: u64,
    profiler: Option<OpcodeProfiler>,
}

impl Cpu {
    /// Create a CPU in its power-on register state. The program counter is
    /// not loaded until [`Cpu::reset`] reads the reset vector.
    pub fn new() -> Self {
        Self {
            registers: CpuRegisters::default(),
            status: StatusFlags::default(),
            halted: false,
            total_cycles: 0,
            profiler: None,
        }
    }

    /// Reload PC from the reset vector and restore power-on registers.
    ///
    /// RAM and cartridge state are untouched. The halted flag is preserved so
    /// that a deliberately paused CPU stays paused across a reset.
    pub fn reset(&mut self, bus: &mut impl Bus) {
        self.registers = CpuRegisters {
            pc: read_word(bus, RESET_VECTOR),
            ..CpuRegisters::default()
        };
        self.status = StatusFlags::default();
        self.total_cycles = RESET_CYCLES;
        tracing::debug!(pc = format_args!("{:04X}", self.registers.pc), "cpu reset");
    }

    /// Reset that additionally clears the halted flag.
    pub fn power_on(&mut self, bus: &mut impl Bus) {
        self.halted = false;
        self.reset(bus);
    }

    /// Execute one instruction, or service one pending interrupt, and return
    /// the cycles consumed. Returns 0 without touching any state while halted.
    pub fn step(&mut self, bus: &mut impl Bus) -> u32 {
        if self.halted {
            return 0;
        }

        if bus.poll_nmi() {
            self.interrupt(bus, NMI_VECTOR, false);
            self.total_cycles += u64::from(INTERRUPT_CYCLES);
            return INTERRUPT_CYCLES;
        }

        if bus.irq_asserted() && !self.status.interrupt() {
            self.interrupt(bus, IRQ_VECTOR, false);
            self.total_cycles += u64::from(INTERRUPT_CYCLES);
            return INTERRUPT_CYCLES;
        }

        let started = self.profiler.as_ref().map(|_| Instant::now());

        let opcode = self.fetch(bus);
        let info = OpcodeTable::get(opcode);
        let operand = self.resolve(bus, info.mode);

        let mut cycles = u32::from(info.cycles);
        if info.page_penalty && operand.page_crossed {
            cycles += 1;
        }
        cycles += self.execute(bus, info, operand);

        if bus.take_dma_request() {
            let odd = (self.total_cycles + u64::from(cycles)) & 1;
            cycles += OAM_DMA_CYCLES + odd as u32;
        }

        self.total_cycles += u64::from(cycles);

        if let (Some(profiler), Some(started)) = (self.profiler.as_mut(), started) {
            profiler.record(opcode, cycles, started.elapsed());
        }

        cycles
    }

    /// Get CPU registers
    pub fn registers(&self) -> &CpuRegisters {
        &self.registers
    }

    /// Get mutable CPU registers (debuggers and test harnesses)
    pub fn registers_mut(&mut self) -> &mut CpuRegisters {
        &mut self.registers
    }

    pub fn status(&self) -> StatusFlags {
        self.status
    }

    pub fn set_status(&mut self, status: StatusFlags) {
        self.status = status;
    }

    /// Raw processor status byte.
    pub fn p(&self) -> u8 {
        self.status.bits()
    }

    pub fn pc(&self) -> u16 {
        self.registers.pc
    }

    pub fn halted(&self) -> bool {
        self.halted
    }

    pub fn set_halted(&mut self, halted: bool) {
        self.halted = halted;
    }

    /// Cycles elapsed since the last reset, counting the reset sequence.
    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    /// Start collecting per-opcode execution statistics.
    pub fn enable_profiling(&mut self) {
        if self.profiler.is_none() {
            self.profiler = Some(OpcodeProfiler::new());
        }
    }

    pub fn disable_profiling(&mut self) {
        self.profiler = None;
    }

    pub fn profiler(&self) -> Option<&OpcodeProfiler> {
        self.profiler.as_ref()
    }

    /// Human-readable profiling report, one line per executed opcode.
    /// Empty when profiling is disabled.
    pub fn profile_report(&self) -> Vec<String> {
        self.profiler
            .as_ref()
            .map(OpcodeProfiler::report)
            .unwrap_or_default()
    }

    fn fetch(&mut self, bus: &mut impl Bus) -> u8 {
        let value = bus.read(self.registers.pc);
        self.registers.pc = self.registers.pc.wrapping_add(1);
        value
    }

    fn fetch_word(&mut self, bus: &mut impl Bus) -> u16 {
        let lo = self.fetch(bus);
        let hi = self.fetch(bus);
        u16::from_le_bytes([lo, hi])
    }

    /// Compute the effective address for `mode`, consuming operand bytes.
    fn resolve(&mut self, bus: &mut impl Bus, mode: AddressingMode) -> Operand {
        let x = self.registers.x;
        let y = self.registers.y;
        match mode {
            AddressingMode::Implied | AddressingMode::Accumulator => Operand::default(),
            AddressingMode::Immediate => {
                let address = self.registers.pc;
                self.registers.pc = self.registers.pc.wrapping_add(1);
                Operand { address, page_crossed: false }
            }
            AddressingMode::ZeroPage => Operand {
                address: u16::from(self.fetch(bus)),
                page_crossed: false,
            },
            AddressingMode::ZeroPageX => Operand {
                address: u16::from(self.fetch(bus).wrapping_add(x)),
                page_crossed: false,
            },
            AddressingMode::ZeroPageY => Operand {
                address: u16::from(self.fetch(bus).wrapping_add(y)),
                page_crossed: false,
            },
            AddressingMode::Relative => {
                let offset = self.fetch(bus) as i8;
                let address = self.registers.pc.wrapping_add(offset as u16);
                Operand {
                    address,
                    page_crossed: crosses_page(self.registers.pc, address),
                }
            }
            AddressingMode::Absolute => Operand {
                address: self.fetch_word(bus),
                page_crossed: false,
            },
            AddressingMode::AbsoluteX => indexed(self.fetch_word(bus), x),
            AddressingMode::AbsoluteY => indexed(self.fetch_word(bus), y),
            AddressingMode::Indirect => {
                // The pointer high byte is fetched without carrying into the
                // page: JMP ($10FF) reads $10FF and $1000.
                let pointer = self.fetch_word(bus);
                let lo = bus.read(pointer);
                let hi = bus.read((pointer & 0xFF00) | (pointer.wrapping_add(1) & 0x00FF));
                Operand {
                    address: u16::from_le_bytes([lo, hi]),
                    page_crossed: false,
                }
            }
            AddressingMode::IndirectX => {
                let pointer = self.fetch(bus).wrapping_add(x);
                Operand {
                    address: read_zero_page_word(bus, pointer),
                    page_crossed: false,
                }
            }
            AddressingMode::IndirectY => {
                let pointer = self.fetch(bus);
                indexed(read_zero_page_word(bus, pointer), y)
            }
        }
    }

    fn push(&mut self, bus: &mut impl Bus, value: u8) {
        bus.write(STACK_BASE | u16::from(self.registers.sp), value);
        self.registers.sp = self.registers.sp.wrapping_sub(1);
    }

    fn pull(&mut self, bus: &mut impl Bus) -> u8 {
        self.registers.sp = self.registers.sp.wrapping_add(1);
        bus.read(STACK_BASE | u16::from(self.registers.sp))
    }

    fn push_word(&mut self, bus: &mut impl Bus, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.push(bus, hi);
        self.push(bus, lo);
    }

    fn pull_word(&mut self, bus: &mut impl Bus) -> u16 {
        let lo = self.pull(bus);
        let hi = self.pull(bus);
        u16::from_le_bytes([lo, hi])
    }

    /// Push PC and P, mask interrupts, and jump through `vector`.
    /// BRK pushes P with B set; hardware interrupts push it clear.
    fn interrupt(&mut self, bus: &mut impl Bus, vector: u16, brk: bool) {
        self.push_word(bus, self.registers.pc);
        let mut pushed = self.status.bits() | StatusFlags::UNUSED;
        if brk {
            pushed |= StatusFlags::BREAK;
        } else {
            pushed &= !StatusFlags::BREAK;
        }
        self.push(bus, pushed);
        self.status.set_interrupt(true);
        self.registers.pc = read_word(bus, vector);
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a little-endian word at `address`.
pub fn read_word(bus: &mut impl Bus, address: u16) -> u16 {
    let lo = bus.read(address);
    let hi = bus.read(address.wrapping_add(1));
    u16::from_le_bytes([lo, hi])
}

/// Read a pointer stored in page zero; the high byte wraps within the page.
fn read_zero_page_word(bus: &mut impl Bus, pointer: u8) -> u16 {
    let lo = bus.read(u16::from(pointer));
    let hi = bus.read(u16::from(pointer.wrapping_add(1)));
    u16::from_le_bytes([lo, hi])
}

fn indexed(base: u16, index: u8) -> Operand {
    let address = base.wrapping_add(u16::from(index));
    Operand {
        address,
        page_crossed: crosses_page(base, address),
    }
}

#[inline]
fn crosses_page(a: u16, b: u16) -> bool {
    (a & 0xFF00) != (b & 0xFF00)
}
