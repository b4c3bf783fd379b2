//! Static 6502 opcode table
//!
//! Every one of the 256 opcode values maps to an [`OpcodeInfo`]: mnemonic,
//! addressing mode, base cycle cost, whether a page crossing adds a cycle,
//! and the set of status flags the instruction may modify. Undocumented
//! opcodes carry their commonly observed mnemonic.

use std::collections::BTreeMap;
use std::fmt;

use super::StatusFlags;

/// Instruction mnemonic, documented and undocumented.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Mnemonic {
    ADC, AND, ASL, BCC, BCS, BEQ, BIT, BMI, BNE, BPL, BRK, BVC, BVS, CLC,
    CLD, CLI, CLV, CMP, CPX, CPY, DEC, DEX, DEY, EOR, INC, INX, INY, JMP,
    JSR, LDA, LDX, LDY, LSR, NOP, ORA, PHA, PHP, PLA, PLP, ROL, ROR, RTI,
    RTS, SBC, SEC, SED, SEI, STA, STX, STY, TAX, TAY, TSX, TXA, TXS, TYA,
    // Undocumented
    ALR, ANC, ANE, ARR, DCP, ISC, JAM, LAS, LAX, LXA, RLA, RRA, SAX, SBX,
    SHA, SHX, SHY, SLO, SRE, TAS, USBC,
}

impl Mnemonic {
    /// Assembler name. `USBC` is spelled as the `SBC` it duplicates.
    pub const fn name(self) -> &'static str {
        use Mnemonic::*;
        match self {
            ADC => "ADC", AND => "AND", ASL => "ASL", BCC => "BCC", BCS => "BCS",
            BEQ => "BEQ", BIT => "BIT", BMI => "BMI", BNE => "BNE", BPL => "BPL",
            BRK => "BRK", BVC => "BVC", BVS => "BVS", CLC => "CLC", CLD => "CLD",
            CLI => "CLI", CLV => "CLV", CMP => "CMP", CPX => "CPX", CPY => "CPY",
            DEC => "DEC", DEX => "DEX", DEY => "DEY", EOR => "EOR", INC => "INC",
            INX => "INX", INY => "INY", JMP => "JMP", JSR => "JSR", LDA => "LDA",
            LDX => "LDX", LDY => "LDY", LSR => "LSR", NOP => "NOP", ORA => "ORA",
            PHA => "PHA", PHP => "PHP", PLA => "PLA", PLP => "PLP", ROL => "ROL",
            ROR => "ROR", RTI => "RTI", RTS => "RTS", SBC => "SBC", SEC => "SEC",
            SED => "SED", SEI => "SEI", STA => "STA", STX => "STX", STY => "STY",
            TAX => "TAX", TAY => "TAY", TSX => "TSX", TXA => "TXA", TXS => "TXS",
            TYA => "TYA", ALR => "ALR", ANC => "ANC", ANE => "ANE", ARR => "ARR",
            DCP => "DCP", ISC => "ISC", JAM => "JAM", LAS => "LAS", LAX => "LAX",
            LXA => "LXA", RLA => "RLA", RRA => "RRA", SAX => "SAX", SBX => "SBX",
            SHA => "SHA", SHX => "SHX", SHY => "SHY", SLO => "SLO", SRE => "SRE",
            TAS => "TAS", USBC => "SBC",
        }
    }

    /// True for mnemonics that only exist as undocumented opcodes.
    pub const fn is_undocumented(self) -> bool {
        use Mnemonic::*;
        matches!(
            self,
            ALR | ANC | ANE | ARR | DCP | ISC | JAM | LAS | LAX | LXA | RLA | RRA | SAX | SBX
                | SHA | SHX | SHY | SLO | SRE | TAS | USBC
        )
    }

    /// Status bits the instruction may write.
    pub const fn affected_flags(self) -> u8 {
        use Mnemonic::*;
        const C: u8 = StatusFlags::CARRY;
        const Z: u8 = StatusFlags::ZERO;
        const I: u8 = StatusFlags::INTERRUPT;
        const D: u8 = StatusFlags::DECIMAL;
        const V: u8 = StatusFlags::OVERFLOW;
        const N: u8 = StatusFlags::NEGATIVE;
        const ALL: u8 = C | Z | I | D | V | N;
        match self {
            ADC | SBC | USBC | ARR | RRA | ISC => N | V | Z | C,
            AND | EOR | ORA | LDA | LDX | LDY | LAX | LXA | ANE | DEC | DEX | DEY | INC
            | INX | INY | PLA | TAX | TAY | TSX | TXA | TYA | LAS => N | Z,
            ASL | LSR | ROL | ROR | CMP | CPX | CPY | ALR | ANC | DCP | RLA | SBX | SLO
            | SRE => N | Z | C,
            BIT => N | V | Z,
            CLC | SEC => C,
            CLD | SED => D,
            CLI | SEI | BRK => I,
            CLV => V,
            PLP | RTI => ALL,
            _ => 0,
        }
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operand addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddressingMode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Relative,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    Indirect,
    IndirectX,
    IndirectY,
}

impl AddressingMode {
    pub const ALL: [AddressingMode; 13] = [
        AddressingMode::Implied,
        AddressingMode::Accumulator,
        AddressingMode::Immediate,
        AddressingMode::ZeroPage,
        AddressingMode::ZeroPageX,
        AddressingMode::ZeroPageY,
        AddressingMode::Relative,
        AddressingMode::Absolute,
        AddressingMode::AbsoluteX,
        AddressingMode::AbsoluteY,
        AddressingMode::Indirect,
        AddressingMode::IndirectX,
        AddressingMode::IndirectY,
    ];

    /// Number of operand bytes following the opcode.
    pub const fn operand_len(self) -> u16 {
        match self {
            AddressingMode::Implied | AddressingMode::Accumulator => 0,
            AddressingMode::Absolute
            | AddressingMode::AbsoluteX
            | AddressingMode::AbsoluteY
            | AddressingMode::Indirect => 2,
            _ => 1,
        }
    }

    /// Short tag used in diagnostics ("abs", "izy", ...).
    pub const fn tag(self) -> &'static str {
        match self {
            AddressingMode::Implied => "imp",
            AddressingMode::Accumulator => "acc",
            AddressingMode::Immediate => "imm",
            AddressingMode::ZeroPage => "zp",
            AddressingMode::ZeroPageX => "zpx",
            AddressingMode::ZeroPageY => "zpy",
            AddressingMode::Relative => "rel",
            AddressingMode::Absolute => "abs",
            AddressingMode::AbsoluteX => "abx",
            AddressingMode::AbsoluteY => "aby",
            AddressingMode::Indirect => "ind",
            AddressingMode::IndirectX => "izx",
            AddressingMode::IndirectY => "izy",
        }
    }
}

/// Decoded description of a single opcode value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeInfo {
    pub mnemonic: Mnemonic,
    pub mode: AddressingMode,
    /// Base cycle cost before penalties.
    pub cycles: u8,
    /// Adds one cycle when the indexed effective address crosses a page.
    pub page_penalty: bool,
    /// Status bits the instruction may modify.
    pub flags: u8,
}

impl OpcodeInfo {
    /// Instruction length in bytes, opcode included.
    pub const fn byte_len(&self) -> u16 {
        1 + self.mode.operand_len()
    }
}

const fn op(mnemonic: Mnemonic, mode: AddressingMode, cycles: u8, page_penalty: bool) -> OpcodeInfo {
    OpcodeInfo {
        mnemonic,
        mode,
        cycles,
        page_penalty,
        flags: mnemonic.affected_flags(),
    }
}

/// Query surface over [`OPCODES`].
#[derive(Debug, Clone, Copy, Default)]
pub struct OpcodeTable;

impl OpcodeTable {
    #[inline]
    pub fn get(opcode: u8) -> &'static OpcodeInfo {
        &OPCODES[opcode as usize]
    }

    /// One of the 151 officially documented opcodes.
    pub fn is_documented(opcode: u8) -> bool {
        let info = Self::get(opcode);
        match info.mnemonic {
            Mnemonic::NOP => opcode == 0xEA,
            m => !m.is_undocumented(),
        }
    }

    /// Opcode values using `mode`, ascending.
    pub fn opcodes_with_mode(mode: AddressingMode) -> Vec<u8> {
        (0..=u8::MAX).filter(|&op| Self::get(op).mode == mode).collect()
    }

    /// Number of opcodes per addressing mode.
    pub fn mode_histogram() -> BTreeMap<AddressingMode, usize> {
        let mut histogram = BTreeMap::new();
        for info in OPCODES.iter() {
            *histogram.entry(info.mode).or_insert(0) += 1;
        }
        histogram
    }
}

use AddressingMode::*;
use Mnemonic::*;

/// The full 256-entry opcode table, indexed by opcode value.
pub static OPCODES: [OpcodeInfo; 256] = [
    // 0x00
    op(BRK, Implied, 7, false),
    op(ORA, IndirectX, 6, false),
    op(JAM, Implied, 0, false),
    op(SLO, IndirectX, 8, false),
    op(NOP, ZeroPage, 3, false),
    op(ORA, ZeroPage, 3, false),
    op(ASL, ZeroPage, 5, false),
    op(SLO, ZeroPage, 5, false),
    op(PHP, Implied, 3, false),
    op(ORA, Immediate, 2, false),
    op(ASL, Accumulator, 2, false),
    op(ANC, Immediate, 2, false),
    op(NOP, Absolute, 4, false),
    op(ORA, Absolute, 4, false),
    op(ASL, Absolute, 6, false),
    op(SLO, Absolute, 6, false),
    // 0x10
    op(BPL, Relative, 2, false),
    op(ORA, IndirectY, 5, true),
    op(JAM, Implied, 0, false),
    op(SLO, IndirectY, 8, false),
    op(NOP, ZeroPageX, 4, false),
    op(ORA, ZeroPageX, 4, false),
    op(ASL, ZeroPageX, 6, false),
    op(SLO, ZeroPageX, 6, false),
    op(CLC, Implied, 2, false),
    op(ORA, AbsoluteY, 4, true),
    op(NOP, Implied, 2, false),
    op(SLO, AbsoluteY, 7, false),
    op(NOP, AbsoluteX, 4, true),
    op(ORA, AbsoluteX, 4, true),
    op(ASL, AbsoluteX, 7, false),
    op(SLO, AbsoluteX, 7, false),
    // 0x20
    op(JSR, Absolute, 6, false),
    op(AND, IndirectX, 6, false),
    op(JAM, Implied, 0, false),
    op(RLA, IndirectX, 8, false),
    op(BIT, ZeroPage, 3, false),
    op(AND, ZeroPage, 3, false),
    op(ROL, ZeroPage, 5, false),
    op(RLA, ZeroPage, 5, false),
    op(PLP, Implied, 4, false),
    op(AND, Immediate, 2, false),
    op(ROL, Accumulator, 2, false),
    op(ANC, Immediate, 2, false),
    op(BIT, Absolute, 4, false),
    op(AND, Absolute, 4, false),
    op(ROL, Absolute, 6, false),
    op(RLA, Absolute, 6, false),
    // 0x30
    op(BMI, Relative, 2, false),
    op(AND, IndirectY, 5, true),
    op(JAM, Implied, 0, false),
    op(RLA, IndirectY, 8, false),
    op(NOP, ZeroPageX, 4, false),
    op(AND, ZeroPageX, 4, false),
    op(ROL, ZeroPageX, 6, false),
    op(RLA, ZeroPageX, 6, false),
    op(SEC, Implied, 2, false),
    op(AND, AbsoluteY, 4, true),
    op(NOP, Implied, 2, false),
    op(RLA, AbsoluteY, 7, false),
    op(NOP, AbsoluteX, 4, true),
    op(AND, AbsoluteX, 4, true),
    op(ROL, AbsoluteX, 7, false),
    op(RLA, AbsoluteX, 7, false),
    // 0x40
    op(RTI, Implied, 6, false),
    op(EOR, IndirectX, 6, false),
    op(JAM, Implied, 0, false),
    op(SRE, IndirectX, 8, false),
    op(NOP, ZeroPage, 3, false),
    op(EOR, ZeroPage, 3, false),
    op(LSR, ZeroPage, 5, false),
    op(SRE, ZeroPage, 5, false),
    op(PHA, Implied, 3, false),
    op(EOR, Immediate, 2, false),
    op(LSR, Accumulator, 2, false),
    op(ALR, Immediate, 2, false),
    op(JMP, Absolute, 3, false),
    op(EOR, Absolute, 4, false),
    op(LSR, Absolute, 6, false),
    op(SRE, Absolute, 6, false),
    // 0x50
    op(BVC, Relative, 2, false),
    op(EOR, IndirectY, 5, true),
    op(JAM, Implied, 0, false),
    op(SRE, IndirectY, 8, false),
    op(NOP, ZeroPageX, 4, false),
    op(EOR, ZeroPageX, 4, false),
    op(LSR, ZeroPageX, 6, false),
    op(SRE, ZeroPageX, 6, false),
    op(CLI, Implied, 2, false),
    op(EOR, AbsoluteY, 4, true),
    op(NOP, Implied, 2, false),
    op(SRE, AbsoluteY, 7, false),
    op(NOP, AbsoluteX, 4, true),
    op(EOR, AbsoluteX, 4, true),
    op(LSR, AbsoluteX, 7, false),
    op(SRE, AbsoluteX, 7, false),
    // 0x60
    op(RTS, Implied, 6, false),
    op(ADC, IndirectX, 6, false),
    op(JAM, Implied, 0, false),
    op(RRA, IndirectX, 8, false),
    op(NOP, ZeroPage, 3, false),
    op(ADC, ZeroPage, 3, false),
    op(ROR, ZeroPage, 5, false),
    op(RRA, ZeroPage, 5, false),
    op(PLA, Implied, 4, false),
    op(ADC, Immediate, 2, false),
    op(ROR, Accumulator, 2, false),
    op(ARR, Immediate, 2, false),
    op(JMP, Indirect, 5, false),
    op(ADC, Absolute, 4, false),
    op(ROR, Absolute, 6, false),
    op(RRA, Absolute, 6, false),
    // 0x70
    op(BVS, Relative, 2, false),
    op(ADC, IndirectY, 5, true),
    op(JAM, Implied, 0, false),
    op(RRA, IndirectY, 8, false),
    op(NOP, ZeroPageX, 4, false),
    op(ADC, ZeroPageX, 4, false),
    op(ROR, ZeroPageX, 6, false),
    op(RRA, ZeroPageX, 6, false),
    op(SEI, Implied, 2, false),
    op(ADC, AbsoluteY, 4, true),
    op(NOP, Implied, 2, false),
    op(RRA, AbsoluteY, 7, false),
    op(NOP, AbsoluteX, 4, true),
    op(ADC, AbsoluteX, 4, true),
    op(ROR, AbsoluteX, 7, false),
    op(RRA, AbsoluteX, 7, false),
    // 0x80
    op(NOP, Immediate, 2, false),
    op(STA, IndirectX, 6, false),
    op(NOP, Immediate, 2, false),
    op(SAX, IndirectX, 6, false),
    op(STY, ZeroPage, 3, false),
    op(STA, ZeroPage, 3, false),
    op(STX, ZeroPage, 3, false),
    op(SAX, ZeroPage, 3, false),
    op(DEY, Implied, 2, false),
    op(NOP, Immediate, 2, false),
    op(TXA, Implied, 2, false),
    op(ANE, Immediate, 2, false),
    op(STY, Absolute, 4, false),
    op(STA, Absolute, 4, false),
    op(STX, Absolute, 4, false),
    op(SAX, Absolute, 4, false),
    // 0x90
    op(BCC, Relative, 2, false),
    op(STA, IndirectY, 6, false),
    op(JAM, Implied, 0, false),
    op(SHA, IndirectY, 6, false),
    op(STY, ZeroPageX, 4, false),
    op(STA, ZeroPageX, 4, false),
    op(STX, ZeroPageY, 4, false),
    op(SAX, ZeroPageY, 4, false),
    op(TYA, Implied, 2, false),
    op(STA, AbsoluteY, 5, false),
    op(TXS, Implied, 2, false),
    op(TAS, AbsoluteY, 5, false),
    op(SHY, AbsoluteX, 5, false),
    op(STA, AbsoluteX, 5, false),
    op(SHX, AbsoluteY, 5, false),
    op(SHA, AbsoluteY, 5, false),
    // 0xA0
    op(LDY, Immediate, 2, false),
    op(LDA, IndirectX, 6, false),
    op(LDX, Immediate, 2, false),
    op(LAX, IndirectX, 6, false),
    op(LDY, ZeroPage, 3, false),
    op(LDA, ZeroPage, 3, false),
    op(LDX, ZeroPage, 3, false),
    op(LAX, ZeroPage, 3, false),
    op(TAY, Implied, 2, false),
    op(LDA, Immediate, 2, false),
    op(TAX, Implied, 2, false),
    op(LXA, Immediate, 2, false),
    op(LDY, Absolute, 4, false),
    op(LDA, Absolute, 4, false),
    op(LDX, Absolute, 4, false),
    op(LAX, Absolute, 4, false),
    // 0xB0
    op(BCS, Relative, 2, false),
    op(LDA, IndirectY, 5, true),
    op(JAM, Implied, 0, false),
    op(LAX, IndirectY, 5, true),
    op(LDY, ZeroPageX, 4, false),
    op(LDA, ZeroPageX, 4, false),
    op(LDX, ZeroPageY, 4, false),
    op(LAX, ZeroPageY, 4, false),
    op(CLV, Implied, 2, false),
    op(LDA, AbsoluteY, 4, true),
    op(TSX, Implied, 2, false),
    op(LAS, AbsoluteY, 4, true),
    op(LDY, AbsoluteX, 4, true),
    op(LDA, AbsoluteX, 4, true),
    op(LDX, AbsoluteY, 4, true),
    op(LAX, AbsoluteY, 4, true),
    // 0xC0
    op(CPY, Immediate, 2, false),
    op(CMP, IndirectX, 6, false),
    op(NOP, Immediate, 2, false),
    op(DCP, IndirectX, 8, false),
    op(CPY, ZeroPage, 3, false),
    op(CMP, ZeroPage, 3, false),
    op(DEC, ZeroPage, 5, false),
    op(DCP, ZeroPage, 5, false),
    op(INY, Implied, 2, false),
    op(CMP, Immediate, 2, false),
    op(DEX, Implied, 2, false),
    op(SBX, Immediate, 2, false),
    op(CPY, Absolute, 4, false),
    op(CMP, Absolute, 4, false),
    op(DEC, Absolute, 6, false),
    op(DCP, Absolute, 6, false),
    // 0xD0
    op(BNE, Relative, 2, false),
    op(CMP, IndirectY, 5, true),
    op(JAM, Implied, 0, false),
    op(DCP, IndirectY, 8, false),
    op(NOP, ZeroPageX, 4, false),
    op(CMP, ZeroPageX, 4, false),
    op(DEC, ZeroPageX, 6, false),
    op(DCP, ZeroPageX, 6, false),
    op(CLD, Implied, 2, false),
    op(CMP, AbsoluteY, 4, true),
    op(NOP, Implied, 2, false),
    op(DCP, AbsoluteY, 7, false),
    op(NOP, AbsoluteX, 4, true),
    op(CMP, AbsoluteX, 4, true),
    op(DEC, AbsoluteX, 7, false),
    op(DCP, AbsoluteX, 7, false),
    // 0xE0
    op(CPX, Immediate, 2, false),
    op(SBC, IndirectX, 6, false),
    op(NOP, Immediate, 2, false),
    op(ISC, IndirectX, 8, false),
    op(CPX, ZeroPage, 3, false),
    op(SBC, ZeroPage, 3, false),
    op(INC, ZeroPage, 5, false),
    op(ISC, ZeroPage, 5, false),
    op(INX, Implied, 2, false),
    op(SBC, Immediate, 2, false),
    op(NOP, Implied, 2, false),
    op(USBC, Immediate, 2, false),
    op(CPX, Absolute, 4, false),
    op(SBC, Absolute, 4, false),
    op(INC, Absolute, 6, false),
    op(ISC, Absolute, 6, false),
    // 0xF0
    op(BEQ, Relative, 2, false),
    op(SBC, IndirectY, 5, true),
    op(JAM, Implied, 0, false),
    op(ISC, IndirectY, 8, false),
    op(NOP, ZeroPageX, 4, false),
    op(SBC, ZeroPageX, 4, false),
    op(INC, ZeroPageX, 6, false),
    op(ISC, ZeroPageX, 6, false),
    op(SED, Implied, 2, false),
    op(SBC, AbsoluteY, 4, true),
    op(NOP, Implied, 2, false),
    op(ISC, AbsoluteY, 7, false),
    op(NOP, AbsoluteX, 4, true),
    op(SBC, AbsoluteX, 4, true),
    op(INC, AbsoluteX, 7, false),
    op(ISC, AbsoluteX, 7, false),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documented_count() {
        let documented = (0..=u8::MAX).filter(|&op| OpcodeTable::is_documented(op)).count();
        assert_eq!(documented, 151);
    }

    #[test]
    fn test_known_entries() {
        let jmp = OpcodeTable::get(0x4C);
        assert_eq!(jmp.mnemonic, Mnemonic::JMP);
        assert_eq!(jmp.mode, AddressingMode::Absolute);
        assert_eq!(jmp.cycles, 3);
        assert_eq!(jmp.byte_len(), 3);

        let lda = OpcodeTable::get(0xB1);
        assert_eq!(lda.mnemonic, Mnemonic::LDA);
        assert_eq!(lda.mode, AddressingMode::IndirectY);
        assert!(lda.page_penalty);

        // Stores never pay the page-cross penalty; the extra cycle is in the base cost.
        let sta = OpcodeTable::get(0x9D);
        assert_eq!(sta.cycles, 5);
        assert!(!sta.page_penalty);
    }

    #[test]
    fn test_flag_effects() {
        assert_eq!(OpcodeTable::get(0x18).flags, StatusFlags::CARRY);
        assert_eq!(OpcodeTable::get(0xEA).flags, 0);
        assert_eq!(
            OpcodeTable::get(0x24).flags,
            StatusFlags::NEGATIVE | StatusFlags::OVERFLOW | StatusFlags::ZERO
        );
    }

    #[test]
    fn test_usbc_spelled_as_sbc() {
        assert_eq!(OpcodeTable::get(0xEB).mnemonic.name(), "SBC");
        assert!(!OpcodeTable::is_documented(0xEB));
    }
}
