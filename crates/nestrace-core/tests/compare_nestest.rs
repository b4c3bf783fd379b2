//! Compare emulator traces with nestest.log
//!
//! The reference ROM and log are not redistributed. Place `nestest.nes` and
//! `nestest.log` in `tests/roms/` and run with `--ignored`.

use std::fs;
use std::path::PathBuf;

use nestrace_core::cartridge::build_ines;
use nestrace_core::mapper::PRG_BANK_SIZE;
use nestrace_core::system::NesSystem;
use nestrace_core::trace::TraceLine;

/// Numeric fields of one log line. The disassembly column is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LogEntry {
    pc: u16,
    opcodes: Vec<u8>,
    a: u8,
    x: u8,
    y: u8,
    p: u8,
    sp: u8,
    ppu_line: u16,
    ppu_dot: u16,
    cycles: u64,
}

impl LogEntry {
    fn from_trace(line: &TraceLine) -> Self {
        Self {
            pc: line.pc,
            opcodes: line.instruction_bytes().to_vec(),
            a: line.a,
            x: line.x,
            y: line.y,
            p: line.p,
            sp: line.sp,
            ppu_line: line.scanline,
            ppu_dot: line.dot,
            cycles: line.cycles,
        }
    }
}

// Format: C000  4C F5 C5  JMP $C5F5                       A:00 X:00 Y:00 P:24 SP:FD PPU:  0, 21 CYC:7
fn parse_log_line(line: &str) -> Option<LogEntry> {
    let line = line.trim_end();
    if line.len() < 16 {
        return None;
    }

    let pc = u16::from_str_radix(line.get(0..4)?, 16).ok()?;
    // Bytes occupy columns 6..14; undocumented opcodes put '*' at 15.
    let opcodes = line
        .get(6..14)?
        .split_whitespace()
        .map(|s| u8::from_str_radix(s, 16).ok())
        .collect::<Option<Vec<_>>>()?;

    let registers = line.get(line.find("A:")?..)?;
    let a = parse_hex(registers, "A:")?;
    let x = parse_hex(registers, "X:")?;
    let y = parse_hex(registers, "Y:")?;
    let p = parse_hex(registers, " P:")?;
    let sp = parse_hex(registers, "SP:")?;

    let ppu = registers.get(registers.find("PPU:")? + 4..)?;
    let (ppu_line, rest) = ppu.split_once(',')?;
    let ppu_dot = rest.split_whitespace().next()?;
    let cycles = registers.get(registers.find("CYC:")? + 4..)?.trim();

    Some(LogEntry {
        pc,
        opcodes,
        a,
        x,
        y,
        p,
        sp,
        ppu_line: ppu_line.trim().parse().ok()?,
        ppu_dot: ppu_dot.parse().ok()?,
        cycles: cycles.parse().ok()?,
    })
}

fn parse_hex(s: &str, prefix: &str) -> Option<u8> {
    let start = s.find(prefix)? + prefix.len();
    u8::from_str_radix(s.get(start..start + 2)?, 16).ok()
}

fn roms_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("roms")
}

#[test]
fn test_parse_reference_line() {
    let entry = parse_log_line(
        "C000  4C F5 C5  JMP $C5F5                       A:00 X:00 Y:00 P:24 SP:FD PPU:  0, 21 CYC:7",
    )
    .expect("line parses");
    assert_eq!(entry.pc, 0xC000);
    assert_eq!(entry.opcodes, vec![0x4C, 0xF5, 0xC5]);
    assert_eq!((entry.a, entry.x, entry.y, entry.p, entry.sp), (0, 0, 0, 0x24, 0xFD));
    assert_eq!((entry.ppu_line, entry.ppu_dot, entry.cycles), (0, 21, 7));

    let undocumented = parse_log_line(
        "C6BD  04 A9    *NOP $A9 = 00                    A:AA X:97 Y:4E P:EF SP:F5 PPU: 95,217 CYC:10865",
    )
    .expect("line parses");
    assert_eq!(undocumented.opcodes, vec![0x04, 0xA9]);
    assert_eq!((undocumented.p, undocumented.sp), (0xEF, 0xF5));
    assert_eq!((undocumented.ppu_line, undocumented.ppu_dot), (95, 217));
    assert_eq!(undocumented.cycles, 10865);
}

#[test]
fn test_rendered_trace_parses_back() {
    let mut prg = vec![0xEA; PRG_BANK_SIZE];
    prg[..3].copy_from_slice(&[0x4C, 0xF5, 0xC5]);
    prg[0x05F5..0x05F8].copy_from_slice(&[0xA2, 0x00, 0x86]);
    prg[0x3FFC] = 0x00;
    prg[0x3FFD] = 0xC0;
    let mut system = NesSystem::new();
    system.load_rom(&build_ines(0, 0, &prg, &[])).unwrap();
    system.reset();

    for _ in 0..3 {
        let line = system.trace_line();
        let parsed = parse_log_line(&line.nestest()).expect("rendered line parses");
        assert_eq!(parsed, LogEntry::from_trace(&line));
        system.step();
    }
}

/// Step from $C000 (automation entry point) and require every logged
/// instruction boundary to match exactly.
#[test]
#[ignore = "needs tests/roms/nestest.nes and tests/roms/nestest.log"]
fn test_compare_with_nestest_log() {
    let dir = roms_dir();
    let log = fs::read_to_string(dir.join("nestest.log"))
        .unwrap_or_else(|e| panic!("failed to read {}: {}", dir.join("nestest.log").display(), e));
    let rom = fs::read(dir.join("nestest.nes"))
        .unwrap_or_else(|e| panic!("failed to read {}: {}", dir.join("nestest.nes").display(), e));

    let expected: Vec<(&str, LogEntry)> = log
        .lines()
        .filter_map(|line| parse_log_line(line).map(|entry| (line, entry)))
        .collect();
    assert!(expected.len() > 8000, "only {} log entries parsed", expected.len());

    let mut system = NesSystem::new();
    system.load_rom(&rom).expect("nestest.nes loads");
    system.reset();
    system.cpu_mut().registers_mut().pc = 0xC000;

    for (index, (reference, entry)) in expected.iter().enumerate() {
        let line = system.trace_line();
        let actual = LogEntry::from_trace(&line);
        assert_eq!(
            &actual,
            entry,
            "divergence at line {}\n  expected: {}\n  actual:   {}",
            index + 1,
            reference,
            line.nestest()
        );
        system.step();
    }

    // Result codes for the official and unofficial opcode sections.
    assert_eq!(system.peek_memory(0x0002), 0x00);
    assert_eq!(system.peek_memory(0x0003), 0x00);
}
