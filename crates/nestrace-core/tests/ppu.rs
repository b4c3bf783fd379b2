//! PPU tests for the NES emulator
//!
//! These run through the whole system so the CPU, bus and PPU clock are
//! exercised together.

use nestrace_core::cartridge::build_ines;
use nestrace_core::mapper::PRG_BANK_SIZE;
use nestrace_core::ppu::{Ppu, DOTS_PER_SCANLINE, SCANLINES_PER_FRAME};
use nestrace_core::system::NesSystem;

/// Horizontal mirroring unless `vertical`; CHR RAM.
fn boot_with(program: &[u8], nmi_handler: &[u8], vertical: bool) -> NesSystem {
    let mut prg = vec![0xEA; PRG_BANK_SIZE];
    prg[..program.len()].copy_from_slice(program);
    prg[0x10..0x10 + nmi_handler.len()].copy_from_slice(nmi_handler);
    // NMI -> $C010, RESET -> $C000
    prg[0x3FFA] = 0x10;
    prg[0x3FFB] = 0xC0;
    prg[0x3FFC] = 0x00;
    prg[0x3FFD] = 0xC0;
    let mut system = NesSystem::new();
    system
        .load_rom(&build_ines(0, u8::from(vertical), &prg, &[]))
        .expect("valid image");
    system.reset();
    system
}

fn set_vram_address(system: &mut NesSystem, address: u16) {
    system.write_memory(0x2006, (address >> 8) as u8);
    system.write_memory(0x2006, address as u8);
}

#[test]
fn test_ppu_power_on() {
    let ppu = Ppu::new();
    assert_eq!(ppu.scanline(), 0);
    assert_eq!(ppu.dot(), 0);
    assert!(!ppu.status().vblank());
}

#[test]
fn test_frame_length() {
    let mut ppu = Ppu::new();
    let dots = u32::from(DOTS_PER_SCANLINE) * u32::from(SCANLINES_PER_FRAME);
    // 29781 CPU cycles overshoot one frame by a single dot.
    assert!(ppu.advance(dots / 3 + 1));
    assert_eq!(ppu.frame(), 1);
    assert_eq!((ppu.scanline(), ppu.dot()), (0, 1));
}

#[test]
fn test_cpu_polls_vblank() {
    // wait: BIT $2002; BPL wait; LDA #$01; STA $10; JMP *
    let program = [0x2C, 0x02, 0x20, 0x10, 0xFB, 0xA9, 0x01, 0x85, 0x10, 0x4C, 0x09, 0xC0];
    let mut system = boot_with(&program, &[0x40], false);
    system.run_one_frame();
    assert_eq!(system.peek_memory(0x0010), 0x01);
    // The CPU's $2002 read cleared the flag.
    assert!(!system.ppu().status().vblank());
}

#[test]
fn test_nmi_serviced_once_per_frame() {
    // LDA #$80; STA $2000; JMP *   NMI: INX; RTI
    let program = [0xA9, 0x80, 0x8D, 0x00, 0x20, 0x4C, 0x05, 0xC0];
    let mut system = boot_with(&program, &[0xE8, 0x40], false);
    system.run_frames(3);
    assert_eq!(system.cpu().registers().x, 3);
    // NMI pushes P with B clear and U set.
    assert_eq!(system.peek_memory(0x01FB), 0xA4);
    assert_eq!(system.cpu().registers().sp, 0xFD);
}

#[test]
fn test_nmi_disabled_leaves_cpu_alone() {
    let program = [0x4C, 0x00, 0xC0];
    let mut system = boot_with(&program, &[0xE8, 0x40], false);
    system.run_frames(2);
    assert_eq!(system.cpu().registers().x, 0);
}

#[test]
fn test_nametable_mirroring_follows_cartridge() {
    for (vertical, alias) in [(false, 0x2400u16), (true, 0x2800u16)] {
        let mut system = boot_with(&[], &[], vertical);
        set_vram_address(&mut system, 0x2000);
        system.write_memory(0x2007, 0xAB);
        set_vram_address(&mut system, alias);
        system.read_memory(0x2007);
        assert_eq!(system.read_memory(0x2007), 0xAB, "vertical={}", vertical);
    }
}

#[test]
fn test_chr_ram_through_ppudata() {
    let mut system = boot_with(&[], &[], false);
    set_vram_address(&mut system, 0x0010);
    system.write_memory(0x2007, 0x5A);
    set_vram_address(&mut system, 0x0010);
    system.read_memory(0x2007);
    assert_eq!(system.read_memory(0x2007), 0x5A);
    assert_eq!(system.bus().cartridge().map(|c| c.chr_read(0x0010)), Some(0x5A));
}

#[test]
fn test_trace_peek_does_not_clear_vblank() {
    let program = [0x4C, 0x00, 0xC0];
    let mut system = boot_with(&program, &[], false);
    while !(system.ppu().scanline() == 241 && system.ppu().dot() > 1) {
        system.step();
    }
    assert_eq!(system.peek_memory(0x2002) & 0x80, 0x80);
    let _ = system.trace_line();
    assert!(system.ppu().status().vblank());
    assert_eq!(system.read_memory(0x2002) & 0x80, 0x80);
    assert!(!system.ppu().status().vblank());
}
