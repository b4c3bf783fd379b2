//! Integration tests for the NES system

use std::cell::RefCell;
use std::rc::Rc;

use nestrace_core::cartridge::{build_ines, Cartridge, CartridgeError};
use nestrace_core::cheats::{decode_game_genie, Cheat};
use nestrace_core::controller::{Buttons, Controller};
use nestrace_core::mapper::PRG_BANK_SIZE;
use nestrace_core::system::{NesSystem, SystemError};
use proptest::prelude::*;

/// PRG image of `banks` 16KB banks, each filled with its own index, with
/// `program` and the reset vector placed in the last bank at $C000.
fn banked_prg(banks: usize, program: &[u8]) -> Vec<u8> {
    let mut prg: Vec<u8> = (0..banks)
        .flat_map(|bank| std::iter::repeat(bank as u8).take(PRG_BANK_SIZE))
        .collect();
    let last = (banks - 1) * PRG_BANK_SIZE;
    prg[last..last + program.len()].copy_from_slice(program);
    prg[last + 0x3FFC] = 0x00;
    prg[last + 0x3FFD] = 0xC0;
    prg
}

fn boot(mapper: u8, banks: usize, program: &[u8]) -> NesSystem {
    let mut system = NesSystem::new();
    system
        .load_rom(&build_ines(mapper, 0, &banked_prg(banks, program), &[]))
        .expect("valid image");
    system.reset();
    system
}

#[test]
fn test_system_creation() {
    let system = NesSystem::new();
    assert_eq!(system.frame_count(), 0);
    assert_eq!(system.peek_memory(0x8000), 0x00);
}

#[test]
fn test_cpu_after_reset() {
    let system = boot(0, 1, &[]);
    let cpu = system.cpu();
    assert_eq!(cpu.registers().a, 0);
    assert_eq!(cpu.registers().sp, 0xFD);
    assert_eq!(cpu.registers().pc, 0xC000);
}

#[test]
fn test_rejects_bad_images() {
    let mut system = NesSystem::new();
    assert!(matches!(
        system.load_rom(&[]),
        Err(SystemError::Cartridge(CartridgeError::Empty))
    ));
    assert!(matches!(
        system.load_rom(b"NOPE and then some more bytes"),
        Err(SystemError::Cartridge(CartridgeError::InvalidSignature))
    ));
    let image = build_ines(4, 0, &vec![0; PRG_BANK_SIZE], &[]);
    assert!(matches!(
        system.load_rom(&image),
        Err(SystemError::Cartridge(CartridgeError::UnsupportedMapper(4)))
    ));
    assert!(system.bus().cartridge().is_none());
}

#[test]
fn test_controller_serial_read() {
    let mut system = boot(0, 1, &[]);
    let port = system.attach_controller(Controller::new()).unwrap();
    system
        .set_buttons(port, Buttons::new(Buttons::A | Buttons::START | Buttons::RIGHT))
        .unwrap();

    system.write_memory(0x4016, 1);
    system.write_memory(0x4016, 0);
    let bits: Vec<u8> = (0..8).map(|_| system.read_memory(0x4016) & 1).collect();
    assert_eq!(bits, vec![1, 0, 0, 1, 0, 0, 0, 1]);
    assert_eq!(system.read_memory(0x4016) & 1, 1);

    // Port 2 is empty.
    assert_eq!(system.read_memory(0x4017), 0x00);
}

#[test]
fn test_controller_read_by_program() {
    // LDA #1; STA $4016; LDA #0; STA $4016; LDA $4016; LDA $4016; STA $20; JMP *
    let program = [
        0xA9, 0x01, 0x8D, 0x16, 0x40, 0xA9, 0x00, 0x8D, 0x16, 0x40, 0xAD, 0x16, 0x40, 0xAD,
        0x16, 0x40, 0x85, 0x20, 0x4C, 0x12, 0xC0,
    ];
    let mut system = boot(0, 1, &program);
    let port = system.attach_controller(Controller::new()).unwrap();
    system.set_buttons(port, Buttons::new(Buttons::B)).unwrap();
    system.run_one_frame();
    assert_eq!(system.peek_memory(0x0020), 0x01);
}

#[test]
fn test_uxrom_bank_switch() {
    // LDA #$02; STA $8000; LDA $8000; JMP *
    let program = [0xA9, 0x02, 0x8D, 0x00, 0x80, 0xAD, 0x00, 0x80, 0x4C, 0x08, 0xC0];
    let mut system = boot(2, 4, &program);
    assert_eq!(system.peek_memory(0x8000), 0x00);
    for _ in 0..3 {
        system.step();
    }
    assert_eq!(system.cpu().registers().a, 0x02);
    // Fixed bank still holds the program.
    assert_eq!(system.peek_memory(0xC000), 0xA9);
}

#[test]
fn test_mmc1_serial_bank_switch() {
    let mut system = boot(1, 8, &[0x4C, 0x00, 0xC0]);
    assert_eq!(system.peek_memory(0x8000), 0x00);
    assert_eq!(system.peek_memory(0xC000), 0x4C);
    for bit in [1, 1, 0, 0, 0] {
        system.write_memory(0xE000, bit);
    }
    assert_eq!(system.peek_memory(0x8000), 0x03);

    // Reset returns mapper registers to power-on values.
    system.reset();
    assert_eq!(system.peek_memory(0x8000), 0x00);
}

#[test]
fn test_prg_ram() {
    let mut system = boot(0, 1, &[]);
    system.write_memory(0x6000, 0x42);
    system.write_memory(0x7FFF, 0x24);
    assert_eq!(system.peek_memory(0x6000), 0x42);
    assert_eq!(system.peek_memory(0x7FFF), 0x24);
}

#[test]
fn test_hot_swap_keeps_cpu_state() {
    let mut system = boot(0, 1, &[0xA9, 0x33, 0x4C, 0x02, 0xC0]);
    system.step();
    let registers = *system.cpu().registers();

    let other = Cartridge::from_bytes(&build_ines(0, 0, &banked_prg(1, &[0x60]), &[])).unwrap();
    let previous = system.attach_cart(other);
    assert_eq!(previous.map(|c| c.mapper_id()), Some(0));
    assert_eq!(*system.cpu().registers(), registers);
    assert_eq!(system.peek_memory(0xC000), 0x60);

    assert!(system.detach_cart().is_some());
    assert_eq!(system.peek_memory(0xC000), 0x00);
    assert!(system.detach_cart().is_none());
}

#[test]
fn test_cheats_apply_to_cpu_reads() {
    // LDA $10; LDX $D1DD; JMP *
    let program = [0xA5, 0x10, 0xAE, 0xDD, 0xD1, 0x4C, 0x05, 0xC0];
    let mut system = boot(0, 1, &program);
    system.add_cheat(Cheat::new(0x0010, 0x63));
    system.add_cheat(decode_game_genie("GOSSIP").unwrap());
    system.step();
    system.step();
    assert_eq!(system.cpu().registers().a, 0x63);
    assert_eq!(system.cpu().registers().x, 0x14);
    assert_eq!(system.cheats().len(), 2);

    assert_eq!(system.remove_cheat(0x0010), Some(Cheat::new(0x0010, 0x63)));
    assert_eq!(system.peek_memory(0x0010), 0x00);
}

#[test]
fn test_oam_dma_stall() {
    // LDA #$02; STA $4014
    let mut system = boot(0, 1, &[0xA9, 0x02, 0x8D, 0x14, 0x40]);
    system.write_memory(0x0200, 0x11);
    system.write_memory(0x02FF, 0x22);
    system.step();
    // STA (4) + 513, +1 because the transfer starts on an odd cycle.
    assert_eq!(system.step().cycles, 518);
    assert_eq!(system.ppu().oam()[0], 0x11);
    assert_eq!(system.ppu().oam()[255], 0x22);
}

#[test]
fn test_irq_respects_interrupt_disable() {
    let mut prg = banked_prg(1, &[0xEA, 0x58, 0xEA]);
    prg[0x3FFE] = 0x20;
    prg[0x3FFF] = 0xC0;
    let mut system = NesSystem::new();
    system.load_rom(&build_ines(0, 0, &prg, &[])).unwrap();
    system.reset();
    system.bus_mut().set_irq(true);

    // NOP with I set, then CLI.
    system.step();
    system.step();
    assert_eq!(system.cpu().pc(), 0xC002);
    assert_eq!(system.step().cycles, 7);
    assert_eq!(system.cpu().pc(), 0xC020);
    assert!(system.cpu().status().interrupt());
}

#[test]
fn test_frame_callback_controls_halt() {
    let mut system = boot(0, 1, &[0x4C, 0x00, 0xC0]);
    let log = Rc::new(RefCell::new(Vec::new()));
    let seen = Rc::clone(&log);
    system.set_frame_callback(move |handle| {
        seen.borrow_mut().push(handle.cpu().total_cycles());
        if handle.frame_count() == 2 {
            handle.set_halted(true);
        }
    });

    system.run_frames(4);
    let cycles = log.borrow().clone();
    assert_eq!(cycles.len(), 4);
    assert!(cycles[1] > cycles[0]);
    assert_eq!(cycles[2], cycles[1]);
    assert_eq!(cycles[3], cycles[1]);
    assert_eq!(system.frame_count(), 4);
}

#[test]
fn test_frame_stats() {
    let mut system = boot(0, 1, &[0x4C, 0x00, 0xC0]);
    let first = system.run_one_frame();
    let second = system.run_one_frame();
    // 89342 dots per frame, about 29781 CPU cycles.
    assert!((29_770..29_790).contains(&first.cpu_cycles));
    assert!((29_770..29_790).contains(&second.cpu_cycles));
    assert_eq!(second.instructions * 3, second.cpu_cycles);
}

#[test]
fn test_power_cycle_clears_ram() {
    let mut system = boot(0, 1, &[]);
    system.write_memory(0x0123, 0x99);
    system.reset();
    assert_eq!(system.peek_memory(0x0123), 0x99);
    system.power_cycle();
    assert_eq!(system.peek_memory(0x0123), 0x00);
    assert_eq!(system.cpu().pc(), 0xC000);
}

proptest! {
    #[test]
    fn test_ram_mirroring(address in 0u16..0x0800, value in any::<u8>(), mirror in 0u16..4) {
        let mut system = NesSystem::new();
        system.write_memory(address + mirror * 0x0800, value);
        for k in 0..4u16 {
            prop_assert_eq!(system.peek_memory(address + k * 0x0800), value);
        }
    }
}
