//! NROM (mapper 0): no bank switching.
//!
//! 16KB PRG images are mirrored into both halves of $8000-$FFFF.

use super::{CartridgeMemory, Mapper, CHR_BANK_SIZE};
use crate::cartridge::Mirroring;

#[derive(Debug)]
pub struct Nrom {
    memory: CartridgeMemory,
    mirroring: Mirroring,
}

impl Nrom {
    pub fn new(memory: CartridgeMemory, mirroring: Mirroring) -> Self {
        Self { memory, mirroring }
    }
}

impl Mapper for Nrom {
    fn id(&self) -> u8 {
        0
    }

    fn name(&self) -> &'static str {
        "NROM"
    }

    fn map_read(&self, address: u16) -> u8 {
        match address {
            0x6000..=0x7FFF => self.memory.read_prg_ram(address),
            0x8000..=0xFFFF => {
                let rom = self.memory.prg_rom();
                if rom.is_empty() {
                    0
                } else {
                    rom[(address as usize - 0x8000) % rom.len()]
                }
            }
            _ => 0,
        }
    }

    fn map_write(&mut self, address: u16, value: u8) {
        if let 0x6000..=0x7FFF = address {
            self.memory.write_prg_ram(address, value);
        }
    }

    fn chr_read(&self, address: u16) -> u8 {
        self.memory.read_chr(0, CHR_BANK_SIZE, address as usize & 0x1FFF)
    }

    fn chr_write(&mut self, address: u16, value: u8) {
        self.memory.write_chr(0, CHR_BANK_SIZE, address as usize & 0x1FFF, value);
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }
}
