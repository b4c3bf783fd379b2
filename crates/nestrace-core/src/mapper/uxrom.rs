//! UxROM (mapper 2): switchable 16KB bank at $8000, last bank fixed at $C000.

use super::{CartridgeMemory, Mapper, CHR_BANK_SIZE, PRG_BANK_SIZE};
use crate::cartridge::Mirroring;

#[derive(Debug)]
pub struct UxRom {
    memory: CartridgeMemory,
    mirroring: Mirroring,
    bank: u8,
}

impl UxRom {
    pub fn new(memory: CartridgeMemory, mirroring: Mirroring) -> Self {
        Self {
            memory,
            mirroring,
            bank: 0,
        }
    }
}

impl Mapper for UxRom {
    fn id(&self) -> u8 {
        2
    }

    fn name(&self) -> &'static str {
        "UxROM"
    }

    fn map_read(&self, address: u16) -> u8 {
        match address {
            0x6000..=0x7FFF => self.memory.read_prg_ram(address),
            0x8000..=0xBFFF => {
                self.memory
                    .read_prg(self.bank as usize, PRG_BANK_SIZE, (address - 0x8000) as usize)
            }
            0xC000..=0xFFFF => {
                let last = self.memory.prg_banks(PRG_BANK_SIZE) - 1;
                self.memory.read_prg(last, PRG_BANK_SIZE, (address - 0xC000) as usize)
            }
            _ => 0,
        }
    }

    fn map_write(&mut self, address: u16, value: u8) {
        match address {
            0x6000..=0x7FFF => self.memory.write_prg_ram(address, value),
            0x8000..=0xFFFF => {
                self.bank = value & 0x0F;
                tracing::trace!(bank = self.bank, "uxrom prg bank select");
            }
            _ => {}
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

    fn reset(&mut self) {
        self.bank = 0;
    }
}
