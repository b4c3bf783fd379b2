//! AxROM (mapper 7): 32KB PRG banks and single-screen mirroring.

use super::{CartridgeMemory, Mapper, CHR_BANK_SIZE};
use crate::cartridge::Mirroring;

const PRG_WINDOW: usize = 32 * 1024;

#[derive(Debug)]
pub struct AxRom {
    memory: CartridgeMemory,
    bank: u8,
    upper_nametable: bool,
}

impl AxRom {
    pub fn new(memory: CartridgeMemory) -> Self {
        Self {
            memory,
            bank: 0,
            upper_nametable: false,
        }
    }
}

impl Mapper for AxRom {
    fn id(&self) -> u8 {
        7
    }

    fn name(&self) -> &'static str {
        "AxROM"
    }

    fn map_read(&self, address: u16) -> u8 {
        match address {
            0x6000..=0x7FFF => self.memory.read_prg_ram(address),
            0x8000..=0xFFFF => {
                self.memory
                    .read_prg(self.bank as usize, PRG_WINDOW, (address - 0x8000) as usize)
            }
            _ => 0,
        }
    }

    fn map_write(&mut self, address: u16, value: u8) {
        match address {
            0x6000..=0x7FFF => self.memory.write_prg_ram(address, value),
            0x8000..=0xFFFF => {
                self.bank = value & 0x07;
                self.upper_nametable = (value & 0x10) != 0;
                tracing::trace!(bank = self.bank, upper = self.upper_nametable, "axrom bank select");
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
        if self.upper_nametable {
            Mirroring::SingleScreenUpper
        } else {
            Mirroring::SingleScreenLower
        }
    }

    fn reset(&mut self) {
        self.bank = 0;
        self.upper_nametable = false;
    }
}
