//! CNROM (mapper 3): fixed PRG, switchable 8KB CHR bank.

use super::{CartridgeMemory, Mapper, CHR_BANK_SIZE};
use crate::cartridge::Mirroring;

#[derive(Debug)]
pub struct CnRom {
    memory: CartridgeMemory,
    mirroring: Mirroring,
    chr_bank: u8,
}

impl CnRom {
    pub fn new(memory: CartridgeMemory, mirroring: Mirroring) -> Self {
        Self {
            memory,
            mirroring,
            chr_bank: 0,
        }
    }
}

impl Mapper for CnRom {
    fn id(&self) -> u8 {
        3
    }

    fn name(&self) -> &'static str {
        "CNROM"
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
        match address {
            0x6000..=0x7FFF => self.memory.write_prg_ram(address, value),
            0x8000..=0xFFFF => {
                self.chr_bank = value & 0x03;
                tracing::trace!(bank = self.chr_bank, "cnrom chr bank select");
            }
            _ => {}
        }
    }

    fn chr_read(&self, address: u16) -> u8 {
        self.memory
            .read_chr(self.chr_bank as usize, CHR_BANK_SIZE, address as usize & 0x1FFF)
    }

    fn chr_write(&mut self, address: u16, value: u8) {
        let bank = self.chr_bank as usize;
        self.memory
            .write_chr(bank, CHR_BANK_SIZE, address as usize & 0x1FFF, value);
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn reset(&mut self) {
        self.chr_bank = 0;
    }
}
