//! Mapper implementations
//!
//! A mapper translates CPU addresses in $4020-$FFFF and PPU pattern-table
//! addresses in $0000-$1FFF onto the cartridge's physical ROM and RAM. Bank
//! registers are plain fields, so a bank-select write is visible to the very
//! next access.

use std::fmt;

use crate::cartridge::{CartridgeError, Mirroring};

mod axrom;
mod cnrom;
mod mmc1;
mod nrom;
mod uxrom;

pub use axrom::AxRom;
pub use cnrom::CnRom;
pub use mmc1::Mmc1;
pub use nrom::Nrom;
pub use uxrom::UxRom;

pub const PRG_BANK_SIZE: usize = 16 * 1024;
pub const CHR_BANK_SIZE: usize = 8 * 1024;
pub const PRG_RAM_SIZE: usize = 8 * 1024;

/// Mapper numbers with an implementation
pub const SUPPORTED_MAPPERS: [u8; 5] = [0, 1, 2, 3, 7];

/// Mapper trait
pub trait Mapper: fmt::Debug + Send {
    /// iNES mapper number
    fn id(&self) -> u8;
    fn name(&self) -> &'static str;
    /// CPU read in $4020-$FFFF. Must not have side effects.
    fn map_read(&self, address: u16) -> u8;
    /// CPU write in $4020-$FFFF: PRG RAM or bank registers.
    fn map_write(&mut self, address: u16, value: u8);
    /// PPU read in $0000-$1FFF
    fn chr_read(&self, address: u16) -> u8;
    /// PPU write in $0000-$1FFF; ignored for CHR ROM
    fn chr_write(&mut self, address: u16, value: u8);
    fn mirroring(&self) -> Mirroring;
    /// Return bank registers to their power-on values.
    fn reset(&mut self) {}
}

/// Build the mapper for `id` around the cartridge's memory.
pub fn create_mapper(
    id: u8,
    memory: CartridgeMemory,
    mirroring: Mirroring,
) -> Result<Box<dyn Mapper>, CartridgeError> {
    let mapper: Box<dyn Mapper> = match id {
        0 => Box::new(Nrom::new(memory, mirroring)),
        1 => Box::new(Mmc1::new(memory)),
        2 => Box::new(UxRom::new(memory, mirroring)),
        3 => Box::new(CnRom::new(memory, mirroring)),
        7 => Box::new(AxRom::new(memory)),
        other => return Err(CartridgeError::UnsupportedMapper(other)),
    };
    Ok(mapper)
}

/// Physical cartridge storage shared by every mapper: PRG ROM, CHR ROM or
/// RAM, and 8KB of PRG RAM at $6000-$7FFF.
pub struct CartridgeMemory {
    prg_rom: Vec<u8>,
    chr: Vec<u8>,
    chr_is_ram: bool,
    prg_ram: Vec<u8>,
}

impl CartridgeMemory {
    /// `chr_rom` may be empty, in which case 8KB of CHR RAM is provided.
    pub fn new(prg_rom: Vec<u8>, chr_rom: Vec<u8>) -> Self {
        let chr_is_ram = chr_rom.is_empty();
        let chr = if chr_is_ram { vec![0; CHR_BANK_SIZE] } else { chr_rom };
        Self {
            prg_rom,
            chr,
            chr_is_ram,
            prg_ram: vec![0; PRG_RAM_SIZE],
        }
    }

    pub fn prg_rom(&self) -> &[u8] {
        &self.prg_rom
    }

    pub fn chr(&self) -> &[u8] {
        &self.chr
    }

    pub fn chr_is_ram(&self) -> bool {
        self.chr_is_ram
    }

    /// Number of banks of `size` bytes in PRG ROM, at least one.
    pub fn prg_banks(&self, size: usize) -> usize {
        (self.prg_rom.len() / size).max(1)
    }

    pub fn chr_banks(&self, size: usize) -> usize {
        (self.chr.len() / size).max(1)
    }

    /// Read PRG ROM through a window of `size` bytes. Out-of-range bank
    /// numbers wrap the way unconnected high address lines do.
    pub fn read_prg(&self, bank: usize, size: usize, offset: usize) -> u8 {
        if self.prg_rom.is_empty() {
            return 0;
        }
        let bank = bank % self.prg_banks(size);
        self.prg_rom[(bank * size + offset) % self.prg_rom.len()]
    }

    fn chr_index(&self, bank: usize, size: usize, offset: usize) -> usize {
        let bank = bank % self.chr_banks(size);
        (bank * size + offset) % self.chr.len()
    }

    pub fn read_chr(&self, bank: usize, size: usize, offset: usize) -> u8 {
        self.chr[self.chr_index(bank, size, offset)]
    }

    pub fn write_chr(&mut self, bank: usize, size: usize, offset: usize, value: u8) {
        if self.chr_is_ram {
            let index = self.chr_index(bank, size, offset);
            self.chr[index] = value;
        }
    }

    pub fn read_prg_ram(&self, address: u16) -> u8 {
        self.prg_ram[(address as usize - 0x6000) % PRG_RAM_SIZE]
    }

    pub fn write_prg_ram(&mut self, address: u16, value: u8) {
        self.prg_ram[(address as usize - 0x6000) % PRG_RAM_SIZE] = value;
    }
}

impl fmt::Debug for CartridgeMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CartridgeMemory")
            .field("prg_rom", &self.prg_rom.len())
            .field("chr", &self.chr.len())
            .field("chr_is_ram", &self.chr_is_ram)
            .finish()
    }
}
