//! Cartridge and mapper support
//!
//! This module parses iNES images and owns the mapper that translates
//! cartridge-space addresses. A failed load never produces a partially
//! constructed cartridge.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::mapper::{self, CartridgeMemory, Mapper, CHR_BANK_SIZE, PRG_BANK_SIZE};

/// iNES header size
pub const HEADER_SIZE: usize = 16;
/// Trainer size, present when flags 6 bit 2 is set
pub const TRAINER_SIZE: usize = 512;
/// Magic number: "NES\x1A"
pub const INES_MAGIC: [u8; 4] = [b'N', b'E', b'S', 0x1A];

/// Cartridge loading errors
#[derive(Debug, Error)]
pub enum CartridgeError {
    #[error("cartridge image is empty")]
    Empty,
    #[error("missing iNES signature")]
    InvalidSignature,
    #[error("truncated {section}: expected {expected} bytes, found {actual}")]
    Truncated {
        section: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("unsupported mapper {0}")]
    UnsupportedMapper(u8),
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Nametable mirroring mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mirroring {
    Horizontal,
    Vertical,
    FourScreen,
    SingleScreenLower,
    SingleScreenUpper,
}

impl Mirroring {
    /// Physical nametable (0-3) backing logical nametable `table` (0-3).
    pub fn nametable_bank(self, table: usize) -> usize {
        match self {
            Mirroring::Horizontal => (table >> 1) & 1,
            Mirroring::Vertical => table & 1,
            Mirroring::FourScreen => table & 3,
            Mirroring::SingleScreenLower => 0,
            Mirroring::SingleScreenUpper => 1,
        }
    }
}

/// iNES header structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InesHeader {
    /// PRG ROM size in 16KB units
    pub prg_rom_size: u8,
    /// CHR ROM size in 8KB units; 0 means the board has CHR RAM
    pub chr_rom_size: u8,
    /// Flags 6
    pub flags_6: u8,
    /// Flags 7
    pub flags_7: u8,
}

impl InesHeader {
    /// Parse an iNES header from bytes
    pub fn parse(bytes: &[u8]) -> Result<Self, CartridgeError> {
        if bytes.is_empty() {
            return Err(CartridgeError::Empty);
        }
        if bytes.len() >= 4 && bytes[..4] != INES_MAGIC {
            return Err(CartridgeError::InvalidSignature);
        }
        if bytes.len() < HEADER_SIZE {
            return Err(CartridgeError::Truncated {
                section: "header",
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            prg_rom_size: bytes[4],
            chr_rom_size: bytes[5],
            flags_6: bytes[6],
            flags_7: bytes[7],
        })
    }

    /// Get the mapper number from flags
    pub fn mapper_number(&self) -> u8 {
        (self.flags_6 >> 4) | (self.flags_7 & 0xF0)
    }

    /// Check if trainer is present
    pub fn has_trainer(&self) -> bool {
        (self.flags_6 & 0x04) != 0
    }

    /// Check if battery-backed PRG RAM is present
    pub fn has_battery(&self) -> bool {
        (self.flags_6 & 0x02) != 0
    }

    /// Mirroring wired on the board
    pub fn mirroring(&self) -> Mirroring {
        if self.flags_6 & 0x08 != 0 {
            Mirroring::FourScreen
        } else if self.flags_6 & 0x01 != 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        }
    }

    pub fn prg_rom_bytes(&self) -> usize {
        self.prg_rom_size as usize * PRG_BANK_SIZE
    }

    pub fn chr_rom_bytes(&self) -> usize {
        self.chr_rom_size as usize * CHR_BANK_SIZE
    }
}

/// Cartridge structure
pub struct Cartridge {
    header: InesHeader,
    mapper: Box<dyn Mapper>,
}

impl Cartridge {
    /// Create a new cartridge from iNES ROM data
    pub fn from_bytes(rom_data: &[u8]) -> Result<Self, CartridgeError> {
        let header = InesHeader::parse(rom_data)?;
        if header.prg_rom_size == 0 {
            return Err(CartridgeError::Empty);
        }

        let mut offset = HEADER_SIZE;
        if header.has_trainer() {
            take(rom_data, &mut offset, TRAINER_SIZE, "trainer")?;
        }
        let prg_rom = take(rom_data, &mut offset, header.prg_rom_bytes(), "PRG ROM")?.to_vec();
        let chr_rom = take(rom_data, &mut offset, header.chr_rom_bytes(), "CHR ROM")?.to_vec();

        let memory = CartridgeMemory::new(prg_rom, chr_rom);
        let mapper = mapper::create_mapper(header.mapper_number(), memory, header.mirroring())?;

        Ok(Self { header, mapper })
    }

    /// Read and parse an iNES file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CartridgeError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| CartridgeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&data)
    }

    /// Wrap an already constructed mapper, for boards built in code.
    pub fn with_mapper(header: InesHeader, mapper: Box<dyn Mapper>) -> Self {
        Self { header, mapper }
    }

    pub fn header(&self) -> &InesHeader {
        &self.header
    }

    pub fn mapper_id(&self) -> u8 {
        self.mapper.id()
    }

    pub fn mapper_name(&self) -> &'static str {
        self.mapper.name()
    }

    /// CPU read in $4020-$FFFF. Side-effect free.
    pub fn map_read(&self, address: u16) -> u8 {
        self.mapper.map_read(address)
    }

    pub fn map_write(&mut self, address: u16, value: u8) {
        self.mapper.map_write(address, value);
    }

    pub fn chr_read(&self, address: u16) -> u8 {
        self.mapper.chr_read(address)
    }

    pub fn chr_write(&mut self, address: u16, value: u8) {
        self.mapper.chr_write(address, value);
    }

    /// Current mirroring; mappers like MMC1 and AxROM change it at runtime.
    pub fn mirroring(&self) -> Mirroring {
        self.mapper.mirroring()
    }

    /// Return bank registers to power-on values. ROM and RAM are kept.
    pub fn reset(&mut self) {
        self.mapper.reset();
    }
}

impl fmt::Debug for Cartridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cartridge")
            .field("header", &self.header)
            .field("mapper", &self.mapper.name())
            .finish()
    }
}

/// Slice `len` bytes at `offset`, advancing it.
fn take<'a>(
    data: &'a [u8],
    offset: &mut usize,
    len: usize,
    section: &'static str,
) -> Result<&'a [u8], CartridgeError> {
    let available = data.len().saturating_sub(*offset);
    if available < len {
        return Err(CartridgeError::Truncated {
            section,
            expected: len,
            actual: available,
        });
    }
    let slice = &data[*offset..*offset + len];
    *offset += len;
    Ok(slice)
}

/// Assemble an iNES image in memory. Used by tests and benchmarks.
pub fn build_ines(mapper: u8, flags_6_low: u8, prg_rom: &[u8], chr_rom: &[u8]) -> Vec<u8> {
    let mut image = Vec::with_capacity(HEADER_SIZE + prg_rom.len() + chr_rom.len());
    image.extend_from_slice(&INES_MAGIC);
    image.push((prg_rom.len() / PRG_BANK_SIZE) as u8);
    image.push((chr_rom.len() / CHR_BANK_SIZE) as u8);
    image.push((mapper << 4) | (flags_6_low & 0x0F));
    image.push(mapper & 0xF0);
    image.extend_from_slice(&[0; 8]);
    image.extend_from_slice(prg_rom);
    image.extend_from_slice(chr_rom);
    image
}
