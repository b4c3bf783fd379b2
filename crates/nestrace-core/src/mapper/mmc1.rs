//! MMC1 (mapper 1)
//!
//! Registers are loaded serially: five writes to $8000-$FFFF shift bit 0 of
//! each value into a shift register, LSB first. The fifth write commits the
//! value to the register chosen by address bits 14-13:
//!
//! - $8000-$9FFF control (mirroring, PRG mode, CHR mode)
//! - $A000-$BFFF CHR bank 0
//! - $C000-$DFFF CHR bank 1
//! - $E000-$FFFF PRG bank (bit 4 disables PRG RAM)
//!
//! A write with bit 7 set clears the shift register and forces PRG mode 3.

use super::{CartridgeMemory, Mapper, PRG_BANK_SIZE};
use crate::cartridge::Mirroring;

const CHR_WINDOW: usize = 4 * 1024;
/// PRG mode 3 (fix last bank at $C000), set on power-up and shift reset.
const CONTROL_RESET: u8 = 0x0C;

#[derive(Debug)]
pub struct Mmc1 {
    memory: CartridgeMemory,
    shift_register: u8,
    shift_count: u8,
    control: u8,
    chr_bank_0: u8,
    chr_bank_1: u8,
    prg_bank: u8,
}

impl Mmc1 {
    pub fn new(memory: CartridgeMemory) -> Self {
        Self {
            memory,
            shift_register: 0,
            shift_count: 0,
            control: CONTROL_RESET,
            chr_bank_0: 0,
            chr_bank_1: 0,
            prg_bank: 0,
        }
    }

    fn write_register(&mut self, address: u16, value: u8) {
        if value & 0x80 != 0 {
            self.shift_register = 0;
            self.shift_count = 0;
            self.control |= CONTROL_RESET;
            return;
        }

        self.shift_register |= (value & 1) << self.shift_count;
        self.shift_count += 1;
        if self.shift_count < 5 {
            return;
        }

        let data = self.shift_register;
        match (address >> 13) & 0x03 {
            0 => self.control = data,
            1 => self.chr_bank_0 = data,
            2 => self.chr_bank_1 = data,
            _ => self.prg_bank = data,
        }
        tracing::trace!(
            register = (address >> 13) & 0x03,
            value = data,
            "mmc1 register write"
        );
        self.shift_register = 0;
        self.shift_count = 0;
    }

    fn prg_ram_enabled(&self) -> bool {
        self.prg_bank & 0x10 == 0
    }

    /// 16KB bank mapped at $8000 (`high == false`) or $C000.
    fn prg_bank_for(&self, high: bool) -> usize {
        let selected = (self.prg_bank & 0x0F) as usize;
        match (self.control >> 2) & 0x03 {
            // 32KB mode: low bit of the bank number ignored
            0 | 1 => (selected & !1) + usize::from(high),
            // Fix first bank at $8000
            2 => {
                if high {
                    selected
                } else {
                    0
                }
            }
            // Fix last bank at $C000
            _ => {
                if high {
                    self.memory.prg_banks(PRG_BANK_SIZE) - 1
                } else {
                    selected
                }
            }
        }
    }

    /// 4KB CHR bank and offset for a pattern-table address.
    fn chr_location(&self, address: u16) -> (usize, usize) {
        let address = address as usize & 0x1FFF;
        let offset = address & 0x0FFF;
        let upper = address >= 0x1000;
        if self.control & 0x10 == 0 {
            // 8KB mode: low bit of CHR bank 0 ignored
            ((self.chr_bank_0 as usize & !1) + usize::from(upper), offset)
        } else if upper {
            (self.chr_bank_1 as usize, offset)
        } else {
            (self.chr_bank_0 as usize, offset)
        }
    }
}

impl Mapper for Mmc1 {
    fn id(&self) -> u8 {
        1
    }

    fn name(&self) -> &'static str {
        "MMC1"
    }

    fn map_read(&self, address: u16) -> u8 {
        match address {
            0x6000..=0x7FFF if self.prg_ram_enabled() => self.memory.read_prg_ram(address),
            0x8000..=0xBFFF => self.memory.read_prg(
                self.prg_bank_for(false),
                PRG_BANK_SIZE,
                (address - 0x8000) as usize,
            ),
            0xC000..=0xFFFF => self.memory.read_prg(
                self.prg_bank_for(true),
                PRG_BANK_SIZE,
                (address - 0xC000) as usize,
            ),
            _ => 0,
        }
    }

    fn map_write(&mut self, address: u16, value: u8) {
        match address {
            0x6000..=0x7FFF => {
                if self.prg_ram_enabled() {
                    self.memory.write_prg_ram(address, value);
                }
            }
            0x8000..=0xFFFF => self.write_register(address, value),
            _ => {}
        }
    }

    fn chr_read(&self, address: u16) -> u8 {
        let (bank, offset) = self.chr_location(address);
        self.memory.read_chr(bank, CHR_WINDOW, offset)
    }

    fn chr_write(&mut self, address: u16, value: u8) {
        let (bank, offset) = self.chr_location(address);
        self.memory.write_chr(bank, CHR_WINDOW, offset, value);
    }

    fn mirroring(&self) -> Mirroring {
        match self.control & 0x03 {
            0 => Mirroring::SingleScreenLower,
            1 => Mirroring::SingleScreenUpper,
            2 => Mirroring::Vertical,
            _ => Mirroring::Horizontal,
        }
    }

    fn reset(&mut self) {
        self.shift_register = 0;
        self.shift_count = 0;
        self.control = CONTROL_RESET;
        self.chr_bank_0 = 0;
        self.chr_bank_1 = 0;
        self.prg_bank = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::tests::{banked_chr, banked_prg};

    fn serial_write(mapper: &mut Mmc1, address: u16, value: u8) {
        for bit in 0..5 {
            mapper.map_write(address, (value >> bit) & 1);
        }
    }

    fn mmc1(prg_banks: usize, chr_banks: usize) -> Mmc1 {
        Mmc1::new(CartridgeMemory::new(banked_prg(prg_banks), banked_chr(chr_banks)))
    }

    #[test]
    fn test_power_on_fixes_last_bank() {
        let mapper = mmc1(8, 1);
        assert_eq!(mapper.map_read(0x8000), 0);
        assert_eq!(mapper.map_read(0xC000), 7);
    }

    #[test]
    fn test_prg_bank_select_takes_effect_immediately() {
        let mut mapper = mmc1(8, 1);
        serial_write(&mut mapper, 0xE000, 5);
        assert_eq!(mapper.map_read(0x8000), 5);
        assert_eq!(mapper.map_read(0xC000), 7);
    }

    #[test]
    fn test_partial_write_does_not_commit() {
        let mut mapper = mmc1(8, 1);
        mapper.map_write(0xE000, 1);
        mapper.map_write(0xE000, 1);
        assert_eq!(mapper.map_read(0x8000), 0);
        mapper.map_write(0xE000, 0x80);
        serial_write(&mut mapper, 0xE000, 2);
        assert_eq!(mapper.map_read(0x8000), 2);
    }

    #[test]
    fn test_32k_and_fix_first_modes() {
        let mut mapper = mmc1(8, 1);
        serial_write(&mut mapper, 0x8000, 0b00000);
        serial_write(&mut mapper, 0xE000, 5);
        assert_eq!(mapper.map_read(0x8000), 4);
        assert_eq!(mapper.map_read(0xC000), 5);

        serial_write(&mut mapper, 0x8000, 0b01000);
        assert_eq!(mapper.map_read(0x8000), 0);
        assert_eq!(mapper.map_read(0xC000), 5);
    }

    #[test]
    fn test_chr_modes_and_mirroring() {
        let mut mapper = mmc1(2, 4);
        serial_write(&mut mapper, 0x8000, 0b10010);
        serial_write(&mut mapper, 0xA000, 3);
        serial_write(&mut mapper, 0xC000, 6);
        assert_eq!(mapper.chr_read(0x0000), 0x83);
        assert_eq!(mapper.chr_read(0x1000), 0x86);
        assert_eq!(mapper.mirroring(), Mirroring::Vertical);

        serial_write(&mut mapper, 0x8000, 0b00011);
        assert_eq!(mapper.chr_read(0x0000), 0x82);
        assert_eq!(mapper.chr_read(0x1000), 0x83);
        assert_eq!(mapper.mirroring(), Mirroring::Horizontal);
    }

    #[test]
    fn test_prg_ram_disable() {
        let mut mapper = mmc1(2, 1);
        mapper.map_write(0x6000, 0x11);
        assert_eq!(mapper.map_read(0x6000), 0x11);
        serial_write(&mut mapper, 0xE000, 0x10);
        assert_eq!(mapper.map_read(0x6000), 0);
        mapper.map_write(0x6000, 0x22);
        serial_write(&mut mapper, 0xE000, 0x00);
        assert_eq!(mapper.map_read(0x6000), 0x11);
    }
}
