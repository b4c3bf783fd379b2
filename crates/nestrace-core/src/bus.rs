//! Memory bus and mapping
//!
//! The NES CPU memory map:
//! $0000-$07FF - 2KB Internal RAM
//! $0800-$1FFF - RAM mirroring (repeats every $0800 bytes)
//! $2000-$2007 - PPU registers
//! $2008-$3FFF - PPU register mirroring (repeats every 8 bytes)
//! $4000-$4017 - APU and I/O registers ($4014 OAM DMA, $4016/$4017 joypads)
//! $4018-$401F - Disabled APU/I/O test registers
//! $4020-$FFFF - Cartridge space (expansion, PRG RAM, PRG ROM, mapper registers)
//!
//! Every address resolves: unmapped reads return [`OPEN_BUS`] and unmapped
//! writes are dropped. Debug pokes go through the same `write` as the CPU.

use std::collections::BTreeMap;

use crate::cartridge::Cartridge;
use crate::cheats::Cheat;
use crate::controller::{Controller, MAX_PORTS};
use crate::cpu::Bus as CpuBus;
use crate::ppu::{Ppu, OAM_SIZE};

/// RAM size in bytes
pub const RAM_SIZE: usize = 2048; // 2KB

/// Value read from addresses nothing drives
pub const OPEN_BUS: u8 = 0x00;

/// OAM DMA register
pub const OAM_DMA: u16 = 0x4014;
/// Joypad 1 data / strobe for both joypads
pub const JOYPAD_1: u16 = 0x4016;
/// Joypad 2 data
pub const JOYPAD_2: u16 = 0x4017;

/// Memory bus structure
#[derive(Debug)]
pub struct Bus {
    /// 2KB internal RAM (with mirroring)
    ram: [u8; RAM_SIZE],
    ppu: Ppu,
    cartridge: Option<Cartridge>,
    controllers: [Option<Controller>; MAX_PORTS],
    /// Read overrides by address
    cheats: BTreeMap<u16, Cheat>,
    /// Level of the external IRQ line
    irq_line: bool,
    /// Set by a $4014 write until the CPU accounts for the stall
    dma_pending: bool,
    /// Frames completed since the bus was created
    frames: u64,
}

impl Bus {
    /// Create a new bus with no cartridge and no controllers
    pub fn new() -> Self {
        Self {
            ram: [0; RAM_SIZE],
            ppu: Ppu::new(),
            cartridge: None,
            controllers: [None, None],
            cheats: BTreeMap::new(),
            irq_line: false,
            dma_pending: false,
            frames: 0,
        }
    }

    /// Insert a cartridge, returning the one it replaces.
    pub fn insert_cartridge(&mut self, cartridge: Cartridge) -> Option<Cartridge> {
        self.cartridge.replace(cartridge)
    }

    pub fn remove_cartridge(&mut self) -> Option<Cartridge> {
        self.cartridge.take()
    }

    pub fn cartridge(&self) -> Option<&Cartridge> {
        self.cartridge.as_ref()
    }

    pub fn cartridge_mut(&mut self) -> Option<&mut Cartridge> {
        self.cartridge.as_mut()
    }

    /// Plug a controller into the first free port. Returns the port index,
    /// or the controller back when every port is taken.
    pub fn attach_controller(&mut self, controller: Controller) -> Result<usize, Controller> {
        match self.controllers.iter().position(Option::is_none) {
            Some(port) => {
                self.controllers[port] = Some(controller);
                Ok(port)
            }
            None => Err(controller),
        }
    }

    pub fn detach_controller(&mut self, port: usize) -> Option<Controller> {
        self.controllers.get_mut(port).and_then(Option::take)
    }

    pub fn controller(&self, port: usize) -> Option<&Controller> {
        self.controllers.get(port).and_then(Option::as_ref)
    }

    pub fn controller_mut(&mut self, port: usize) -> Option<&mut Controller> {
        self.controllers.get_mut(port).and_then(Option::as_mut)
    }

    pub fn add_cheat(&mut self, cheat: Cheat) {
        self.cheats.insert(cheat.address, cheat);
    }

    pub fn remove_cheat(&mut self, address: u16) -> Option<Cheat> {
        self.cheats.remove(&address)
    }

    pub fn clear_cheats(&mut self) {
        self.cheats.clear();
    }

    /// Active cheats in address order.
    pub fn cheats(&self) -> impl Iterator<Item = &Cheat> {
        self.cheats.values()
    }

    pub fn ppu(&self) -> &Ppu {
        &self.ppu
    }

    pub fn ppu_mut(&mut self) -> &mut Ppu {
        &mut self.ppu
    }

    pub fn ram(&self) -> &[u8; RAM_SIZE] {
        &self.ram
    }

    /// Zero internal RAM (power cycle).
    pub fn clear_ram(&mut self) {
        self.ram = [0; RAM_SIZE];
    }

    pub fn set_irq(&mut self, asserted: bool) {
        self.irq_line = asserted;
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Advance the PPU by `cpu_cycles`. Returns true when a frame completed.
    pub fn clock(&mut self, cpu_cycles: u32) -> bool {
        let frame_complete = self.ppu.advance(cpu_cycles);
        if frame_complete {
            self.frames += 1;
        }
        frame_complete
    }

    /// Read without side effects: no vblank clear, no joypad shift.
    /// Cheats still apply so the result matches what the CPU would see.
    pub fn peek(&self, address: u16) -> u8 {
        let value = match address {
            // $0000-$1FFF - Internal RAM and mirrors
            0x0000..=0x1FFF => self.ram[(address & 0x07FF) as usize],
            // $2000-$3FFF - PPU registers and mirrors
            0x2000..=0x3FFF => self.ppu.peek_register(address & 0x2007),
            JOYPAD_1 => self.controller(0).map_or(OPEN_BUS, Controller::peek),
            JOYPAD_2 => self.controller(1).map_or(OPEN_BUS, Controller::peek),
            // $4000-$401F - APU and I/O, not emulated
            0x4000..=0x401F => OPEN_BUS,
            // $4020-$FFFF - Cartridge space
            0x4020..=0xFFFF => self.cartridge.as_ref().map_or(OPEN_BUS, |c| c.map_read(address)),
        };
        self.apply_cheat(address, value)
    }

    fn apply_cheat(&self, address: u16, value: u8) -> u8 {
        match self.cheats.get(&address) {
            Some(cheat) => cheat.apply(value),
            None => value,
        }
    }

    fn oam_dma(&mut self, page: u8) {
        let base = u16::from(page) << 8;
        let mut data = [0u8; OAM_SIZE];
        for (i, byte) in data.iter_mut().enumerate() {
            *byte = self.read(base | i as u16);
        }
        self.ppu.oam_dma(&data);
        self.dma_pending = true;
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuBus for Bus {
    /// Read a byte from the given address
    fn read(&mut self, address: u16) -> u8 {
        let value = match address {
            // $0000-$1FFF - Internal RAM and mirrors
            0x0000..=0x1FFF => self.ram[(address & 0x07FF) as usize],
            // $2000-$3FFF - PPU registers and mirrors
            0x2000..=0x3FFF => self.ppu.read_register(address & 0x2007, self.cartridge.as_ref()),
            JOYPAD_1 => self.controller_mut(0).map_or(OPEN_BUS, Controller::read),
            JOYPAD_2 => self.controller_mut(1).map_or(OPEN_BUS, Controller::read),
            // $4000-$401F - APU and I/O, not emulated
            0x4000..=0x401F => OPEN_BUS,
            // $4020-$FFFF - Cartridge space
            0x4020..=0xFFFF => self.cartridge.as_ref().map_or(OPEN_BUS, |c| c.map_read(address)),
        };
        self.apply_cheat(address, value)
    }

    /// Write a byte to the given address
    fn write(&mut self, address: u16, value: u8) {
        match address {
            // $0000-$1FFF - Internal RAM and mirrors
            0x0000..=0x1FFF => self.ram[(address & 0x07FF) as usize] = value,
            // $2000-$3FFF - PPU registers and mirrors
            0x2000..=0x3FFF => {
                self.ppu
                    .write_register(address & 0x2007, value, self.cartridge.as_mut())
            }
            OAM_DMA => self.oam_dma(value),
            // The strobe line is shared by both ports.
            JOYPAD_1 => {
                for controller in self.controllers.iter_mut().flatten() {
                    controller.strobe_write(value);
                }
            }
            // $4000-$401F - APU and I/O, not emulated
            0x4000..=0x401F => {}
            // $4020-$FFFF - Cartridge space
            0x4020..=0xFFFF => {
                if let Some(cart) = self.cartridge.as_mut() {
                    cart.map_write(address, value);
                }
            }
        }
    }

    fn poll_nmi(&mut self) -> bool {
        self.ppu.take_nmi()
    }

    fn irq_asserted(&self) -> bool {
        self.irq_line
    }

    fn take_dma_request(&mut self) -> bool {
        std::mem::take(&mut self.dma_pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::build_ines;
    use crate::controller::Buttons;
    use crate::mapper::PRG_BANK_SIZE;

    fn nrom_bus() -> Bus {
        let mut prg = vec![0; PRG_BANK_SIZE];
        prg[0x0000] = 0xA5;
        let cart = Cartridge::from_bytes(&build_ines(0, 0, &prg, &[])).unwrap();
        let mut bus = Bus::new();
        bus.insert_cartridge(cart);
        bus
    }

    #[test]
    fn test_ram_mirroring() {
        let mut bus = Bus::new();
        bus.write(0x0001, 0x42);
        assert_eq!(bus.read(0x0801), 0x42);
        assert_eq!(bus.read(0x1801), 0x42);
        bus.write(0x1FFF, 0x99);
        assert_eq!(bus.read(0x07FF), 0x99);
    }

    #[test]
    fn test_open_bus_without_cartridge() {
        let mut bus = Bus::new();
        assert_eq!(bus.read(0x8000), OPEN_BUS);
        assert_eq!(bus.read(0xFFFC), OPEN_BUS);
        assert_eq!(bus.read(0x4018), OPEN_BUS);
        assert_eq!(bus.read(0x4016), OPEN_BUS);
        bus.write(0x8000, 0x12);
        bus.write(0x5000, 0x12);
    }

    #[test]
    fn test_ppu_register_mirror_side_effects() {
        let mut bus = Bus::new();
        // $3FFA mirrors $2002
        bus.ppu_mut().write_register(0, 0, None);
        bus.clock(241 * 341 / 3 + 1);
        assert!(bus.ppu().status().vblank());
        assert_eq!(bus.peek(0x3FFA) & 0x80, 0x80);
        assert!(bus.ppu().status().vblank());
        assert_eq!(bus.read(0x3FFA) & 0x80, 0x80);
        assert!(!bus.ppu().status().vblank());
    }

    #[test]
    fn test_cartridge_dispatch_and_hot_swap() {
        let mut bus = nrom_bus();
        assert_eq!(bus.read(0x8000), 0xA5);
        assert_eq!(bus.read(0xC000), 0xA5);
        bus.write(0x6000, 0x3C);
        assert_eq!(bus.read(0x6000), 0x3C);

        bus.write(0x0010, 0x77);
        let old = bus.remove_cartridge();
        assert!(old.is_some());
        assert_eq!(bus.read(0x8000), OPEN_BUS);
        assert_eq!(bus.read(0x0010), 0x77);
    }

    #[test]
    fn test_cheats_override_reads() {
        let mut bus = nrom_bus();
        bus.write(0x0075, 0x03);
        bus.add_cheat(Cheat::new(0x0075, 0x09));
        assert_eq!(bus.read(0x0075), 0x09);
        assert_eq!(bus.peek(0x0075), 0x09);
        assert_eq!(bus.ram()[0x75], 0x03);

        bus.add_cheat(Cheat {
            address: 0x8000,
            value: 0x00,
            compare: Some(0xFF),
        });
        assert_eq!(bus.read(0x8000), 0xA5);

        assert!(bus.remove_cheat(0x0075).is_some());
        assert_eq!(bus.read(0x0075), 0x03);
        assert_eq!(bus.cheats().count(), 1);
    }

    #[test]
    fn test_joypad_strobe_reaches_both_ports() {
        let mut bus = Bus::new();
        let mut one = Controller::new();
        one.set_buttons(Buttons::new(Buttons::A));
        let mut two = Controller::new();
        two.set_buttons(Buttons::new(Buttons::B));
        assert_eq!(bus.attach_controller(one), Ok(0));
        assert_eq!(bus.attach_controller(two), Ok(1));
        assert!(bus.attach_controller(Controller::new()).is_err());

        bus.write(JOYPAD_1, 1);
        bus.write(JOYPAD_1, 0);
        assert_eq!(bus.read(JOYPAD_1), 1);
        assert_eq!(bus.read(JOYPAD_2), 0);
        assert_eq!(bus.read(JOYPAD_2), 1);
    }

    #[test]
    fn test_oam_dma() {
        let mut bus = Bus::new();
        for i in 0..=255u8 {
            bus.write(0x0200 + u16::from(i), i);
        }
        bus.write(OAM_DMA, 0x02);
        assert_eq!(bus.ppu().oam()[0x80], 0x80);
        assert!(bus.take_dma_request());
        assert!(!bus.take_dma_request());
    }
}
