//! PPU timing and register file
//!
//! The PPU here is a clock and a register file, not a renderer. It keeps the
//! dot/scanline counters phase-locked to the CPU (three dots per CPU cycle),
//! raises vblank and NMI at the documented coordinates, and implements the
//! $2000-$2007 registers together with nametable, palette and OAM storage so
//! that programs polling or uploading to the PPU behave correctly.
//!
//! Frame layout (NTSC):
//! - 341 dots per scanline, 262 scanlines per frame (0-261)
//! - vblank set and NMI raised at scanline 241, dot 1
//! - vblank cleared at scanline 261 (pre-render), dot 1

use crate::cartridge::{Cartridge, Mirroring};

/// PPU memory sizes
pub const NAMETABLE_SIZE: usize = 4096; // four 1KB tables, two used unless four-screen
pub const PALETTE_SIZE: usize = 32; // 32 bytes (8 palettes x 4 colors each)
pub const OAM_SIZE: usize = 256; // Object Attribute Memory

/// PPU dots per CPU cycle
pub const DOTS_PER_CPU_CYCLE: u32 = 3;
/// Dots per scanline
pub const DOTS_PER_SCANLINE: u16 = 341;
/// Scanlines per frame, pre-render included
pub const SCANLINES_PER_FRAME: u16 = 262;
/// Scanline on which vblank begins
pub const VBLANK_SCANLINE: u16 = 241;
/// Pre-render scanline, where vblank ends
pub const PRE_RENDER_SCANLINE: u16 = 261;

/// PPU control flags ($2000)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PpuCtrl(u8);

impl PpuCtrl {
    pub const NMI_ENABLE: u8 = 0b10000000;
    pub const MASTER_SLAVE: u8 = 0b01000000;
    pub const SPRITE_SIZE: u8 = 0b00100000;
    pub const BG_PATTERN_TABLE: u8 = 0b00010000;
    pub const SPR_PATTERN_TABLE: u8 = 0b00001000;
    pub const VRAM_INC: u8 = 0b00000100;
    pub const NAMETABLE: u8 = 0b00000011;

    pub fn new(val: u8) -> Self {
        Self(val)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn nmi_enable(&self) -> bool {
        (self.0 & Self::NMI_ENABLE) != 0
    }

    /// VRAM address step after each $2007 access
    pub fn vram_increment(&self) -> u16 {
        if (self.0 & Self::VRAM_INC) != 0 {
            32
        } else {
            1
        }
    }

    pub fn nametable(&self) -> u8 {
        self.0 & Self::NAMETABLE
    }
}

/// PPU status flags ($2002)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PpuStatus(u8);

impl PpuStatus {
    pub const VBLANK: u8 = 0b10000000;
    pub const SPRITE_ZERO_HIT: u8 = 0b01000000;
    pub const SPRITE_OVERFLOW: u8 = 0b00100000;

    pub fn new(val: u8) -> Self {
        Self(val)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn vblank(&self) -> bool {
        (self.0 & Self::VBLANK) != 0
    }

    fn set_vblank(&mut self, val: bool) {
        self.0 = if val { self.0 | Self::VBLANK } else { self.0 & !Self::VBLANK };
    }
}

/// PPU render mask flags ($2001)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PpuMask(u8);

impl PpuMask {
    pub const GRAYSCALE: u8 = 0b00000001;
    pub const RENDER_BG_LEFT: u8 = 0b00000010;
    pub const RENDER_SPR_LEFT: u8 = 0b00000100;
    pub const RENDER_BG: u8 = 0b00001000;
    pub const RENDER_SPR: u8 = 0b00010000;

    pub fn new(val: u8) -> Self {
        Self(val)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn rendering_enabled(&self) -> bool {
        (self.0 & (Self::RENDER_BG | Self::RENDER_SPR)) != 0
    }
}

/// PPU state
#[derive(Debug, Clone)]
pub struct Ppu {
    control: PpuCtrl,
    mask: PpuMask,
    status: PpuStatus,
    oam_addr: u8,
    oam: [u8; OAM_SIZE],
    /// Current VRAM address (15 bits)
    v: u16,
    /// Temporary VRAM address, loaded by $2000/$2005/$2006
    t: u16,
    /// Fine X scroll (3 bits)
    fine_x: u8,
    /// Shared $2005/$2006 write toggle
    write_toggle: bool,
    /// Delayed $2007 read value
    read_buffer: u8,
    nametables: [u8; NAMETABLE_SIZE],
    palette: [u8; PALETTE_SIZE],
    /// Dot within the scanline (0-340)
    dot: u16,
    /// Scanline (0-261)
    scanline: u16,
    /// Frames completed since reset
    frame: u64,
    nmi_pending: bool,
}

impl Ppu {
    /// Create a new PPU instance at scanline 0, dot 0
    pub fn new() -> Self {
        Self {
            control: PpuCtrl::default(),
            mask: PpuMask::default(),
            status: PpuStatus::default(),
            oam_addr: 0,
            oam: [0; OAM_SIZE],
            v: 0,
            t: 0,
            fine_x: 0,
            write_toggle: false,
            read_buffer: 0,
            nametables: [0; NAMETABLE_SIZE],
            palette: [0; PALETTE_SIZE],
            dot: 0,
            scanline: 0,
            frame: 0,
            nmi_pending: false,
        }
    }

    /// Reset registers and the clock. Nametable, palette and OAM contents
    /// survive, as they do on hardware.
    pub fn reset(&mut self) {
        self.control = PpuCtrl::default();
        self.mask = PpuMask::default();
        self.status = PpuStatus::default();
        self.oam_addr = 0;
        self.v = 0;
        self.t = 0;
        self.fine_x = 0;
        self.write_toggle = false;
        self.read_buffer = 0;
        self.dot = 0;
        self.scanline = 0;
        self.frame = 0;
        self.nmi_pending = false;
    }

    /// Clear all PPU memory as well as registers (power cycle).
    pub fn power_on(&mut self) {
        *self = Self::new();
    }

    /// Advance the clock by `cpu_cycles` CPU cycles. Returns true if a frame
    /// boundary was crossed.
    pub fn advance(&mut self, cpu_cycles: u32) -> bool {
        let mut frame_complete = false;
        for _ in 0..cpu_cycles * DOTS_PER_CPU_CYCLE {
            frame_complete |= self.tick();
        }
        frame_complete
    }

    /// Advance one dot.
    fn tick(&mut self) -> bool {
        let mut frame_complete = false;
        self.dot += 1;
        if self.dot >= DOTS_PER_SCANLINE {
            self.dot = 0;
            self.scanline += 1;
            if self.scanline >= SCANLINES_PER_FRAME {
                self.scanline = 0;
                self.frame += 1;
                frame_complete = true;
            }
        }

        if self.dot == 1 {
            match self.scanline {
                VBLANK_SCANLINE => {
                    self.status.set_vblank(true);
                    if self.control.nmi_enable() {
                        self.nmi_pending = true;
                    }
                }
                PRE_RENDER_SCANLINE => {
                    self.status = PpuStatus::default();
                }
                _ => {}
            }
        }
        frame_complete
    }

    /// Read a PPU register. `register` is the address within $2000-$2007.
    pub fn read_register(&mut self, register: u16, cartridge: Option<&Cartridge>) -> u8 {
        match register & 0x0007 {
            // $2002 - PPUSTATUS
            2 => {
                let value = self.status.bits();
                self.status.set_vblank(false);
                self.write_toggle = false;
                value
            }
            // $2004 - OAMDATA
            4 => self.oam[self.oam_addr as usize],
            // $2007 - PPUDATA
            7 => {
                let address = self.v & 0x3FFF;
                let value = if address >= 0x3F00 {
                    // Palette reads bypass the buffer; the buffer gets the
                    // nametable byte underneath.
                    self.read_buffer = self.read_vram(address - 0x1000, cartridge);
                    self.palette[palette_index(address)]
                } else {
                    let buffered = self.read_buffer;
                    self.read_buffer = self.read_vram(address, cartridge);
                    buffered
                };
                self.v = self.v.wrapping_add(self.control.vram_increment()) & 0x7FFF;
                value
            }
            // Write-only registers read as open bus
            _ => 0,
        }
    }

    /// Register value without read side effects.
    pub fn peek_register(&self, register: u16) -> u8 {
        match register & 0x0007 {
            2 => self.status.bits(),
            4 => self.oam[self.oam_addr as usize],
            7 => self.read_buffer,
            _ => 0,
        }
    }

    /// Write a PPU register. `register` is the address within $2000-$2007.
    pub fn write_register(&mut self, register: u16, value: u8, cartridge: Option<&mut Cartridge>) {
        match register & 0x0007 {
            // $2000 - PPUCTRL
            0 => {
                let was_enabled = self.control.nmi_enable();
                self.control = PpuCtrl::new(value);
                self.t = (self.t & !0x0C00) | (u16::from(value & 0x03) << 10);
                // Enabling NMI during vblank fires it immediately.
                if !was_enabled && self.control.nmi_enable() && self.status.vblank() {
                    self.nmi_pending = true;
                }
            }
            // $2001 - PPUMASK
            1 => self.mask = PpuMask::new(value),
            // $2003 - OAMADDR
            3 => self.oam_addr = value,
            // $2004 - OAMDATA
            4 => {
                self.oam[self.oam_addr as usize] = value;
                self.oam_addr = self.oam_addr.wrapping_add(1);
            }
            // $2005 - PPUSCROLL
            5 => {
                if !self.write_toggle {
                    self.t = (self.t & !0x001F) | u16::from(value >> 3);
                    self.fine_x = value & 0x07;
                } else {
                    self.t = (self.t & !0x73E0)
                        | (u16::from(value & 0x07) << 12)
                        | (u16::from(value & 0xF8) << 2);
                }
                self.write_toggle = !self.write_toggle;
            }
            // $2006 - PPUADDR
            6 => {
                if !self.write_toggle {
                    self.t = (self.t & 0x00FF) | (u16::from(value & 0x3F) << 8);
                } else {
                    self.t = (self.t & 0xFF00) | u16::from(value);
                    self.v = self.t;
                }
                self.write_toggle = !self.write_toggle;
            }
            // $2007 - PPUDATA
            7 => {
                self.write_vram(self.v & 0x3FFF, value, cartridge);
                self.v = self.v.wrapping_add(self.control.vram_increment()) & 0x7FFF;
            }
            // $2002 - PPUSTATUS is read-only
            _ => {}
        }
    }

    /// Copy a 256-byte page into OAM starting at OAMADDR ($4014).
    pub fn oam_dma(&mut self, page: &[u8; OAM_SIZE]) {
        for &byte in page.iter() {
            self.oam[self.oam_addr as usize] = byte;
            self.oam_addr = self.oam_addr.wrapping_add(1);
        }
    }

    fn read_vram(&self, address: u16, cartridge: Option<&Cartridge>) -> u8 {
        let address = address & 0x3FFF;
        match address {
            0x0000..=0x1FFF => cartridge.map_or(0, |cart| cart.chr_read(address)),
            0x2000..=0x3EFF => self.nametables[nametable_index(address, mirroring_of(cartridge))],
            _ => self.palette[palette_index(address)],
        }
    }

    fn write_vram(&mut self, address: u16, value: u8, cartridge: Option<&mut Cartridge>) {
        match address {
            0x0000..=0x1FFF => {
                if let Some(cart) = cartridge {
                    cart.chr_write(address, value);
                }
            }
            0x2000..=0x3EFF => {
                let mirroring = mirroring_of(cartridge.as_deref());
                self.nametables[nametable_index(address, mirroring)] = value;
            }
            _ => self.palette[palette_index(address)] = value,
        }
    }

    /// Take the pending NMI, clearing it.
    pub fn take_nmi(&mut self) -> bool {
        std::mem::take(&mut self.nmi_pending)
    }

    pub fn nmi_pending(&self) -> bool {
        self.nmi_pending
    }

    pub fn scanline(&self) -> u16 {
        self.scanline
    }

    pub fn dot(&self) -> u16 {
        self.dot
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn status(&self) -> PpuStatus {
        self.status
    }

    pub fn control(&self) -> PpuCtrl {
        self.control
    }

    pub fn mask(&self) -> PpuMask {
        self.mask
    }

    /// Current VRAM address register
    pub fn vram_address(&self) -> u16 {
        self.v
    }

    pub fn fine_x(&self) -> u8 {
        self.fine_x
    }

    pub fn oam(&self) -> &[u8; OAM_SIZE] {
        &self.oam
    }

    pub fn palette(&self) -> &[u8; PALETTE_SIZE] {
        &self.palette
    }
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}

fn mirroring_of(cartridge: Option<&Cartridge>) -> Mirroring {
    cartridge.map_or(Mirroring::Horizontal, Cartridge::mirroring)
}

fn nametable_index(address: u16, mirroring: Mirroring) -> usize {
    let offset = (address as usize - 0x2000) & 0x0FFF;
    let table = offset / 0x400;
    mirroring.nametable_bank(table) * 0x400 + (offset & 0x3FF)
}

/// $3F10/$3F14/$3F18/$3F1C alias the background entries below them.
fn palette_index(address: u16) -> usize {
    let index = (address & 0x1F) as usize;
    if index >= 0x10 && index % 4 == 0 {
        index - 0x10
    } else {
        index
    }
}
