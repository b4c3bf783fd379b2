//! NES System Integration
//!
//! [`NesSystem`] owns every piece of mutable machine state: the CPU and the
//! bus, which in turn owns RAM, the PPU, the cartridge and the controllers.
//! Hosts drive it one frame at a time and observe it through a registered
//! frame callback that receives a [`FrameHandle`].

use std::collections::VecDeque;
use std::fmt;
use std::path::Path;
use std::time::Instant;

use thiserror::Error;

use crate::bus::Bus;
use crate::cartridge::{Cartridge, CartridgeError};
use crate::cheats::Cheat;
use crate::controller::{Buttons, Controller, MAX_PORTS};
use crate::cpu::{Bus as CpuBus, Cpu, RESET_CYCLES};
use crate::ppu::Ppu;
use crate::trace::TraceLine;

/// Index of a controller port (0 or 1)
pub type ControllerPort = usize;

/// Frames averaged by the FPS counter
const FPS_WINDOW: usize = 60;

#[derive(Debug, Error)]
pub enum SystemError {
    #[error("all {max} controller ports are in use")]
    ControllerPortsFull { max: usize },
    #[error("no controller attached to port {0}")]
    NoSuchPort(ControllerPort),
    #[error(transparent)]
    Cartridge(#[from] CartridgeError),
}

/// Result of a single [`NesSystem::step`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepOutcome {
    /// CPU cycles consumed; 0 while halted
    pub cycles: u32,
    /// The PPU crossed a frame boundary during this step
    pub frame_complete: bool,
}

/// Work done by one [`NesSystem::run_one_frame`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Instructions and interrupt entries executed
    pub instructions: u64,
    pub cpu_cycles: u64,
}

/// Per-frame host hook.
pub type FrameCallback = Box<dyn FnMut(&mut FrameHandle<'_>)>;

/// Rolling frames-per-second over the last [`FPS_WINDOW`] frames.
#[derive(Debug, Default)]
struct FpsCounter {
    frames: VecDeque<Instant>,
}

impl FpsCounter {
    fn record(&mut self, at: Instant) {
        if self.frames.len() == FPS_WINDOW {
            self.frames.pop_front();
        }
        self.frames.push_back(at);
    }

    fn fps(&self) -> f64 {
        match (self.frames.front(), self.frames.back()) {
            (Some(first), Some(last)) if self.frames.len() > 1 => {
                let secs = last.duration_since(*first).as_secs_f64();
                if secs > 0.0 {
                    (self.frames.len() - 1) as f64 / secs
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }

    fn clear(&mut self) {
        self.frames.clear();
    }
}

/// NES System - integrates all components
pub struct NesSystem {
    cpu: Cpu,
    bus: Bus,
    frame_callback: Option<FrameCallback>,
    fps: FpsCounter,
}

impl NesSystem {
    /// Create a new NES system with no cartridge. Call [`NesSystem::reset`]
    /// after attaching one to load the reset vector.
    pub fn new() -> Self {
        Self {
            cpu: Cpu::new(),
            bus: Bus::new(),
            frame_callback: None,
            fps: FpsCounter::default(),
        }
    }

    /// Insert a cartridge, returning the one it replaces. CPU, RAM and PPU
    /// state are untouched until the next reset.
    pub fn attach_cart(&mut self, cartridge: Cartridge) -> Option<Cartridge> {
        tracing::info!(
            mapper = cartridge.mapper_id(),
            name = cartridge.mapper_name(),
            prg_banks = cartridge.header().prg_rom_size,
            chr_banks = cartridge.header().chr_rom_size,
            "cartridge attached"
        );
        self.bus.insert_cartridge(cartridge)
    }

    /// Remove the cartridge; cartridge space then reads as open bus.
    pub fn detach_cart(&mut self) -> Option<Cartridge> {
        let removed = self.bus.remove_cartridge();
        if removed.is_some() {
            tracing::info!("cartridge detached");
        }
        removed
    }

    /// Parse an iNES image and attach it. On error the current cartridge
    /// stays in place.
    pub fn load_rom(&mut self, rom_data: &[u8]) -> Result<(), SystemError> {
        let cartridge = Cartridge::from_bytes(rom_data)?;
        self.attach_cart(cartridge);
        Ok(())
    }

    pub fn load_rom_file(&mut self, path: impl AsRef<Path>) -> Result<(), SystemError> {
        let cartridge = Cartridge::from_file(path)?;
        self.attach_cart(cartridge);
        Ok(())
    }

    /// Plug a controller into the first free port.
    pub fn attach_controller(&mut self, controller: Controller) -> Result<ControllerPort, SystemError> {
        self.bus
            .attach_controller(controller)
            .map_err(|_| SystemError::ControllerPortsFull { max: MAX_PORTS })
    }

    pub fn detach_controller(&mut self, port: ControllerPort) -> Option<Controller> {
        self.bus.detach_controller(port)
    }

    pub fn controller(&self, port: ControllerPort) -> Option<&Controller> {
        self.bus.controller(port)
    }

    /// Supply the host's button snapshot for `port`.
    pub fn set_buttons(&mut self, port: ControllerPort, buttons: Buttons) -> Result<(), SystemError> {
        let controller = self
            .bus
            .controller_mut(port)
            .ok_or(SystemError::NoSuchPort(port))?;
        controller.set_buttons(buttons);
        Ok(())
    }

    /// Register the hook invoked after every completed frame.
    pub fn set_frame_callback(&mut self, callback: impl FnMut(&mut FrameHandle<'_>) + 'static) {
        self.frame_callback = Some(Box::new(callback));
    }

    pub fn clear_frame_callback(&mut self) {
        self.frame_callback = None;
    }

    /// Reset the CPU, PPU and mapper registers. RAM and the cartridge are
    /// kept, and a halted CPU stays halted.
    ///
    /// The PPU is advanced through the seven reset cycles so the first
    /// instruction boundary reports PPU 0,21 and CYC 7.
    pub fn reset(&mut self) {
        if let Some(cart) = self.bus.cartridge_mut() {
            cart.reset();
        }
        self.bus.ppu_mut().reset();
        self.cpu.reset(&mut self.bus);
        self.bus.ppu_mut().advance(RESET_CYCLES as u32);
        self.fps.clear();
    }

    /// Power cycle: like [`NesSystem::reset`], but also clears RAM, PPU
    /// memory and the halted flag.
    pub fn power_cycle(&mut self) {
        if let Some(cart) = self.bus.cartridge_mut() {
            cart.reset();
        }
        self.bus.clear_ram();
        self.bus.ppu_mut().power_on();
        self.cpu.power_on(&mut self.bus);
        self.bus.ppu_mut().advance(RESET_CYCLES as u32);
        self.fps.clear();
        tracing::info!("power cycle");
    }

    /// Execute one CPU instruction (or interrupt entry) and advance the PPU
    /// by the cycles it consumed. This is the only place the PPU clock moves
    /// during emulation.
    ///
    /// While the CPU is halted the PPU idles forward one CPU cycle (3 dots)
    /// per call, so frames keep completing and the host callback keeps
    /// running. `total_cycles` does not move during those calls, so after a
    /// resume the PPU position is ahead of `total_cycles * 3` by the idled
    /// dots. Trace lines report both counters as they are.
    pub fn step(&mut self) -> StepOutcome {
        let cycles = self.cpu.step(&mut self.bus);
        let elapsed = if cycles == 0 && self.cpu.halted() { 1 } else { cycles };
        let frame_complete = self.bus.clock(elapsed);
        StepOutcome {
            cycles,
            frame_complete,
        }
    }

    /// Run until the PPU completes a frame, then invoke the frame callback.
    pub fn run_one_frame(&mut self) -> FrameStats {
        let mut stats = FrameStats::default();
        loop {
            let outcome = self.step();
            if outcome.cycles > 0 {
                stats.instructions += 1;
                stats.cpu_cycles += u64::from(outcome.cycles);
            }
            if outcome.frame_complete {
                break;
            }
        }
        self.fps.record(Instant::now());

        if let Some(mut callback) = self.frame_callback.take() {
            callback(&mut FrameHandle { system: self });
            // The callback may have installed a replacement.
            if self.frame_callback.is_none() {
                self.frame_callback = Some(callback);
            }
        }
        stats
    }

    /// Run `frames` frames back to back.
    pub fn run_frames(&mut self, frames: u64) -> FrameStats {
        let mut total = FrameStats::default();
        for _ in 0..frames {
            let stats = self.run_one_frame();
            total.instructions += stats.instructions;
            total.cpu_cycles += stats.cpu_cycles;
        }
        total
    }

    /// Snapshot for the instruction about to execute.
    pub fn trace_line(&self) -> TraceLine {
        TraceLine::capture(&self.cpu, &self.bus)
    }

    /// Read through the bus, side effects included.
    pub fn read_memory(&mut self, address: u16) -> u8 {
        self.bus.read(address)
    }

    /// Read without side effects.
    pub fn peek_memory(&self, address: u16) -> u8 {
        self.bus.peek(address)
    }

    pub fn write_memory(&mut self, address: u16, value: u8) {
        self.bus.write(address, value);
    }

    pub fn halted(&self) -> bool {
        self.cpu.halted()
    }

    pub fn set_halted(&mut self, halted: bool) {
        self.cpu.set_halted(halted);
    }

    pub fn add_cheat(&mut self, cheat: Cheat) {
        self.bus.add_cheat(cheat);
    }

    pub fn remove_cheat(&mut self, address: u16) -> Option<Cheat> {
        self.bus.remove_cheat(address)
    }

    pub fn cheats(&self) -> Vec<Cheat> {
        self.bus.cheats().copied().collect()
    }

    pub fn enable_profiling(&mut self) {
        self.cpu.enable_profiling();
    }

    pub fn profile_report(&self) -> Vec<String> {
        self.cpu.profile_report()
    }

    /// Frames completed since the system was created
    pub fn frame_count(&self) -> u64 {
        self.bus.frames()
    }

    /// Rolling frames per second of host time
    pub fn fps(&self) -> f64 {
        self.fps.fps()
    }

    /// Get CPU reference
    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// Get mutable CPU reference
    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }

    /// Get PPU reference
    pub fn ppu(&self) -> &Ppu {
        self.bus.ppu()
    }
}

impl Default for NesSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NesSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NesSystem")
            .field("cpu", &self.cpu)
            .field("bus", &self.bus)
            .field("frame_callback", &self.frame_callback.is_some())
            .finish()
    }
}

/// Access granted to the frame callback.
///
/// Exposes memory, the halted flag, reset, cartridge swapping, input,
/// cheats and diagnostics, but not frame execution itself.
pub struct FrameHandle<'a> {
    system: &'a mut NesSystem,
}

impl FrameHandle<'_> {
    /// Read through the bus, side effects included.
    pub fn read(&mut self, address: u16) -> u8 {
        self.system.read_memory(address)
    }

    pub fn peek(&self, address: u16) -> u8 {
        self.system.peek_memory(address)
    }

    pub fn write(&mut self, address: u16, value: u8) {
        self.system.write_memory(address, value);
    }

    pub fn halted(&self) -> bool {
        self.system.halted()
    }

    pub fn set_halted(&mut self, halted: bool) {
        self.system.set_halted(halted);
    }

    pub fn reset(&mut self) {
        self.system.reset();
    }

    pub fn power_cycle(&mut self) {
        self.system.power_cycle();
    }

    /// Replace the cartridge, returning the previous one.
    pub fn swap_cartridge(&mut self, cartridge: Cartridge) -> Option<Cartridge> {
        self.system.attach_cart(cartridge)
    }

    pub fn load_rom_file(&mut self, path: impl AsRef<Path>) -> Result<(), SystemError> {
        self.system.load_rom_file(path)
    }

    pub fn set_buttons(&mut self, port: ControllerPort, buttons: Buttons) -> Result<(), SystemError> {
        self.system.set_buttons(port, buttons)
    }

    pub fn add_cheat(&mut self, cheat: Cheat) {
        self.system.add_cheat(cheat);
    }

    pub fn remove_cheat(&mut self, address: u16) -> Option<Cheat> {
        self.system.remove_cheat(address)
    }

    pub fn cheats(&self) -> Vec<Cheat> {
        self.system.cheats()
    }

    pub fn profile_report(&self) -> Vec<String> {
        self.system.profile_report()
    }

    pub fn enable_profiling(&mut self) {
        self.system.enable_profiling();
    }

    pub fn frame_count(&self) -> u64 {
        self.system.frame_count()
    }

    pub fn fps(&self) -> f64 {
        self.system.fps()
    }

    pub fn cpu(&self) -> &Cpu {
        self.system.cpu()
    }

    pub fn ppu(&self) -> &Ppu {
        self.system.ppu()
    }

    pub fn trace_line(&self) -> TraceLine {
        self.system.trace_line()
    }
}
