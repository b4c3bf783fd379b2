//! nestrace core - cycle-counted NES emulation engine
//!
//! This crate emulates the parts of the Nintendo Entertainment System needed
//! to reproduce instruction-level CPU traces: the 2A03 CPU with its full
//! opcode table, the memory bus, PPU timing and registers, iNES cartridges
//! with their mappers, and the standard controller. It performs no I/O apart
//! from loading ROM files.

#![forbid(unsafe_code)]

/// CPU module containing the 2A03 (6502 variant) implementation
pub mod cpu;
/// Memory bus and mapping
pub mod bus;
/// PPU timing and register file
pub mod ppu;
/// iNES parsing
pub mod cartridge;
/// Bank switching hardware
pub mod mapper;
/// Standard joypad
pub mod controller;
/// Read overrides and Game Genie codes
pub mod cheats;
/// Instruction-boundary trace lines
pub mod trace;
/// Integration module for complete NES system
pub mod system;

pub use cartridge::{Cartridge, CartridgeError, Mirroring};
pub use cheats::{Cheat, CheatError};
pub use controller::{Buttons, Controller};
pub use system::{ControllerPort, FrameHandle, FrameStats, NesSystem, StepOutcome, SystemError};
pub use trace::TraceLine;
