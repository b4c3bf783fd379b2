//! nestrace - run NES ROMs headless and write instruction traces

#![forbid(unsafe_code)]

mod commands;
mod config;

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use nestrace_core::cartridge::Cartridge;
use nestrace_core::controller::Controller;
use nestrace_core::cpu::RESET_VECTOR;
use nestrace_core::system::NesSystem;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::commands::{Dispatcher, Script};
use crate::config::RunConfig;

const DEFAULT_FRAMES: u64 = 60;

/// NES emulator core runner
#[derive(Parser, Debug)]
#[command(name = "nestrace", version)]
#[command(about = "Headless NES runner and CPU trace generator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a ROM for a number of frames
    Run(RunArgs),
    /// Write one trace line per executed instruction
    Trace(TraceArgs),
    /// Print iNES header information
    Info(InfoArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Path to the iNES ROM file (overrides `cart` in the config)
    #[arg(short, long)]
    rom: Option<PathBuf>,

    /// Number of frames to run
    #[arg(short, long)]
    frames: Option<u64>,

    /// JSON run configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Debug commands to run, one `<frame> <command>` per line
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Seed for `randomize`
    #[arg(long)]
    seed: Option<u64>,

    /// Collect per-opcode statistics for the `profile` command
    #[arg(long)]
    profile: bool,

    /// Dump CPU state after execution
    #[arg(short = 'c', long)]
    dump_cpu: bool,

    /// Dump PPU state after execution
    #[arg(short = 'p', long)]
    dump_ppu: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum TraceFormat {
    /// `C000 4C F5 C5 A:00 X:00 Y:00 P:00100100 SP:FD PPU:  0, 21 CYC:7`
    #[default]
    Compact,
    /// nestest.log column layout with disassembly
    Nestest,
}

#[derive(Args, Debug)]
struct TraceArgs {
    /// Path to the iNES ROM file
    #[arg(short, long)]
    rom: PathBuf,

    /// Override the reset vector, e.g. C000 for nestest automation mode
    #[arg(long, value_parser = parse_hex_u16)]
    start_pc: Option<u16>,

    /// Instructions to trace
    #[arg(short = 'n', long, default_value_t = 10_000)]
    count: u64,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = TraceFormat::Compact)]
    format: TraceFormat,
}

#[derive(Args, Debug)]
struct InfoArgs {
    /// Path to the iNES ROM file
    #[arg(short, long)]
    rom: PathBuf,
}

fn parse_hex_u16(text: &str) -> Result<u16, String> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix('$'))
        .unwrap_or(text);
    u16::from_str_radix(digits, 16).map_err(|e| format!("invalid address {}: {}", text, e))
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run(args),
        Command::Trace(args) => trace(args),
        Command::Info(args) => show_info(&args.rom),
    }
}

fn load_system(rom: &Path) -> Result<NesSystem> {
    let mut system = NesSystem::new();
    system
        .load_rom_file(rom)
        .with_context(|| format!("failed to load {}", rom.display()))?;
    Ok(system)
}

fn run(args: RunArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    let rom = args
        .rom
        .or(config.cart)
        .context("no ROM given: pass --rom or set \"cart\" in the config")?;
    let frames = args.frames.or(config.frames).unwrap_or(DEFAULT_FRAMES);
    let seed = args.seed.or(config.seed).unwrap_or(0);
    let script = match &args.script {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read script {}", path.display()))?;
            Script::parse(&text).with_context(|| format!("invalid script {}", path.display()))?
        }
        None => Script::default(),
    };
    if let Some(last) = script.last_frame().filter(|&last| last > frames) {
        warn!(last, frames, "script has commands past the last frame");
    }

    let mut system = load_system(&rom)?;
    system.attach_controller(Controller::new())?;
    if args.profile {
        system.enable_profiling();
    }
    system.reset();

    let mut dispatcher = Dispatcher::new(seed);
    let report_rate = config.fps_report_rate;
    system.set_frame_callback(move |handle| {
        let frame = handle.frame_count();
        for command in script.due(frame) {
            match dispatcher.execute(handle, command) {
                Ok(message) => info!(frame, "{}", message),
                Err(e) => warn!(frame, ?command, "{:#}", e),
            }
        }
        if report_rate > 0 && frame % report_rate == 0 {
            info!(frame, fps = handle.fps(), "frame rate");
        }
    });

    info!(rom = %rom.display(), frames, seed, "running");
    let started = Instant::now();
    let stats = system.run_frames(frames);
    info!(
        instructions = stats.instructions,
        cpu_cycles = stats.cpu_cycles,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "run complete"
    );

    println!("Completed {} frames.", system.frame_count());
    if args.dump_cpu {
        dump_cpu_state(&system);
    }
    if args.dump_ppu {
        dump_ppu_state(&system);
    }
    Ok(())
}

fn trace(args: TraceArgs) -> Result<()> {
    let mut system = load_system(&args.rom)?;
    system.reset();
    if let Some(pc) = args.start_pc {
        system.cpu_mut().registers_mut().pc = pc;
    }

    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };
    let mut out = BufWriter::new(sink);

    let mut written = 0u64;
    while written < args.count {
        if system.halted() {
            warn!(pc = format_args!("{:04X}", system.cpu().pc()), "cpu halted, stopping trace");
            break;
        }
        let line = system.trace_line();
        match args.format {
            TraceFormat::Compact => writeln!(out, "{}", line)?,
            TraceFormat::Nestest => writeln!(out, "{}", line.nestest())?,
        }
        system.step();
        written += 1;
    }
    out.flush()?;
    info!(lines = written, "trace complete");
    Ok(())
}

fn show_info(rom: &Path) -> Result<()> {
    let cartridge =
        Cartridge::from_file(rom).with_context(|| format!("failed to load {}", rom.display()))?;
    let header = cartridge.header().clone();

    println!("{}", rom.display());
    println!("  Mapper:    {} ({})", cartridge.mapper_id(), cartridge.mapper_name());
    println!("  PRG ROM:   {} x 16KB", header.prg_rom_size);
    if header.chr_rom_size == 0 {
        println!("  CHR:       8KB RAM");
    } else {
        println!("  CHR ROM:   {} x 8KB", header.chr_rom_size);
    }
    println!("  Mirroring: {:?}", header.mirroring());
    println!("  Battery:   {}", header.has_battery());
    println!("  Trainer:   {}", header.has_trainer());

    let mut system = NesSystem::new();
    system.attach_cart(cartridge);
    let reset = u16::from_le_bytes([
        system.peek_memory(RESET_VECTOR),
        system.peek_memory(RESET_VECTOR + 1),
    ]);
    println!("  Reset:     ${:04X}", reset);
    Ok(())
}

fn dump_cpu_state(system: &NesSystem) {
    let cpu = system.cpu();
    let regs = cpu.registers();

    println!("\nCPU State:");
    println!("  A:    ${:02X}", regs.a);
    println!("  X:    ${:02X}", regs.x);
    println!("  Y:    ${:02X}", regs.y);
    println!("  PC:   ${:04X}", regs.pc);
    println!("  SP:   ${:02X}", regs.sp);
    println!("  P:    ${:02X} ({})", cpu.p(), cpu.status());
    println!("  Cycles: {}", cpu.total_cycles());
    println!("  Halted: {}", cpu.halted());
    for line in system.profile_report() {
        println!("  {}", line);
    }
}

fn dump_ppu_state(system: &NesSystem) {
    let ppu = system.ppu();

    println!("\nPPU State:");
    println!("  Scanline: {}", ppu.scanline());
    println!("  Dot: {}", ppu.dot());
    println!("  Frame: {}", ppu.frame());
    println!("  CTRL: ${:02X}", ppu.control().bits());
    println!("  MASK: ${:02X}", ppu.mask().bits());
    println!("  VBLANK: {}", ppu.status().vblank());
    println!("  VRAM address: ${:04X}", ppu.vram_address());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_u16() {
        assert_eq!(parse_hex_u16("C000"), Ok(0xC000));
        assert_eq!(parse_hex_u16("0xc004"), Ok(0xC004));
        assert_eq!(parse_hex_u16("$8000"), Ok(0x8000));
        assert!(parse_hex_u16("G000").is_err());
    }

    #[test]
    fn test_cli_arguments() {
        let cli = Cli::try_parse_from([
            "nestrace", "trace", "--rom", "nestest.nes", "--start-pc", "C000", "-n", "8991",
            "--format", "nestest",
        ])
        .unwrap();
        match cli.command {
            Command::Trace(args) => {
                assert_eq!(args.start_pc, Some(0xC000));
                assert_eq!(args.count, 8991);
                assert_eq!(args.format, TraceFormat::Nestest);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
