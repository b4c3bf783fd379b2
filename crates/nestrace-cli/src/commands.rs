//! Debug command parsing and dispatch
//!
//! Commands arrive one per line, either typed or from a script file where
//! each line is prefixed with the frame it runs on:
//!
//! ```text
//! # frame command (frames start at 1)
//! 1 buttons 0x08
//! 60 setmem 0x0075 9
//! 120 ggcheat GOSSIP
//! 300 profile profile.txt
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use nestrace_core::cheats::{decode_game_genie, Cheat};
use nestrace_core::controller::Buttons;
use nestrace_core::system::FrameHandle;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid number: {0}")]
    InvalidNumber(String),
    /// Commands run after a frame completes, so frame 0 is never reached.
    #[error("frame numbers start at 1")]
    FrameZero,
    #[error("line {line}: {source}")]
    Script {
        line: usize,
        #[source]
        source: Box<CommandError>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Reset,
    Power,
    /// Toggle the halted flag
    Pause,
    Halt,
    Resume,
    SetMem { address: u16, value: u8 },
    GetMem(u16),
    LoadRom(PathBuf),
    /// Write this many random bytes to random addresses
    Randomize(usize),
    Cheat { address: u16, value: u8 },
    GameGenie(String),
    Cheats,
    RemoveCheat(u16),
    Profile(PathBuf),
    Buttons(u8),
    Help,
}

/// Accepted verbs and their arguments, in the order `help` lists them.
const USAGE: &[&str] = &[
    "reset",
    "power",
    "pause",
    "halt",
    "resume",
    "setmem <addr> <value>",
    "getmem <addr>",
    "loadrom <filename>",
    "randomize <bytes>",
    "cheat <addr> <value>",
    "ggcheat <code>",
    "cheats",
    "rmcheat <addr>",
    "profile <path>",
    "buttons <mask>",
    "help",
];

/// Accepts `0x`-prefixed hex or decimal.
fn parse_number(text: &str) -> Result<u32, CommandError> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|_| CommandError::InvalidNumber(text.to_string()))
}

fn parse_address(text: &str) -> Result<u16, CommandError> {
    parse_number(text).map(|n| (n & 0xFFFF) as u16)
}

fn parse_byte(text: &str) -> Result<u8, CommandError> {
    parse_number(text).map(|n| (n & 0xFF) as u8)
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let (&name, args) = tokens.split_first().ok_or(CommandError::Empty)?;
        let command = match (name, args) {
            ("reset", []) => Command::Reset,
            ("power", []) => Command::Power,
            ("pause", []) => Command::Pause,
            ("halt", []) => Command::Halt,
            ("resume", []) => Command::Resume,
            ("setmem", [address, value]) => Command::SetMem {
                address: parse_address(address)?,
                value: parse_byte(value)?,
            },
            ("setmem", _) => return Err(CommandError::Usage("setmem <addr> <value>")),
            ("getmem", [address]) => Command::GetMem(parse_address(address)?),
            ("getmem", _) => return Err(CommandError::Usage("getmem <addr>")),
            // File names may contain spaces.
            ("loadrom", [_, ..]) => Command::LoadRom(PathBuf::from(args.join(" "))),
            ("loadrom", _) => return Err(CommandError::Usage("loadrom <filename>")),
            ("randomize", [count]) => Command::Randomize(parse_number(count)? as usize),
            ("randomize", _) => return Err(CommandError::Usage("randomize <bytes>")),
            ("cheat", [address, value]) => Command::Cheat {
                address: parse_address(address)?,
                value: parse_byte(value)?,
            },
            ("cheat", _) => return Err(CommandError::Usage("cheat <addr> <value>")),
            ("ggcheat", [code]) => Command::GameGenie(code.to_string()),
            ("ggcheat", _) => return Err(CommandError::Usage("ggcheat <code>")),
            ("cheats", []) => Command::Cheats,
            ("rmcheat", [address]) => Command::RemoveCheat(parse_address(address)?),
            ("rmcheat", _) => return Err(CommandError::Usage("rmcheat <addr>")),
            ("profile", [path]) => Command::Profile(PathBuf::from(*path)),
            ("profile", _) => return Err(CommandError::Usage("profile <path>")),
            ("buttons", [mask]) => Command::Buttons(parse_byte(mask)?),
            ("buttons", _) => return Err(CommandError::Usage("buttons <mask>")),
            ("help", _) => Command::Help,
            (other, _) => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

/// Frame-indexed command list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    entries: BTreeMap<u64, Vec<Command>>,
}

impl Script {
    /// Parse `<frame> <command>` lines. Blank lines and `#` comments are
    /// skipped.
    pub fn parse(text: &str) -> Result<Self, CommandError> {
        let mut entries: BTreeMap<u64, Vec<Command>> = BTreeMap::new();
        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let wrap = |source| CommandError::Script {
                line: index + 1,
                source: Box::new(source),
            };
            let (frame, command) = line
                .split_once(char::is_whitespace)
                .ok_or_else(|| wrap(CommandError::Usage("<frame> <command>")))?;
            let frame = frame
                .parse::<u64>()
                .map_err(|_| wrap(CommandError::InvalidNumber(frame.to_string())))?;
            if frame == 0 {
                return Err(wrap(CommandError::FrameZero));
            }
            let command = command.parse().map_err(wrap)?;
            entries.entry(frame).or_default().push(command);
        }
        Ok(Self { entries })
    }

    /// Commands scheduled for `frame`.
    pub fn due(&self, frame: u64) -> &[Command] {
        self.entries.get(&frame).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn last_frame(&self) -> Option<u64> {
        self.entries.keys().next_back().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Executes commands against the running system.
#[derive(Debug)]
pub struct Dispatcher {
    rng: StdRng,
}

impl Dispatcher {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Run one command and return the message to show the user.
    pub fn execute(&mut self, handle: &mut FrameHandle<'_>, command: &Command) -> Result<String> {
        let message = match command {
            Command::Reset => {
                handle.reset();
                "reset".to_string()
            }
            Command::Power => {
                handle.power_cycle();
                "power cycled".to_string()
            }
            Command::Pause => {
                let halted = !handle.halted();
                handle.set_halted(halted);
                let state = if halted { "paused" } else { "resumed" };
                state.to_string()
            }
            Command::Halt => {
                handle.set_halted(true);
                "paused".to_string()
            }
            Command::Resume => {
                handle.set_halted(false);
                "resumed".to_string()
            }
            Command::SetMem { address, value } => {
                handle.write(*address, *value);
                format!("memory at 0x{:04X} set to 0x{:02X}", address, value)
            }
            Command::GetMem(address) => {
                let value = handle.read(*address);
                format!("memory at 0x{:04X} = 0x{:02X}", address, value)
            }
            Command::LoadRom(path) => {
                handle
                    .load_rom_file(path)
                    .with_context(|| format!("failed to load {}", path.display()))?;
                handle.reset();
                format!("loaded {}", path.display())
            }
            Command::Randomize(count) => {
                for _ in 0..*count {
                    let address: u16 = self.rng.gen();
                    let value: u8 = self.rng.gen();
                    handle.write(address, value);
                }
                format!("randomized {} bytes", count)
            }
            Command::Cheat { address, value } => {
                let cheat = Cheat::new(*address, *value);
                handle.add_cheat(cheat);
                format!("cheat {}", cheat)
            }
            Command::GameGenie(code) => {
                let cheat = decode_game_genie(code)
                    .with_context(|| format!("bad game genie code {}", code))?;
                handle.add_cheat(cheat);
                format!("cheat {}", cheat)
            }
            Command::Cheats => {
                let cheats = handle.cheats();
                if cheats.is_empty() {
                    "no cheats".to_string()
                } else {
                    cheats
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }
            Command::RemoveCheat(address) => match handle.remove_cheat(*address) {
                Some(_) => format!("removed cheat at 0x{:04X}", address),
                None => format!("no cheat at 0x{:04X}", address),
            },
            Command::Profile(path) => {
                let report = handle.profile_report();
                let text: String = report.iter().map(|line| format!("{}\n", line)).collect();
                fs::write(path, text)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                format!("wrote {} profile lines to {}", report.len(), path.display())
            }
            Command::Buttons(mask) => {
                let buttons = Buttons::new(*mask);
                handle.set_buttons(0, buttons)?;
                format!("buttons {}", buttons)
            }
            Command::Help => format!("commands:\n  {}", USAGE.join("\n  ")),
        };
        Ok(message)
    }
}
