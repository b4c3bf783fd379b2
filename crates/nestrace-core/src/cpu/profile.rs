//! Per-opcode execution profiler

use std::time::Duration;

use super::opcodes::OpcodeTable;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpcodeStats {
    pub count: u64,
    pub cycles: u64,
    pub elapsed: Duration,
}

impl OpcodeStats {
    pub fn average_cycles(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.cycles as f64 / self.count as f64
        }
    }

    pub fn average_nanos(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.elapsed.as_nanos() as f64 / self.count as f64
        }
    }
}

/// Counts executions, emulated cycles and host time for every opcode value.
#[derive(Debug, Clone)]
pub struct OpcodeProfiler {
    stats: [OpcodeStats; 256],
}

impl OpcodeProfiler {
    pub fn new() -> Self {
        Self {
            stats: [OpcodeStats::default(); 256],
        }
    }

    pub fn record(&mut self, opcode: u8, cycles: u32, elapsed: Duration) {
        let entry = &mut self.stats[opcode as usize];
        entry.count += 1;
        entry.cycles += u64::from(cycles);
        entry.elapsed += elapsed;
    }

    pub fn stats(&self, opcode: u8) -> &OpcodeStats {
        &self.stats[opcode as usize]
    }

    pub fn clear(&mut self) {
        self.stats = [OpcodeStats::default(); 256];
    }

    /// One line per executed opcode, in opcode order.
    pub fn report(&self) -> Vec<String> {
        self.stats
            .iter()
            .enumerate()
            .filter(|(_, s)| s.count > 0)
            .map(|(opcode, s)| {
                let info = OpcodeTable::get(opcode as u8);
                format!(
                    "{:02X} {} {:<3} count={} avg_cycles={:.2} avg_ns={:.1}",
                    opcode,
                    info.mnemonic,
                    info.mode.tag(),
                    s.count,
                    s.average_cycles(),
                    s.average_nanos(),
                )
            })
            .collect()
    }
}

impl Default for OpcodeProfiler {
    fn default() -> Self {
        Self::new()
    }
}
