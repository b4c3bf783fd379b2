//! Memory cheats and Game Genie decoding
//!
//! A cheat substitutes a fixed byte for every CPU read of one address. Game
//! Genie codes encode a cartridge address, a replacement value and, for
//! eight-letter codes, a compare byte that must match the underlying ROM.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Game Genie letters in nibble order.
const GENIE_ALPHABET: &[u8; 16] = b"APZLGITYEOXUKSVN";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheatError {
    #[error("game genie codes are 6 or 8 letters, got {0}")]
    InvalidLength(usize),
    #[error("'{0}' is not a game genie letter")]
    InvalidLetter(char),
}

/// A read override at one CPU address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cheat {
    pub address: u16,
    pub value: u8,
    /// Only substitute while the real byte equals this value.
    pub compare: Option<u8>,
}

impl Cheat {
    pub fn new(address: u16, value: u8) -> Self {
        Self {
            address,
            value,
            compare: None,
        }
    }

    /// The byte a read returns given the underlying value.
    pub fn apply(&self, original: u8) -> u8 {
        match self.compare {
            Some(compare) if compare != original => original,
            _ => self.value,
        }
    }
}

impl fmt::Display for Cheat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X} = 0x{:02X}", self.address, self.value)?;
        if let Some(compare) = self.compare {
            write!(f, " if 0x{:02X}", compare)?;
        }
        Ok(())
    }
}

impl FromStr for Cheat {
    type Err = CheatError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        decode_game_genie(code)
    }
}

fn genie_nibble(letter: char) -> Result<u8, CheatError> {
    let upper = letter.to_ascii_uppercase();
    GENIE_ALPHABET
        .iter()
        .position(|&c| c as char == upper)
        .map(|n| n as u8)
        .ok_or(CheatError::InvalidLetter(letter))
}

/// Decode a 6- or 8-letter Game Genie code.
pub fn decode_game_genie(code: &str) -> Result<Cheat, CheatError> {
    let n = code
        .chars()
        .map(genie_nibble)
        .collect::<Result<Vec<u8>, _>>()?;
    if n.len() != 6 && n.len() != 8 {
        return Err(CheatError::InvalidLength(n.len()));
    }

    let address = 0x8000
        | (u16::from(n[3] & 7) << 12)
        | (u16::from(n[5] & 7) << 8)
        | (u16::from(n[4] & 8) << 8)
        | (u16::from(n[2] & 7) << 4)
        | (u16::from(n[1] & 8) << 4)
        | u16::from(n[4] & 7)
        | u16::from(n[3] & 8);

    let value_low_high_bit = if n.len() == 8 { n[7] } else { n[5] };
    let value = ((n[1] & 7) << 4) | ((n[0] & 8) << 4) | (n[0] & 7) | (value_low_high_bit & 8);

    let compare = (n.len() == 8)
        .then(|| ((n[7] & 7) << 4) | ((n[6] & 8) << 4) | (n[6] & 7) | (n[5] & 8));

    Ok(Cheat {
        address,
        value,
        compare,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_six_letter_code() {
        let cheat = decode_game_genie("GOSSIP").unwrap();
        assert_eq!(cheat, Cheat::new(0xD1DD, 0x14));
        assert_eq!(cheat, "gossip".parse().unwrap());
    }

    #[test]
    fn test_eight_letter_code() {
        let cheat = decode_game_genie("ZEXPYGLA").unwrap();
        assert_eq!(cheat.address, 0x94A7);
        assert_eq!(cheat.value, 0x02);
        assert_eq!(cheat.compare, Some(0x03));
        assert_eq!(cheat.apply(0x03), 0x02);
        assert_eq!(cheat.apply(0x04), 0x04);
    }

    #[test]
    fn test_invalid_codes() {
        assert_eq!(decode_game_genie("AAAA"), Err(CheatError::InvalidLength(4)));
        assert_eq!(decode_game_genie("AAAAAB"), Err(CheatError::InvalidLetter('B')));
    }

    #[test]
    fn test_display() {
        assert_eq!(Cheat::new(0x0075, 9).to_string(), "0x0075 = 0x09");
    }
}
