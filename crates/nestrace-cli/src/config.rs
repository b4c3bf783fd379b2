//! JSON run configuration

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

const DEFAULT_FPS_REPORT_RATE: u64 = 60;

/// Settings read from `--config`. Command-line flags take precedence.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// ROM to load when `--rom` is not given
    pub cart: Option<PathBuf>,
    /// Frames between FPS log events; 0 disables reporting
    pub fps_report_rate: u64,
    pub frames: Option<u64>,
    /// Seed for the `randomize` command
    pub seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            cart: None,
            fps_report_rate: DEFAULT_FPS_REPORT_RATE,
            frames: None,
            seed: None,
        }
    }
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunConfig::parse("{}").unwrap();
        assert_eq!(config, RunConfig::default());
        assert_eq!(config.fps_report_rate, 60);
    }

    #[test]
    fn test_full_config() {
        let config = RunConfig::parse(
            r#"{ "cart": "roms/game.nes", "fps_report_rate": 120, "frames": 600, "seed": 7 }"#,
        )
        .unwrap();
        assert_eq!(config.cart, Some(PathBuf::from("roms/game.nes")));
        assert_eq!(config.fps_report_rate, 120);
        assert_eq!(config.frames, Some(600));
        assert_eq!(config.seed, Some(7));
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(RunConfig::parse(r#"{ "speed": 2.0 }"#).is_err());
    }
}
