//! User configuration file.
//!
//! Lives at `<config dir>/cadenza/config.toml` unless `--config` names
//! another file. Every key is optional; command-line flags override it.
//!
//! ```toml
//! block_size = 512
//! sample_rate = 48000
//! bit_depth = 32
//! cpu_load_ceiling = 0.8
//! sound_bank = "/usr/share/sounds/sf2/default.sf2"
//! stream_from_disk = false
//! output_device = "USB"
//! ```

use cadenza_core::{DEFAULT_CPU_LOAD_CEILING, DEFAULT_FRAMES_PER_BLOCK};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

const APP_NAME: &str = "cadenza";
const CONFIG_FILE: &str = "config.toml";

/// Offline sample rate used when neither the file nor the flags set one.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Bit depth used when neither the file nor the flags set one.
pub const DEFAULT_BIT_DEPTH: u16 = 16;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config value for '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Settings shared by the play and render commands.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub block_size: u32,
    pub sample_rate: u32,
    pub bit_depth: u16,
    pub cpu_load_ceiling: f32,
    pub sound_bank: Option<PathBuf>,
    pub stream_from_disk: bool,
    pub output_device: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_FRAMES_PER_BLOCK,
            sample_rate: DEFAULT_SAMPLE_RATE,
            bit_depth: DEFAULT_BIT_DEPTH,
            cpu_load_ceiling: DEFAULT_CPU_LOAD_CEILING,
            sound_bank: None,
            stream_from_disk: false,
            output_device: None,
        }
    }
}

/// Default config file location.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
        .join(CONFIG_FILE)
}

impl Config {
    /// Loads `path`, or the default location if it exists, or defaults.
    ///
    /// An explicitly named file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = default_path();
                if path.is_file() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Parses TOML text without validating it.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Checks every value against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_block_size(self.block_size)?;
        validate_sample_rate(self.sample_rate)?;
        validate_bit_depth(self.bit_depth)?;
        validate_cpu_load_ceiling(self.cpu_load_ceiling)
    }
}

pub fn validate_block_size(frames: u32) -> Result<(), ConfigError> {
    if (1..=8192).contains(&frames) {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            key: "block_size",
            reason: format!("{frames} is outside 1..=8192"),
        })
    }
}

pub fn validate_sample_rate(rate: u32) -> Result<(), ConfigError> {
    if (8000..=192_000).contains(&rate) {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            key: "sample_rate",
            reason: format!("{rate} Hz is outside 8000..=192000"),
        })
    }
}

pub fn validate_bit_depth(bits: u16) -> Result<(), ConfigError> {
    match bits {
        16 | 32 => Ok(()),
        other => Err(ConfigError::Invalid {
            key: "bit_depth",
            reason: format!("{other} (expected 16 or 32)"),
        }),
    }
}

pub fn validate_cpu_load_ceiling(ceiling: f32) -> Result<(), ConfigError> {
    if ceiling > 0.0 && ceiling <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            key: "cpu_load_ceiling",
            reason: format!("{ceiling} is outside (0, 1]"),
        })
    }
}
