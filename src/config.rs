//! Daemon configuration
//!
//! Settings come from three layers, later ones winning:
//!
//! 1. built-in defaults
//! 2. an optional TOML file (`RENC_CONFIG_FILE`, or `knob.toml` in the
//!    user config directory when present)
//! 3. environment variables
//!
//! Invalid values abort startup instead of being silently replaced.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const ENV_LOG_ENABLED: &str = "LOG_ENABLED";
pub const ENV_CLK_PIN: &str = "RENC_CLK_GPIO_PIN";
pub const ENV_DT_PIN: &str = "RENC_DT_GPIO_PIN";
pub const ENV_SW_PIN: &str = "RENC_SW_GPIO_PIN";
pub const ENV_LISTENER_PORT: &str = "RENC_LISTENER_PORT";
pub const ENV_LISTENER_ADDRESS: &str = "RENC_LISTENER_ADDRESS";
pub const ENV_SW_DEBOUNCE_MS: &str = "RENC_SW_DEBOUNCE_MS";
pub const ENV_CONFIG_FILE: &str = "RENC_CONFIG_FILE";

// Highest BCM GPIO number exposed on the 40-pin header
const MAX_BCM_PIN: u8 = 27;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("GPIO pin {pin} is assigned to both {first} and {second}")]
    PinConflict {
        pin: u8,
        first: &'static str,
        second: &'static str,
    },

    #[error("Failed to read config file {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    FileParse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Fully resolved daemon settings
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct KnobConfig {
    pub log_enabled: bool,
    pub clk_pin: u8,
    pub dt_pin: u8,
    pub sw_pin: u8,
    pub listener_port: u16,
    pub listener_address: String,
    /// Software debounce for the button line, off when `None`
    pub sw_debounce_ms: Option<u64>,
}

impl Default for KnobConfig {
    fn default() -> Self {
        Self {
            log_enabled: false,
            clk_pin: 17,
            dt_pin: 27,
            sw_pin: 22,
            listener_port: 8001,
            listener_address: "localhost".to_string(),
            sw_debounce_ms: None,
        }
    }
}

impl fmt::Display for KnobConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Pins: CLK: {} DT: {} SW: {} listener: {}:{}",
            self.clk_pin, self.dt_pin, self.sw_pin, self.listener_address, self.listener_port
        )
    }
}

impl KnobConfig {
    /// Loads from the process environment and the optional config file
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// File layer [`KnobConfig::load`] reads from the process environment, if any
    pub fn file_location() -> Option<PathBuf> {
        config_file_path(&|key: &str| std::env::var(key).ok())
    }

    /// Same as [`KnobConfig::load`] with an injectable variable lookup
    pub fn load_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = match config_file_path(&lookup) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        let config = base.apply_env(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::FileParse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_env<F>(mut self, lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_LOG_ENABLED) {
            self.log_enabled = value == "1";
        }
        if let Some(value) = lookup(ENV_CLK_PIN) {
            self.clk_pin = parse_value(ENV_CLK_PIN, &value)?;
        }
        if let Some(value) = lookup(ENV_DT_PIN) {
            self.dt_pin = parse_value(ENV_DT_PIN, &value)?;
        }
        if let Some(value) = lookup(ENV_SW_PIN) {
            self.sw_pin = parse_value(ENV_SW_PIN, &value)?;
        }
        if let Some(value) = lookup(ENV_LISTENER_PORT) {
            self.listener_port = parse_value(ENV_LISTENER_PORT, &value)?;
        }
        if let Some(value) = lookup(ENV_LISTENER_ADDRESS) {
            self.listener_address = value.trim().to_string();
        }
        if let Some(value) = lookup(ENV_SW_DEBOUNCE_MS) {
            self.sw_debounce_ms = Some(parse_value(ENV_SW_DEBOUNCE_MS, &value)?);
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let pins = [
            (ENV_CLK_PIN, self.clk_pin),
            (ENV_DT_PIN, self.dt_pin),
            (ENV_SW_PIN, self.sw_pin),
        ];

        for (key, pin) in pins {
            if pin > MAX_BCM_PIN {
                return Err(ConfigError::InvalidValue {
                    key,
                    value: pin.to_string(),
                    reason: format!("BCM GPIO number must be between 0 and {}", MAX_BCM_PIN),
                });
            }
        }

        for (i, (first, pin)) in pins.iter().enumerate() {
            if let Some((second, _)) = pins[i + 1..].iter().find(|(_, other)| other == pin) {
                return Err(ConfigError::PinConflict {
                    pin: *pin,
                    first: *first,
                    second: *second,
                });
            }
        }

        if self.listener_port == 0 {
            return Err(ConfigError::InvalidValue {
                key: ENV_LISTENER_PORT,
                value: "0".to_string(),
                reason: "port must be non-zero".to_string(),
            });
        }

        if self.listener_address.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: ENV_LISTENER_ADDRESS,
                value: String::new(),
                reason: "address must not be empty".to_string(),
            });
        }

        Ok(())
    }

    pub fn sw_debounce(&self) -> Option<Duration> {
        self.sw_debounce_ms.map(Duration::from_millis)
    }
}

fn parse_value<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason: e.to_string(),
        })
}

// Explicit path wins; otherwise the default location is used only if it exists
fn config_file_path<F>(lookup: &F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = lookup(ENV_CONFIG_FILE) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir()
        .map(|dir| dir.join("rotary-knob").join("knob.toml"))
        .filter(|path| path.is_file())
}
