//! Configuration management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::presenter::Timing;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Display bus configuration
    #[serde(default)]
    pub device: DeviceConfig,

    /// Initial display settings
    #[serde(default)]
    pub display: DisplayConfig,

    /// Animation timing
    #[serde(default)]
    pub timing: TimingConfig,

    /// HTTP API configuration
    #[serde(default)]
    pub web: WebConfig,

    /// Daily log configuration
    #[serde(default)]
    pub logs: LogsConfig,
}

/// Serial link to the board that owns the I2C bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Serial port path
    #[serde(default = "default_port")]
    pub port: String,

    /// Serial baud rate
    #[serde(default = "default_baud")]
    pub baud: u32,

    /// I2C address of the display
    #[serde(default = "default_address")]
    pub address: u8,

    /// Run without hardware, discarding every write
    #[serde(default)]
    pub headless: bool,

    /// Board pin of the LED flashed on every event
    #[serde(default = "default_activity_pin")]
    pub activity_pin: u8,

    /// LED flash length (0 disables the LED)
    #[serde(default = "default_activity_flash")]
    pub activity_flash_ms: u64,
}

impl DeviceConfig {
    /// Returns the activity LED flash length, if the LED is enabled.
    pub fn activity_flash(&self) -> Option<Duration> {
        (self.activity_flash_ms > 0).then(|| Duration::from_millis(self.activity_flash_ms))
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud: default_baud(),
            address: default_address(),
            headless: false,
            activity_pin: default_activity_pin(),
            activity_flash_ms: default_activity_flash(),
        }
    }
}

/// Display settings applied at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Brightness (0-15, clamped)
    #[serde(default = "default_brightness")]
    pub brightness: i32,

    /// Blink rate (0=off, 1=2Hz, 2=1Hz, 3=0.5Hz; anything else is off)
    #[serde(default)]
    pub blink: i64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            brightness: default_brightness(),
            blink: 0,
        }
    }
}

/// Animation timing in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Quiet period before the running total replaces an event count
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,

    /// Period of the total/unique alternation
    #[serde(default = "default_alternation")]
    pub alternation_ms: u64,

    /// Default scroll step interval
    #[serde(default = "default_scroll")]
    pub scroll_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce(),
            alternation_ms: default_alternation(),
            scroll_ms: default_scroll(),
        }
    }
}

impl From<&TimingConfig> for Timing {
    fn from(config: &TimingConfig) -> Self {
        Timing::new(
            Duration::from_millis(config.debounce_ms),
            Duration::from_millis(config.alternation_ms),
            Duration::from_millis(config.scroll_ms),
        )
    }
}

/// HTTP API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Enable the HTTP API
    #[serde(default = "default_web_enable")]
    pub enable: bool,

    /// Listen address (e.g., "127.0.0.1:8686")
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enable: default_web_enable(),
            listen: default_listen(),
        }
    }
}

/// Daily log configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsConfig {
    /// Directory for daily JSON logs
    #[serde(default = "default_logs_dir")]
    pub dir: PathBuf,

    /// Reset counters and write a log at local midnight
    #[serde(default = "default_rollover")]
    pub rollover: bool,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            dir: default_logs_dir(),
            rollover: default_rollover(),
        }
    }
}

// Default value functions
fn default_port() -> String {
    "/dev/ttyACM0".to_string()
}

fn default_baud() -> u32 {
    quadseg_hw::firmata::DEFAULT_BAUD_RATE
}

fn default_address() -> u8 {
    quadseg_hw::DEFAULT_ADDRESS
}

fn default_activity_pin() -> u8 {
    13
}

fn default_activity_flash() -> u64 {
    250
}

fn default_brightness() -> i32 {
    i32::from(quadseg_hw::MAX_BRIGHTNESS)
}

fn default_debounce() -> u64 {
    500
}

fn default_alternation() -> u64 {
    1500
}

fn default_scroll() -> u64 {
    500
}

fn default_web_enable() -> bool {
    true
}

fn default_listen() -> String {
    "127.0.0.1:8686".to_string()
}

fn default_logs_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_rollover() -> bool {
    true
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse configuration")?;
        Ok(config)
    }
}
