use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::pixel::PixelFormat;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
    /// Seconds between decoder statistics lines; 0 disables them
    #[serde(default)]
    pub stats_interval_secs: u64,
}

/// Serial link the host streams frames over
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InputConfig {
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Upper bound on a single read; keeps idle polling responsive
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

/// Where rendered pixels go
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutputConfig {
    /// Downstream LED controller on another serial port
    Serial(SerialOutputConfig),
    /// Log each render; useful without hardware
    #[default]
    Log,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SerialOutputConfig {
    pub port: String,
    pub baud_rate: u32,
    /// "adalight" or "awa"
    pub protocol: String,
    #[serde(default)]
    pub pixel_format: PixelFormat,
}

fn default_baud_rate() -> u32 {
    115200
}

fn default_read_timeout_ms() -> u64 {
    5
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }
}
