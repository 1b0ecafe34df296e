//! Configuration for the MAX17616 shell.
//!
//! Settings come from an optional JSON file. Any field missing from the file
//! takes its default, and the shell's command-line flags override the result.

use std::path::Path;

use serde::Deserialize;

use crate::hw_trait::I2cConfig;

/// Connection and logging settings for the shell.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShellConfig {
    /// I2C adapter device node
    pub bus: String,

    /// 7-bit device address
    pub address: u8,

    /// Bus clock in Hz
    pub speed_hz: u32,

    /// Default log level when RUST_LOG is unset
    pub log_level: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        let i2c = I2cConfig::default();
        Self {
            bus: "/dev/i2c-1".into(),
            address: i2c.address,
            speed_hz: i2c.speed_hz,
            log_level: "warn".into(),
        }
    }
}

impl ShellConfig {
    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.address > 0x7F {
            anyhow::bail!("address 0x{:02X} is not a 7-bit I2C address", self.address);
        }
        if self.speed_hz == 0 {
            anyhow::bail!("bus speed must be nonzero");
        }
        Ok(())
    }

    pub fn i2c(&self) -> I2cConfig {
        I2cConfig {
            address: self.address,
            speed_hz: self.speed_hz,
        }
    }
}

/// Parse an I2C address given as decimal or `0x` hex.
pub fn parse_address(text: &str) -> Result<u8, String> {
    let text = text.trim();
    let value = match text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => text.parse::<u8>(),
    }
    .map_err(|e| format!("invalid address {text:?}: {e}"))?;

    if value > 0x7F {
        return Err(format!("0x{value:02X} is not a 7-bit I2C address"));
    }
    Ok(value)
}
