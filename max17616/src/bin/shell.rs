//! Interactive shell for a MAX17616 on a Linux I2C adapter.
//!
//! Initializes the device, then reads commands from stdin until EOF or
//! `exit`. With a trailing command on the command line, runs just that
//! command and exits with its status.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use max17616::config::{parse_address, ShellConfig};
use max17616::tracing::{self, prelude::*};

/// Shell for the MAX17616 current limiter / surge protector
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// I2C adapter device node (default: /dev/i2c-1)
    #[arg(short, long)]
    bus: Option<String>,

    /// 7-bit device address, decimal or 0x hex (default: 0x16)
    #[arg(short, long, value_parser = parse_address)]
    address: Option<u8>,

    /// Bus clock in Hz
    #[arg(short, long)]
    speed: Option<u32>,

    /// Log level used when RUST_LOG is unset (default: warn)
    #[arg(long)]
    log_level: Option<String>,

    /// Run this command and exit, e.g. `telemetry` or `clmode 2`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

fn resolve_config(args: &Args) -> Result<ShellConfig> {
    let mut config = match &args.config {
        Some(path) => ShellConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ShellConfig::default(),
    };

    if let Some(bus) = &args.bus {
        config.bus = bus.clone();
    }
    if let Some(address) = args.address {
        config.address = address;
    }
    if let Some(speed) = args.speed {
        config.speed_hz = speed;
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }

    config.validate()?;
    Ok(config)
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let config = resolve_config(&args)?;

    let level = tracing::parse_level(&config.log_level)
        .with_context(|| format!("Unknown log level {:?}", config.log_level))?;
    tracing::init_journald_or_stderr(level);
    debug!("Using {:?}", config);

    let status = run(&config, &args.command)?;
    Ok(ExitCode::from(status.clamp(0, 255) as u8))
}

#[cfg(target_os = "linux")]
fn run(config: &ShellConfig, command: &[String]) -> Result<i32> {
    use std::io::{self, IsTerminal, Write};

    use max17616::hw_trait::linux_i2c::LinuxI2cBus;
    use max17616::peripheral::max17616::{InitParams, Max17616};
    use max17616::shell::Shell;

    let mut bus = LinuxI2cBus::new(&config.bus);
    let params = InitParams { i2c: config.i2c() };
    let mut dev = Max17616::init(&mut bus, &params).with_context(|| {
        format!(
            "Failed to initialize MAX17616 at 0x{:02X} on {}",
            config.address, config.bus
        )
    })?;

    let interactive = command.is_empty();
    if interactive && io::stdin().is_terminal() {
        let mut stdout = io::stdout();
        writeln!(
            stdout,
            "{} on {} at 0x{:02X}. Type 'help' for commands.",
            dev.variant(),
            config.bus,
            config.address
        )?;
    }

    let result = {
        let mut shell = Shell::new(&mut dev, io::stdout().lock());
        if interactive {
            shell.run(io::stdin().lock())
        } else {
            Ok(shell.execute(&command.join(" ")))
        }
    };

    // Release the device even if the shell hit an I/O error
    let removed = dev.remove();
    let status = result.context("Shell I/O failed")?;
    removed.context("Failed to release device")?;
    info!("Exiting.");
    Ok(status)
}

#[cfg(not(target_os = "linux"))]
fn run(_config: &ShellConfig, _command: &[String]) -> Result<i32> {
    anyhow::bail!("no I2C transport on this platform; the shell needs Linux i2c-dev")
}
