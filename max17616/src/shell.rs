//! Line-oriented command shell for a MAX17616.
//!
//! The shell borrows an initialized device and writes everything it shows
//! to a caller-supplied writer. Each command returns a status code: 0 on
//! success, 1 when the device reported an error, 2 for usage errors. Usage
//! errors are caught before any bus traffic.

use std::fmt::Display;
use std::io::{self, BufRead, Write};

use strum::IntoEnumIterator;
use thiserror::Error;

use crate::error::Error;
use crate::hw_trait::I2c;
use crate::peripheral::max17616::{
    CurrentLimitMode, FaultDescriber, FaultTable, IstartRatio, Max17616, NominalVoltage,
    OvercurrentLimit, OvercurrentTimeout, PgoodThreshold, Quantity, RegisterField,
    VoutUvFaultConfig,
};
use crate::tracing::prelude::*;

pub const PROMPT: &str = "max17616> ";

/// Commands and their help text, in display order.
pub const COMMANDS: &[(&str, &str)] = &[
    ("telemetry", "Read and display device telemetry"),
    ("faults", "Display fault status"),
    ("clmode", "Get/set current limit mode"),
    ("istart", "Get/set current start ratio"),
    ("timeout", "Get/set overcurrent timeout"),
    ("oclimit", "Get/set overcurrent limit"),
    ("uvfault", "Get/set output undervoltage fault configuration"),
    ("operation", "Get/set operation state"),
    ("settings", "Display all device settings"),
    ("clear", "Clear all faults"),
    ("help", "List commands"),
];

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("Unknown command '{0}'. Type 'help' for a list.")]
    UnknownCommand(String),

    /// Bad arguments; carries the text to show the user
    #[error("{0}")]
    Usage(String),

    #[error("{context}: {source}")]
    Device { context: String, source: Error },

    #[error("No telemetry could be read")]
    NoTelemetry,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ShellError {
    /// Exit status reported for this error
    pub fn status(&self) -> i32 {
        match self {
            ShellError::UnknownCommand(_) | ShellError::Usage(_) => 2,
            _ => 1,
        }
    }
}

fn failed(context: impl Into<String>) -> impl FnOnce(Error) -> ShellError {
    let context = context.into();
    move |source| ShellError::Device { context, source }
}

/// Get/set command over one enumerated register.
struct SettingCommand {
    name: &'static str,
    arg: &'static str,
    title: &'static str,
    what: &'static str,
}

const CLMODE: SettingCommand = SettingCommand {
    name: "clmode",
    arg: "mode",
    title: "Current Limit Mode",
    what: "current limit mode",
};

const ISTART: SettingCommand = SettingCommand {
    name: "istart",
    arg: "ratio",
    title: "Current Start Ratio",
    what: "current start ratio",
};

const TIMEOUT: SettingCommand = SettingCommand {
    name: "timeout",
    arg: "value",
    title: "Overcurrent Timeout",
    what: "overcurrent timeout",
};

const OCLIMIT: SettingCommand = SettingCommand {
    name: "oclimit",
    arg: "value",
    title: "Overcurrent Limit",
    what: "overcurrent limit",
};

/// "0=Latch-off, 1=Continuous, ..." for the variants of `T`.
fn choices<T: IntoEnumIterator + Display>() -> String {
    T::iter()
        .enumerate()
        .map(|(i, v)| format!("{i}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Map a CLI index to the variant at that position.
fn parse_choice<T: IntoEnumIterator>(arg: &str) -> Option<T> {
    arg.parse::<usize>().ok().and_then(|i| T::iter().nth(i))
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// A shell bound to one device.
pub struct Shell<'a, I2C, W> {
    dev: &'a mut Max17616<I2C>,
    out: W,
    describer: &'a dyn FaultDescriber,
}

impl<'a, I2C: I2c, W: Write> Shell<'a, I2C, W> {
    pub fn new(dev: &'a mut Max17616<I2C>, out: W) -> Self {
        Self {
            dev,
            out,
            describer: &FaultTable,
        }
    }

    /// Use a different source of fault descriptions.
    pub fn with_describer(mut self, describer: &'a dyn FaultDescriber) -> Self {
        self.describer = describer;
        self
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Read commands until end of input or `exit`, returning the last status.
    pub fn run<R: BufRead>(&mut self, input: R) -> io::Result<i32> {
        let mut status = 0;
        self.prompt()?;
        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if matches!(line, "exit" | "quit") {
                break;
            }
            status = self.execute(line);
            self.prompt()?;
        }
        writeln!(self.out)?;
        Ok(status)
    }

    fn prompt(&mut self) -> io::Result<()> {
        write!(self.out, "{PROMPT}")?;
        self.out.flush()
    }

    /// Run one command line and return its status.
    pub fn execute(&mut self, line: &str) -> i32 {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&name, args)) = words.split_first() else {
            return 0;
        };

        match self.dispatch(name, args) {
            Ok(()) => 0,
            Err(e) => {
                debug!("'{}' failed: {}", line, e);
                if let Err(io_err) = writeln!(self.out, "{}", e) {
                    warn!("Failed to write shell output: {}", io_err);
                }
                e.status()
            }
        }
    }

    fn dispatch(&mut self, name: &str, args: &[&str]) -> Result<(), ShellError> {
        match name {
            "telemetry" => self.telemetry(args),
            "faults" => self.faults(args),
            "clmode" => self.setting::<CurrentLimitMode>(&CLMODE, args),
            "istart" => self.setting::<IstartRatio>(&ISTART, args),
            "timeout" => self.setting::<OvercurrentTimeout>(&TIMEOUT, args),
            "oclimit" => self.setting::<OvercurrentLimit>(&OCLIMIT, args),
            "uvfault" => self.uvfault(args),
            "operation" => self.operation(args),
            "settings" => self.settings(args),
            "clear" => self.clear(args),
            "help" => self.help(),
            other => Err(ShellError::UnknownCommand(other.to_string())),
        }
    }

    fn no_args(name: &str, args: &[&str]) -> Result<(), ShellError> {
        if args.is_empty() {
            Ok(())
        } else {
            Err(ShellError::Usage(format!("Usage: {name}")))
        }
    }

    fn help(&mut self) -> Result<(), ShellError> {
        for (name, text) in COMMANDS {
            writeln!(self.out, "  {:<10} {}", name, text)?;
        }
        writeln!(self.out, "  {:<10} {}", "exit", "Leave the shell")?;
        Ok(())
    }

    fn telemetry(&mut self, args: &[&str]) -> Result<(), ShellError> {
        Self::no_args("telemetry", args)?;

        let telemetry = self.dev.read_telemetry();
        if telemetry.valid.is_empty() {
            return Err(ShellError::NoTelemetry);
        }

        writeln!(self.out, "=== MAX17616 Telemetry ===")?;
        for quantity in Quantity::iter() {
            if let Some(value) = telemetry.get(quantity) {
                let label = format!("{quantity}:");
                writeln!(self.out, "{:<13}{} {}", label, value, quantity.unit())?;
            }
        }
        Ok(())
    }

    fn faults(&mut self, args: &[&str]) -> Result<(), ShellError> {
        Self::no_args("faults", args)?;

        let status = self
            .dev
            .read_status()
            .map_err(failed("Failed to read fault status"))?;

        if status.is_clear() {
            writeln!(self.out, "No faults detected.")?;
            return Ok(());
        }

        writeln!(self.out, "=== FAULT STATUS ===")?;
        writeln!(self.out, "STATUS_WORD: 0x{:04X}", status.word.bits())?;
        for (group, value) in status.active_groups() {
            writeln!(self.out, "{} Faults: 0x{:02X}", group, value)?;
            for (bit, desc) in self.describer.describe_all(group, value) {
                writeln!(self.out, "  [{}] {}", bit, desc)?;
            }
        }
        Ok(())
    }

    fn show_setting<F>(&mut self, cmd: &SettingCommand) -> Result<(), ShellError>
    where
        F: RegisterField + Display,
    {
        let value: F = self
            .dev
            .read_setting()
            .map_err(failed(format!("Failed to get {}", cmd.what)))?;
        writeln!(self.out, "{}: {} (0x{:02X})", cmd.title, value, value.to_raw())?;
        Ok(())
    }

    fn setting<F>(&mut self, cmd: &SettingCommand, args: &[&str]) -> Result<(), ShellError>
    where
        F: RegisterField + IntoEnumIterator + Display,
    {
        match args {
            [] => self.show_setting::<F>(cmd),
            [arg] => {
                let value = parse_choice::<F>(arg).ok_or_else(|| {
                    ShellError::Usage(format!("Invalid {}. Use: {}", cmd.arg, choices::<F>()))
                })?;
                self.dev
                    .write_setting(value)
                    .map_err(failed(format!("Failed to set {}", cmd.what)))?;
                writeln!(self.out, "{} set successfully", capitalize(cmd.what))?;
                Ok(())
            }
            _ => Err(ShellError::Usage(format!(
                "Usage: {name} [{arg}]\n  {arg}: {choices}\n  Without arguments, displays current {what}",
                name = cmd.name,
                arg = cmd.arg,
                choices = choices::<F>(),
                what = cmd.what,
            ))),
        }
    }

    fn show_uvfault(&mut self) -> Result<(), ShellError> {
        let config = self
            .dev
            .vout_uv_fault_config()
            .map_err(failed("Failed to get VOUT UV fault limit"))?;
        writeln!(
            self.out,
            "VOUT UV Fault Limit: {} (0x{:02X})",
            config,
            config.to_raw()
        )?;
        Ok(())
    }

    fn uvfault(&mut self, args: &[&str]) -> Result<(), ShellError> {
        let usage = || {
            ShellError::Usage(format!(
                "Usage: uvfault [voltage threshold]\n  voltage: {}\n  threshold: {}\n  Without arguments, displays current configuration",
                choices::<NominalVoltage>(),
                choices::<PgoodThreshold>(),
            ))
        };

        match args {
            [] => self.show_uvfault(),
            [voltage, threshold] => {
                let config = VoutUvFaultConfig {
                    nominal: parse_choice(voltage).ok_or_else(usage)?,
                    threshold: parse_choice(threshold).ok_or_else(usage)?,
                };
                self.dev
                    .set_vout_uv_fault_config(config)
                    .map_err(failed("Failed to set VOUT UV fault limit"))?;
                writeln!(self.out, "VOUT UV fault limit set to {}", config)?;
                Ok(())
            }
            _ => Err(usage()),
        }
    }

    fn show_operation(&mut self) -> Result<(), ShellError> {
        let enabled = self
            .dev
            .operation_enabled()
            .map_err(failed("Failed to get operation state"))?;
        writeln!(
            self.out,
            "Operation State: {}",
            if enabled { "ENABLED" } else { "DISABLED" }
        )?;
        Ok(())
    }

    fn operation(&mut self, args: &[&str]) -> Result<(), ShellError> {
        let enabled = match args {
            [] => return self.show_operation(),
            ["0"] => false,
            ["1"] => true,
            [_] => {
                return Err(ShellError::Usage(
                    "Invalid value. Use: 0=Disable, 1=Enable".into(),
                ))
            }
            _ => {
                return Err(ShellError::Usage(
                    "Usage: operation [state]\n  state: 0=Disable, 1=Enable\n  Without arguments, displays current state".into(),
                ))
            }
        };

        self.dev
            .set_operation(enabled)
            .map_err(failed("Failed to set operation state"))?;
        writeln!(
            self.out,
            "Operation state set to {}",
            if enabled { "ENABLED" } else { "DISABLED" }
        )?;
        Ok(())
    }

    /// Show every setting; one unreadable register does not hide the rest.
    fn settings(&mut self, args: &[&str]) -> Result<(), ShellError> {
        Self::no_args("settings", args)?;

        writeln!(self.out, "=== Device Settings ===")?;
        let results = [
            self.show_setting::<CurrentLimitMode>(&CLMODE),
            self.show_setting::<IstartRatio>(&ISTART),
            self.show_setting::<OvercurrentTimeout>(&TIMEOUT),
            self.show_setting::<OvercurrentLimit>(&OCLIMIT),
            self.show_uvfault(),
            self.show_operation(),
        ];

        for result in results {
            match result {
                Err(ShellError::Device { context, source }) => {
                    warn!("{}: {}", context, source);
                }
                other => other?,
            }
        }
        Ok(())
    }

    fn clear(&mut self, args: &[&str]) -> Result<(), ShellError> {
        Self::no_args("clear", args)?;

        self.dev
            .clear_faults()
            .map_err(failed("Failed to clear faults"))?;
        writeln!(self.out, "Faults cleared successfully")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw_trait::mock::{MockBus, MockI2c};
    use crate::peripheral::max17616::tests::init_device;
    use crate::peripheral::max17616::FaultGroup;
    use crate::peripheral::pmbus::commands;
    use test_case::test_case;

    struct Fixture {
        bus: MockBus,
        dev: Max17616<MockI2c>,
    }

    impl Fixture {
        fn new() -> Self {
            let mut bus = MockBus::with_identity("MAX17616");
            let dev = init_device(&mut bus);
            bus.state_mut().log.clear();
            Self { bus, dev }
        }

        fn run(&mut self, line: &str) -> (i32, String) {
            let mut shell = Shell::new(&mut self.dev, Vec::new());
            let status = shell.execute(line);
            let out = String::from_utf8(shell.into_output()).unwrap();
            (status, out)
        }

        fn register(&self, command: u8) -> Option<Vec<u8>> {
            self.bus.state().registers.get(&command).cloned()
        }
    }

    #[test]
    fn test_telemetry() {
        let mut fx = Fixture::new();
        fx.bus.set_word(commands::READ_VIN, 614);
        fx.bus.set_word(commands::READ_VOUT, 614);
        fx.bus.set_word(commands::READ_IOUT, 5853);
        fx.bus.set_word(commands::READ_TEMPERATURE_1, 2000);

        let (status, out) = fx.run("telemetry");

        assert_eq!(status, 0);
        assert!(out.contains("VIN:         12 V"));
        assert!(out.contains("IOUT:        10 A"));
        assert!(out.contains("Temperature: 4 °C"));
        assert!(out.contains("Power:       120 W"));
    }

    #[test]
    fn test_telemetry_hides_invalid_fields() {
        let mut fx = Fixture::new();
        fx.bus.set_word(commands::READ_VIN, 614);
        fx.bus.set_word(commands::READ_VOUT, 614);

        let (status, out) = fx.run("telemetry");

        assert_eq!(status, 0);
        assert!(out.contains("VOUT:"));
        assert!(!out.contains("IOUT:"));
        assert!(!out.contains("Power:"));
    }

    #[test]
    fn test_telemetry_nothing_readable() {
        let mut fx = Fixture::new();
        let (status, _) = fx.run("telemetry");
        assert_eq!(status, 1);
    }

    #[test]
    fn test_no_faults() {
        let mut fx = Fixture::new();
        fx.bus.set_word(commands::STATUS_WORD, 0);

        let (status, out) = fx.run("faults");

        assert_eq!(status, 0);
        assert_eq!(out, "No faults detected.\n");
    }

    #[test]
    fn test_faults_listed_with_descriptions() {
        let mut fx = Fixture::new();
        fx.bus.set_word(commands::STATUS_WORD, 0x1002);
        fx.bus.set_byte(FaultGroup::Cml.command(), 0x80);
        fx.bus.set_byte(FaultGroup::MfrSpecific.command(), 0x02);

        let (status, out) = fx.run("faults");

        assert_eq!(status, 0);
        assert!(out.contains("STATUS_WORD: 0x1002"));
        assert!(out.contains("CML Faults: 0x80\n  [7] Invalid or unsupported command received"));
        assert!(out.contains("Manufacturer Faults: 0x02\n  [1] Output short circuit fault occurred"));
    }

    #[test]
    fn test_faults_read_error() {
        let mut fx = Fixture::new();
        fx.bus.set_word(commands::STATUS_WORD, 0x0002);
        fx.bus.fail_command(commands::STATUS_CML);

        let (status, out) = fx.run("faults");

        assert_eq!(status, 1);
        assert!(out.starts_with("Failed to read fault status"));
        assert!(!out.contains("STATUS_WORD"));
    }

    #[test_case("clmode 0", commands::SET_CLMODE, 0x00)]
    #[test_case("clmode 1", commands::SET_CLMODE, 0x40)]
    #[test_case("clmode 2", commands::SET_CLMODE, 0x80)]
    #[test_case("istart 4", commands::SET_ISTART_RATIO, 0x04)]
    #[test_case("timeout 3", commands::SET_TSTOC, 0x03)]
    #[test_case("oclimit 1", commands::SET_ISTLIM, 0x01)]
    #[test_case("uvfault 5 2", commands::VOUT_UV_FAULT_LIMIT, 0x16)]
    #[test_case("operation 0", commands::OPERATION, 0x00)]
    fn test_set_writes_register(line: &str, command: u8, expected: u8) {
        let mut fx = Fixture::new();

        let (status, _) = fx.run(line);

        assert_eq!(status, 0);
        assert_eq!(fx.register(command), Some(vec![expected]));
    }

    #[test_case("clmode 3"; "clmode out of range")]
    #[test_case("clmode -1"; "negative")]
    #[test_case("istart half"; "not a number")]
    #[test_case("timeout 4"; "timeout out of range")]
    #[test_case("oclimit 1 2"; "too many args")]
    #[test_case("uvfault 8 0"; "voltage out of range")]
    #[test_case("uvfault 0 3"; "threshold out of range")]
    #[test_case("uvfault 1"; "missing threshold")]
    #[test_case("operation 2"; "operation out of range")]
    #[test_case("clear now"; "unexpected argument")]
    #[test_case("reboot"; "unknown command")]
    fn test_usage_errors_leave_device_alone(line: &str) {
        let mut fx = Fixture::new();

        let (status, out) = fx.run(line);

        assert_eq!(status, 2);
        assert!(!out.is_empty());
        assert!(fx.bus.state().log.is_empty());
    }

    #[test]
    fn test_get_setting() {
        let mut fx = Fixture::new();
        fx.bus.set_byte(commands::SET_CLMODE, 0x80);
        fx.bus.set_byte(commands::VOUT_UV_FAULT_LIMIT, 0x16);

        assert_eq!(fx.run("clmode"), (0, "Current Limit Mode: Auto-retry (0x80)\n".to_string()));
        assert_eq!(
            fx.run("uvfault"),
            (
                0,
                "VOUT UV Fault Limit: 48V nominal, -30% PGOOD threshold (0x16)\n".to_string()
            )
        );
    }

    #[test]
    fn test_get_setting_with_unknown_pattern() {
        let mut fx = Fixture::new();
        fx.bus.set_byte(commands::SET_ISTART_RATIO, 0x0F);

        let (status, out) = fx.run("istart");

        assert_eq!(status, 1);
        assert!(out.contains("Unrecognized SET_ISTART_RATIO value 0x0F"));
    }

    #[test]
    fn test_settings_skips_unreadable_register() {
        let mut fx = Fixture::new();
        fx.bus.set_byte(commands::SET_CLMODE, 0x00);
        fx.bus.set_byte(commands::SET_ISTART_RATIO, 0x01);
        fx.bus.fail_command(commands::SET_TSTOC);
        fx.bus.set_byte(commands::SET_ISTLIM, 0x03);
        fx.bus.set_byte(commands::VOUT_UV_FAULT_LIMIT, 0x00);
        fx.bus.set_byte(commands::OPERATION, 0x80);

        let (status, out) = fx.run("settings");

        assert_eq!(status, 0);
        assert!(out.contains("Current Limit Mode: Latch-off (0x00)"));
        assert!(out.contains("Current Start Ratio: Half (I_limit/2) (0x01)"));
        assert!(!out.contains("Overcurrent Timeout"));
        assert!(out.contains("Overcurrent Limit: 2.00:1 ratio (0x03)"));
        assert!(out.contains("VOUT UV Fault Limit: 5V nominal, -10% PGOOD threshold (0x00)"));
        assert!(out.contains("Operation State: ENABLED"));
    }

    #[test]
    fn test_clear() {
        let mut fx = Fixture::new();

        let (status, out) = fx.run("clear");

        assert_eq!(status, 0);
        assert_eq!(out, "Faults cleared successfully\n");
        assert_eq!(fx.bus.state().writes(), vec![vec![commands::CLEAR_FAULTS]]);
    }

    #[test]
    fn test_run_until_exit() {
        let mut fx = Fixture::new();
        let input = "clmode 1\n\nbogus\nexit\nclear\n";

        let mut shell = Shell::new(&mut fx.dev, Vec::new());
        let status = shell.run(input.as_bytes()).unwrap();
        let out = String::from_utf8(shell.into_output()).unwrap();

        assert_eq!(status, 2);
        assert!(out.contains("Current limit mode set successfully"));
        assert!(out.contains("Unknown command 'bogus'"));
        assert!(!out.contains("Faults cleared"));
    }

    #[test]
    fn test_custom_describer() {
        struct Upper;
        impl FaultDescriber for Upper {
            fn describe(&self, _group: FaultGroup, _bit: u8) -> Option<&str> {
                Some("SOMETHING")
            }
        }

        let mut fx = Fixture::new();
        fx.bus.set_word(commands::STATUS_WORD, 0x0004);
        fx.bus.set_byte(commands::STATUS_TEMPERATURE, 0x40);

        let mut shell = Shell::new(&mut fx.dev, Vec::new()).with_describer(&Upper);
        assert_eq!(shell.execute("faults"), 0);
        let out = String::from_utf8(shell.into_output()).unwrap();
        assert!(out.contains("Temperature Faults: 0x40\n  [6] SOMETHING"));
    }
}
