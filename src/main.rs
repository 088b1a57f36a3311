//! wheelflip - command line front end
//!
//! Lists eligible pointing devices and switches their scroll direction.
//! Changing a flag or restarting a device needs an elevated prompt.

use anyhow::{Context, Result, bail};
use std::io::{self, Write};
use tracing::info;
use tracing_subscriber::EnvFilter;
use wheelflip::{AppSettings, DirectionFlag, FlagWriteError, Host, RestartOutcome, WheelService};

const USAGE: &str = "\
Usage:
  wheelflip list [--all]
  wheelflip get <stable-path>
  wheelflip set <stable-path> <standard|inverted> [--no-restart]
  wheelflip restart <stable-path>
  wheelflip config [set <key> <value>]

Stable paths look like HID\\VID_046D&PID_C52B&MI_01\\7&1a2b&0&0000 (see `list`).";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    List { all: bool },
    Get { path: String },
    Set { path: String, flag: DirectionFlag, restart: bool },
    Restart { path: String },
    Config { update: Option<(String, String)> },
    Help,
}

impl Command {
    fn parse(args: &[String]) -> Result<Self> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let command = match args.as_slice() {
            [] | ["help"] | ["--help"] | ["-h"] => Command::Help,
            ["list"] => Command::List { all: false },
            ["list", "--all"] => Command::List { all: true },
            ["get", path] => Command::Get {
                path: path.to_string(),
            },
            ["set", path, flag, rest @ ..] => {
                let restart = match rest {
                    [] => true,
                    ["--no-restart"] => false,
                    _ => bail!("Unexpected arguments: {}\n\n{}", rest.join(" "), USAGE),
                };
                Command::Set {
                    path: path.to_string(),
                    flag: flag.parse().map_err(anyhow::Error::msg)?,
                    restart,
                }
            }
            ["restart", path] => Command::Restart {
                path: path.to_string(),
            },
            ["config"] => Command::Config { update: None },
            ["config", "set", key, value] => Command::Config {
                update: Some((key.to_string(), value.to_string())),
            },
            _ => bail!("Unrecognized command: {}\n\n{}", args.join(" "), USAGE),
        };
        Ok(command)
    }
}

fn main() -> Result<()> {
    // Initialize logging (respects RUST_LOG, defaults to info)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args)?;
    if command == Command::Help {
        println!("{}", USAGE);
        return Ok(());
    }

    let settings = AppSettings::load().context("Failed to load settings")?;
    run(command, settings)
}

#[cfg(windows)]
fn run(command: Command, settings: AppSettings) -> Result<()> {
    let service = WheelService::new(wheelflip::backend::WindowsHost::new(), settings);
    execute(&service, command, &mut io::stdout().lock())
}

#[cfg(not(windows))]
fn run(_command: Command, _settings: AppSettings) -> Result<()> {
    bail!("No device backend for this platform; wheelflip manages Windows pointing devices")
}

#[cfg_attr(not(windows), allow(dead_code))]
fn execute<H: Host>(
    service: &WheelService<H>,
    command: Command,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        Command::Help => writeln!(out, "{}", USAGE)?,

        Command::List { all } => {
            let (devices, candidates) = service.scan_with_debug();
            if devices.is_empty() {
                writeln!(out, "No connected devices with a configurable wheel found.")?;
            }
            for device in &devices {
                writeln!(out, "{}", device.display_name)?;
                writeln!(
                    out,
                    "    {}  [{}]  {}",
                    device.short_id,
                    service.get_flag(&device.config_path),
                    device.stable_path
                )?;
            }
            if all {
                writeln!(out)?;
                for candidate in candidates.iter().filter(|c| c.rejected.is_some()) {
                    writeln!(out, "skipped {} ({:?})", candidate.stable_path, candidate.rejected)?;
                }
            }
        }

        Command::Get { path } => {
            let device = find(service, &path)?;
            writeln!(out, "{}", service.get_flag(&device.config_path))?;
        }

        Command::Set {
            path,
            flag,
            restart,
        } => {
            let device = find(service, &path)?;
            if !restart {
                write_flag(service, &device.config_path, flag)?;
                writeln!(out, "Setting saved. Reconnect the device to apply it.")?;
                return Ok(());
            }

            let applied = match service.apply(&device, flag) {
                Ok(applied) => applied,
                Err(e) => return Err(write_error(e)),
            };
            info!("{} set to {}", device.display_name, applied.flag);
            match applied.restart {
                Some(outcome) => writeln!(out, "{}", outcome.message())?,
                None => writeln!(out, "Setting saved. Reconnect the device to apply it.")?,
            }
        }

        Command::Restart { path } => {
            info!("Restarting {} (settle {} ms)", path, service.settings().settle_ms);
            let outcome = service.restart_with(&path, |state| info!("  {:?}", state));
            match outcome {
                RestartOutcome::Success => writeln!(out, "Device restarted.")?,
                RestartOutcome::Failed(reason) => {
                    bail!("Restart failed: {}. Unplug and reconnect the device instead.", reason)
                }
            }
        }

        Command::Config { update } => {
            let mut settings = service.settings().clone();
            match update {
                Some((key, value)) => {
                    settings.set(&key, &value)?;
                    let path = settings.save()?;
                    writeln!(out, "Saved {} = {} to {}", key, value, path.display())?;
                }
                None => {
                    if let Ok(path) = AppSettings::settings_path() {
                        writeln!(out, "# {}", path.display())?;
                    }
                    write!(out, "{}", settings.to_toml()?)?;
                }
            }
        }
    }
    Ok(())
}

#[cfg_attr(not(windows), allow(dead_code))]
fn find<H: Host>(service: &WheelService<H>, path: &str) -> Result<wheelflip::DeviceRecord> {
    service
        .find(path)
        .with_context(|| format!("{} is not a connected device with a configurable wheel", path))
}

#[cfg_attr(not(windows), allow(dead_code))]
fn write_flag<H: Host>(
    service: &WheelService<H>,
    config_path: &str,
    flag: DirectionFlag,
) -> Result<()> {
    service.set_flag(config_path, flag).map_err(write_error)
}

#[cfg_attr(not(windows), allow(dead_code))]
fn write_error(err: FlagWriteError) -> anyhow::Error {
    match err {
        FlagWriteError::PermissionDenied => {
            anyhow::anyhow!(
                "Could not save the setting: run wheelflip from an elevated (administrator) prompt"
            )
        }
        other => anyhow::Error::new(other).context("Could not save the setting"),
    }
}
