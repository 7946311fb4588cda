//! lirc-macros: command line host for the macro engine.
//!
//! # Usage
//!
//! ```bash
//! # List macros shown to users
//! lirc-macros --config config.json macros
//!
//! # Run a macro and wait for it to finish
//! lirc-macros run "movie night"
//!
//! # Send an IR command, or start/stop repeating it
//! lirc-macros send tv KEY_VOLUMEUP --start
//!
//! # Toggle a GPIO pin without touching hardware
//! lirc-macros --dry-run toggle 17
//! ```
//!
//! Without `--config`, `./config.json` and then `~/.lirc_web_config.json`
//! are tried. `RUST_LOG` controls logging.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lirc_macros_core::config::{self, ConfigError, RemoteConfig};
use lirc_macros_core::devices::gpio::{EmulatedGpio, GpioBank, GpioTransport, SysfsGpio};
use lirc_macros_core::devices::ir::{
    refine_remotes, IrTransport, Irsend, LoggingIr, RemoteCommands, SendMode,
};
use lirc_macros_core::devices::register_standard_devices;
use lirc_macros_core::{MacroDefinition, MacroEngine, StepKind};
use tracing::warn;

#[derive(Parser)]
#[command(name = "lirc-macros")]
#[command(version)]
#[command(about = "Trigger infrared remote commands, GPIO switches and macros")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (.json, .yaml or .yml)
    #[arg(long, short, global = true, env = "LIRC_MACROS_CONFIG")]
    config: Option<PathBuf>,

    /// Log IR sends and emulate GPIO pins instead of using hardware
    #[arg(long, global = true)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the macros shown to users
    Macros,

    /// Print a macro's definition as JSON
    Show {
        /// Macro name
        name: String,
    },

    /// Run a macro and wait until its last step completes
    Run {
        /// Macro name
        name: String,
    },

    /// List remotes and their commands, minus blacklisted ones
    Remotes,

    /// Send an IR command
    Send {
        remote: String,
        command: String,

        /// Start repeating the command
        #[arg(long, conflicts_with = "stop")]
        start: bool,

        /// Stop repeating the command
        #[arg(long)]
        stop: bool,
    },

    /// Print configured GPIO pins with their current state
    Gpios,

    /// Toggle a GPIO pin (GPIO numbering)
    Toggle {
        pin: u32,
    },
}

/// Transports and configuration every command may need. The macro engine is
/// only built by the commands that run macros, so a bad macro does not block
/// direct IR or GPIO use.
struct Host {
    config: RemoteConfig,
    ir: Arc<dyn IrTransport>,
    remotes: RemoteCommands,
    gpio: Arc<GpioBank>,
}

impl Host {
    async fn build(cli: &Cli) -> Result<Self> {
        let config = load_config(cli.config.as_deref())?;

        let (ir, remotes): (Arc<dyn IrTransport>, RemoteCommands) = if cli.dry_run {
            let remotes = remotes_from_macros(&config.macros);
            (Arc::new(LoggingIr::new(remotes.clone())), remotes)
        } else {
            let irsend = Irsend::new(&config.ir);
            let remotes = match irsend.list_remotes().await {
                Ok(remotes) => remotes,
                Err(e) => {
                    warn!(
                        "Could not list LIRC remotes, using the ones macros name: {:#}",
                        e
                    );
                    remotes_from_macros(&config.macros)
                }
            };
            (Arc::new(irsend), remotes)
        };

        let transport: Arc<dyn GpioTransport> = if cli.dry_run {
            Arc::new(EmulatedGpio::new())
        } else {
            let sysfs = SysfsGpio::new();
            if let Err(e) = sysfs.setup(&config.gpios) {
                warn!("GPIO setup failed: {}", e);
            }
            Arc::new(sysfs)
        };
        let gpio = Arc::new(GpioBank::new(transport, config.gpios.clone()));

        Ok(Self {
            config,
            ir,
            remotes,
            gpio,
        })
    }

    /// Register the standard devices and load the configured macros.
    fn engine(&self) -> Result<MacroEngine> {
        let mut engine = MacroEngine::new();
        register_standard_devices(
            &mut engine,
            Arc::clone(&self.ir),
            &self.remotes,
            &self.config.ir,
            Some(Arc::clone(&self.gpio)),
        );
        engine
            .load_configuration(self.config.macros.clone())
            .context("Failed to load macros")?;
        Ok(engine)
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<RemoteConfig> {
    match path {
        Some(path) => Ok(config::load_from_path(path)?),
        None => match config::load_default() {
            Ok(config) => Ok(config),
            Err(e @ ConfigError::NotFound(_)) => {
                warn!("{}; continuing without macros", e);
                Ok(RemoteConfig::default())
            }
            Err(e) => Err(e.into()),
        },
    }
}

/// Remotes and commands referenced by device steps, for dry runs where there
/// is no LIRC daemon to ask.
fn remotes_from_macros(macros: &[MacroDefinition]) -> RemoteCommands {
    let mut remotes = RemoteCommands::new();
    for step in macros.iter().flat_map(|m| &m.sequence) {
        if let StepKind::Device(device) = step.kind() {
            let commands = remotes.entry(device.to_string()).or_default();
            for arg in &step.args {
                if !commands.contains(arg) {
                    commands.push(arg.clone());
                }
            }
        }
    }
    remotes.remove(lirc_macros_core::devices::gpio::GPIO_DEVICE);
    remotes
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn dispatch(cli: Cli) -> Result<ExitCode> {
    let host = Host::build(&cli).await?;

    match cli.command {
        Commands::Macros => {
            for name in host.engine()?.visible_macro_names() {
                println!("{name}");
            }
        }

        Commands::Show { name } => match host.engine()?.definition(&name) {
            Some(definition) => print_json(definition)?,
            None => {
                eprintln!("Unknown macro: {name}");
                return Ok(ExitCode::FAILURE);
            }
        },

        Commands::Run { name } => {
            if !host.engine()?.run(&name).await {
                eprintln!("Unknown macro: {name}");
                return Ok(ExitCode::FAILURE);
            }
        }

        Commands::Remotes => {
            print_json(&refine_remotes(&host.remotes, &host.config.blacklists))?;
        }

        Commands::Send {
            remote,
            command,
            start,
            stop,
        } => {
            let mode = match (start, stop) {
                (true, _) => SendMode::Start,
                (_, true) => SendMode::Stop,
                _ => SendMode::Once,
            };
            host.ir.send(mode, &remote, &command).await?;
        }

        Commands::Gpios => {
            if host.gpio.is_empty() {
                eprintln!("No GPIO pins configured");
                return Ok(ExitCode::FAILURE);
            }
            print_json(&host.gpio.update_pin_states()?)?;
        }

        Commands::Toggle { pin } => {
            print_json(&host.gpio.toggle_pin(pin)?)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lirc_macros_core::Step;

    #[test]
    fn test_remotes_from_macros() {
        let macros = vec![
            MacroDefinition::new(
                "movie",
                vec![
                    Step::new("tv", ["KEY_POWER"]),
                    Step::delay(100),
                    Step::new("tv", ["KEY_POWER"]),
                    Step::new("amp", ["KEY_VOLUMEUP"]),
                    Step::new("gpio", ["lamp", "1"]),
                    Step::call("other"),
                ],
            ),
            MacroDefinition::new("other", vec![Step::new("tv", ["KEY_MUTE"])]),
        ];

        let remotes = remotes_from_macros(&macros);
        assert_eq!(remotes.keys().collect::<Vec<_>>(), vec!["amp", "tv"]);
        assert_eq!(remotes["tv"], vec!["KEY_POWER", "KEY_MUTE"]);
    }

    #[tokio::test]
    async fn test_gpio_commands_ignore_broken_macros() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"macros": [{"name": "m", "sequence": [["gpio", "porch", 1]]}],
                "gpios": [{"name": "lamp", "pin": 17}]}"#,
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "lirc-macros",
            "--dry-run",
            "--config",
            path.to_str().unwrap(),
            "toggle",
            "17",
        ])
        .unwrap();
        let host = Host::build(&cli).await.unwrap();

        assert_eq!(host.gpio.toggle_pin(17).unwrap().state, 1);
        assert_eq!(host.gpio.toggle_pin(17).unwrap().state, 0);

        let err = host.engine().unwrap_err();
        assert!(format!("{err:#}").contains("porch"));
    }

    #[test]
    fn test_cli_parses_send_flags() {
        let cli = Cli::try_parse_from(["lirc-macros", "--dry-run", "send", "tv", "KEY_UP", "--start"])
            .unwrap();
        assert!(cli.dry_run);
        assert!(matches!(
            cli.command,
            Commands::Send { start: true, stop: false, .. }
        ));

        assert!(
            Cli::try_parse_from(["lirc-macros", "send", "tv", "KEY_UP", "--start", "--stop"])
                .is_err()
        );
    }
}
