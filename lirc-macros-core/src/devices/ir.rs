//! Infrared remotes via LIRC.
//!
//! Macros address a remote by registering one [`IrDevice`] per remote name,
//! so a step reads `["tv", "KEY_POWER"]`; the device sends the command once
//! and then pauses before the macro continues.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::IrConfig;
use crate::device::DeviceDriver;
use crate::error::ArgumentError;

/// Remote name → command names.
pub type RemoteCommands = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendMode {
    Once,
    Start,
    Stop,
}

impl SendMode {
    pub fn as_irsend(self) -> &'static str {
        match self {
            SendMode::Once => "SEND_ONCE",
            SendMode::Start => "SEND_START",
            SendMode::Stop => "SEND_STOP",
        }
    }
}

impl fmt::Display for SendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_irsend())
    }
}

/// Send-side access to an IR blaster.
#[async_trait]
pub trait IrTransport: Send + Sync {
    async fn send(&self, mode: SendMode, remote: &str, command: &str) -> Result<()>;

    async fn list_remotes(&self) -> Result<RemoteCommands>;

    async fn send_once(&self, remote: &str, command: &str) -> Result<()> {
        self.send(SendMode::Once, remote, command).await
    }

    async fn send_start(&self, remote: &str, command: &str) -> Result<()> {
        self.send(SendMode::Start, remote, command).await
    }

    async fn send_stop(&self, remote: &str, command: &str) -> Result<()> {
        self.send(SendMode::Stop, remote, command).await
    }
}

// ── Irsend ──

/// Shells out to LIRC's `irsend`.
#[derive(Debug, Clone)]
pub struct Irsend {
    program: String,
    socket: Option<String>,
}

impl Irsend {
    pub fn new(config: &IrConfig) -> Self {
        Self {
            program: config.irsend.clone(),
            socket: config.socket.clone(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new(&self.program);
        if let Some(socket) = &self.socket {
            cmd.arg("--device").arg(socket);
        }
        cmd.args(args);

        let output = cmd
            .output()
            .await
            .with_context(|| format!("Failed to spawn {}", self.program))?;

        if !output.status.success() {
            bail!(
                "{} {} failed ({}): {}",
                self.program,
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(listing_output(&output.stdout, &output.stderr))
    }
}

/// stdout, or stderr when stdout is blank: older LIRC releases print
/// listings on stderr.
fn listing_output(stdout: &[u8], stderr: &[u8]) -> String {
    let stdout = String::from_utf8_lossy(stdout);
    if stdout.trim().is_empty() {
        String::from_utf8_lossy(stderr).into_owned()
    } else {
        stdout.into_owned()
    }
}

#[async_trait]
impl IrTransport for Irsend {
    async fn send(&self, mode: SendMode, remote: &str, command: &str) -> Result<()> {
        debug!(%mode, remote, command, "irsend");
        self.run(&[mode.as_irsend(), remote, command]).await?;
        Ok(())
    }

    async fn list_remotes(&self) -> Result<RemoteCommands> {
        let listing = self.run(&["LIST", "", ""]).await?;
        let mut remotes = RemoteCommands::new();
        for remote in parse_listing(&listing) {
            let commands = self.run(&["LIST", remote.as_str(), ""]).await?;
            remotes.insert(remote, parse_listing(&commands));
        }
        Ok(remotes)
    }
}

/// Last token of each non-empty line, with any `irsend:` prefix ignored.
///
/// Handles both `irsend: tv` and `0000000000000001 KEY_POWER` forms.
fn parse_listing(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.trim_start_matches("irsend:").trim())
        .filter_map(|line| line.split_whitespace().last())
        .map(str::to_string)
        .collect()
}

// ── LoggingIr ──

/// One recorded send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrSend {
    pub mode: SendMode,
    pub remote: String,
    pub command: String,
}

/// Dry-run transport: logs and records sends, lists a fixed set of remotes.
#[derive(Debug, Default)]
pub struct LoggingIr {
    remotes: RemoteCommands,
    sent: Mutex<Vec<IrSend>>,
}

impl LoggingIr {
    pub fn new(remotes: RemoteCommands) -> Self {
        Self {
            remotes,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<IrSend> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl IrTransport for LoggingIr {
    async fn send(&self, mode: SendMode, remote: &str, command: &str) -> Result<()> {
        tracing::info!(%mode, remote, command, "dry-run ir send");
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(IrSend {
                mode,
                remote: remote.to_string(),
                command: command.to_string(),
            });
        Ok(())
    }

    async fn list_remotes(&self) -> Result<RemoteCommands> {
        Ok(self.remotes.clone())
    }
}

/// Drop blacklisted commands from a remote listing.
pub fn refine_remotes(
    remotes: &RemoteCommands,
    blacklists: &BTreeMap<String, Vec<String>>,
) -> RemoteCommands {
    remotes
        .iter()
        .map(|(remote, commands)| {
            let commands = match blacklists.get(remote) {
                Some(blacklist) => commands
                    .iter()
                    .filter(|c| !blacklist.contains(*c))
                    .cloned()
                    .collect(),
                None => commands.clone(),
            };
            (remote.clone(), commands)
        })
        .collect()
}

// ── IrDevice ──

/// Macro driver for one remote: `[<remote>, <command>]` steps.
///
/// The argument list is `[command]`; the remote is the device name it was
/// registered under.
pub struct IrDevice {
    remote: String,
    transport: Arc<dyn IrTransport>,
    post_send_delay: Duration,
    known_commands: Option<Vec<String>>,
}

impl IrDevice {
    pub fn new(remote: impl Into<String>, transport: Arc<dyn IrTransport>) -> Self {
        Self {
            remote: remote.into(),
            transport,
            post_send_delay: Duration::from_millis(IrConfig::default().post_send_delay_ms),
            known_commands: None,
        }
    }

    pub fn with_post_send_delay(mut self, delay: Duration) -> Self {
        self.post_send_delay = delay;
        self
    }

    /// Reject commands the remote does not define.
    pub fn with_known_commands(mut self, commands: Vec<String>) -> Self {
        self.known_commands = Some(commands);
        self
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }
}

#[async_trait]
impl DeviceDriver for IrDevice {
    fn validate_arguments(&self, args: &[String]) -> Result<(), ArgumentError> {
        let [command] = args else {
            return Err(ArgumentError::arity(1, args.len()));
        };
        if command.is_empty() {
            return Err(ArgumentError::new("IR command must not be empty"));
        }
        if let Some(known) = &self.known_commands {
            if !known.contains(command) {
                return Err(ArgumentError::new(format!(
                    "remote \"{}\" has no command \"{command}\"",
                    self.remote
                )));
            }
        }
        Ok(())
    }

    async fn call(&self, args: &[String]) {
        for command in args {
            if let Err(e) = self.transport.send_once(&self.remote, command).await {
                warn!(remote = %self.remote, command = %command, "IR send failed: {:#}", e);
            }
        }
        tokio::time::sleep(self.post_send_delay).await;
    }
}
