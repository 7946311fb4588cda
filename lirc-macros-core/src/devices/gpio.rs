//! GPIO switches.
//!
//! Pins are configured by name (`{"name": "lamp", "pin": 17}`) and driven
//! through a [`GpioTransport`]. Macros address them with
//! `["gpio", <name>, 0|1]`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::device::DeviceDriver;
use crate::error::ArgumentError;

/// Conventional device name for GPIO steps.
pub const GPIO_DEVICE: &str = "gpio";

pub const LOW: u8 = 0;
pub const HIGH: u8 = 1;

#[derive(Debug, Error)]
pub enum GpioError {
    #[error("GPIO pin \"{0}\" is not configured")]
    UnknownPin(String),

    #[error("GPIO pin {pin}: {source}")]
    Io {
        pin: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("GPIO pin {pin} returned unreadable value {value:?}")]
    InvalidValue { pin: u32, value: String },
}

/// One configured switch. `state` is the last value read or written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpioPinConfig {
    pub name: String,
    pub pin: u32,
    #[serde(default)]
    pub state: u8,
}

/// Result of toggling a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinState {
    pub pin: u32,
    pub state: u8,
}

/// Raw pin access (GPIO numbering). Kernels with a non-zero chip base number
/// pins from 512 upwards.
pub trait GpioTransport: Send + Sync {
    fn digital_read(&self, pin: u32) -> Result<u8, GpioError>;
    fn digital_write(&self, pin: u32, state: u8) -> Result<(), GpioError>;
}

// ── SysfsGpio ──

/// Linux sysfs interface (`/sys/class/gpio/gpio<N>/value`).
#[derive(Debug, Clone)]
pub struct SysfsGpio {
    root: PathBuf,
}

impl SysfsGpio {
    pub fn new() -> Self {
        Self::with_root("/sys/class/gpio")
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Export each pin that is not exported yet and make it an output.
    ///
    /// Writing `out` to `direction` drives the pin low, so pins that are
    /// already outputs are left alone and keep their value.
    pub fn setup(&self, pins: &[GpioPinConfig]) -> Result<(), GpioError> {
        for cfg in pins {
            let io = |source: std::io::Error| GpioError::Io { pin: cfg.pin, source };
            let dir = self.root.join(format!("gpio{}", cfg.pin));
            if !dir.exists() {
                std::fs::write(self.root.join("export"), cfg.pin.to_string()).map_err(io)?;
            }

            let direction = dir.join("direction");
            match std::fs::read_to_string(&direction) {
                Ok(current) if current.trim() == "out" => {
                    debug!(pin = cfg.pin, "gpio pin already an output");
                }
                _ => std::fs::write(&direction, "out").map_err(io)?,
            }
        }
        Ok(())
    }

    fn value_path(&self, pin: u32) -> PathBuf {
        self.root.join(format!("gpio{pin}")).join("value")
    }
}

impl Default for SysfsGpio {
    fn default() -> Self {
        Self::new()
    }
}

impl GpioTransport for SysfsGpio {
    fn digital_read(&self, pin: u32) -> Result<u8, GpioError> {
        let raw = std::fs::read_to_string(self.value_path(pin))
            .map_err(|source| GpioError::Io { pin, source })?;
        raw.trim()
            .parse::<u8>()
            .map_err(|_| GpioError::InvalidValue { pin, value: raw })
    }

    fn digital_write(&self, pin: u32, state: u8) -> Result<(), GpioError> {
        std::fs::write(self.value_path(pin), state.to_string())
            .map_err(|source| GpioError::Io { pin, source })
    }
}

// ── EmulatedGpio ──

/// In-memory pin bank for dry runs and tests. Unwritten pins read low.
#[derive(Debug, Default)]
pub struct EmulatedGpio {
    pins: Mutex<HashMap<u32, u8>>,
}

impl EmulatedGpio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set every pin in `pins` to `value`.
    pub fn init_pins_with(&self, pins: impl IntoIterator<Item = u32>, value: u8) {
        let mut map = lock(&self.pins);
        for pin in pins {
            map.insert(pin, value);
        }
    }

    pub fn get(&self, pin: u32) -> u8 {
        lock(&self.pins).get(&pin).copied().unwrap_or(LOW)
    }
}

impl GpioTransport for EmulatedGpio {
    fn digital_read(&self, pin: u32) -> Result<u8, GpioError> {
        Ok(self.get(pin))
    }

    fn digital_write(&self, pin: u32, state: u8) -> Result<(), GpioError> {
        lock(&self.pins).insert(pin, state);
        Ok(())
    }
}

// ── GpioBank ──

/// The configured switches plus the transport that drives them.
pub struct GpioBank {
    transport: Arc<dyn GpioTransport>,
    pins: Mutex<Vec<GpioPinConfig>>,
}

impl GpioBank {
    pub fn new(transport: Arc<dyn GpioTransport>, pins: Vec<GpioPinConfig>) -> Self {
        Self {
            transport,
            pins: Mutex::new(pins),
        }
    }

    /// Snapshot of the configured pins with their cached states.
    pub fn pins(&self) -> Vec<GpioPinConfig> {
        lock(&self.pins).clone()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.pins).is_empty()
    }

    pub fn pin_for_name(&self, name: &str) -> Option<u32> {
        lock(&self.pins)
            .iter()
            .find(|cfg| cfg.name == name)
            .map(|cfg| cfg.pin)
    }

    /// Re-read every configured pin and return the refreshed list.
    pub fn update_pin_states(&self) -> Result<Vec<GpioPinConfig>, GpioError> {
        let mut pins = lock(&self.pins);
        for cfg in pins.iter_mut() {
            cfg.state = self.transport.digital_read(cfg.pin)?;
        }
        Ok(pins.clone())
    }

    /// Invert a pin: any non-zero reading counts as high and becomes low.
    pub fn toggle_pin(&self, pin: u32) -> Result<PinState, GpioError> {
        let current = self.transport.digital_read(pin)?;
        let state = if current > 0 { LOW } else { HIGH };
        self.transport.digital_write(pin, state)?;
        self.remember(pin, state);
        debug!(pin, state, "toggled gpio pin");
        Ok(PinState { pin, state })
    }

    /// Drive a pin addressed by its configured name.
    pub fn set_pin(&self, name: &str, state: u8) -> Result<(), GpioError> {
        let pin = self
            .pin_for_name(name)
            .ok_or_else(|| GpioError::UnknownPin(name.to_string()))?;
        self.transport.digital_write(pin, state)?;
        self.remember(pin, state);
        debug!(pin, name, state, "set gpio pin");
        Ok(())
    }

    fn remember(&self, pin: u32, state: u8) {
        for cfg in lock(&self.pins).iter_mut().filter(|cfg| cfg.pin == pin) {
            cfg.state = state;
        }
    }
}

// ── GpioDevice ──

/// Macro driver for `["gpio", <name>, 0|1]`.
pub struct GpioDevice {
    bank: Arc<GpioBank>,
}

impl GpioDevice {
    pub fn new(bank: Arc<GpioBank>) -> Self {
        Self { bank }
    }
}

#[async_trait]
impl DeviceDriver for GpioDevice {
    fn validate_arguments(&self, args: &[String]) -> Result<(), ArgumentError> {
        let [name, state] = args else {
            return Err(ArgumentError::arity(2, args.len()));
        };
        if self.bank.pin_for_name(name).is_none() {
            return Err(ArgumentError::new(format!(
                "gpio pin \"{name}\" is not configured"
            )));
        }
        parse_state(state)?;
        Ok(())
    }

    async fn call(&self, args: &[String]) {
        let [name, state] = args else {
            warn!(?args, "gpio: unexpected arguments, skipping");
            return;
        };
        let result = parse_state(state)
            .map_err(|e| e.to_string())
            .and_then(|state| self.bank.set_pin(name, state).map_err(|e| e.to_string()));
        if let Err(e) = result {
            warn!(pin = %name, "gpio: {}", e);
        }
    }
}

fn parse_state(raw: &str) -> Result<u8, ArgumentError> {
    match raw {
        "0" => Ok(LOW),
        "1" => Ok(HIGH),
        other => Err(ArgumentError::new(format!(
            "gpio state must be 0 or 1, got \"{other}\""
        ))),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
