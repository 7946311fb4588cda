//! Macro compiler.
//!
//! Turns one macro's step sequence into a flat, immutable list of actions:
//!
//! ```text
//! ["tv", "KEY_POWER"]   → Action::Device { tv, [KEY_POWER] }
//! ["delay", 500]        → Action::Delay(500ms)
//! ["call", "amp on"]    → (steps of "amp on", inlined recursively)
//! ```
//!
//! `call` steps are resolved against the raw definitions that are already
//! loaded, so a compiled macro is a snapshot: recompiling the callee later
//! does not change it. All argument contracts are checked here so a compiled
//! macro never fails for configuration reasons once it runs.

use crate::device::{DeviceDriver, DeviceRegistry};
use crate::error::{ArgumentError, MacroError};
use crate::types::{MacroDefinition, Step, StepKind, CALL, DELAY};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// One runnable unit of a compiled macro.
#[derive(Clone)]
pub enum Action {
    Device {
        device: String,
        driver: Arc<dyn DeviceDriver>,
        args: Vec<String>,
    },
    Delay(Duration),
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Device { device, args, .. } => f
                .debug_struct("Device")
                .field("device", device)
                .field("args", args)
                .finish(),
            Action::Delay(d) => f.debug_tuple("Delay").field(d).finish(),
        }
    }
}

/// The executable form of a macro. Cheap to clone; runs share the same list.
#[derive(Clone, Debug, Default)]
pub struct CompiledMacro {
    actions: Arc<[Action]>,
}

impl CompiledMacro {
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }
}

/// Compiles sequences against the registered devices and loaded definitions.
pub struct MacroCompiler<'a> {
    devices: &'a DeviceRegistry,
    definitions: &'a HashMap<String, MacroDefinition>,
}

impl<'a> MacroCompiler<'a> {
    pub fn new(
        devices: &'a DeviceRegistry,
        definitions: &'a HashMap<String, MacroDefinition>,
    ) -> Self {
        Self {
            devices,
            definitions,
        }
    }

    pub fn compile(&self, sequence: &[Step]) -> Result<CompiledMacro, MacroError> {
        let mut actions = Vec::with_capacity(sequence.len());
        let mut call_stack = Vec::new();
        self.inline(sequence, &mut call_stack, &mut actions)?;
        Ok(CompiledMacro {
            actions: actions.into(),
        })
    }

    fn inline(
        &self,
        sequence: &[Step],
        call_stack: &mut Vec<String>,
        actions: &mut Vec<Action>,
    ) -> Result<(), MacroError> {
        for step in sequence {
            match step.kind() {
                StepKind::Delay => actions.push(Action::Delay(parse_delay(&step.args)?)),

                StepKind::Call => {
                    let name = single_arg(CALL, &step.args)?;
                    if call_stack.iter().any(|n| n == name) {
                        let mut cycle = call_stack.clone();
                        cycle.push(name.to_string());
                        return Err(MacroError::CyclicMacro { cycle });
                    }
                    let target =
                        self.definitions
                            .get(name)
                            .ok_or_else(|| MacroError::UnknownMacro {
                                name: name.to_string(),
                            })?;

                    call_stack.push(name.to_string());
                    self.inline(&target.sequence, call_stack, actions)?;
                    call_stack.pop();
                }

                StepKind::Device(device) => {
                    let driver =
                        self.devices
                            .get(device)
                            .ok_or_else(|| MacroError::UnknownDevice {
                                device: device.to_string(),
                            })?;
                    driver
                        .validate_arguments(&step.args)
                        .map_err(|e| MacroError::invalid_arguments(device, e))?;
                    actions.push(Action::Device {
                        device: device.to_string(),
                        driver: Arc::clone(driver),
                        args: step.args.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn single_arg<'s>(kind: &str, args: &'s [String]) -> Result<&'s str, MacroError> {
    match args {
        [only] => Ok(only.as_str()),
        _ => Err(MacroError::invalid_arguments(
            kind,
            ArgumentError::arity(1, args.len()),
        )),
    }
}

/// Milliseconds, rounded to the nearest whole one: JSON `500.0` is a delay.
fn parse_delay(args: &[String]) -> Result<Duration, MacroError> {
    let raw = single_arg(DELAY, args)?;
    match raw.trim().parse::<f64>() {
        Ok(ms) if ms.is_finite() && ms >= 0.0 => Ok(Duration::from_millis(ms.round() as u64)),
        _ => Err(MacroError::invalid_arguments(
            DELAY,
            ArgumentError::new(format!("\"{raw}\" is not a duration in milliseconds")),
        )),
    }
}
