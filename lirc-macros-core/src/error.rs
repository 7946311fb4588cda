//! Typed error model for macro compilation and device argument contracts.
//!
//! Every failure here is detected while a configuration is loaded. Once a
//! macro has been compiled it never fails for configuration reasons; only the
//! device transports can misbehave at run time, and they log and drop.

use thiserror::Error;

/// Rejection returned by a device driver's argument contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct ArgumentError {
    pub reason: String,
}

impl ArgumentError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Arity mismatch helper used by the built-in drivers.
    pub fn arity(expected: usize, actual: usize) -> Self {
        Self::new(format!("expected {expected} argument(s), got {actual}"))
    }
}

/// Errors that abort compilation of a macro and with it the whole load.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MacroError {
    /// A device step names a device that was never registered.
    #[error("Can not create macro. Device \"{device}\" is not known")]
    UnknownDevice { device: String },

    /// A `call` step names a macro that has not been loaded yet.
    #[error("Can not create macro. Macro \"{name}\" is not known")]
    UnknownMacro { name: String },

    /// A driver (or the built-in `delay`/`call` steps) rejected the arguments.
    #[error("Invalid arguments for \"{device}\": {reason}")]
    InvalidArguments { device: String, reason: String },

    /// Inlining `call` steps re-entered a macro already being inlined.
    #[error("Cycle detected in macro calls: {}", cycle.join(" → "))]
    CyclicMacro { cycle: Vec<String> },

    /// A step record is not a non-empty list starting with a string.
    #[error("Malformed step: {reason}")]
    MalformedStep { reason: String },
}

impl MacroError {
    pub(crate) fn invalid_arguments(device: &str, err: ArgumentError) -> Self {
        Self::InvalidArguments {
            device: device.to_string(),
            reason: err.reason,
        }
    }
}
