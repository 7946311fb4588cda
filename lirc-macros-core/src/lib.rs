//! Macro compiler and executor for an infrared/GPIO remote host.
//!
//! Configuration holds named macros, each an ordered list of steps:
//!
//! ```text
//! ["tv", "KEY_POWER"]   device step, args passed to the "tv" driver
//! ["delay", 500]        wait 500ms
//! ["call", "amp on"]    splice the steps of macro "amp on"
//! ```
//!
//! [`MacroEngine`] compiles the whole list when configuration is loaded,
//! checking devices, callee macros and argument contracts up front, and then
//! runs a macro on demand as a strictly sequential chain of async steps.

pub mod compiler;
pub mod config;
pub mod device;
pub mod devices;
pub mod engine;
pub mod error;
pub mod executor;
pub mod registry;
pub mod types;

pub use compiler::{Action, CompiledMacro, MacroCompiler};
pub use config::{load_default, load_from_path, ConfigError, IrConfig, RemoteConfig};
pub use device::{DeviceDriver, DeviceRegistry};
pub use engine::MacroEngine;
pub use error::{ArgumentError, MacroError};
pub use executor::run_compiled;
pub use registry::MacroRegistry;
pub use types::{MacroDefinition, Step, StepKind, CALL, DELAY};
