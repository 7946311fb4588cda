//! The macro subsystem as one explicit context object.
//!
//! ```text
//! register_device(...)            devices persist across reloads
//! reset_configuration()           drop macros, compiled forms, visible names
//! load_configuration([...])       compile + register in order, fail fast
//! execute("name")                 spawn the compiled run, return at once
//! ```
//!
//! Several engines can coexist (one per test, one per host); nothing here is
//! process-global.

use std::future::Future;
use std::sync::Arc;

use tracing::warn;

use crate::device::{DeviceDriver, DeviceRegistry};
use crate::error::MacroError;
use crate::executor::run_compiled;
use crate::registry::MacroRegistry;
use crate::types::MacroDefinition;

#[derive(Debug, Default)]
pub struct MacroEngine {
    devices: DeviceRegistry,
    macros: MacroRegistry,
}

impl MacroEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_device(&mut self, name: impl Into<String>, driver: Arc<dyn DeviceDriver>) {
        self.devices.register(name, driver);
    }

    pub fn reset_configuration(&mut self) {
        self.macros.reset();
    }

    /// Compile and register macros in order against the current devices.
    ///
    /// The first failing definition aborts the load; the ones before it stay
    /// registered.
    pub fn load_configuration(
        &mut self,
        definitions: impl IntoIterator<Item = MacroDefinition>,
    ) -> Result<(), MacroError> {
        self.macros.load(&self.devices, definitions)
    }

    /// Reset, then load. The usual way to apply a freshly read configuration.
    pub fn reload_configuration(
        &mut self,
        definitions: impl IntoIterator<Item = MacroDefinition>,
    ) -> Result<(), MacroError> {
        self.reset_configuration();
        self.load_configuration(definitions)
    }

    pub fn visible_macro_names(&self) -> &[String] {
        self.macros.visible_names()
    }

    pub fn definition(&self, name: &str) -> Option<&MacroDefinition> {
        self.macros.definition(name)
    }

    pub fn has_macro(&self, name: &str) -> bool {
        self.macros.contains(name)
    }

    pub fn devices(&self) -> &DeviceRegistry {
        &self.devices
    }

    pub fn macros(&self) -> &MacroRegistry {
        &self.macros
    }

    /// Start a macro and return immediately.
    ///
    /// Unknown names are a no-op. Must be called from within a tokio runtime;
    /// outside one the run is dropped with a warning.
    pub fn execute(&self, name: &str) {
        let Some(compiled) = self.macros.compiled(name) else {
            warn!(macro_name = %name, "execute: macro not found, ignoring");
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(run_compiled(name.to_string(), compiled.clone()));
            }
            Err(e) => warn!(macro_name = %name, "execute: no async runtime ({})", e),
        }
    }

    /// Run a macro and resolve when its last step has completed.
    ///
    /// The compiled macro is captured now, so a reload while the returned
    /// future is pending does not affect it. Resolves to `false` for an
    /// unknown name.
    pub fn run(&self, name: &str) -> impl Future<Output = bool> + Send + 'static {
        let compiled = self.macros.compiled(name).cloned();
        let name = name.to_string();
        async move {
            match compiled {
                Some(compiled) => {
                    run_compiled(name, compiled).await;
                    true
                }
                None => {
                    warn!(macro_name = %name, "run: macro not found");
                    false
                }
            }
        }
    }
}
