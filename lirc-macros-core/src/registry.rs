//! Macro registry
//!
//! Owns the loaded macro definitions, their compiled form, and the ordered
//! list of names shown to users.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::compiler::{CompiledMacro, MacroCompiler};
use crate::device::DeviceRegistry;
use crate::error::MacroError;
use crate::types::MacroDefinition;

#[derive(Debug, Default)]
pub struct MacroRegistry {
    /// Raw definitions by name; `call` steps resolve against these.
    definitions: HashMap<String, MacroDefinition>,

    /// Compiled macros by name.
    compiled: HashMap<String, CompiledMacro>,

    /// Names of non-hidden macros in registration order.
    visible: Vec<String>,
}

impl MacroRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every definition, compiled macro and visible name.
    pub fn reset(&mut self) {
        self.definitions.clear();
        self.compiled.clear();
        self.visible.clear();
    }

    /// Compile and register each definition in order.
    ///
    /// Stops at the first failure; definitions registered before it stay.
    pub fn load(
        &mut self,
        devices: &DeviceRegistry,
        definitions: impl IntoIterator<Item = MacroDefinition>,
    ) -> Result<(), MacroError> {
        let mut loaded = 0usize;
        for definition in definitions {
            self.register(devices, definition)?;
            loaded += 1;
        }

        info!(
            "Loaded {} macros ({} registered, {} visible)",
            loaded,
            self.compiled.len(),
            self.visible.len()
        );
        Ok(())
    }

    /// Compile one definition and store it, replacing any macro of that name.
    pub fn register(
        &mut self,
        devices: &DeviceRegistry,
        definition: MacroDefinition,
    ) -> Result<(), MacroError> {
        let compiled =
            MacroCompiler::new(devices, &self.definitions).compile(&definition.sequence)?;
        let name = definition.name.clone();
        debug!(
            macro_name = %name,
            steps = definition.sequence.len(),
            actions = compiled.len(),
            hidden = definition.hidden,
            "compiled macro"
        );

        self.visible.retain(|n| n != &name);
        if definition.is_visible() {
            self.visible.push(name.clone());
        }
        self.compiled.insert(name.clone(), compiled);
        self.definitions.insert(name, definition);
        Ok(())
    }

    pub fn compiled(&self, name: &str) -> Option<&CompiledMacro> {
        self.compiled.get(name)
    }

    pub fn definition(&self, name: &str) -> Option<&MacroDefinition> {
        self.definitions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.compiled.contains_key(name)
    }

    pub fn visible_names(&self) -> &[String] {
        &self.visible
    }

    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}
