use crate::error::ArgumentError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Capability contract every device must satisfy to appear in a macro.
///
/// `validate_arguments` runs once per step while a configuration is loaded;
/// a rejection aborts the load. `call` performs the effect at run time and
/// its future resolving is the signal that the next step may start. There is
/// no failure channel: a driver that cannot reach its transport logs the
/// problem and returns, so the rest of the macro still runs.
#[async_trait]
pub trait DeviceDriver: Send + Sync {
    fn validate_arguments(&self, args: &[String]) -> Result<(), ArgumentError>;

    async fn call(&self, args: &[String]);
}

/// Maps device names to drivers.
///
/// Entries survive configuration resets; a later registration under the same
/// name replaces the earlier one.
#[derive(Clone, Default)]
pub struct DeviceRegistry {
    devices: HashMap<String, Arc<dyn DeviceDriver>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, driver: Arc<dyn DeviceDriver>) {
        let name = name.into();
        tracing::debug!(device = %name, "registered device");
        self.devices.insert(name, driver);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn DeviceDriver>> {
        self.devices.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.devices.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.devices.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("devices", &self.names())
            .finish()
    }
}
