//! Concrete device drivers for the two transports a remote host has.

pub mod gpio;
pub mod ir;

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::IrConfig;
use crate::engine::MacroEngine;
use crate::types::{CALL, DELAY};
use gpio::{GpioBank, GpioDevice, GPIO_DEVICE};
use ir::{IrDevice, IrTransport, RemoteCommands};

/// Register one [`IrDevice`] per known remote plus the `gpio` device.
///
/// IR devices only accept the commands their remote lists. The `gpio` device
/// is registered last, so it wins over a remote of the same name.
pub fn register_standard_devices(
    engine: &mut MacroEngine,
    transport: Arc<dyn IrTransport>,
    remotes: &RemoteCommands,
    ir_config: &IrConfig,
    gpio: Option<Arc<GpioBank>>,
) {
    let delay = Duration::from_millis(ir_config.post_send_delay_ms);

    for (remote, commands) in remotes {
        if remote == DELAY || remote == CALL {
            warn!("Remote {:?} shadows a built-in step and can not be used in macros", remote);
            continue;
        }
        let device = IrDevice::new(remote.clone(), Arc::clone(&transport))
            .with_post_send_delay(delay)
            .with_known_commands(commands.clone());
        engine.register_device(remote.clone(), Arc::new(device));
    }

    if let Some(bank) = gpio {
        if remotes.contains_key(GPIO_DEVICE) {
            warn!("Remote \"gpio\" is replaced by the GPIO device in macros");
        }
        engine.register_device(GPIO_DEVICE, Arc::new(GpioDevice::new(bank)));
    }

    info!("Registered {} devices", engine.devices().len());
}

#[cfg(test)]
mod tests {
    use super::gpio::{EmulatedGpio, GpioPinConfig};
    use super::ir::LoggingIr;
    use super::*;

    #[test]
    fn test_registers_remotes_and_gpio() {
        let mut remotes = RemoteCommands::new();
        remotes.insert("tv".into(), vec!["KEY_POWER".into()]);
        remotes.insert("delay".into(), vec!["KEY_X".into()]);

        let bank = Arc::new(GpioBank::new(
            Arc::new(EmulatedGpio::new()),
            vec![GpioPinConfig {
                name: "lamp".into(),
                pin: 17,
                state: 0,
            }],
        ));

        let mut engine = MacroEngine::new();
        register_standard_devices(
            &mut engine,
            Arc::new(LoggingIr::new(remotes.clone())),
            &remotes,
            &IrConfig::default(),
            Some(bank),
        );

        assert_eq!(engine.devices().names(), vec!["gpio", "tv"]);
    }
}
