use crate::compiler::{Action, CompiledMacro};
use std::time::Instant;
use tracing::{debug, Instrument};
use uuid::Uuid;

/// Drive a compiled macro to completion, one action at a time.
///
/// A device action's future must resolve before the next action starts; a
/// delay suspends on the runtime timer without blocking the thread. Nothing
/// is returned: device failures are the drivers' to log.
pub async fn run_compiled(name: String, compiled: CompiledMacro) {
    let run_id = Uuid::now_v7();
    let span = tracing::info_span!("macro_run", macro_name = %name, %run_id);

    async move {
        let started = Instant::now();
        debug!(actions = compiled.len(), "macro started");

        for (index, action) in compiled.actions().iter().enumerate() {
            match action {
                Action::Device {
                    device,
                    driver,
                    args,
                } => {
                    debug!(step = index, device = %device, ?args, "device step");
                    driver.call(args).await;
                }
                Action::Delay(duration) => {
                    debug!(step = index, ms = duration.as_millis() as u64, "delay step");
                    tokio::time::sleep(*duration).await;
                }
            }
        }

        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "macro finished"
        );
    }
    .instrument(span)
    .await
}
