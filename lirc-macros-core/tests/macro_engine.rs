//! End-to-end behaviour through the public API: configuration in, device
//! calls out.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lirc_macros_core::devices::gpio::{EmulatedGpio, GpioBank, GpioPinConfig};
use lirc_macros_core::devices::ir::{LoggingIr, RemoteCommands, SendMode};
use lirc_macros_core::devices::register_standard_devices;
use lirc_macros_core::{
    ArgumentError, DeviceDriver, MacroDefinition, MacroEngine, MacroError, RemoteConfig, Step,
};
use tokio::time::Instant;

#[derive(Default)]
struct Say {
    calls: Mutex<Vec<(Vec<String>, Instant)>>,
}

impl Say {
    fn words(&self) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(args, _)| args.clone())
            .collect()
    }
}

#[async_trait]
impl DeviceDriver for Say {
    fn validate_arguments(&self, _args: &[String]) -> Result<(), ArgumentError> {
        Ok(())
    }

    async fn call(&self, args: &[String]) {
        self.calls
            .lock()
            .unwrap()
            .push((args.to_vec(), Instant::now()));
    }
}

fn engine() -> (MacroEngine, Arc<Say>) {
    let say = Arc::new(Say::default());
    let mut engine = MacroEngine::new();
    engine.register_device("say", say.clone());
    (engine, say)
}

fn words(list: &[&[&str]]) -> Vec<Vec<String>> {
    list.iter()
        .map(|args| args.iter().map(|s| s.to_string()).collect())
        .collect()
}

#[tokio::test]
async fn hello_world_runs_in_order() {
    let (mut engine, say) = engine();
    let config = RemoteConfig::from_json_str(
        r#"{"macros": [{"name": "hello world", "sequence": [["say", "hello"], ["say", "world"]]}]}"#,
    )
    .unwrap();
    engine.load_configuration(config.macros).unwrap();

    assert!(engine.run("hello world").await);
    assert_eq!(say.words(), words(&[&["hello"], &["world"]]));
}

#[tokio::test]
async fn execute_is_fire_and_forget() {
    let (mut engine, say) = engine();
    engine
        .load_configuration(vec![MacroDefinition::new(
            "hello world",
            vec![Step::new("say", ["hello"]), Step::new("say", ["world"])],
        )])
        .unwrap();

    engine.execute("hello world");
    for _ in 0..100 {
        if say.words().len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(say.words(), words(&[&["hello"], &["world"]]));
}

#[tokio::test]
async fn call_step_inlines_earlier_macro_once() {
    let (mut engine, say) = engine();
    engine
        .load_configuration(vec![
            MacroDefinition::new("b", vec![Step::new("say", ["hi"])]),
            MacroDefinition::new("a", vec![Step::call("b")]),
        ])
        .unwrap();

    assert!(engine.run("a").await);
    assert_eq!(say.words(), words(&[&["hi"]]));
}

#[test]
fn call_step_forward_reference_fails_load() {
    let (mut engine, _) = engine();
    let err = engine
        .load_configuration(vec![
            MacroDefinition::new("a", vec![Step::call("b")]),
            MacroDefinition::new("b", vec![Step::new("say", ["hi"])]),
        ])
        .unwrap_err();
    assert_eq!(err, MacroError::UnknownMacro { name: "b".into() });
}

#[tokio::test]
async fn nonexistent_macro_is_noop() {
    let (engine, say) = engine();
    engine.execute("nonexistent");
    assert!(!engine.run("nonexistent").await);
    assert!(say.words().is_empty());
}

#[tokio::test(start_paused = true)]
async fn delay_orders_following_step() {
    let (mut engine, say) = engine();
    engine
        .load_configuration(vec![MacroDefinition::new(
            "wait",
            vec![
                Step::new("say", ["a"]),
                Step::delay(750),
                Step::new("say", ["b"]),
            ],
        )])
        .unwrap();

    assert!(engine.run("wait").await);
    let calls = say.calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert!(calls[1].1 - calls[0].1 >= Duration::from_millis(750));
}

#[test]
fn visible_names_skip_hidden_and_keep_order() {
    let (mut engine, _) = engine();
    engine
        .load_configuration(vec![
            MacroDefinition::new("hello", vec![Step::new("say", ["hello"])]),
            MacroDefinition::new("world", vec![Step::new("say", ["world"])]),
            MacroDefinition::new("!", vec![Step::new("say", ["!"])]).hidden(),
        ])
        .unwrap();
    assert_eq!(engine.visible_macro_names(), ["hello", "world"]);
}

#[test]
fn unknown_device_keeps_earlier_macros() {
    let (mut engine, _) = engine();
    let err = engine
        .load_configuration(vec![
            MacroDefinition::new("ok", vec![Step::new("say", ["fine"])]),
            MacroDefinition::new("dont care", vec![Step::new("reject", ["a"])]),
        ])
        .unwrap_err();
    assert_eq!(
        err,
        MacroError::UnknownDevice {
            device: "reject".into()
        }
    );
    assert!(engine.has_macro("ok"));
    assert!(!engine.has_macro("dont care"));
}

#[tokio::test(start_paused = true)]
async fn standard_devices_drive_ir_and_gpio() {
    let config = RemoteConfig::from_json_str(
        r#"{
            "macros": [
                {"name": "lamp on", "hidden": true, "sequence": [["gpio", "lamp", 1]]},
                {"name": "movie", "sequence": [["tv", "KEY_POWER"], ["delay", 500], ["call", "lamp on"]]}
            ],
            "gpios": [{"name": "lamp", "pin": 17}],
            "ir": {"post_send_delay_ms": 100}
        }"#,
    )
    .unwrap();

    let mut remotes = RemoteCommands::new();
    remotes.insert("tv".into(), vec!["KEY_POWER".into()]);
    let ir = Arc::new(LoggingIr::new(remotes.clone()));
    let pins = Arc::new(EmulatedGpio::new());
    let bank = Arc::new(GpioBank::new(pins.clone(), config.gpios.clone()));

    let mut engine = MacroEngine::new();
    register_standard_devices(&mut engine, ir.clone(), &remotes, &config.ir, Some(bank));
    engine.load_configuration(config.macros).unwrap();
    assert_eq!(engine.visible_macro_names(), ["movie"]);

    let start = Instant::now();
    assert!(engine.run("movie").await);
    assert!(start.elapsed() >= Duration::from_millis(600));

    let sent = ir.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].mode, SendMode::Once);
    assert_eq!(sent[0].command, "KEY_POWER");
    assert_eq!(pins.get(17), 1);
}

#[test]
fn unknown_ir_command_rejected_at_load() {
    let mut remotes = RemoteCommands::new();
    remotes.insert("tv".into(), vec!["KEY_POWER".into()]);
    let mut engine = MacroEngine::new();
    register_standard_devices(
        &mut engine,
        Arc::new(LoggingIr::new(remotes.clone())),
        &remotes,
        &Default::default(),
        Some(Arc::new(GpioBank::new(
            Arc::new(EmulatedGpio::new()),
            vec![GpioPinConfig {
                name: "lamp".into(),
                pin: 4,
                state: 0,
            }],
        ))),
    );

    let err = engine
        .load_configuration(vec![MacroDefinition::new(
            "bad",
            vec![Step::new("tv", ["KEY_EJECT"])],
        )])
        .unwrap_err();
    assert!(matches!(err, MacroError::InvalidArguments { ref device, .. } if device == "tv"));

    let err = engine
        .load_configuration(vec![MacroDefinition::new(
            "bad gpio",
            vec![Step::new("gpio", ["lamp", "2"])],
        )])
        .unwrap_err();
    assert!(matches!(err, MacroError::InvalidArguments { ref device, .. } if device == "gpio"));
}
