use coex_sync::derived::{self, ChoiceKind};
use coex_sync::{
    ConnectionStatus, DeviceError, DisplayStateRecord, Engine, EngineConfig, EngineError,
    FailureKind, LifecycleState, MockConnector, MockDevice, PresetRecord, RawPresets,
    RecordingSurface, Resource, ScreenParameters, Setting, Source,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

type TestEngine = Engine<MockConnector, RecordingSurface>;

fn setup() -> (MockDevice, Arc<RecordingSurface>, TestEngine) {
    let _ = env_logger::builder().is_test(true).try_init();
    let device = MockDevice::new();
    let surface = Arc::new(RecordingSurface::new());
    let engine = Engine::new(MockConnector::new(device.clone()), surface.clone());
    (device, surface, engine)
}

fn config() -> EngineConfig {
    EngineConfig::for_address("192.168.0.10")
}

fn screens(brightness: f64) -> Vec<ScreenParameters> {
    vec![ScreenParameters {
        screen_id: "A".into(),
        brightness,
        color_temperature: 6500,
        gamma: 2.2,
    }]
}

#[tokio::test(start_paused = true)]
async fn test_bootstrap_publishes_sources_and_default_preset_name() {
    let (device, surface, mut engine) = setup();
    device.set_sources(vec![Source::new("HDMI1")]);

    engine.configure(config()).await.unwrap();

    assert_eq!(engine.state(), LifecycleState::Ready);
    assert!(engine.is_polling());
    assert_eq!(
        surface.statuses(),
        vec![ConnectionStatus::Connecting, ConnectionStatus::Ready]
    );
    assert_eq!(
        surface.latest_choices(ChoiceKind::Sources),
        Some(vec!["HDMI1".to_string()])
    );
    assert_eq!(surface.latest_choices(ChoiceKind::Presets), Some(vec![]));
    assert_eq!(
        surface.latest_values()[derived::CURRENT_PRESET_VARIABLE],
        derived::NOT_ACTIVATED
    );
    assert_eq!(
        engine.connector().last_target(),
        Some(("192.168.0.10".parse().unwrap(), 8001))
    );

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_unchanged_parameters_are_not_republished() {
    let (device, surface, mut engine) = setup();
    device.set_display_parameters(screens(0.5));
    engine.configure(config()).await.unwrap();

    // let the immediate first cycle land
    sleep(Duration::from_millis(10)).await;
    assert_eq!(surface.latest_values()["screen_0_brightness"], "50%");
    surface.clear();

    sleep(Duration::from_millis(2000)).await;
    assert!(device.call_count(Resource::DisplayParameters) >= 4);
    assert_eq!(surface.value_publish_count(), 0);
    assert_eq!(surface.definition_publish_count(), 0);

    engine
        .apply_setting(&Setting::brightness(75).unwrap())
        .await
        .unwrap();
    sleep(Duration::from_millis(600)).await;
    assert_eq!(surface.value_publish_count(), 1);
    assert_eq!(surface.latest_values()["screen_0_brightness"], "75%");

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_active_preset_follows_device() {
    let (device, surface, mut engine) = setup();
    device.set_presets(RawPresets::Flat(vec![
        PresetRecord::new("Show", 1, true),
        PresetRecord::new("Break", 2, false),
    ]));
    engine.configure(config()).await.unwrap();
    assert_eq!(engine.snapshot().derived.active_preset_name, "Show");

    engine
        .apply_setting(&Setting::load_preset("Break"))
        .await
        .unwrap();
    sleep(Duration::from_millis(600)).await;

    assert_eq!(engine.snapshot().derived.active_preset_name, "Break");
    assert_eq!(
        surface.latest_values()[derived::CURRENT_PRESET_VARIABLE],
        "Break"
    );

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_polling_failure_keeps_ready_status() {
    let (device, surface, mut engine) = setup();
    device.set_display_parameters(screens(0.5));
    device.set_display_state(DisplayStateRecord::from_codes(&[1]));
    engine.configure(config()).await.unwrap();

    // let the immediate first cycle land
    sleep(Duration::from_millis(10)).await;
    assert_eq!(
        surface.latest_values()[derived::DISPLAY_STATE_VARIABLE],
        "Blackout"
    );
    surface.clear();

    device.fail(Resource::DisplayState, DeviceError::Timeout(500));
    device.set_display_parameters(screens(0.8));
    sleep(Duration::from_millis(600)).await;

    // only the display parameter change was published
    assert_eq!(surface.value_publish_count(), 1);
    let values = surface.latest_values();
    assert_eq!(values["screen_0_brightness"], "80%");
    assert_eq!(values[derived::DISPLAY_STATE_VARIABLE], "Blackout");
    assert_eq!(
        engine.snapshot().display_state,
        Some(DisplayStateRecord::from_codes(&[1]))
    );

    sleep(Duration::from_millis(600)).await;
    assert_eq!(surface.value_publish_count(), 1);
    assert_eq!(engine.state(), LifecycleState::Ready);
    assert!(surface.statuses().is_empty());
    assert!(device.call_count(Resource::DisplayState) >= 3);

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_reconfigure_stops_previous_poll_loop() {
    let (device, surface, mut engine) = setup();
    engine.configure(config()).await.unwrap();
    sleep(Duration::from_millis(1200)).await;

    let err = engine
        .configure(EngineConfig::for_address("not-an-ip"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAddress(_)));
    assert_eq!(engine.state(), LifecycleState::Failed(FailureKind::BadConfig));
    assert!(device.is_closed());

    let calls = device.total_calls();
    sleep(Duration::from_millis(5000)).await;
    assert_eq!(device.total_calls(), calls);
    assert_eq!(surface.last_status(), Some(ConnectionStatus::BadConfig));

    engine.configure(config()).await.unwrap();
    assert_eq!(engine.state(), LifecycleState::Ready);
    assert_eq!(engine.connector().connect_count(), 2);

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_bootstrap_failure_registers_empty_capabilities() {
    let (device, surface, mut engine) = setup();
    device.set_sources(vec![Source::new("HDMI1")]);
    device.fail(Resource::Presets, DeviceError::Timeout(500));

    let err = engine.configure(config()).await.unwrap_err();

    assert!(matches!(
        err,
        EngineError::Bootstrap {
            resource: Resource::Presets,
            ..
        }
    ));
    assert_eq!(
        engine.state(),
        LifecycleState::Failed(FailureKind::Connection)
    );
    assert_eq!(
        surface.last_status(),
        Some(ConnectionStatus::ConnectionFailure)
    );
    assert_eq!(surface.latest_choices(ChoiceKind::Sources), Some(vec![]));
    assert_eq!(surface.latest_choices(ChoiceKind::Presets), Some(vec![]));
    assert!(engine.snapshot().sources.is_none());
    assert!(device.is_closed());
    assert!(!engine.is_polling());

    let calls = device.total_calls();
    sleep(Duration::from_millis(2000)).await;
    assert_eq!(device.total_calls(), calls);
}

#[tokio::test(start_paused = true)]
async fn test_connect_failure_reports_connection_failure() {
    let (device, surface, mut engine) = setup();
    engine
        .connector()
        .fail_with(Some(DeviceError::Unreachable {
            address: "192.168.0.10:8001".into(),
            reason: "no route to host".into(),
        }));

    let err = engine.configure(config()).await.unwrap_err();
    assert!(matches!(err, EngineError::Connect(_)));
    assert_eq!(
        surface.statuses(),
        vec![
            ConnectionStatus::Connecting,
            ConnectionStatus::ConnectionFailure
        ]
    );
    assert_eq!(device.total_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_missing_address_never_connects() {
    let (device, surface, mut engine) = setup();

    let err = engine.configure(EngineConfig::default()).await.unwrap_err();

    assert!(matches!(err, EngineError::MissingAddress));
    assert_eq!(engine.connector().connect_count(), 0);
    assert_eq!(device.total_calls(), 0);
    assert_eq!(surface.statuses(), vec![ConnectionStatus::BadConfig]);
    assert_eq!(surface.latest_choices(ChoiceKind::Screens), Some(vec![]));
}

#[tokio::test(start_paused = true)]
async fn test_close_error_does_not_block_teardown() {
    let (device, _surface, mut engine) = setup();
    device.fail_close(true);
    engine.configure(config()).await.unwrap();

    engine.shutdown().await;

    assert_eq!(engine.state(), LifecycleState::Disconnected);
    assert!(!engine.is_polling());
    assert!(device.is_closed());

    engine.configure(config()).await.unwrap();
    assert_eq!(engine.state(), LifecycleState::Ready);
    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_in_flight_cycle() {
    let (device, _surface, mut engine) = setup();
    device.set_sources(vec![Source::new("SDI")]);
    device.set_latency(Duration::from_millis(300));
    engine.configure(config()).await.unwrap();

    // first cycle is now waiting on the device
    sleep(Duration::from_millis(100)).await;
    engine.shutdown().await;

    assert_eq!(engine.state(), LifecycleState::Disconnected);
    assert!(engine.snapshot().sources.is_none());

    let calls = device.total_calls();
    sleep(Duration::from_millis(2000)).await;
    assert_eq!(device.total_calls(), calls);
}

#[tokio::test(start_paused = true)]
async fn test_apply_setting_requires_connection() {
    let (device, _surface, mut engine) = setup();
    let setting = Setting::gamma(2.4).unwrap();

    assert!(matches!(
        engine.apply_setting(&setting).await,
        Err(EngineError::NotConnected)
    ));

    engine.configure(config()).await.unwrap();
    engine.apply_setting(&setting).await.unwrap();
    assert_eq!(device.applied_settings(), vec![setting.clone()]);

    device.reject_settings(true);
    assert!(matches!(
        engine.apply_setting(&setting).await,
        Err(EngineError::Device(DeviceError::Rejected(_)))
    ));

    engine.shutdown().await;
    assert!(matches!(
        engine.apply_setting(&setting).await,
        Err(EngineError::NotConnected)
    ));
}
