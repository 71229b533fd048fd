//! Example: Drive the engine against a simulated controller.
//!
//! Run with: `RUST_LOG=debug cargo run --example poll_mock`
//!
//! Pass a TOML config path as the first argument to override the defaults.

use coex_sync::derived::{self, ChoiceKind};
use coex_sync::{
    DisplayMode, DisplayStateRecord, Engine, EngineConfig, EngineError, MockConnector, MockDevice,
    PresetRecord, RawPresets, RecordingSurface, ScreenParameters, Setting, Source,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // Initialize logging (optional)
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig {
            poll_interval_ms: 250,
            ..EngineConfig::for_address("127.0.0.1")
        },
    };

    // Simulated controller with two screens
    let device = MockDevice::new();
    device.set_sources(vec![Source::new("HDMI1"), Source::new("SDI")]);
    device.set_presets(RawPresets::Flat(vec![
        PresetRecord::new("Show", 1, true),
        PresetRecord::new("Break", 2, false),
    ]));
    device.set_display_parameters(vec![
        ScreenParameters {
            screen_id: "{A1}".into(),
            brightness: 0.5,
            color_temperature: 6500,
            gamma: 2.2,
        },
        ScreenParameters {
            screen_id: "{B2}".into(),
            brightness: 0.5,
            color_temperature: 6500,
            gamma: 2.2,
        },
    ]);
    device.set_display_state(DisplayStateRecord::from_codes(&[0, 0]));

    let surface = Arc::new(RecordingSurface::new());
    let mut engine = Engine::new(MockConnector::new(device.clone()), surface.clone());

    println!("Connecting to {}...", config.target_address);
    engine.configure(config).await?;
    println!("Status: {:?}", engine.status());
    println!(
        "Sources: {:?}",
        surface.latest_choices(ChoiceKind::Sources).unwrap_or_default()
    );

    // Change things on the device and watch them come back through polling
    engine.apply_setting(&Setting::brightness(80)?).await?;
    engine.apply_setting(&Setting::load_preset("Break")).await?;
    engine
        .apply_setting(&Setting::display_mode(DisplayMode::Blackout))
        .await?;
    tokio::time::sleep(Duration::from_secs(1)).await;

    for (name, value) in surface.latest_values() {
        println!("  {name} = {value}");
    }
    println!(
        "Active preset: {}",
        surface.latest_values()[derived::CURRENT_PRESET_VARIABLE]
    );
    println!(
        "{} cycles, {} publishes",
        engine.cycles_completed(),
        surface.calls().len()
    );

    engine.shutdown().await;
    Ok(())
}
