use adaflow_core::config::EngineCfg;
use adaflow_core::mocks::{ScriptedTelemetry, SpyActuator};
use adaflow_core::{Command, Engine, Session};
use adaflow_traits::TelemetrySample;
use std::collections::BTreeMap;
use std::time::Duration;

fn engine(tick_hz: u32, temp: f32) -> Engine {
    let mut cfg = EngineCfg::default();
    cfg.control.tick_hz = tick_hz;
    let mut materials = BTreeMap::new();
    materials.insert("pla".to_string(), adaflow_config::MaterialCfg::default());
    Engine::builder()
        .with_telemetry(ScriptedTelemetry::constant(TelemetrySample {
            hotend_temp: temp,
            heater_duty: 0.4,
            z_height: 5.0,
            ..TelemetrySample::default()
        }))
        .with_actuator(SpyActuator::new())
        .with_material("pla")
        .with_materials(materials)
        .with_cfg(cfg)
        .build()
        .expect("engine build")
}

#[test]
fn session_ticks_and_sees_tapped_commands() {
    let session = Session::spawn(engine(50, 210.0));
    session
        .execute(Command::Start { material: None })
        .expect("start");

    // A long extruding move keeps the lookahead window populated for the
    // whole test.
    let tap = session.tap();
    tap.publish_line("M83");
    tap.publish_line("G1 X500 E20.0 F3000");

    std::thread::sleep(Duration::from_millis(300));
    let status = session.execute(Command::Status).expect("status");
    let ticks: u64 = status
        .fields
        .get("tick_count")
        .expect("tick_count field")
        .parse()
        .expect("numeric tick count");
    assert!(ticks > 0, "session never ticked");
    let predicted: f32 = status
        .fields
        .get("predicted_flow")
        .expect("predicted_flow field")
        .parse()
        .expect("numeric predicted flow");
    assert!(predicted > 0.0, "lookahead never saw the tapped move");

    session.execute(Command::Stop).expect("stop");
    drop(session);
}

#[test]
fn disable_now_takes_effect_against_running_session() {
    let session = Session::spawn(engine(50, 210.0));
    session
        .execute(Command::Start { material: None })
        .expect("start");
    session.disable_now();
    std::thread::sleep(Duration::from_millis(100));
    let status = session.execute(Command::Status).expect("status");
    assert_eq!(
        status.fields.get("enabled").map(String::as_str),
        Some("false")
    );
}

#[test]
fn temp_wait_unblocks_once_ticks_publish_temperature() {
    let session = Session::spawn(engine(100, 209.5));
    session
        .execute(Command::Start { material: None })
        .expect("start");
    // Blocks until the first tick publishes 209.5, which is inside the
    // default 3 °C tolerance of 210.
    session.temp_wait().wait_for(210.0, 3.0);
    session.execute(Command::Stop).expect("stop");
}
