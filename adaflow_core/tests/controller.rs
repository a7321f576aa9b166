use adaflow_core::config::{EngineCfg, LookaheadCfg};
use adaflow_core::mocks::{
    FailingLoad, FailingTelemetry, ScriptedLoad, ScriptedTelemetry, SpyActuator,
};
use adaflow_core::{Engine, FaultKind, SubState, TickStatus};
use adaflow_traits::TelemetrySample;
use adaflow_traits::clock::test_clock::TestClock;
use rstest::rstest;
use std::collections::BTreeMap;
use std::time::Duration;

fn material(
    flow_k: f32,
    flow_gate: f32,
    max_boost: f32,
    ramp_rise: f32,
    ramp_fall: f32,
) -> adaflow_config::MaterialCfg {
    adaflow_config::MaterialCfg {
        base_temp: 210.0,
        max_temp: 250.0,
        flow_k,
        speed_k: 0.0,
        max_boost,
        flow_gate,
        pa_boost_k: 0.001,
        ramp_rise,
        ramp_fall,
        default_pa: 0.05,
        smoothing: 1.0,
    }
}

/// Telemetry sample carrying `flow` mm³/s as an extruder velocity.
fn sample(flow: f32, speed: f32, duty: f32, temp: f32, z: f32) -> TelemetrySample {
    TelemetrySample {
        extruder_velocity: flow / LookaheadCfg::default().filament_area(),
        toolhead_velocity: speed,
        heater_duty: duty,
        hotend_temp: temp,
        z_height: z,
        fan_duty: 0.0,
    }
}

fn build(
    telemetry: ScriptedTelemetry,
    mat: adaflow_config::MaterialCfg,
    cfg: EngineCfg,
    clock: &TestClock,
) -> (Engine, SpyActuator) {
    let spy = SpyActuator::new();
    let mut materials = BTreeMap::new();
    materials.insert("test".to_string(), mat);
    let engine = Engine::builder()
        .with_telemetry(telemetry)
        .with_actuator(spy.clone())
        .with_material("test")
        .with_materials(materials)
        .with_cfg(cfg)
        .with_clock(Box::new(clock.clone()))
        .build()
        .expect("engine build");
    (engine, spy)
}

fn tick(engine: &mut Engine, clock: &TestClock) -> TickStatus {
    clock.advance(Duration::from_secs(1));
    engine.tick().expect("tick")
}

fn report(status: TickStatus) -> adaflow_core::TickReport {
    match status {
        TickStatus::Active(r) => r,
        other => panic!("expected Active tick, got {other:?}"),
    }
}

#[rstest]
fn boost_follows_flow_above_gate() {
    // flow_gate=10, flow_k=1.0, base=210, max_boost=30, effective_flow=18
    // -> raw_boost 8.0 -> after full ramp target_temp 218.
    let clock = TestClock::new();
    let (mut engine, _spy) = build(
        ScriptedTelemetry::constant(sample(18.0, 50.0, 0.5, 215.0, 5.0)),
        material(1.0, 10.0, 30.0, 100.0, 50.0),
        EngineCfg::default(),
        &clock,
    );
    engine.start(None).expect("start");
    let r = report(tick(&mut engine, &clock));
    assert!((r.boost - 8.0).abs() < 0.01, "boost {}", r.boost);
    assert!((r.target_temp - 218.0).abs() < 0.01, "target {}", r.target_temp);
    assert!((r.pressure_advance - 0.042).abs() < 1e-4);
    assert!(r.fault.is_none());
}

#[rstest]
fn first_layer_suppresses_boost() {
    let clock = TestClock::new();
    let (mut engine, _spy) = build(
        ScriptedTelemetry::constant(sample(18.0, 50.0, 0.5, 210.0, 0.2)),
        material(1.0, 10.0, 30.0, 100.0, 50.0),
        EngineCfg::default(),
        &clock,
    );
    engine.start(None).expect("start");
    let r = report(tick(&mut engine, &clock));
    assert_eq!(r.boost, 0.0);
    assert_eq!(r.target_temp, 210.0);
}

#[rstest]
fn boost_is_slew_limited_both_ways() {
    let clock = TestClock::new();
    // Step the flow up, then away; ramps are 2.0 up / 0.5 down per second.
    let mut samples = vec![sample(18.0, 50.0, 0.5, 212.0, 5.0); 3];
    samples.extend(vec![sample(0.0, 50.0, 0.5, 212.0, 5.0); 3]);
    let (mut engine, _spy) = build(
        ScriptedTelemetry::new(samples),
        material(1.0, 10.0, 30.0, 2.0, 0.5),
        EngineCfg::default(),
        &clock,
    );
    engine.start(None).expect("start");
    let mut prev = 0.0_f32;
    for expected in [2.0, 4.0, 6.0, 5.5, 5.0, 4.5] {
        let r = report(tick(&mut engine, &clock));
        assert!((r.boost - expected).abs() < 0.01, "boost {}", r.boost);
        assert!((r.boost - prev).abs() <= 2.0 + 1e-3);
        prev = r.boost;
    }
}

#[rstest]
fn undertemp_halves_boost() {
    let clock = TestClock::new();
    let mut cfg = EngineCfg::default();
    // Keep the governor out of the way for this scenario.
    cfg.governor.base_flow_mm3s = 1_000.0;
    cfg.governor.temp_deficit_c = 100.0;
    let samples = vec![
        sample(18.0, 50.0, 0.5, 215.0, 5.0),
        sample(18.0, 50.0, 0.5, 190.0, 5.0),
    ];
    let (mut engine, _spy) = build(
        ScriptedTelemetry::new(samples),
        material(1.0, 10.0, 30.0, 100.0, 50.0),
        cfg,
        &clock,
    );
    engine.start(None).expect("start");
    let healthy = report(tick(&mut engine, &clock));
    assert!((healthy.boost - 8.0).abs() < 0.01);
    let cold = report(tick(&mut engine, &clock));
    assert_eq!(cold.fault, Some(FaultKind::ThermalUndertemp));
    assert!((cold.boost - 4.0).abs() < 0.01, "boost {}", cold.boost);
}

#[rstest]
fn runaway_strikes_force_disable() {
    let clock = TestClock::new();
    let (mut engine, spy) = build(
        ScriptedTelemetry::constant(sample(18.0, 50.0, 0.5, 240.0, 5.0)),
        material(1.0, 10.0, 30.0, 100.0, 50.0),
        EngineCfg::default(),
        &clock,
    );
    engine.start(None).expect("start");
    // 240 > base(210) + runaway_delta(10): every tick is a strike.
    let first = report(tick(&mut engine, &clock));
    assert_eq!(first.fault, Some(FaultKind::ThermalRunaway));
    assert_eq!(first.boost, 0.0);
    assert_eq!(first.target_temp, 210.0);
    let _second = report(tick(&mut engine, &clock));
    // Third strike trips the fail-safe: tick reports Disabled.
    clock.advance(Duration::from_secs(1));
    assert!(matches!(engine.tick().expect("tick"), TickStatus::Disabled));
    assert!(!engine.status().enabled);
    // Fail-safe dropped the heater back to base.
    assert_eq!(spy.last_temperature(), Some(210.0));
    // Further ticks stay disabled.
    clock.advance(Duration::from_secs(1));
    assert!(matches!(engine.tick().expect("tick"), TickStatus::Disabled));
}

#[rstest]
fn governor_caps_effective_flow_in_tick() {
    let clock = TestClock::new();
    // duty 0.95 over threshold 0.85, 0.9 °C deficit: backoff 0.225 and the
    // 18 mm³/s request is capped to 0.775 * 20 = 15.5.
    let (mut engine, _spy) = build(
        ScriptedTelemetry::constant(sample(18.0, 50.0, 0.95, 209.1, 5.0)),
        material(1.0, 10.0, 30.0, 100.0, 50.0),
        EngineCfg::default(),
        &clock,
    );
    engine.start(None).expect("start");
    let r = report(tick(&mut engine, &clock));
    assert!((r.effective_flow - 15.5).abs() < 0.05, "flow {}", r.effective_flow);
    assert!((r.target_temp - 215.5).abs() < 0.05, "target {}", r.target_temp);
}

#[rstest]
fn stress_clamping_forces_accel_relief() {
    let clock = TestClock::new();
    // Predicate: speed > 120, flow < 6, duty > 0.75, constant height.
    let (mut engine, spy) = build(
        ScriptedTelemetry::constant(sample(2.4, 200.0, 0.8, 210.0, 5.0)),
        material(1.0, 10.0, 30.0, 100.0, 50.0),
        EngineCfg::default(),
        &clock,
    );
    engine.start(None).expect("start");
    // Score crosses activate (8.0) on tick 8; relief applies on tick 9.
    for _ in 0..8 {
        let r = report(tick(&mut engine, &clock));
        assert_eq!(r.accel_override, None);
    }
    let r = report(tick(&mut engine, &clock));
    assert_eq!(r.accel_override, Some(1_500.0));
    assert_eq!(spy.last_acceleration(), Some(1_500.0));
    assert_eq!(engine.status().sub_state, SubState::Normal);
}

#[rstest]
fn crash_spikes_throttle_next_three_layers() {
    let clock = TestClock::new();
    let low_flow = |z: f32| sample(2.4, 50.0, 0.5, 210.0, z);
    let samples = vec![
        low_flow(1.0),  // boundary; baseline load
        low_flow(1.0),  // spikes...
        low_flow(1.0),
        low_flow(1.0),
        low_flow(1.0),
        low_flow(1.25), // layer done: 4 spikes > 3 -> throttle
        low_flow(1.5),
        low_flow(1.75),
        low_flow(2.0), // third throttled layer complete -> restore
    ];
    let load = ScriptedLoad::new(500, [500, 400, 400, 400, 400, 500, 500, 500, 500]);
    let spy = SpyActuator::new();
    let mut materials = BTreeMap::new();
    materials.insert("test".to_string(), material(1.0, 10.0, 30.0, 100.0, 50.0));
    let mut engine = Engine::builder()
        .with_telemetry(ScriptedTelemetry::new(samples))
        .with_actuator(spy.clone())
        .with_material("test")
        .with_materials(materials)
        .with_clock(Box::new(clock.clone()))
        .with_load_sensor(load)
        .build()
        .expect("engine build");
    engine.start(None).expect("start");

    let mut factors = Vec::new();
    for _ in 0..9 {
        factors.push(report(tick(&mut engine, &clock)).speed_factor);
    }
    assert_eq!(
        factors,
        vec![1.0, 1.0, 1.0, 1.0, 1.0, 0.5, 0.5, 0.5, 1.0]
    );
    assert_eq!(spy.last_speed_factor(), Some(1.0));
    assert_eq!(engine.status().sub_state, SubState::Normal);
}

#[rstest]
fn unchanged_outputs_are_not_reissued() {
    let clock = TestClock::new();
    let (mut engine, spy) = build(
        ScriptedTelemetry::constant(sample(0.0, 10.0, 0.3, 210.0, 5.0)),
        material(1.0, 10.0, 30.0, 100.0, 50.0),
        EngineCfg::default(),
        &clock,
    );
    engine.start(None).expect("start");
    let _ = report(tick(&mut engine, &clock));
    let after_first = spy.calls().len();
    let _ = report(tick(&mut engine, &clock));
    assert_eq!(spy.calls().len(), after_first, "idempotent channels reissued");
}

#[rstest]
fn telemetry_failure_skips_tick() {
    let clock = TestClock::new();
    let spy = SpyActuator::new();
    let mut materials = BTreeMap::new();
    materials.insert("test".to_string(), material(1.0, 10.0, 30.0, 100.0, 50.0));
    let mut engine = Engine::builder()
        .with_telemetry(FailingTelemetry)
        .with_actuator(spy.clone())
        .with_material("test")
        .with_materials(materials)
        .with_clock(Box::new(clock.clone()))
        .build()
        .expect("engine build");
    engine.start(None).expect("start");
    clock.advance(Duration::from_secs(1));
    assert!(matches!(engine.tick().expect("tick"), TickStatus::Skipped));
    assert!(spy.calls().is_empty());
}

#[rstest]
fn dead_load_sensor_degrades_gracefully() {
    let clock = TestClock::new();
    let spy = SpyActuator::new();
    let mut materials = BTreeMap::new();
    materials.insert("test".to_string(), material(1.0, 10.0, 30.0, 100.0, 50.0));
    let mut engine = Engine::builder()
        .with_telemetry(ScriptedTelemetry::constant(sample(18.0, 50.0, 0.5, 215.0, 5.0)))
        .with_actuator(spy)
        .with_material("test")
        .with_materials(materials)
        .with_clock(Box::new(clock.clone()))
        .with_load_sensor(FailingLoad)
        .build()
        .expect("engine build");
    engine.start(None).expect("start");
    assert!(engine.status().has_load_sensor);
    // Flow-driven boost still works with the register gone.
    let r = report(tick(&mut engine, &clock));
    assert!((r.boost - 8.0).abs() < 0.01);
    assert!(!engine.status().has_load_sensor);
    assert!(engine.status().has_lookahead);
}
