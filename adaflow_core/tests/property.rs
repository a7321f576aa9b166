use adaflow_core::config::{EngineCfg, LookaheadCfg};
use adaflow_core::mocks::{ScriptedTelemetry, SpyActuator};
use adaflow_core::{Engine, TickStatus};
use adaflow_traits::TelemetrySample;
use adaflow_traits::clock::test_clock::TestClock;
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::time::Duration;

const BASE_TEMP: f32 = 210.0;
const MAX_TEMP: f32 = 240.0;
const MAX_BOOST: f32 = 25.0;
const RAMP_RISE: f32 = 2.0;
const RAMP_FALL: f32 = 0.5;

fn build(samples: Vec<TelemetrySample>, clock: &TestClock) -> Engine {
    let mut materials = BTreeMap::new();
    materials.insert(
        "test".to_string(),
        adaflow_config::MaterialCfg {
            base_temp: BASE_TEMP,
            max_temp: MAX_TEMP,
            flow_k: 1.2,
            speed_k: 0.08,
            max_boost: MAX_BOOST,
            flow_gate: 8.0,
            pa_boost_k: 0.001,
            ramp_rise: RAMP_RISE,
            ramp_fall: RAMP_FALL,
            default_pa: 0.05,
            smoothing: 1.0,
        },
    );
    Engine::builder()
        .with_telemetry(ScriptedTelemetry::new(samples))
        .with_actuator(SpyActuator::new())
        .with_material("test")
        .with_materials(materials)
        .with_cfg(EngineCfg::default())
        .with_clock(Box::new(clock.clone()))
        .build()
        .expect("engine build")
}

prop_compose! {
    fn sample_strategy()(
        flow in 0.0_f32..40.0,
        speed in 0.0_f32..300.0,
        duty in 0.0_f32..1.0,
        temp in 150.0_f32..260.0,
        z in 0.0_f32..30.0,
    ) -> TelemetrySample {
        TelemetrySample {
            extruder_velocity: flow / LookaheadCfg::default().filament_area(),
            toolhead_velocity: speed,
            heater_duty: duty,
            hotend_temp: temp,
            z_height: z,
            fan_duty: 0.0,
        }
    }
}

proptest! {
    #[test]
    fn tick_invariants_hold_for_arbitrary_telemetry(
        samples in prop::collection::vec(sample_strategy(), 1..40)
    ) {
        let clock = TestClock::new();
        let mut engine = build(samples.clone(), &clock);
        engine.start(None).expect("start");

        let mut prev_boost = 0.0_f32;
        for _ in 0..samples.len() {
            clock.advance(Duration::from_secs(1));
            match engine.tick().expect("tick") {
                TickStatus::Active(r) => {
                    // base_temp <= target <= max_temp
                    prop_assert!(r.target_temp >= BASE_TEMP - 1e-3);
                    prop_assert!(r.target_temp <= MAX_TEMP + 1e-3);
                    // 0 <= boost <= max_boost
                    prop_assert!(r.boost >= 0.0);
                    prop_assert!(r.boost <= MAX_BOOST + 1e-3);
                    // PA never negative
                    prop_assert!(r.pressure_advance >= 0.0);
                    // fan stays inside its configured band
                    prop_assert!((0.2..=1.0).contains(&r.fan_target));
                    // Slew bound holds on every fault-free tick; the
                    // thermal interlocks may cut faster by design.
                    if r.fault.is_none() {
                        prop_assert!(
                            (r.boost - prev_boost).abs()
                                <= RAMP_RISE.max(RAMP_FALL) + 1e-3
                        );
                    }
                    prev_boost = r.boost;
                }
                // Fail-safe tripped (repeated runaway): stays disabled.
                TickStatus::Disabled => break,
                TickStatus::Skipped => {}
            }
        }
    }
}
