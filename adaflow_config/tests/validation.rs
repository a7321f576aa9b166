use adaflow_config::load_toml;
use rstest::rstest;

const SAMPLE: &str = r#"
[control]
tick_hz = 1
speed_threshold = 100.0

[lookahead]
window_ms = 2000
horizon_ms = 2000
filament_diameter_mm = 1.75

[governor]
duty_threshold = 0.85
backoff_k = 1.5

[materials.pla]
base_temp = 210.0
max_temp = 240.0
flow_boost_k = 1.2
speed_boost_k = 0.08
max_boost_limit = 25.0
flow_gate = 8.0
ramp_rise = 2.0
ramp_fall = 0.5
default_pa = 0.04
flow_smoothing = 0.3
"#;

#[rstest]
fn sample_config_parses_and_validates() {
    let cfg = load_toml(SAMPLE).expect("parse");
    cfg.validate().expect("validate");
    let pla = cfg.materials.get("pla").expect("pla profile");
    // Legacy auto_flow aliases map onto the typed fields.
    assert!((pla.flow_k - 1.2).abs() < 1e-6);
    assert!((pla.speed_k - 0.08).abs() < 1e-6);
    assert!((pla.max_boost - 25.0).abs() < 1e-6);
    assert!((pla.smoothing - 0.3).abs() < 1e-6);
    assert_eq!(cfg.control.tick_hz, 1);
}

#[rstest]
fn empty_config_is_all_defaults() {
    let cfg = load_toml("").expect("parse");
    cfg.validate().expect("validate");
    assert_eq!(cfg.control.tick_hz, 1);
    assert_eq!(cfg.lookahead.window_ms, 2_000);
    assert!(cfg.materials.is_empty());
}

#[rstest]
#[case("[control]\ntick_hz = 0\n", "tick_hz")]
#[case("[lookahead]\nwindow_ms = 0\n", "window_ms")]
#[case("[lookahead]\nfilament_diameter_mm = -1.0\n", "filament_diameter_mm")]
#[case("[governor]\nduty_threshold = 1.5\n", "duty_threshold")]
#[case("[stress]\nscore_decay = 1.2\n", "score_decay")]
#[case(
    "[stress]\nactivate_score = 2.0\ndeactivate_score = 5.0\n",
    "deactivate_score"
)]
#[case("[crash]\nthrottle_factor = 1.5\n", "throttle_factor")]
#[case("[safety]\nrunaway_strikes = 0\n", "runaway_strikes")]
#[case("[learning]\nwindow = 0\n", "window")]
fn invalid_sections_are_rejected(#[case] toml: &str, #[case] field: &str) {
    let cfg = load_toml(toml).expect("parse");
    let err = cfg.validate().unwrap_err();
    assert!(
        err.to_string().contains(field),
        "error should name {field}: {err}"
    );
}

#[rstest]
#[case("[materials.bad]\nbase_temp = 0.0\n")]
#[case("[materials.bad]\nbase_temp = 250.0\nmax_temp = 210.0\n")]
#[case("[materials.bad]\nramp_rise = 0.0\n")]
#[case("[materials.bad]\ndefault_pa = -0.5\n")]
#[case("[materials.bad]\nflow_smoothing = 2.0\n")]
fn invalid_material_profiles_are_rejected(#[case] toml: &str) {
    let cfg = load_toml(toml).expect("parse");
    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("materials.bad"), "{err}");
}
