#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas for the adaptive flow controller.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Material profiles accept the legacy `auto_flow` gain aliases
//!   (`flow_boost_k`, `speed_boost_k`, `max_boost_limit`, `flow_smoothing`)
//!   so existing tuning carries over unchanged.

use serde::Deserialize;
use std::collections::BTreeMap;

/// Control loop cadence and smart-cooling parameters.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ControlCfg {
    /// Tick rate of the control loop in Hz.
    pub tick_hz: u32,
    /// Toolhead speed above which the speed term contributes boost (mm/s).
    pub speed_threshold: f32,
    /// Extra boost added while the toolhead is accelerating hard (°C).
    pub accel_kick: f32,
    /// Speed increase per tick that counts as "accelerating hard" (mm/s).
    pub accel_kick_threshold: f32,
    /// Z height at or below which the first-layer flag is set (mm).
    pub first_layer_z: f32,
    /// Part-cooling fan floor, 0.0..=1.0.
    pub fan_min: f32,
    /// Part-cooling fan ceiling, 0.0..=1.0.
    pub fan_max: f32,
    /// Fan duty added per mm³/s of effective flow.
    pub fan_flow_k: f32,
    /// Layers completing faster than this get full cooling (s).
    pub short_layer_s: f32,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            tick_hz: 1,
            speed_threshold: 100.0,
            accel_kick: 2.0,
            accel_kick_threshold: 40.0,
            first_layer_z: 0.45,
            fan_min: 0.2,
            fan_max: 1.0,
            fan_flow_k: 0.04,
            short_layer_s: 15.0,
        }
    }
}

/// Lookahead buffer parameters.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LookaheadCfg {
    /// Rolling buffer window (ms); segments expire after this.
    pub window_ms: u64,
    /// Prediction horizon (ms).
    pub horizon_ms: u64,
    /// Floor clamp for a parsed move's duration (ms).
    pub min_move_ms: u64,
    /// Filament diameter used for the volumetric conversion (mm).
    pub filament_diameter_mm: f32,
}

impl Default for LookaheadCfg {
    fn default() -> Self {
        Self {
            window_ms: 2_000,
            horizon_ms: 2_000,
            min_move_ms: 2,
            filament_diameter_mm: 1.75,
        }
    }
}

/// Heater capacity governor parameters.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GovernorCfg {
    /// Sustainable flow at reference temperature with fan off (mm³/s).
    pub base_flow_mm3s: f32,
    /// Heater duty above which the heater counts as struggling, 0.0..=1.0.
    pub duty_threshold: f32,
    /// Target-minus-actual deficit that counts as struggling (°C).
    pub temp_deficit_c: f32,
    /// Gain applied to duty excess when computing backoff.
    pub backoff_k: f32,
    /// Sustainable-flow penalty per unit of fan duty.
    pub fan_penalty_k: f32,
    /// Sustainable-flow penalty per °C of base temperature above reference.
    pub temp_penalty_k: f32,
    /// Reference base temperature for the temp penalty (°C).
    pub reference_temp_c: f32,
}

impl Default for GovernorCfg {
    fn default() -> Self {
        Self {
            base_flow_mm3s: 20.0,
            duty_threshold: 0.85,
            temp_deficit_c: 6.0,
            backoff_k: 1.5,
            fan_penalty_k: 0.25,
            temp_penalty_k: 0.004,
            reference_temp_c: 210.0,
        }
    }
}

/// Stress learner (per-height acceleration relief) parameters.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StressCfg {
    /// Toolhead speed component of the stress predicate (mm/s).
    pub speed_thresh: f32,
    /// Flow must be below this for the predicate to hold (mm³/s).
    pub flow_max: f32,
    /// Heater duty component of the stress predicate, 0.0..=1.0.
    pub pwm_thresh: f32,
    /// Score added per stressed tick.
    pub score_inc: f32,
    /// Multiplicative decay per unstressed tick, 0.0..1.0.
    pub score_decay: f32,
    /// Score at which clamping engages.
    pub activate_score: f32,
    /// Score at which clamping releases.
    pub deactivate_score: f32,
    /// Height bin size (mm).
    pub bin_height_mm: f32,
    /// Acceleration applied while clamping (mm/s²).
    pub accel_relief: f32,
}

impl Default for StressCfg {
    fn default() -> Self {
        Self {
            speed_thresh: 120.0,
            flow_max: 6.0,
            pwm_thresh: 0.75,
            score_inc: 1.0,
            score_decay: 0.92,
            activate_score: 8.0,
            deactivate_score: 2.0,
            bin_height_mm: 1.0,
            accel_relief: 1_500.0,
        }
    }
}

/// Crash/blob detector parameters.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CrashCfg {
    /// Load-delta changes smaller than this are sensor noise.
    pub deadband: i32,
    /// Load delta (baseline − current) counted as a spike.
    pub crash_threshold: i32,
    /// Minimum filament speed for spike counting (mm/s).
    pub min_filament_speed: f32,
    /// Spikes per layer beyond which recovery engages.
    pub spike_limit: u32,
    /// Layers to hold the recovery throttle.
    pub throttle_layers: u32,
    /// Speed factor applied during recovery.
    pub throttle_factor: f32,
    /// Z rise that counts as a layer change (mm).
    pub min_layer_dz: f32,
}

impl Default for CrashCfg {
    fn default() -> Self {
        Self {
            deadband: 8,
            crash_threshold: 60,
            min_filament_speed: 0.5,
            spike_limit: 3,
            throttle_layers: 3,
            throttle_factor: 0.5,
            min_layer_dz: 0.05,
        }
    }
}

/// Thermal safety interlocks.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SafetyCfg {
    /// Actual above target by more than this is a runaway tick (°C).
    pub runaway_delta_c: f32,
    /// Actual below target by more than this is an undertemp tick (°C).
    pub undertemp_delta_c: f32,
    /// Consecutive runaway ticks that force-disable the controller.
    pub runaway_strikes: u32,
}

impl Default for SafetyCfg {
    fn default() -> Self {
        Self {
            runaway_delta_c: 10.0,
            undertemp_delta_c: 12.0,
            runaway_strikes: 3,
        }
    }
}

/// Self-learning of the flow gain from persistent thermal error.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LearningCfg {
    /// Samples per learning window.
    pub window: u32,
    /// Gain nudge applied per window with persistent error.
    pub learning_rate: f32,
    /// Bound on the accumulated adjustment, ± around the profile gain.
    pub max_adjust: f32,
    /// Mean error magnitude below which no nudge is applied (°C).
    pub error_deadband_c: f32,
}

impl Default for LearningCfg {
    fn default() -> Self {
        Self {
            window: 50,
            learning_rate: 0.02,
            max_adjust: 0.25,
            error_deadband_c: 1.0,
        }
    }
}

/// Multi-object temperature wait.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WaitCfg {
    /// Temperature band considered "arrived" (°C).
    pub tolerance_c: f32,
}

impl Default for WaitCfg {
    fn default() -> Self {
        Self { tolerance_c: 3.0 }
    }
}

/// Per-session CSV telemetry log, consumed by the offline analyzer.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SessionLogCfg {
    /// Directory for session CSVs; absent disables the log.
    pub dir: Option<String>,
    /// Buffered rows are flushed every this many ticks.
    pub flush_every: Option<u32>,
}

/// CLI-consumed logging settings.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
}

/// One material's tuning profile as written in TOML.
///
/// Field aliases accept the original `auto_flow.cfg` variable names.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MaterialCfg {
    /// Session base temperature (°C).
    pub base_temp: f32,
    /// Hard ceiling for the boosted target (°C).
    pub max_temp: f32,
    /// Boost per mm³/s of flow above the gate (°C·s/mm³).
    #[serde(alias = "flow_boost_k")]
    pub flow_k: f32,
    /// Boost per mm/s of toolhead speed above the threshold.
    #[serde(alias = "speed_boost_k")]
    pub speed_k: f32,
    /// Boost ceiling (°C).
    #[serde(alias = "max_boost_limit")]
    pub max_boost: f32,
    /// Flow below this contributes no boost (mm³/s).
    pub flow_gate: f32,
    /// Pressure-advance reduction per °C of boost.
    pub pa_boost_k: f32,
    /// Boost slew when rising (°C/s).
    pub ramp_rise: f32,
    /// Boost slew when falling (°C/s); deliberately slower than the rise.
    pub ramp_fall: f32,
    /// Pressure advance at zero boost.
    pub default_pa: f32,
    /// EMA factor for the smoothed flow estimate, (0.0, 1.0].
    #[serde(alias = "flow_smoothing")]
    pub smoothing: f32,
}

impl Default for MaterialCfg {
    fn default() -> Self {
        Self {
            base_temp: 210.0,
            max_temp: 250.0,
            flow_k: 1.2,
            speed_k: 0.08,
            max_boost: 30.0,
            flow_gate: 8.0,
            pa_boost_k: 0.0008,
            ramp_rise: 2.0,
            ramp_fall: 0.5,
            default_pa: 0.04,
            smoothing: 0.3,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub control: ControlCfg,
    pub lookahead: LookaheadCfg,
    pub governor: GovernorCfg,
    pub stress: StressCfg,
    pub crash: CrashCfg,
    pub safety: SafetyCfg,
    pub learning: LearningCfg,
    pub wait: WaitCfg,
    pub session_log: SessionLogCfg,
    pub logging: Logging,
    /// Material profiles keyed by name (`[materials.pla]`, ...).
    pub materials: BTreeMap<String, MaterialCfg>,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    /// Validate cross-field constraints; returns the first violation found.
    pub fn validate(&self) -> eyre::Result<()> {
        if self.control.tick_hz == 0 {
            eyre::bail!("control.tick_hz must be > 0");
        }
        if !(0.0..=1.0).contains(&self.control.fan_min)
            || !(0.0..=1.0).contains(&self.control.fan_max)
            || self.control.fan_min > self.control.fan_max
        {
            eyre::bail!("control.fan_min/fan_max must satisfy 0 <= min <= max <= 1");
        }
        if self.lookahead.window_ms == 0 || self.lookahead.horizon_ms == 0 {
            eyre::bail!("lookahead.window_ms and horizon_ms must be > 0");
        }
        if self.lookahead.filament_diameter_mm <= 0.0 {
            eyre::bail!("lookahead.filament_diameter_mm must be > 0");
        }
        if !(0.0..=1.0).contains(&self.governor.duty_threshold) {
            eyre::bail!("governor.duty_threshold must be within 0..=1");
        }
        if self.governor.base_flow_mm3s <= 0.0 {
            eyre::bail!("governor.base_flow_mm3s must be > 0");
        }
        if !(0.0..1.0).contains(&self.stress.score_decay) {
            eyre::bail!("stress.score_decay must be within 0..1");
        }
        if self.stress.deactivate_score >= self.stress.activate_score {
            eyre::bail!("stress.deactivate_score must be below activate_score");
        }
        if self.stress.bin_height_mm <= 0.0 {
            eyre::bail!("stress.bin_height_mm must be > 0");
        }
        if !(0.0..=1.0).contains(&self.crash.throttle_factor) {
            eyre::bail!("crash.throttle_factor must be within 0..=1");
        }
        if self.safety.runaway_strikes == 0 {
            eyre::bail!("safety.runaway_strikes must be > 0");
        }
        if self.learning.window == 0 {
            eyre::bail!("learning.window must be > 0");
        }
        for (name, m) in &self.materials {
            if m.base_temp <= 0.0 || m.max_temp < m.base_temp {
                eyre::bail!("materials.{name}: need 0 < base_temp <= max_temp");
            }
            if m.max_boost < 0.0 {
                eyre::bail!("materials.{name}: max_boost must be >= 0");
            }
            if m.ramp_rise <= 0.0 || m.ramp_fall <= 0.0 {
                eyre::bail!("materials.{name}: ramp_rise and ramp_fall must be > 0");
            }
            if m.default_pa < 0.0 {
                eyre::bail!("materials.{name}: default_pa must be >= 0");
            }
            if !(0.0..=1.0).contains(&m.smoothing) {
                eyre::bail!("materials.{name}: smoothing must be within 0..=1");
            }
        }
        Ok(())
    }
}
