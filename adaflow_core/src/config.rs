//! Runtime configuration for the control engine.
//!
//! These are the structs the engine consumes; they are separate from the
//! TOML-deserialized schema in `adaflow_config`, with `From` conversions
//! below. Defaults here are the engine's authoritative fallbacks.

/// Control loop cadence and smart-cooling parameters.
#[derive(Debug, Clone)]
pub struct ControlCfg {
    /// Tick rate in Hz.
    pub tick_hz: u32,
    /// Toolhead speed above which the speed term contributes boost (mm/s).
    pub speed_threshold: f32,
    /// Extra boost while the toolhead speed is rising fast (°C).
    pub accel_kick: f32,
    /// Per-tick speed increase that counts as a hard acceleration (mm/s).
    pub accel_kick_threshold: f32,
    /// First-layer flag is set while Z is at or below this (mm).
    pub first_layer_z: f32,
    /// Fan duty floor.
    pub fan_min: f32,
    /// Fan duty ceiling.
    pub fan_max: f32,
    /// Fan duty added per mm³/s of effective flow.
    pub fan_flow_k: f32,
    /// Layers faster than this get full cooling (s).
    pub short_layer_s: f32,
    /// Per-read telemetry timeout (ms).
    pub telemetry_timeout_ms: u64,
    /// Learned state is re-persisted every this many ticks (crash safety).
    pub persist_every_ticks: u64,
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
            telemetry_timeout_ms: 150,
            persist_every_ticks: 120,
        }
    }
}

/// Lookahead buffer parameters.
#[derive(Debug, Clone)]
pub struct LookaheadCfg {
    pub window_ms: u64,
    pub horizon_ms: u64,
    /// Floor clamp for a parsed move's duration; avoids infinite flow on
    /// zero-duration segments.
    pub min_move_ms: u64,
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

impl LookaheadCfg {
    /// Filament cross-section area, mm².
    pub fn filament_area(&self) -> f32 {
        let r = self.filament_diameter_mm / 2.0;
        std::f32::consts::PI * r * r
    }
}

/// Heater capacity governor parameters.
#[derive(Debug, Clone)]
pub struct GovernorCfg {
    pub base_flow_mm3s: f32,
    pub duty_threshold: f32,
    pub temp_deficit_c: f32,
    pub backoff_k: f32,
    pub fan_penalty_k: f32,
    pub temp_penalty_k: f32,
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

/// Stress learner parameters.
#[derive(Debug, Clone)]
pub struct StressCfg {
    pub speed_thresh: f32,
    pub flow_max: f32,
    pub pwm_thresh: f32,
    pub score_inc: f32,
    pub score_decay: f32,
    pub activate_score: f32,
    pub deactivate_score: f32,
    pub bin_height_mm: f32,
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
#[derive(Debug, Clone)]
pub struct CrashCfg {
    pub deadband: i32,
    pub crash_threshold: i32,
    pub min_filament_speed: f32,
    pub spike_limit: u32,
    pub throttle_layers: u32,
    pub throttle_factor: f32,
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
#[derive(Debug, Clone)]
pub struct SafetyCfg {
    pub runaway_delta_c: f32,
    pub undertemp_delta_c: f32,
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

/// Flow-gain self-learning parameters.
#[derive(Debug, Clone)]
pub struct LearningCfg {
    pub window: u32,
    pub learning_rate: f32,
    pub max_adjust: f32,
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
#[derive(Debug, Clone)]
pub struct WaitCfg {
    pub tolerance_c: f32,
}

impl Default for WaitCfg {
    fn default() -> Self {
        Self { tolerance_c: 3.0 }
    }
}

/// Aggregate engine configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineCfg {
    pub control: ControlCfg,
    pub lookahead: LookaheadCfg,
    pub governor: GovernorCfg,
    pub stress: StressCfg,
    pub crash: CrashCfg,
    pub safety: SafetyCfg,
    pub learning: LearningCfg,
    pub wait: WaitCfg,
}

impl From<&adaflow_config::ControlCfg> for ControlCfg {
    fn from(c: &adaflow_config::ControlCfg) -> Self {
        Self {
            tick_hz: c.tick_hz,
            speed_threshold: c.speed_threshold,
            accel_kick: c.accel_kick,
            accel_kick_threshold: c.accel_kick_threshold,
            first_layer_z: c.first_layer_z,
            fan_min: c.fan_min,
            fan_max: c.fan_max,
            fan_flow_k: c.fan_flow_k,
            short_layer_s: c.short_layer_s,
            ..Self::default()
        }
    }
}

impl From<&adaflow_config::LookaheadCfg> for LookaheadCfg {
    fn from(c: &adaflow_config::LookaheadCfg) -> Self {
        Self {
            window_ms: c.window_ms,
            horizon_ms: c.horizon_ms,
            min_move_ms: c.min_move_ms,
            filament_diameter_mm: c.filament_diameter_mm,
        }
    }
}

impl From<&adaflow_config::GovernorCfg> for GovernorCfg {
    fn from(c: &adaflow_config::GovernorCfg) -> Self {
        Self {
            base_flow_mm3s: c.base_flow_mm3s,
            duty_threshold: c.duty_threshold,
            temp_deficit_c: c.temp_deficit_c,
            backoff_k: c.backoff_k,
            fan_penalty_k: c.fan_penalty_k,
            temp_penalty_k: c.temp_penalty_k,
            reference_temp_c: c.reference_temp_c,
        }
    }
}

impl From<&adaflow_config::StressCfg> for StressCfg {
    fn from(c: &adaflow_config::StressCfg) -> Self {
        Self {
            speed_thresh: c.speed_thresh,
            flow_max: c.flow_max,
            pwm_thresh: c.pwm_thresh,
            score_inc: c.score_inc,
            score_decay: c.score_decay,
            activate_score: c.activate_score,
            deactivate_score: c.deactivate_score,
            bin_height_mm: c.bin_height_mm,
            accel_relief: c.accel_relief,
        }
    }
}

impl From<&adaflow_config::CrashCfg> for CrashCfg {
    fn from(c: &adaflow_config::CrashCfg) -> Self {
        Self {
            deadband: c.deadband,
            crash_threshold: c.crash_threshold,
            min_filament_speed: c.min_filament_speed,
            spike_limit: c.spike_limit,
            throttle_layers: c.throttle_layers,
            throttle_factor: c.throttle_factor,
            min_layer_dz: c.min_layer_dz,
        }
    }
}

impl From<&adaflow_config::SafetyCfg> for SafetyCfg {
    fn from(c: &adaflow_config::SafetyCfg) -> Self {
        Self {
            runaway_delta_c: c.runaway_delta_c,
            undertemp_delta_c: c.undertemp_delta_c,
            runaway_strikes: c.runaway_strikes,
        }
    }
}

impl From<&adaflow_config::LearningCfg> for LearningCfg {
    fn from(c: &adaflow_config::LearningCfg) -> Self {
        Self {
            window: c.window,
            learning_rate: c.learning_rate,
            max_adjust: c.max_adjust,
            error_deadband_c: c.error_deadband_c,
        }
    }
}

impl From<&adaflow_config::WaitCfg> for WaitCfg {
    fn from(c: &adaflow_config::WaitCfg) -> Self {
        Self {
            tolerance_c: c.tolerance_c,
        }
    }
}

impl From<&adaflow_config::Config> for EngineCfg {
    fn from(c: &adaflow_config::Config) -> Self {
        Self {
            control: (&c.control).into(),
            lookahead: (&c.lookahead).into(),
            governor: (&c.governor).into(),
            stress: (&c.stress).into(),
            crash: (&c.crash).into(),
            safety: (&c.safety).into(),
            learning: (&c.learning).into(),
            wait: (&c.wait).into(),
        }
    }
}
