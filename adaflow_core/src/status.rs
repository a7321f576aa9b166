//! Controller status types.

use crate::error::FaultKind;

/// Sub-state of an active session, driven by the crash detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubState {
    #[default]
    Normal,
    CrashRecovery,
}

impl SubState {
    pub fn name(self) -> &'static str {
        match self {
            SubState::Normal => "normal",
            SubState::CrashRecovery => "crash_recovery",
        }
    }
}

/// Outcome of a single control tick.
#[derive(Debug)]
pub enum TickStatus {
    /// Controller is disabled; nothing was computed or applied.
    Disabled,
    /// Telemetry was unavailable this tick; outputs left untouched.
    Skipped,
    /// A full tick ran; outputs were computed (and applied unless disable
    /// was observed mid-tick).
    Active(TickReport),
}

/// What one tick computed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub target_temp: f32,
    pub boost: f32,
    pub pressure_advance: f32,
    pub fan_target: f32,
    pub accel_override: Option<f32>,
    pub speed_factor: f32,
    pub effective_flow: f32,
    pub predicted_flow: f32,
    pub fault: Option<FaultKind>,
}

/// Structured snapshot returned by `STATUS`. Reading it has no side
/// effects: two calls with no intervening tick are identical.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerStatus {
    pub enabled: bool,
    pub material: String,
    pub base_temp: f32,
    pub boost: f32,
    pub target_temp: f32,
    pub pressure_advance: f32,
    pub fan_target: f32,
    pub accel_override: Option<f32>,
    pub speed_factor: f32,
    pub first_layer: bool,
    pub sub_state: SubState,
    pub effective_flow: f32,
    pub predicted_flow: f32,
    pub smoothed_flow: f32,
    pub flow_gain_adjust: f32,
    pub runaway_strikes: u32,
    pub runaway_total: u32,
    pub last_fault: Option<&'static str>,
    pub has_load_sensor: bool,
    pub has_lookahead: bool,
    pub tick_count: u64,
}

/// Capability flags negotiated once at build time, consulted instead of
/// scattered presence checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureSet {
    pub has_load_sensor: bool,
    pub has_lookahead: bool,
}
