//! Crash / blob detector.
//!
//! Watches a stepper-driver strain register (load proxy) while filament is
//! moving. A drop of the load against its baseline beyond the crash
//! threshold is a spike; a layer finishing with more spikes than the limit
//! throttles the speed factor for the following layers.

use crate::config::CrashCfg;

/// Baseline tracking EMA factor; slow so spikes do not drag the baseline.
const BASELINE_ALPHA: f32 = 0.05;

#[derive(Debug)]
pub struct CrashDetector {
    cfg: CrashCfg,
    baseline: Option<f32>,
    spike_count: u32,
    layer_index: u32,
    throttle_layers_remaining: u32,
}

impl CrashDetector {
    pub fn new(cfg: CrashCfg) -> Self {
        Self {
            cfg,
            baseline: None,
            spike_count: 0,
            layer_index: 0,
            throttle_layers_remaining: 0,
        }
    }

    /// Feed one load reading. Only counts while filament is actually moving;
    /// deltas inside the deadband refresh the baseline instead.
    pub fn observe(&mut self, load: i32, filament_speed: f32) {
        let baseline = *self.baseline.get_or_insert(load as f32);
        if filament_speed < self.cfg.min_filament_speed {
            return;
        }
        let delta = baseline - load as f32;
        if delta.abs() <= self.cfg.deadband as f32 {
            self.baseline = Some(baseline + BASELINE_ALPHA * (load as f32 - baseline));
        } else if delta > self.cfg.crash_threshold as f32 {
            self.spike_count = self.spike_count.saturating_add(1);
            tracing::debug!(
                delta,
                spikes = self.spike_count,
                layer = self.layer_index,
                "load spike"
            );
        }
    }

    /// Close out the current layer. Recovery engages when the completed
    /// layer exceeded the spike limit and holds for `throttle_layers`.
    pub fn on_layer_change(&mut self) {
        if self.throttle_layers_remaining > 0 {
            self.throttle_layers_remaining -= 1;
            if self.throttle_layers_remaining == 0 {
                tracing::info!(layer = self.layer_index, "crash recovery complete");
            }
        }
        if self.spike_count > self.cfg.spike_limit {
            tracing::warn!(
                spikes = self.spike_count,
                layer = self.layer_index,
                hold_layers = self.cfg.throttle_layers,
                "crash suspected; throttling speed"
            );
            self.throttle_layers_remaining = self.cfg.throttle_layers;
        }
        self.spike_count = 0;
        self.layer_index = self.layer_index.wrapping_add(1);
    }

    pub fn speed_factor(&self) -> f32 {
        if self.throttle_layers_remaining > 0 {
            self.cfg.throttle_factor
        } else {
            1.0
        }
    }

    pub fn in_recovery(&self) -> bool {
        self.throttle_layers_remaining > 0
    }

    pub fn spike_count(&self) -> u32 {
        self.spike_count
    }

    pub fn layer_index(&self) -> u32 {
        self.layer_index
    }

    pub fn reset(&mut self) {
        self.baseline = None;
        self.spike_count = 0;
        self.layer_index = 0;
        self.throttle_layers_remaining = 0;
    }
}
