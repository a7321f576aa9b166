//! Self-learning of the flow gain from persistent thermal error.
//!
//! Every `window` samples the mean signed error (target − actual) is
//! examined: persistently positive means the boost is not keeping up, so the
//! flow gain gets nudged up; persistently negative nudges it down. The
//! accumulated adjustment is clamped to a bounded band and persisted per
//! material. The sign-of-mean heuristic carries no convergence guarantee;
//! the band is the only divergence bound (see DESIGN notes).

use crate::config::LearningCfg;

#[derive(Debug)]
pub struct GainLearner {
    cfg: LearningCfg,
    error_sum: f32,
    samples: u32,
    adjustment: f32,
}

impl GainLearner {
    pub fn new(cfg: LearningCfg) -> Self {
        Self {
            cfg,
            error_sum: 0.0,
            samples: 0,
            adjustment: 0.0,
        }
    }

    /// Additive adjustment to the profile's flow gain.
    pub fn adjustment(&self) -> f32 {
        self.adjustment
    }

    /// Seed the adjustment from persisted state, clamped to the band.
    pub fn seed(&mut self, adjustment: f32) {
        if adjustment.is_finite() {
            self.adjustment = adjustment.clamp(-self.cfg.max_adjust, self.cfg.max_adjust);
        }
    }

    /// Record one tick's signed thermal error. Returns the new adjustment
    /// when a learning window just closed with a nudge.
    pub fn record(&mut self, signed_error_c: f32) -> Option<f32> {
        if !signed_error_c.is_finite() {
            return None;
        }
        self.error_sum += signed_error_c;
        self.samples += 1;
        if self.samples < self.cfg.window {
            return None;
        }
        let mean = self.error_sum / self.samples as f32;
        self.error_sum = 0.0;
        self.samples = 0;

        let before = self.adjustment;
        if mean > self.cfg.error_deadband_c {
            self.adjustment += self.cfg.learning_rate;
        } else if mean < -self.cfg.error_deadband_c {
            self.adjustment -= self.cfg.learning_rate;
        }
        self.adjustment = self
            .adjustment
            .clamp(-self.cfg.max_adjust, self.cfg.max_adjust);
        if self.adjustment != before {
            tracing::info!(
                mean_error_c = mean,
                adjustment = self.adjustment,
                "flow gain nudged"
            );
            Some(self.adjustment)
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        self.error_sum = 0.0;
        self.samples = 0;
        self.adjustment = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> LearningCfg {
        LearningCfg {
            window: 5,
            learning_rate: 0.02,
            max_adjust: 0.06,
            error_deadband_c: 1.0,
        }
    }

    #[test]
    fn persistent_hot_deficit_nudges_up() {
        let mut l = GainLearner::new(cfg());
        for _ in 0..4 {
            assert_eq!(l.record(3.0), None);
        }
        assert_eq!(l.record(3.0), Some(0.02));
    }

    #[test]
    fn persistent_overshoot_nudges_down() {
        let mut l = GainLearner::new(cfg());
        for _ in 0..5 {
            l.record(-3.0);
        }
        assert!((l.adjustment() + 0.02).abs() < 1e-6);
    }

    #[test]
    fn small_errors_inside_deadband_do_nothing() {
        let mut l = GainLearner::new(cfg());
        for _ in 0..20 {
            l.record(0.4);
        }
        assert_eq!(l.adjustment(), 0.0);
    }

    #[test]
    fn adjustment_saturates_at_band() {
        let mut l = GainLearner::new(cfg());
        for _ in 0..50 {
            l.record(5.0);
        }
        assert!((l.adjustment() - 0.06).abs() < 1e-6);
    }

    #[test]
    fn seed_clamps_to_band() {
        let mut l = GainLearner::new(cfg());
        l.seed(9.0);
        assert!((l.adjustment() - 0.06).abs() < 1e-6);
    }
}
