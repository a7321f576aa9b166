//! Heater capacity governor.
//!
//! Estimates the flow the heater can actually sustain at the session's base
//! temperature and current fan load, and backs the effective flow off while
//! the heater is struggling. This keeps the boost loop from requesting
//! temperatures the heater cannot deliver, which would destabilize the
//! underlying PID under heavy part-cooling.

use crate::config::GovernorCfg;

/// Per-tick governor verdict, computed from one input snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GovernorOutput {
    /// Flow the heater can sustain at steady state, mm³/s.
    pub max_sustainable: f32,
    /// 0.0 (healthy) ..= 1.0 (fully backed off).
    pub backoff: f32,
    /// Input flow after the sustainability cap.
    pub effective_flow: f32,
    /// Fan duty reduction requested from smart cooling, 0.0..=1.0.
    pub fan_reduction: f32,
    pub struggling: bool,
}

#[derive(Debug, Clone)]
pub struct HeaterGovernor {
    cfg: GovernorCfg,
}

impl HeaterGovernor {
    pub fn new(cfg: GovernorCfg) -> Self {
        Self { cfg }
    }

    pub fn assess(
        &self,
        actual_flow: f32,
        base_temp: f32,
        fan_duty: f32,
        heater_duty: f32,
        target_temp: f32,
        actual_temp: f32,
    ) -> GovernorOutput {
        let c = &self.cfg;
        let temp_factor =
            (1.0 - (base_temp - c.reference_temp_c).max(0.0) * c.temp_penalty_k).clamp(0.3, 1.0);
        let fan_factor = (1.0 - fan_duty.clamp(0.0, 1.0) * c.fan_penalty_k).clamp(0.3, 1.0);
        let max_sustainable = c.base_flow_mm3s * temp_factor * fan_factor;

        let duty_excess = (heater_duty - c.duty_threshold).max(0.0);
        let deficit = target_temp - actual_temp;
        let struggling = heater_duty > c.duty_threshold || deficit > c.temp_deficit_c;

        let backoff = if struggling {
            let deficit_factor = (deficit / c.temp_deficit_c).clamp(0.0, 1.0);
            (duty_excess * c.backoff_k + deficit_factor * 0.5).clamp(0.0, 1.0)
        } else {
            0.0
        };

        GovernorOutput {
            max_sustainable,
            backoff,
            effective_flow: actual_flow.min(max_sustainable * (1.0 - backoff)),
            fan_reduction: backoff * 0.4,
            struggling,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn governor() -> HeaterGovernor {
        HeaterGovernor::new(GovernorCfg::default())
    }

    #[test]
    fn healthy_heater_passes_flow_through() {
        let out = governor().assess(9.0, 210.0, 0.0, 0.5, 210.0, 210.0);
        assert!(!out.struggling);
        assert_eq!(out.backoff, 0.0);
        assert_eq!(out.effective_flow, 9.0);
        assert_eq!(out.fan_reduction, 0.0);
    }

    #[test]
    fn fan_load_lowers_sustainable_flow() {
        let calm = governor().assess(50.0, 210.0, 0.0, 0.5, 210.0, 210.0);
        let windy = governor().assess(50.0, 210.0, 1.0, 0.5, 210.0, 210.0);
        assert!(windy.max_sustainable < calm.max_sustainable);
        // High request gets capped even when healthy.
        assert!(windy.effective_flow <= windy.max_sustainable);
    }

    #[test]
    fn struggling_heater_backs_off() {
        // duty 0.95 over threshold 0.85 with backoff_k 1.5, plus a 0.9 °C
        // deficit against a 6 °C threshold: 0.10*1.5 + 0.15*0.5 = 0.225.
        let out = governor().assess(30.0, 210.0, 0.0, 0.95, 210.9, 210.0);
        assert!(out.struggling);
        assert!((out.backoff - 0.225).abs() < 1e-3);
        let expected_cap = out.max_sustainable * (1.0 - out.backoff);
        assert!((out.effective_flow - expected_cap.min(30.0)).abs() < 1e-4);
        assert!((out.fan_reduction - 0.09).abs() < 1e-3);
    }

    #[test]
    fn backoff_saturates_at_one() {
        let out = governor().assess(30.0, 210.0, 0.0, 1.0, 400.0, 150.0);
        assert!(out.backoff <= 1.0);
        assert!(out.effective_flow >= 0.0);
    }
}
