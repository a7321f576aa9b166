//! Material profile resolution.
//!
//! A profile is resolved exactly once at session start through a defined
//! override order (config defaults, then persisted learned values, then
//! explicit user overrides) and is immutable for the rest of the session
//! (gain commands swap in a modified copy, never re-interpret per tick).

use crate::error::FlowError;
use crate::persist;
use adaflow_traits::StateStore;
use std::collections::BTreeMap;

/// Resolved, session-immutable material tuning.
#[derive(Debug, Clone)]
pub struct MaterialProfile {
    pub name: String,
    pub base_temp: f32,
    pub max_temp: f32,
    pub flow_k: f32,
    pub speed_k: f32,
    pub max_boost: f32,
    pub flow_gate: f32,
    pub pa_boost_k: f32,
    pub ramp_rise: f32,
    pub ramp_fall: f32,
    /// Pressure advance at zero boost, after the override order.
    pub base_pa: f32,
    /// EMA factor for the smoothed flow estimate.
    pub smoothing: f32,
}

/// Explicit user overrides, applied last in the resolution order.
#[derive(Debug, Clone, Default)]
pub struct ProfileOverrides {
    pub pa: Option<f32>,
    pub max_temp: Option<f32>,
    pub gains: Vec<(String, f32)>,
}

impl MaterialProfile {
    /// Resolve `name` against the config table, persisted learned values,
    /// and user overrides. An unknown material is a configuration error and
    /// aborts session start; a failing store falls back to defaults.
    pub fn resolve(
        name: &str,
        materials: &BTreeMap<String, adaflow_config::MaterialCfg>,
        store: Option<&dyn StateStore>,
        overrides: &ProfileOverrides,
    ) -> Result<Self, FlowError> {
        let cfg = materials
            .get(name)
            .ok_or_else(|| FlowError::Config(format!("unknown material '{name}'")))?;

        let mut profile = Self {
            name: name.to_string(),
            base_temp: cfg.base_temp,
            max_temp: cfg.max_temp,
            flow_k: cfg.flow_k,
            speed_k: cfg.speed_k,
            max_boost: cfg.max_boost,
            flow_gate: cfg.flow_gate,
            pa_boost_k: cfg.pa_boost_k,
            ramp_rise: cfg.ramp_rise,
            ramp_fall: cfg.ramp_fall,
            base_pa: cfg.default_pa,
            smoothing: cfg.smoothing,
        };

        if let Some(store) = store {
            match store.get(&persist::pa_key(name)) {
                Ok(Some(raw)) => match raw.parse::<f32>() {
                    Ok(pa) if pa >= 0.0 => profile.base_pa = pa,
                    _ => tracing::warn!(material = name, raw = %raw, "ignoring malformed persisted PA"),
                },
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, material = name, "state store unreadable; using profile defaults");
                }
            }
        }

        if let Some(pa) = overrides.pa {
            profile.base_pa = pa.max(0.0);
        }
        if let Some(max_temp) = overrides.max_temp {
            profile.max_temp = max_temp.max(profile.base_temp);
        }
        for (gain, value) in &overrides.gains {
            profile.apply_gain(gain, *value)?;
        }
        Ok(profile)
    }

    /// Set a named gain. Unknown names are configuration errors so typos in
    /// `SET_GAIN` surface immediately.
    pub fn apply_gain(&mut self, name: &str, value: f32) -> Result<(), FlowError> {
        if !value.is_finite() {
            return Err(FlowError::Config(format!("gain '{name}': non-finite value")));
        }
        match name {
            "flow_k" | "flow_boost_k" => self.flow_k = value,
            "speed_k" | "speed_boost_k" => self.speed_k = value,
            "max_boost" | "max_boost_limit" => self.max_boost = value.max(0.0),
            "flow_gate" => self.flow_gate = value.max(0.0),
            "pa_boost_k" => self.pa_boost_k = value,
            "ramp_rise" => self.ramp_rise = value.max(f32::EPSILON),
            "ramp_fall" => self.ramp_fall = value.max(f32::EPSILON),
            "smoothing" | "flow_smoothing" => self.smoothing = value.clamp(0.0, 1.0),
            other => {
                return Err(FlowError::Config(format!("unknown gain '{other}'")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn materials() -> BTreeMap<String, adaflow_config::MaterialCfg> {
        let mut m = BTreeMap::new();
        m.insert("pla".to_string(), adaflow_config::MaterialCfg::default());
        m
    }

    #[test]
    fn unknown_material_is_config_error() {
        let err = MaterialProfile::resolve(
            "unobtainium",
            &materials(),
            None,
            &ProfileOverrides::default(),
        )
        .unwrap_err();
        assert!(matches!(err, FlowError::Config(_)));
    }

    #[test]
    fn user_override_beats_defaults() {
        let overrides = ProfileOverrides {
            pa: Some(0.07),
            ..ProfileOverrides::default()
        };
        let p = MaterialProfile::resolve("pla", &materials(), None, &overrides).unwrap();
        assert_eq!(p.base_pa, 0.07);
    }

    #[test]
    fn unknown_gain_rejected() {
        let mut p =
            MaterialProfile::resolve("pla", &materials(), None, &ProfileOverrides::default())
                .unwrap();
        assert!(p.apply_gain("flow_boost_k", 1.5).is_ok());
        assert_eq!(p.flow_k, 1.5);
        assert!(p.apply_gain("warp_drive_k", 1.0).is_err());
    }
}
