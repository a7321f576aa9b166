//! Persisted learned state.
//!
//! Flat key layout in the host's state store:
//! - `pa.<material>`:      learned pressure advance
//! - `gain.<material>`:    accumulated flow-gain adjustment
//! - `stress.<bin>`:       per-height stress score
//! - `fault.runaway_total`: lifetime runaway counter
//!
//! Loaded once at session start; a failing store degrades to profile
//! defaults and the session continues. Saves happen at session end and on
//! the periodic flush cadence, never inside the tick's critical sections.

use crate::error::FlowError;
use adaflow_traits::StateStore;

pub fn pa_key(material: &str) -> String {
    format!("pa.{material}")
}

pub fn gain_key(material: &str) -> String {
    format!("gain.{material}")
}

pub fn stress_key(bin: u32) -> String {
    format!("stress.{bin}")
}

pub const STRESS_PREFIX: &str = "stress.";
pub const RUNAWAY_TOTAL_KEY: &str = "fault.runaway_total";

/// Learned state as read at session start.
#[derive(Debug, Clone, Default)]
pub struct PersistedState {
    pub gain_adjust: f32,
    pub stress_scores: Vec<(u32, f32)>,
    pub runaway_total: u32,
}

/// Read everything the session resumes from. Any store failure maps to
/// `FlowError::Persistence`; the caller logs once and starts from defaults.
pub fn load(store: &dyn StateStore, material: &str) -> Result<PersistedState, FlowError> {
    let mut out = PersistedState::default();

    if let Some(raw) = store
        .get(&gain_key(material))
        .map_err(|e| FlowError::Persistence(e.to_string()))?
    {
        match raw.parse::<f32>() {
            Ok(v) if v.is_finite() => out.gain_adjust = v,
            _ => tracing::warn!(material, raw = %raw, "ignoring malformed persisted gain"),
        }
    }

    for key in store
        .keys(STRESS_PREFIX)
        .map_err(|e| FlowError::Persistence(e.to_string()))?
    {
        let Some(bin) = key
            .strip_prefix(STRESS_PREFIX)
            .and_then(|s| s.parse::<u32>().ok())
        else {
            continue;
        };
        if let Some(raw) = store
            .get(&key)
            .map_err(|e| FlowError::Persistence(e.to_string()))?
        {
            match raw.parse::<f32>() {
                Ok(score) if score.is_finite() && score >= 0.0 => {
                    out.stress_scores.push((bin, score));
                }
                _ => tracing::warn!(key = %key, raw = %raw, "ignoring malformed stress score"),
            }
        }
    }

    if let Some(raw) = store
        .get(RUNAWAY_TOTAL_KEY)
        .map_err(|e| FlowError::Persistence(e.to_string()))?
    {
        out.runaway_total = raw.parse().unwrap_or(0);
    }

    Ok(out)
}

/// Write learned state back. Stale stress bins (decayed to zero) are
/// removed so the store does not accumulate dead keys.
pub fn save(
    store: &mut dyn StateStore,
    material: &str,
    base_pa: f32,
    gain_adjust: f32,
    stress_scores: &[(u32, f32)],
    runaway_total: u32,
) -> Result<(), FlowError> {
    let err = |e: adaflow_traits::DynError| FlowError::Persistence(e.to_string());

    store
        .put(&pa_key(material), &format!("{base_pa:.5}"))
        .map_err(err)?;
    store
        .put(&gain_key(material), &format!("{gain_adjust:.5}"))
        .map_err(err)?;

    let live: std::collections::BTreeSet<u32> = stress_scores.iter().map(|(b, _)| *b).collect();
    for key in store.keys(STRESS_PREFIX).map_err(err)? {
        if let Some(bin) = key
            .strip_prefix(STRESS_PREFIX)
            .and_then(|s| s.parse::<u32>().ok())
            && !live.contains(&bin)
        {
            store.remove(&key).map_err(err)?;
        }
    }
    for (bin, score) in stress_scores {
        store
            .put(&stress_key(*bin), &format!("{score:.3}"))
            .map_err(err)?;
    }

    store
        .put(RUNAWAY_TOTAL_KEY, &runaway_total.to_string())
        .map_err(err)?;
    store.flush().map_err(err)?;
    Ok(())
}

/// Drop all learned state (`RESET_STATE`).
pub fn clear(store: &mut dyn StateStore) -> Result<(), FlowError> {
    let err = |e: adaflow_traits::DynError| FlowError::Persistence(e.to_string());
    for prefix in ["pa.", "gain.", STRESS_PREFIX, "fault."] {
        for key in store.keys(prefix).map_err(err)? {
            store.remove(&key).map_err(err)?;
        }
    }
    store.flush().map_err(err)?;
    Ok(())
}
