//! Operator command surface.
//!
//! Every command returns a human-readable summary plus structured fields,
//! so hosts can print the summary on a console and machine-consume the
//! fields. `Status` is a pure read: two calls with no intervening tick
//! return identical replies.

use crate::controller::FlowController;
use crate::error::{FlowError, Result};
use crate::persist;
use adaflow_traits::{Actuator, StateStore, Telemetry};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start { material: Option<String> },
    Stop,
    Status,
    SetPa { material: String, value: f32 },
    GetPa { material: String },
    SetGain { name: String, value: f32 },
    SetMaxTemp { value: f32 },
    Enable,
    Disable,
    ResetState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandReply {
    pub summary: String,
    pub fields: BTreeMap<String, String>,
}

impl CommandReply {
    fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            fields: BTreeMap::new(),
        }
    }

    fn field(mut self, key: &str, value: impl ToString) -> Self {
        self.fields.insert(key.to_string(), value.to_string());
        self
    }
}

impl<T: Telemetry, A: Actuator> FlowController<T, A> {
    pub fn execute(&mut self, cmd: &Command) -> Result<CommandReply> {
        match cmd {
            Command::Start { material } => {
                self.start(material.as_deref())?;
                let status = self.status();
                Ok(CommandReply::new(format!(
                    "Adaptive flow active for {}: base {:.0}°C, PA {:.4}",
                    status.material, status.base_temp, status.pressure_advance
                ))
                .field("material", &status.material)
                .field("base_temp", status.base_temp)
                .field("base_pa", status.pressure_advance)
                .field("has_load_sensor", status.has_load_sensor)
                .field("has_lookahead", status.has_lookahead))
            }
            Command::Stop => {
                let ticks = self.state.tick_count;
                self.stop();
                Ok(CommandReply::new(format!(
                    "Adaptive flow stopped after {ticks} ticks"
                ))
                .field("ticks", ticks))
            }
            Command::Status => {
                let s = self.status();
                let mut reply = CommandReply::new(format!(
                    "{}: {} target {:.1}°C (boost {:.1}), PA {:.4}, fan {:.0}%, {}",
                    s.material,
                    if s.enabled { "active" } else { "disabled" },
                    s.target_temp,
                    s.boost,
                    s.pressure_advance,
                    s.fan_target * 100.0,
                    s.sub_state.name(),
                ));
                reply = reply
                    .field("enabled", s.enabled)
                    .field("material", &s.material)
                    .field("base_temp", s.base_temp)
                    .field("target_temp", s.target_temp)
                    .field("boost", s.boost)
                    .field("pressure_advance", s.pressure_advance)
                    .field("fan_target", s.fan_target)
                    .field("speed_factor", s.speed_factor)
                    .field("first_layer", s.first_layer)
                    .field("sub_state", s.sub_state.name())
                    .field("effective_flow", s.effective_flow)
                    .field("predicted_flow", s.predicted_flow)
                    .field("smoothed_flow", s.smoothed_flow)
                    .field("flow_gain_adjust", s.flow_gain_adjust)
                    .field("runaway_strikes", s.runaway_strikes)
                    .field("runaway_total", s.runaway_total)
                    .field("has_load_sensor", s.has_load_sensor)
                    .field("has_lookahead", s.has_lookahead)
                    .field("tick_count", s.tick_count);
                if let Some(accel) = s.accel_override {
                    reply = reply.field("accel_override", accel);
                }
                if let Some(fault) = s.last_fault {
                    reply = reply.field("last_fault", fault);
                }
                Ok(reply)
            }
            Command::SetPa { material, value } => {
                if !value.is_finite() || *value < 0.0 {
                    return Err(eyre::Report::new(FlowError::Config(
                        "pressure advance must be finite and >= 0".into(),
                    )));
                }
                if *material == self.profile.name {
                    self.state.base_pa = *value;
                }
                if let Some(store) = self.store_mut() {
                    let key = persist::pa_key(material);
                    let mut put = store.put(&key, &format!("{value:.5}"));
                    if put.is_ok() {
                        put = store.flush();
                    }
                    if let Err(e) = put {
                        tracing::warn!(error = %e, material = %material, "PA not persisted");
                    }
                }
                Ok(
                    CommandReply::new(format!("PA for {material} set to {value:.4}"))
                        .field("material", material)
                        .field("pa", value),
                )
            }
            Command::GetPa { material } => {
                let value = if *material == self.profile.name {
                    Some(self.state.base_pa)
                } else {
                    self.lookup_pa(material)
                };
                match value {
                    Some(pa) => Ok(CommandReply::new(format!("PA for {material}: {pa:.4}"))
                        .field("material", material)
                        .field("pa", pa)),
                    None => Err(eyre::Report::new(FlowError::Config(format!(
                        "unknown material '{material}'"
                    )))),
                }
            }
            Command::SetGain { name, value } => {
                let mut profile = self.profile.clone();
                profile.apply_gain(name, *value).map_err(eyre::Report::new)?;
                self.profile = profile;
                self.overrides.gains.push((name.clone(), *value));
                Ok(CommandReply::new(format!("Gain {name} set to {value}"))
                    .field("gain", name)
                    .field("value", value))
            }
            Command::SetMaxTemp { value } => {
                if !value.is_finite() || *value < self.profile.base_temp {
                    return Err(eyre::Report::new(FlowError::Config(format!(
                        "max temp must be >= base temp ({:.0})",
                        self.profile.base_temp
                    ))));
                }
                let mut profile = self.profile.clone();
                profile.max_temp = *value;
                self.profile = profile;
                self.overrides.max_temp = Some(*value);
                Ok(CommandReply::new(format!("Max temp set to {value:.0}°C"))
                    .field("max_temp", value))
            }
            Command::Enable => {
                self.disable_flag().store(false, std::sync::atomic::Ordering::Release);
                Ok(CommandReply::new("Adaptive behavior enabled").field("enabled", true))
            }
            Command::Disable => {
                self.disable_flag().store(true, std::sync::atomic::Ordering::Release);
                Ok(CommandReply::new("Adaptive behavior disabled").field("enabled", false))
            }
            Command::ResetState => {
                self.learner.reset();
                self.state.runaway_strikes = 0;
                self.state.runaway_total = 0;
                if let Some(store) = self.store_mut() {
                    persist::clear(store).map_err(eyre::Report::new)?;
                }
                self.reset_stress();
                Ok(CommandReply::new("Learned state cleared").field("reset", true))
            }
        }
    }

    fn lookup_pa(&self, material: &str) -> Option<f32> {
        if let Some(store) = self.store_ref()
            && let Ok(Some(raw)) = store.get(&persist::pa_key(material))
            && let Ok(pa) = raw.parse::<f32>()
        {
            return Some(pa);
        }
        self.materials.get(material).map(|m| m.default_pa)
    }
}
