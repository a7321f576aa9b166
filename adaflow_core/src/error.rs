use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum FlowError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("sensor unavailable: {0}")]
    Sensor(String),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("host error: {0}")]
    Hardware(String),
    #[error("timeout waiting for telemetry")]
    Timeout,
    #[error("invalid state: {0}")]
    State(String),
}

/// In-loop thermal fault labels. These are surfaced through status fields and
/// handled inside the tick; they never abort the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    ThermalRunaway,
    ThermalUndertemp,
}

impl FaultKind {
    pub fn name(self) -> &'static str {
        match self {
            FaultKind::ThermalRunaway => "thermal_runaway",
            FaultKind::ThermalUndertemp => "thermal_undertemp",
        }
    }
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing telemetry source")]
    MissingTelemetry,
    #[error("missing actuator")]
    MissingActuator,
    #[error("missing material profile")]
    MissingProfile,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;

/// Map any boxed host error to a typed `FlowError`, downcasting the host
/// crate's error type when the `host-errors` feature is on.
pub fn map_host_error_dyn(e: &(dyn std::error::Error + 'static)) -> FlowError {
    #[cfg(feature = "host-errors")]
    if let Some(host) = e.downcast_ref::<adaflow_host::HostError>() {
        return match host {
            adaflow_host::HostError::Timeout => FlowError::Timeout,
            adaflow_host::HostError::RegisterUnavailable => {
                FlowError::Sensor("strain register unavailable".into())
            }
            other => FlowError::Hardware(other.to_string()),
        };
    }
    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        FlowError::Timeout
    } else {
        FlowError::Hardware(s)
    }
}
