//! Human-readable error descriptions and structured JSON error formatting.

use adaflow_core::error::{BuildError, FlowError};

/// Map an eyre::Report to an explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingTelemetry => {
                "What happened: No telemetry source was provided to the engine.\nLikely causes: The host adapter failed to initialize.\nHow to fix: Ensure the printer connection is up and wired via with_telemetry(...).".to_string()
            }
            BuildError::MissingActuator => {
                "What happened: No actuator was provided to the engine.\nLikely causes: The host adapter failed to initialize.\nHow to fix: Ensure the printer connection is up and wired via with_actuator(...).".to_string()
            }
            BuildError::MissingProfile => {
                "What happened: No material was selected.\nLikely causes: Neither --material nor a default profile was configured.\nHow to fix: Pass --material or add a [materials.<name>] section to the config.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(fe) = err.downcast_ref::<FlowError>() {
        return match fe {
            FlowError::Config(msg) => format!(
                "What happened: Configuration rejected ({msg}).\nLikely causes: Unknown material or gain name, or an out-of-range value.\nHow to fix: Check the material table and the gain name, then rerun."
            ),
            FlowError::Timeout => "What happened: Telemetry poll timed out.\nLikely causes: Host unreachable or overloaded.\nHow to fix: Check the printer connection; consider raising the telemetry timeout.".to_string(),
            FlowError::Persistence(msg) => format!(
                "What happened: State store failure ({msg}).\nLikely causes: Unwritable state file or corrupt contents.\nHow to fix: Check permissions on the state path; the controller keeps running on profile defaults."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    format!("{err:#}")
}

/// Structured error object for `--json` mode.
pub fn to_json(err: &eyre::Report) -> serde_json::Value {
    serde_json::json!({
        "ok": false,
        "error": err.to_string(),
        "detail": format!("{err:#}"),
    })
}
