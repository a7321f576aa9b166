use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("host api error: {0}")]
    Api(String),
    #[error("strain register unavailable")]
    RegisterUnavailable,
    #[error("telemetry timeout")]
    Timeout,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HostError>;
