use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {key} is not set")]
    MissingConfig { key: &'static str },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("No device returned by the device API")]
    DeviceNotFound,

    #[error("Device {device} has no '{sensor}' reading")]
    DataUnavailable { device: String, sensor: &'static str },

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("Remote database error: {0}")]
    Remote(#[from] libsql::Error),

    #[error("Verification mismatch at {timestamp}: expected {expected} row(s), found {observed}")]
    VerificationMismatch {
        timestamp: String,
        expected: usize,
        observed: usize,
    },

    #[error("Query error: {0}")]
    Query(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Transport(format!("request timed out: {}", err))
        } else if let Some(status) = err.status() {
            Error::Transport(format!("device API returned {}", status))
        } else {
            Error::Transport(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
