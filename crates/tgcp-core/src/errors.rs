use std::{path::PathBuf, time::Duration};

/// Core error type for the relay.
///
/// Backend adapters map their specific errors into this type so the forwarder
/// can tell a rate limit (sleep and resume) from a protocol failure (log and
/// move on).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("profile error: {0}")]
    Profile(String),

    #[error("credentials error: {0}")]
    Credentials(String),

    #[error("could not connect after {attempts} attempts: {reason}")]
    Connect { attempts: u32, reason: String },

    #[error("rate limited, retry after {}s", .0.as_secs())]
    RateLimited(Duration),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid path: {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// Wait duration requested by the backend, if this is a rate limit.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::RateLimited(d) => Some(*d),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
