use thiserror::Error;

/// Errors raised outside the payment lifecycle itself: configuration,
/// client setup and talking to a stopped service.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("validation error: {0}")]
    ValidationError(String),
    #[error("payment service is no longer running")]
    ServiceStopped,
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("payment service task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
