use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::sync::Arc;
use thiserror::Error;

/// Raw failure reported by a gateway call.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("transport failure: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("gateway responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode gateway response: {0}")]
    Decode(String),
}

impl GatewayError {
    pub fn transport(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Transport(err.into())
    }
}

/// The closed set of reasons a payment lifecycle can fail.
///
/// Values are produced by [`crate::domain::classifier`] only.
#[derive(Error, Debug, Clone)]
pub enum PaymentError {
    #[error("network error: {details}")]
    NetworkError { details: Arc<GatewayError> },
    #[error("payment session expired")]
    SessionExpired,
    #[error("payment terminated by user")]
    UserTerminated,
}

impl PaymentError {
    pub fn reason(&self) -> &'static str {
        match self {
            PaymentError::NetworkError { .. } => "NETWORK_ERROR",
            PaymentError::SessionExpired => "SESSION_EXPIRED",
            PaymentError::UserTerminated => "USER_TERMINATED",
        }
    }

    pub fn details(&self) -> Option<&GatewayError> {
        match self {
            PaymentError::NetworkError { details } => Some(details),
            _ => None,
        }
    }
}

impl Serialize for PaymentError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.details() {
            Some(details) => {
                let mut state = serializer.serialize_struct("PaymentError", 2)?;
                state.serialize_field("reason", self.reason())?;
                state.serialize_field("details", &details.to_string())?;
                state.end()
            }
            None => {
                let mut state = serializer.serialize_struct("PaymentError", 1)?;
                state.serialize_field("reason", self.reason())?;
                state.end()
            }
        }
    }
}
