//! Maps raw failures and observed snapshots onto the lifecycle's error kinds.
//!
//! This is the only place a [`PaymentError`] is built. Everything here is pure.

use super::error::{GatewayError, PaymentError};
use super::payment::Payment;
use std::sync::Arc;

/// What a freshly polled snapshot means for the verification cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Verified,
    Expired,
    Pending,
}

/// Verification wins over expiry: a notified merchant is final even when the
/// countdown has already hit zero.
pub fn classify_snapshot(payment: &Payment) -> Verdict {
    if payment.is_verified() {
        Verdict::Verified
    } else if payment.is_expired() {
        Verdict::Expired
    } else {
        Verdict::Pending
    }
}

pub fn network_failure(failure: GatewayError) -> PaymentError {
    PaymentError::NetworkError {
        details: Arc::new(failure),
    }
}

pub fn session_expired() -> PaymentError {
    PaymentError::SessionExpired
}

pub fn user_terminated() -> PaymentError {
    PaymentError::UserTerminated
}
