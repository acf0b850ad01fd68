use super::epoch::EpochGuard;
use crate::domain::classifier::{self, Verdict};
use crate::domain::machine::Event;
use crate::domain::payment::PaymentToken;
use crate::domain::ports::PaymentGatewayRef;
use std::time::Duration;

/// Runs single ticks of the verification cycle.
///
/// There is no backoff and no retry budget: the gateway's `remainingSeconds`
/// is the only clock that ends a session. Each tick is one delay followed by
/// one fetch.
#[derive(Clone)]
pub struct PollScheduler {
    gateway: PaymentGatewayRef,
    interval: Duration,
}

impl PollScheduler {
    pub fn new(gateway: PaymentGatewayRef, interval: Duration) -> Self {
        Self { gateway, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits one interval, fetches the payment and turns the snapshot into
    /// the next lifecycle event.
    ///
    /// Returns `None` without touching the gateway if the guard went stale
    /// during the delay.
    pub async fn tick(&self, token: &PaymentToken, guard: &EpochGuard) -> Option<Event> {
        tokio::time::sleep(self.interval).await;
        if !guard.is_current() {
            return None;
        }

        let event = match self.gateway.fetch_payment(token).await {
            Ok(payment) => match classifier::classify_snapshot(&payment) {
                Verdict::Verified => Event::PaymentVerified(payment),
                Verdict::Expired => Event::PaymentSessionExpired,
                Verdict::Pending => Event::VerifyPayment(payment),
            },
            Err(failure) => Event::Rejected(failure),
        };
        Some(event)
    }
}
