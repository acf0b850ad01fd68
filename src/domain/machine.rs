//! The payment lifecycle as a pure state machine.
//!
//! ```text
//!            CREATE_PAYMENT           done
//!   idle ─────────────────▶ creation ──────┐
//!     │                                    ▼
//!     │ START_PAYMENT_VERIFICATION   ┌──────────────┐  VERIFY_PAYMENT
//!     └──────────────▶ fetching ────▶│ verification │◀───────┐
//!                                    └──────┬───────┘────────┘
//!                      PAYMENT_VERIFIED     │     expired / rejected / TERMINATE
//!                  success ◀────────────────┴──────────────▶ failure
//! ```
//!
//! [`Machine::transition`] never performs I/O. Entering `creation`,
//! `fetching` or `verification` yields an [`Effect`] for the runtime to run;
//! its result comes back as an [`Event`].

use super::classifier;
use super::error::{GatewayError, PaymentError};
use super::payment::{CreatePaymentParams, Payment, PaymentToken};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    #[default]
    Idle,
    Creation,
    Fetching,
    Verification,
    Success,
    Failure,
}

impl State {
    pub fn name(&self) -> &'static str {
        match self {
            State::Idle => "idle",
            State::Creation => "creation",
            State::Fetching => "fetching",
            State::Verification => "verification",
            State::Success => "success",
            State::Failure => "failure",
        }
    }

    /// Terminal states have no outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Success | State::Failure)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Data carried alongside the state. Frozen once a terminal state is reached.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PaymentContext {
    pub payment: Option<Payment>,
    pub error: Option<PaymentError>,
}

/// Events the caller may send.
#[derive(Debug, Clone)]
pub enum Command {
    CreatePayment(CreatePaymentParams),
    StartPaymentVerification(PaymentToken),
    Terminate,
}

#[derive(Debug)]
pub enum Event {
    CreatePayment(CreatePaymentParams),
    StartPaymentVerification(PaymentToken),
    Terminate,
    /// Poll found the payment still pending; restarts the cycle.
    VerifyPayment(Payment),
    PaymentVerified(Payment),
    PaymentSessionExpired,
    /// Fresher snapshot from the push channel.
    PaymentUpdated(Payment),
    /// The outstanding create or fetch call succeeded.
    Resolved(Payment),
    /// The outstanding gateway call failed.
    Rejected(GatewayError),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::CreatePayment(_) => "CREATE_PAYMENT",
            Event::StartPaymentVerification(_) => "START_PAYMENT_VERIFICATION",
            Event::Terminate => "TERMINATE",
            Event::VerifyPayment(_) => "VERIFY_PAYMENT",
            Event::PaymentVerified(_) => "PAYMENT_VERIFIED",
            Event::PaymentSessionExpired => "PAYMENT_SESSION_EXPIRED",
            Event::PaymentUpdated(_) => "PAYMENT_UPDATED",
            Event::Resolved(_) => "DONE",
            Event::Rejected(_) => "ERROR",
        }
    }
}

impl From<Command> for Event {
    fn from(command: Command) -> Self {
        match command {
            Command::CreatePayment(params) => Event::CreatePayment(params),
            Command::StartPaymentVerification(token) => Event::StartPaymentVerification(token),
            Command::Terminate => Event::Terminate,
        }
    }
}

/// Asynchronous work requested by a state's entry action.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    CreatePayment(CreatePaymentParams),
    FetchPayment(PaymentToken),
    /// One tick of the verification cycle.
    Poll(PaymentToken),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// A state was entered (or re-entered). Anything still outstanding from
    /// the previous entry is stale.
    Enter { effect: Option<Effect> },
    /// Context changed while staying in the same state.
    Refresh,
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub machine: Machine,
    pub step: Step,
}

#[derive(Debug, Clone, Default)]
pub struct Machine {
    state: State,
    context: PaymentContext,
}

impl Machine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn context(&self) -> &PaymentContext {
        &self.context
    }

    /// Computes the machine that results from `event`.
    ///
    /// Returns `None` when the current state does not handle the event;
    /// the caller keeps the current machine untouched in that case.
    pub fn transition(&self, event: Event) -> Option<Transition> {
        match (self.state, event) {
            (State::Idle, Event::CreatePayment(params)) => {
                Some(self.enter(State::Creation, Some(Effect::CreatePayment(params))))
            }
            (State::Idle, Event::StartPaymentVerification(token)) => {
                Some(self.enter(State::Fetching, Some(Effect::FetchPayment(token))))
            }

            (State::Creation | State::Fetching, Event::Resolved(payment)) => {
                Some(self.enter_verification(payment))
            }
            (State::Verification, Event::VerifyPayment(payment)) => {
                Some(self.enter_verification(payment))
            }
            (State::Verification, Event::PaymentVerified(payment)) => {
                let current = self.context.payment.as_ref()?;
                if current.token != payment.token {
                    return None;
                }
                let mut next = self.enter(State::Success, None);
                next.machine.context.payment = Some(payment);
                Some(next)
            }
            (State::Verification, Event::PaymentUpdated(payment)) => {
                let current = self.context.payment.as_ref()?;
                if current.token != payment.token || *current == payment {
                    return None;
                }
                let mut machine = self.clone();
                machine.context.payment = Some(payment);
                Some(Transition {
                    machine,
                    step: Step::Refresh,
                })
            }
            (State::Verification, Event::PaymentSessionExpired) => {
                Some(self.fail(classifier::session_expired()))
            }

            (
                State::Creation | State::Fetching | State::Verification,
                Event::Rejected(failure),
            ) => Some(self.fail(classifier::network_failure(failure))),
            (State::Creation | State::Fetching | State::Verification, Event::Terminate) => {
                Some(self.fail(classifier::user_terminated()))
            }

            _ => None,
        }
    }

    fn enter(&self, state: State, effect: Option<Effect>) -> Transition {
        Transition {
            machine: Machine {
                state,
                context: self.context.clone(),
            },
            step: Step::Enter { effect },
        }
    }

    fn enter_verification(&self, payment: Payment) -> Transition {
        let token = payment.token.clone();
        let mut next = self.enter(State::Verification, Some(Effect::Poll(token)));
        next.machine.context.payment = Some(payment);
        next
    }

    fn fail(&self, error: PaymentError) -> Transition {
        let mut next = self.enter(State::Failure, None);
        next.machine.context.error = Some(error);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::Currency;
    use rust_decimal_macros::dec;

    fn payment(merchant_notified: bool) -> Payment {
        Payment {
            token: PaymentToken::new("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9"),
            account: "ban_3c9pkkgdy5n8qkkrzj96ncjnpcbuj6ux3177wawn1wu5ynoejquumbffdxny"
                .to_string(),
            amount: dec!(0.000001),
            amount_in_currency: dec!(0.000001),
            currency: Currency::Banano,
            balance: dec!(0),
            sub_payments: Default::default(),
            remaining_seconds: 14399,
            state: String::new(),
            fulfilled: false,
            merchant_notified,
        }
    }

    fn params() -> CreatePaymentParams {
        CreatePaymentParams::new(dec!(0.1), Currency::Usd).unwrap()
    }

    fn apply(machine: &Machine, event: Event) -> Transition {
        machine
            .transition(event)
            .unwrap_or_else(|| panic!("event not handled in {}", machine.state()))
    }

    fn verifying() -> Machine {
        let creation = apply(&Machine::new(), Event::CreatePayment(params())).machine;
        apply(&creation, Event::Resolved(payment(false))).machine
    }

    #[test]
    fn test_idle_create_enters_creation_with_effect() {
        let t = apply(&Machine::new(), Event::CreatePayment(params()));
        assert_eq!(t.machine.state(), State::Creation);
        assert_eq!(
            t.step,
            Step::Enter {
                effect: Some(Effect::CreatePayment(params()))
            }
        );
        assert!(t.machine.context().payment.is_none());
    }

    #[test]
    fn test_idle_start_verification_fetches_token() {
        let token = PaymentToken::new("abc");
        let t = apply(
            &Machine::new(),
            Event::StartPaymentVerification(token.clone()),
        );
        assert_eq!(t.machine.state(), State::Fetching);
        assert_eq!(
            t.step,
            Step::Enter {
                effect: Some(Effect::FetchPayment(token))
            }
        );
    }

    #[test]
    fn test_resolved_enters_verification_and_polls() {
        let machine = verifying();
        assert_eq!(machine.state(), State::Verification);
        assert_eq!(machine.context().payment, Some(payment(false)));
        assert!(machine.context().error.is_none());
    }

    #[test]
    fn test_rejected_creation_fails_with_network_error() {
        let creation = apply(&Machine::new(), Event::CreatePayment(params())).machine;
        let t = apply(
            &creation,
            Event::Rejected(GatewayError::transport("Network Error!")),
        );
        assert_eq!(t.machine.state(), State::Failure);
        let error = t.machine.context().error.as_ref().unwrap();
        assert_eq!(error.reason(), "NETWORK_ERROR");
        assert_eq!(
            error.details().unwrap().to_string(),
            "transport failure: Network Error!"
        );
    }

    #[test]
    fn test_terminate_from_every_busy_state() {
        let creation = apply(&Machine::new(), Event::CreatePayment(params())).machine;
        let fetching = apply(
            &Machine::new(),
            Event::StartPaymentVerification(PaymentToken::new("abc")),
        )
        .machine;

        for machine in [creation, fetching, verifying()] {
            let t = apply(&machine, Event::Terminate);
            assert_eq!(t.machine.state(), State::Failure);
            assert_eq!(
                t.machine.context().error.as_ref().unwrap().reason(),
                "USER_TERMINATED"
            );
        }
    }

    #[test]
    fn test_verify_payment_reenters_without_touching_error() {
        let mut refreshed = payment(false);
        refreshed.remaining_seconds = 100;
        let t = apply(&verifying(), Event::VerifyPayment(refreshed.clone()));
        assert_eq!(t.machine.state(), State::Verification);
        assert_eq!(
            t.step,
            Step::Enter {
                effect: Some(Effect::Poll(refreshed.token.clone()))
            }
        );
        assert_eq!(t.machine.context().payment, Some(refreshed));
        assert!(t.machine.context().error.is_none());
    }

    #[test]
    fn test_payment_verified_reaches_success() {
        let t = apply(&verifying(), Event::PaymentVerified(payment(true)));
        assert_eq!(t.machine.state(), State::Success);
        assert_eq!(t.machine.context().payment, Some(payment(true)));
        assert!(t.machine.context().error.is_none());
    }

    #[test]
    fn test_payment_verified_for_another_session_is_ignored() {
        let mut foreign = payment(true);
        foreign.token = PaymentToken::new("someone-else");
        assert!(verifying()
            .transition(Event::PaymentVerified(foreign))
            .is_none());
    }

    #[test]
    fn test_session_expired_fails() {
        let t = apply(&verifying(), Event::PaymentSessionExpired);
        assert_eq!(t.machine.state(), State::Failure);
        assert_eq!(
            t.machine.context().error.as_ref().unwrap().reason(),
            "SESSION_EXPIRED"
        );
    }

    #[test]
    fn test_payment_updated_refreshes_in_place() {
        let mut update = payment(false);
        update.balance = dec!(0.0000005);
        let t = apply(&verifying(), Event::PaymentUpdated(update.clone()));
        assert_eq!(t.step, Step::Refresh);
        assert_eq!(t.machine.state(), State::Verification);
        assert_eq!(t.machine.context().payment, Some(update));
    }

    #[test]
    fn test_payment_updated_ignores_foreign_or_identical_snapshots() {
        let machine = verifying();
        let mut foreign = payment(false);
        foreign.token = PaymentToken::new("someone-else");
        assert!(machine.transition(Event::PaymentUpdated(foreign)).is_none());
        assert!(machine
            .transition(Event::PaymentUpdated(payment(false)))
            .is_none());
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        let success = apply(&verifying(), Event::PaymentVerified(payment(true))).machine;
        let failure = apply(&verifying(), Event::Terminate).machine;

        for machine in [success, failure] {
            assert!(machine.transition(Event::Terminate).is_none());
            assert!(machine.transition(Event::Resolved(payment(false))).is_none());
            assert!(machine
                .transition(Event::Rejected(GatewayError::transport("late")))
                .is_none());
            assert!(machine.transition(Event::CreatePayment(params())).is_none());
        }
    }

    #[test]
    fn test_out_of_place_events_are_ignored() {
        let idle = Machine::new();
        assert!(idle.transition(Event::Terminate).is_none());
        assert!(idle.transition(Event::PaymentVerified(payment(true))).is_none());

        let machine = verifying();
        assert!(machine.transition(Event::CreatePayment(params())).is_none());
        assert!(machine
            .transition(Event::StartPaymentVerification(PaymentToken::new("x")))
            .is_none());
        assert!(machine.transition(Event::Resolved(payment(false))).is_none());
    }
}
