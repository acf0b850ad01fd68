#![allow(dead_code)]

use accept_banano::domain::error::GatewayError;
use accept_banano::domain::ports::{DiagnosticSink, PaymentGateway};
use accept_banano::{CreatePaymentParams, Currency, Payment, PaymentToken, Snapshot, State};
use async_trait::async_trait;
use rust_decimal_macros::dec;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, mpsc};

pub const TOKEN: &str = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9";

pub fn mock_payment() -> Payment {
    Payment {
        token: PaymentToken::new(TOKEN),
        account: "ban_3c9pkkgdy5n8qkkrzj96ncjnpcbuj6ux3177wawn1wu5ynoejquumbffdxny".to_string(),
        amount: dec!(0.000001),
        amount_in_currency: dec!(0.000001),
        currency: Currency::Banano,
        balance: dec!(0),
        sub_payments: Default::default(),
        remaining_seconds: 14399,
        state: String::new(),
        fulfilled: false,
        merchant_notified: false,
    }
}

pub fn verified_payment() -> Payment {
    Payment {
        merchant_notified: true,
        fulfilled: true,
        ..mock_payment()
    }
}

pub fn expired_payment() -> Payment {
    Payment {
        remaining_seconds: 0,
        ..mock_payment()
    }
}

pub fn params() -> CreatePaymentParams {
    CreatePaymentParams::new(dec!(0.1), Currency::Usd).unwrap()
}

pub enum Reply {
    Ok(Payment),
    Fail(&'static str),
    /// Waits for the gate before resolving.
    Held(Arc<Notify>, Payment),
}

/// Gateway that answers from per-operation scripts and falls back to
/// `mock_payment()` once a script runs dry.
#[derive(Default)]
pub struct ScriptedGateway {
    creates: Mutex<VecDeque<Reply>>,
    fetches: Mutex<VecDeque<Reply>>,
    create_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_create(self, reply: Reply) -> Self {
        self.creates.lock().unwrap().push_back(reply);
        self
    }

    pub fn on_fetch(self, reply: Reply) -> Self {
        self.fetches.lock().unwrap().push_back(reply);
        self
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    async fn answer(script: &Mutex<VecDeque<Reply>>) -> Result<Payment, GatewayError> {
        let reply = script.lock().unwrap().pop_front();
        match reply {
            None => Ok(mock_payment()),
            Some(Reply::Ok(payment)) => Ok(payment),
            Some(Reply::Fail(message)) => Err(GatewayError::transport(message)),
            Some(Reply::Held(gate, payment)) => {
                gate.notified().await;
                Ok(payment)
            }
        }
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_payment(&self, _params: &CreatePaymentParams) -> Result<Payment, GatewayError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        Self::answer(&self.creates).await
    }

    async fn fetch_payment(&self, _token: &PaymentToken) -> Result<Payment, GatewayError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        Self::answer(&self.fetches).await
    }
}

#[derive(Default)]
pub struct RecordingSink {
    lines: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl DiagnosticSink for RecordingSink {
    fn record(&self, namespace: &str, message: &str) {
        self.lines
            .lock()
            .unwrap()
            .push(format!("{namespace}: {message}"));
    }
}

pub async fn drain(transitions: &mut mpsc::UnboundedReceiver<Snapshot>) -> Vec<Snapshot> {
    let mut seen = Vec::new();
    while let Some(snapshot) = transitions.recv().await {
        seen.push(snapshot);
    }
    seen
}

pub fn states(snapshots: &[Snapshot]) -> Vec<State> {
    snapshots.iter().map(|s| s.state).collect()
}
