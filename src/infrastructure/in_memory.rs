use crate::domain::error::GatewayError;
use crate::domain::payment::{CreatePaymentParams, Payment, PaymentToken};
use crate::domain::ports::PaymentGateway;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// An in-process stand-in for the payment gateway.
///
/// Sessions live in `Arc<RwLock<HashMap<PaymentToken, Payment>>>`; the
/// gateway-side changes a real deployment would make on its own (funds
/// arriving, countdown running out) are driven explicitly through
/// [`settle`](Self::settle), [`credit`](Self::credit) and
/// [`expire`](Self::expire).
#[derive(Default, Clone)]
pub struct InMemoryGateway {
    payments: Arc<RwLock<HashMap<PaymentToken, Payment>>>,
    session_seconds: u64,
    next_id: Arc<AtomicUsize>,
    creates: Arc<AtomicUsize>,
    fetches: Arc<AtomicUsize>,
}

impl InMemoryGateway {
    /// Creates an empty gateway whose new sessions start with
    /// `session_seconds` remaining.
    pub fn new(session_seconds: u64) -> Self {
        Self {
            session_seconds,
            ..Self::default()
        }
    }

    /// Opens a session directly, bypassing the call counters.
    pub async fn open_session(&self, params: &CreatePaymentParams) -> Payment {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let payment = Payment {
            token: PaymentToken::new(format!("session-{id}")),
            account: format!("ban_in_memory_{id:04}"),
            amount: params.amount(),
            amount_in_currency: params.amount(),
            currency: params.currency(),
            balance: Decimal::ZERO,
            sub_payments: Default::default(),
            remaining_seconds: self.session_seconds,
            state: params.state().unwrap_or_default().to_string(),
            fulfilled: false,
            merchant_notified: false,
        };
        self.insert(payment.clone()).await;
        payment
    }

    pub async fn insert(&self, payment: Payment) {
        let mut payments = self.payments.write().await;
        payments.insert(payment.token.clone(), payment);
    }

    pub async fn get(&self, token: &PaymentToken) -> Option<Payment> {
        let payments = self.payments.read().await;
        payments.get(token).cloned()
    }

    /// Records a partial payment towards the session balance.
    pub async fn credit(&self, token: &PaymentToken, amount: Decimal) {
        self.update(token, |payment| {
            payment.balance += amount;
            payment.fulfilled = payment.balance >= payment.amount;
        })
        .await;
    }

    /// Marks the session as fully paid and the merchant as notified.
    pub async fn settle(&self, token: &PaymentToken) {
        self.update(token, |payment| {
            payment.balance = payment.amount;
            payment.fulfilled = true;
            payment.merchant_notified = true;
        })
        .await;
    }

    pub async fn expire(&self, token: &PaymentToken) {
        self.update(token, |payment| payment.remaining_seconds = 0)
            .await;
    }

    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    async fn update(&self, token: &PaymentToken, change: impl FnOnce(&mut Payment)) {
        let mut payments = self.payments.write().await;
        if let Some(payment) = payments.get_mut(token) {
            change(payment);
        }
    }
}

#[async_trait]
impl PaymentGateway for InMemoryGateway {
    async fn create_payment(&self, params: &CreatePaymentParams) -> Result<Payment, GatewayError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(self.open_session(params).await)
    }

    async fn fetch_payment(&self, token: &PaymentToken) -> Result<Payment, GatewayError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.get(token).await.ok_or_else(|| GatewayError::Status {
            status: 404,
            body: format!("payment {token} not found"),
        })
    }
}
