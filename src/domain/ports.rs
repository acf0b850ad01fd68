use super::error::GatewayError;
use super::payment::{CreatePaymentParams, Payment, PaymentToken};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment(&self, params: &CreatePaymentParams) -> Result<Payment, GatewayError>;
    async fn fetch_payment(&self, token: &PaymentToken) -> Result<Payment, GatewayError>;
}

pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;

/// Destination for diagnostic messages, injected instead of a global logger.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, namespace: &str, message: &str);
}

pub type DiagnosticSinkRef = Arc<dyn DiagnosticSink>;
