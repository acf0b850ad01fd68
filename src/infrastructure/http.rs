use crate::domain::error::GatewayError;
use crate::domain::payment::{CreatePaymentParams, Payment, PaymentToken};
use crate::domain::ports::PaymentGateway;
use crate::error::Result;
use async_trait::async_trait;
use reqwest::multipart::Form;
use reqwest::{Client, Response, Url};
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpGatewayConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl HttpGatewayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Gateway client over HTTP.
///
/// * `POST {base}/pay` with a multipart form of `amount`, `currency`, `state`
/// * `GET {base}/verify?token=<token>`
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(config: HttpGatewayConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    fn verify_url(&self, token: &PaymentToken) -> Result<Url, GatewayError> {
        Url::parse_with_params(&self.endpoint("verify"), &[("token", token.as_str())])
            .map_err(GatewayError::transport)
    }

    async fn read_payment(response: Response) -> Result<Payment, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await.map_err(GatewayError::transport)?;
        serde_json::from_slice(&bytes).map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

fn payment_form(params: &CreatePaymentParams) -> Form {
    Form::new()
        .text("amount", params.amount().to_string())
        .text("currency", params.currency().code())
        .text("state", params.state().unwrap_or_default().to_string())
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn create_payment(&self, params: &CreatePaymentParams) -> Result<Payment, GatewayError> {
        let response = self
            .client
            .post(self.endpoint("pay"))
            .multipart(payment_form(params))
            .send()
            .await
            .map_err(GatewayError::transport)?;
        Self::read_payment(response).await
    }

    async fn fetch_payment(&self, token: &PaymentToken) -> Result<Payment, GatewayError> {
        let response = self
            .client
            .get(self.verify_url(token)?)
            .send()
            .await
            .map_err(GatewayError::transport)?;
        Self::read_payment(response).await
    }
}
