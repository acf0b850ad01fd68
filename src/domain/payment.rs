use crate::error::Error;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Opaque session identifier issued by the gateway.
///
/// Stable for the lifetime of one payment; it is the only handle needed to
/// fetch the payment again or to open its push channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentToken(String);

impl PaymentToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PaymentToken {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Banano,
    Usd,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Banano => "BANANO",
            Currency::Usd => "USD",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BANANO" => Ok(Currency::Banano),
            "USD" => Ok(Currency::Usd),
            other => Err(Error::ValidationError(format!(
                "unsupported currency code: {other}"
            ))),
        }
    }
}

/// Snapshot of a payment session as reported by the gateway.
///
/// Every fetch produces a fresh value; nothing here is mutated locally.
/// Quantities stay exact decimals end to end and travel as strings on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub token: PaymentToken,
    /// Destination address the payer sends funds to.
    pub account: String,
    #[serde(default)]
    pub amount: Decimal,
    #[serde(default)]
    pub amount_in_currency: Decimal,
    pub currency: Currency,
    #[serde(default)]
    pub balance: Decimal,
    /// Partial payments keyed by identifier; passed through untouched.
    #[serde(default)]
    pub sub_payments: BTreeMap<String, Value>,
    /// Countdown to session expiry, decremented by the gateway.
    #[serde(default)]
    pub remaining_seconds: u64,
    /// Merchant supplied passthrough, echoed back unmodified.
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub fulfilled: bool,
    #[serde(default)]
    pub merchant_notified: bool,
}

impl Payment {
    /// A payment counts as verified only once the merchant has been notified.
    pub fn is_verified(&self) -> bool {
        self.merchant_notified
    }

    pub fn is_expired(&self) -> bool {
        self.remaining_seconds == 0
    }
}

/// Parameters of a new payment session.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatePaymentParams {
    amount: Decimal,
    currency: Currency,
    state: Option<String>,
}

impl CreatePaymentParams {
    /// Amounts must be strictly positive; the gateway refuses anything else.
    pub fn new(amount: Decimal, currency: Currency) -> Result<Self, Error> {
        if amount <= Decimal::ZERO {
            return Err(Error::ValidationError(
                "Amount must be positive".to_string(),
            ));
        }
        Ok(Self {
            amount,
            currency,
            state: None,
        })
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }
}

fn is_truthy_str(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::String(s)) if !s.is_empty())
}

/// Structural check for an untyped payload: an object carrying a non-empty
/// `token`, `account` and `currency`.
pub fn is_payment(input: &Value) -> bool {
    let Some(record) = input.as_object() else {
        return false;
    };
    is_truthy_str(record.get("token"))
        && is_truthy_str(record.get("account"))
        && is_truthy_str(record.get("currency"))
}

pub fn is_verified_payment(input: &Value) -> bool {
    is_payment(input) && input.get("merchantNotified") == Some(&Value::Bool(true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn wire_payment() -> Value {
        json!({
            "token": "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9",
            "account": "ban_3c9pkkgdy5n8qkkrzj96ncjnpcbuj6ux3177wawn1wu5ynoejquumbffdxny",
            "amount": "0.000001",
            "amountInCurrency": "0.000001",
            "currency": "BANANO",
            "balance": "0",
            "subPayments": {},
            "remainingSeconds": 14399,
            "state": "",
            "fulfilled": false,
            "merchantNotified": false
        })
    }

    #[test]
    fn test_payment_deserialization_keeps_exact_decimals() {
        let payment: Payment = serde_json::from_value(wire_payment()).unwrap();
        assert_eq!(payment.amount, dec!(0.000001));
        assert_eq!(payment.amount_in_currency, dec!(0.000001));
        assert_eq!(payment.currency, Currency::Banano);
        assert_eq!(payment.remaining_seconds, 14399);
        assert!(!payment.is_verified());
        assert!(!payment.is_expired());
    }

    #[test]
    fn test_payment_serializes_camel_case_with_string_amounts() {
        let payment: Payment = serde_json::from_value(wire_payment()).unwrap();
        let value = serde_json::to_value(&payment).unwrap();
        assert_eq!(value["amount"], json!("0.000001"));
        assert_eq!(value["merchantNotified"], json!(false));
        assert_eq!(value["remainingSeconds"], json!(14399));
    }

    #[test]
    fn test_optional_wire_fields_default() {
        let payment: Payment = serde_json::from_value(json!({
            "token": "t",
            "account": "ban_1",
            "amount": "1",
            "currency": "USD",
            "remainingSeconds": 10
        }))
        .unwrap();
        assert_eq!(payment.balance, Decimal::ZERO);
        assert!(payment.sub_payments.is_empty());
        assert!(!payment.merchant_notified);
    }

    #[test]
    fn test_structural_minimum_decodes() {
        let payment: Payment = serde_json::from_value(json!({
            "token": "t",
            "account": "ban_1",
            "currency": "BANANO",
            "merchantNotified": true
        }))
        .unwrap();
        assert_eq!(payment.amount, Decimal::ZERO);
        assert_eq!(payment.remaining_seconds, 0);
        assert!(payment.is_verified());
    }

    #[test]
    fn test_is_payment_structural_check() {
        assert!(is_payment(&wire_payment()));
        assert!(!is_payment(&json!("{ foo: bar }")));
        assert!(!is_payment(&json!({ "foo": "bar" })));
        assert!(!is_payment(&json!({ "token": "", "account": "a", "currency": "USD" })));
        assert!(!is_payment(&Value::Null));
    }

    #[test]
    fn test_is_verified_payment() {
        let mut payload = wire_payment();
        assert!(!is_verified_payment(&payload));
        payload["merchantNotified"] = json!(true);
        assert!(is_verified_payment(&payload));
    }

    #[test]
    fn test_create_params_reject_non_positive_amount() {
        assert!(CreatePaymentParams::new(dec!(0), Currency::Usd).is_err());
        assert!(CreatePaymentParams::new(dec!(-1.5), Currency::Usd).is_err());

        let params = CreatePaymentParams::new(dec!(0.1), Currency::Usd)
            .unwrap()
            .with_state("order-42");
        assert_eq!(params.state(), Some("order-42"));
    }

    #[test]
    fn test_currency_from_str() {
        assert_eq!("usd".parse::<Currency>().unwrap(), Currency::Usd);
        assert_eq!("BANANO".parse::<Currency>().unwrap(), Currency::Banano);
        assert!("EUR".parse::<Currency>().is_err());
    }
}
