pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;

pub use application::service::{PaymentHandle, PaymentService, PaymentServiceConfig, Snapshot};
pub use domain::machine::{Command, State};
pub use domain::payment::{CreatePaymentParams, Currency, Payment, PaymentToken};
