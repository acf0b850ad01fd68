//! Application layer: runs the lifecycle machine against real I/O.
//!
//! [`service::PaymentService`] owns the machine and executes its effects as
//! spawned tasks tagged with an [`epoch::Epoch`], so results of superseded
//! work are dropped instead of applied.

pub mod epoch;
pub mod poller;
pub mod service;
