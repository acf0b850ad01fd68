//! Domain layer: the payment snapshot, the lifecycle state machine and the
//! ports it talks through. Nothing in here performs I/O.

pub mod classifier;
pub mod error;
pub mod machine;
pub mod payment;
pub mod ports;
