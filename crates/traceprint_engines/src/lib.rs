#![forbid(unsafe_code)]

pub mod access_gate;
pub mod composer;

pub use access_gate::{AccessGate, AdminCredentials, GateDecision, GateRejection};
pub use composer::{ComposeError, FingerprintComposer};
