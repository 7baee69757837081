#![forbid(unsafe_code)]

pub mod client;
pub mod common;
pub mod edge;
pub mod record;

pub use common::{ContractViolation, SchemaVersion, Validate};
