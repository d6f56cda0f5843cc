//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod gateway;
pub mod http;
pub mod ledger;
pub(crate) mod lock;
pub mod telemetry;
