//! Contract services over the keyed ledger.

pub mod args;
pub mod catalog;
pub mod comments;
pub mod contract;
pub mod entries;
pub mod error;
pub mod keys;
pub mod ledger;
pub mod lifecycle;
pub mod pagination;
pub mod ratings;
pub mod response;
pub mod store;
