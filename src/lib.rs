//! Ledger-backed content review, repository entries and engagement tracking.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
