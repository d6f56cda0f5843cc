//! Host ledger contract.
//!
//! The core only needs an ordered, versioned key-value store with prefix
//! scan, per-key history and a single event slot per transaction. Reads
//! observe the snapshot the transaction started from; writes become
//! visible only after the host commits them.

use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

/// Lazy, finite iterator handed out by the host. Dropping it releases the
/// underlying cursor, so early returns never leak host resources.
pub type LedgerIter<'a, T> = Box<dyn Iterator<Item = Result<T, LedgerError>> + 'a>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: Vec<u8>,
}

/// One committed revision of a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyModification {
    pub tx_id: String,
    pub timestamp: String,
    pub is_delete: bool,
    #[serde(skip)]
    pub value: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("transaction conflict on key `{key}`")]
    Conflict { key: String },
    #[error("ledger key rejected: {reason}")]
    InvalidKey { reason: String },
    #[error("ledger storage failure: {message}")]
    Storage { message: String },
    #[error("ledger io error: {0}")]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    pub fn conflict(key: impl Into<String>) -> Self {
        Self::Conflict { key: key.into() }
    }

    pub fn invalid_key(reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            reason: reason.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

pub trait LedgerStub {
    fn tx_id(&self) -> &str;

    fn tx_timestamp(&self) -> OffsetDateTime;

    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError>;

    fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<(), LedgerError>;

    /// Keys starting with `prefix`, in ascending key order.
    fn scan_prefix(&self, prefix: &str) -> Result<LedgerIter<'_, KeyValue>, LedgerError>;

    /// Keys starting with `prefix` that sort strictly after `after`.
    fn scan_prefix_after(
        &self,
        prefix: &str,
        after: &str,
    ) -> Result<LedgerIter<'_, KeyValue>, LedgerError>;

    /// Committed revisions of `key`, oldest first.
    fn history_for_key(&self, key: &str) -> Result<LedgerIter<'_, KeyModification>, LedgerError>;

    /// Sets the transaction's event; a later call replaces an earlier one.
    fn set_event(&mut self, name: &str, payload: Vec<u8>) -> Result<(), LedgerError>;
}
