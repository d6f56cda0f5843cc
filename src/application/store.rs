//! Typed record access over a [`LedgerStub`].

use std::ops::ControlFlow;

use metrics::counter;
use serde::{Serialize, de::Error as _};
use tracing::{debug, info, warn};

use crate::application::{
    error::ContractError,
    keys::{INDEX_MARKER, RecordKey, ScanPrefix, display_key, primary_from_index},
    ledger::{KeyModification, LedgerStub},
    lifecycle::LedgerRecord,
};
use crate::domain::types::{EventName, ledger_timestamp};

const SOURCE: &str = "marquee::store";

/// Per-transaction view of the ledger used by every contract operation.
pub struct RecordStore<'a> {
    stub: &'a mut dyn LedgerStub,
}

impl<'a> RecordStore<'a> {
    pub fn new(stub: &'a mut dyn LedgerStub) -> Self {
        Self { stub }
    }

    pub fn tx_id(&self) -> &str {
        self.stub.tx_id()
    }

    /// Transaction time in the persisted timestamp format.
    pub fn now(&self) -> Result<String, ContractError> {
        Ok(ledger_timestamp(self.stub.tx_timestamp())?)
    }

    pub fn exists(&self, key: RecordKey<'_>) -> Result<bool, ContractError> {
        let encoded = key.encode()?;
        Ok(self.stub.get_state(&encoded)?.is_some())
    }

    pub fn fetch<R: LedgerRecord>(&self, key: RecordKey<'_>) -> Result<Option<R>, ContractError> {
        let encoded = key.encode()?;
        match self.stub.get_state(&encoded)? {
            Some(bytes) => decode::<R>(&bytes).map(Some),
            None => Ok(None),
        }
    }

    pub fn require<R: LedgerRecord>(&self, key: RecordKey<'_>) -> Result<R, ContractError> {
        self.fetch(key)?
            .ok_or_else(|| ContractError::not_found(R::ENTITY, key.label()))
    }

    /// Writes a new record together with its index entries.
    pub fn insert<R: LedgerRecord>(&mut self, record: &R) -> Result<(), ContractError> {
        let key = record.primary_key()?;
        self.write(&key, record)?;
        for index in record.index_keys()? {
            self.stub.put_state(&index, INDEX_MARKER.to_vec())?;
        }
        Ok(())
    }

    /// Rewrites an existing record in place; index entries never change.
    pub fn replace<R: LedgerRecord>(&mut self, record: &R) -> Result<(), ContractError> {
        let key = record.primary_key()?;
        self.write(&key, record)
    }

    fn write<R: LedgerRecord>(&mut self, key: &str, record: &R) -> Result<(), ContractError> {
        let bytes = serde_json::to_vec(record).map_err(|err| ContractError::codec(R::ENTITY, err))?;
        self.stub.put_state(key, bytes)?;
        debug!(
            target = SOURCE,
            tx_id = self.stub.tx_id(),
            key = %display_key(key),
            version = record.version(),
            "record written"
        );
        Ok(())
    }

    /// Visits records whose primary keys share `prefix`, in key order.
    ///
    /// Undecodable records are skipped. Returning `ControlFlow::Break` stops
    /// the scan and releases the cursor.
    pub fn scan_records<R, F>(&self, prefix: ScanPrefix<'_>, visit: F) -> Result<(), ContractError>
    where
        R: LedgerRecord,
        F: FnMut(&str, R) -> ControlFlow<()>,
    {
        self.scan_records_from(prefix, None, visit)
    }

    /// Same as [`scan_records`](Self::scan_records), but starts right after
    /// the record stored under `after` instead of at the start of the prefix.
    pub fn scan_records_from<R, F>(
        &self,
        prefix: ScanPrefix<'_>,
        after: Option<RecordKey<'_>>,
        mut visit: F,
    ) -> Result<(), ContractError>
    where
        R: LedgerRecord,
        F: FnMut(&str, R) -> ControlFlow<()>,
    {
        let encoded = prefix.encode()?;
        let scan = match after {
            Some(key) => self.stub.scan_prefix_after(&encoded, &key.encode()?)?,
            None => self.stub.scan_prefix(&encoded)?,
        };
        for item in scan {
            let kv = item?;
            let Some(record) = decode_or_skip::<R>(&kv.key, &kv.value) else {
                continue;
            };
            if visit(&kv.key, record).is_break() {
                break;
            }
        }
        Ok(())
    }

    /// Visits the records an index prefix points at, in index-key order.
    ///
    /// Index entries whose record is missing or undecodable are skipped.
    pub fn scan_index<R, F>(&self, prefix: ScanPrefix<'_>, mut visit: F) -> Result<(), ContractError>
    where
        R: LedgerRecord,
        F: FnMut(R) -> ControlFlow<()>,
    {
        let encoded = prefix.encode()?;
        for item in self.stub.scan_prefix(&encoded)? {
            let kv = item?;
            let primary = match primary_from_index(&kv.key) {
                Ok(primary) => primary,
                Err(err) => {
                    skip(&kv.key, "malformed_index_key", &err.to_string());
                    continue;
                }
            };
            let Some(bytes) = self.stub.get_state(&primary)? else {
                skip(&kv.key, "dangling_index_entry", "indexed record is missing");
                continue;
            };
            let Some(record) = decode_or_skip::<R>(&primary, &bytes) else {
                continue;
            };
            if visit(record).is_break() {
                break;
            }
        }
        Ok(())
    }

    /// Collects every indexed record accepted by `keep`.
    pub fn collect_index<R, F>(&self, prefix: ScanPrefix<'_>, mut keep: F) -> Result<Vec<R>, ContractError>
    where
        R: LedgerRecord,
        F: FnMut(&R) -> bool,
    {
        let mut records = Vec::new();
        self.scan_index(prefix, |record: R| {
            if keep(&record) {
                records.push(record);
            }
            ControlFlow::Continue(())
        })?;
        Ok(records)
    }

    /// Committed revisions of a record, oldest first, bounded by `limit`.
    pub fn history(
        &self,
        key: RecordKey<'_>,
        limit: Option<usize>,
    ) -> Result<Vec<KeyModification>, ContractError> {
        let encoded = key.encode()?;
        let bound = limit.unwrap_or(usize::MAX);
        let mut revisions = Vec::new();
        for item in self.stub.history_for_key(&encoded)?.take(bound) {
            revisions.push(item?);
        }
        Ok(revisions)
    }

    pub fn emit<P: Serialize>(&mut self, event: EventName, payload: &P) -> Result<(), ContractError> {
        let bytes = serde_json::to_vec(payload).map_err(|err| ContractError::codec("event", err))?;
        self.stub.set_event(event.as_str(), bytes)?;
        info!(
            target = SOURCE,
            tx_id = self.stub.tx_id(),
            event = %event,
            "event staged"
        );
        Ok(())
    }
}

pub(crate) fn decode<R: LedgerRecord>(bytes: &[u8]) -> Result<R, ContractError> {
    let record: R = serde_json::from_slice(bytes).map_err(|err| ContractError::codec(R::ENTITY, err))?;
    if record.doc_type() != R::DOC_TYPE {
        let err = serde_json::Error::custom(format!(
            "expected doc_type `{}`, found `{}`",
            R::DOC_TYPE.as_str(),
            record.doc_type().as_str()
        ));
        return Err(ContractError::codec(R::ENTITY, err));
    }
    Ok(record)
}

fn decode_or_skip<R: LedgerRecord>(key: &str, bytes: &[u8]) -> Option<R> {
    match decode::<R>(bytes) {
        Ok(record) => Some(record),
        Err(err) => {
            skip(key, "undecodable_record", &err.to_string());
            None
        }
    }
}

fn skip(key: &str, reason: &'static str, detail: &str) {
    counter!("marquee_scan_skipped_total", "reason" => reason).increment(1);
    warn!(
        target = SOURCE,
        key = %display_key(key),
        reason,
        detail,
        "skipping record during scan"
    );
}
