//! In-process multi-version ledger.
//!
//! Every key keeps its full list of committed revisions tagged with the
//! block number that wrote them. A transaction reads the newest revision at
//! or below its snapshot block, buffers its writes, and at commit time is
//! refused if any key it read or any prefix it scanned gained a revision
//! after that snapshot.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use metrics::counter;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::application::keys::display_key;
use crate::application::ledger::{
    KeyModification, KeyValue, LedgerError, LedgerIter, LedgerStub,
};
use crate::domain::types::ledger_timestamp;
use crate::infra::lock::{mutex_lock, rw_read, rw_write};

use super::events::EventQueue;
use super::journal::{Block, BlockEvent, BlockWrite, Journal};

const SOURCE: &str = "marquee::ledger";

#[derive(Debug, Clone)]
struct Revision {
    block: u64,
    tx_id: String,
    timestamp: OffsetDateTime,
    value: Vec<u8>,
}

#[derive(Debug, Default)]
struct LedgerState {
    height: u64,
    keys: BTreeMap<String, Vec<Revision>>,
}

impl LedgerState {
    fn visible(&self, key: &str, snapshot: u64) -> Option<&Revision> {
        self.keys
            .get(key)?
            .iter()
            .rev()
            .find(|revision| revision.block <= snapshot)
    }

    fn changed_since(&self, key: &str, snapshot: u64) -> bool {
        self.keys
            .get(key)
            .and_then(|revisions| revisions.last())
            .is_some_and(|revision| revision.block > snapshot)
    }

    fn prefix_changed_since(&self, prefix: &str, snapshot: u64) -> Option<String> {
        self.keys
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .find(|(_, revisions)| {
                revisions
                    .last()
                    .is_some_and(|revision| revision.block > snapshot)
            })
            .map(|(key, _)| key.clone())
    }

    fn apply(&mut self, block: &Block) {
        for write in &block.writes {
            self.keys
                .entry(write.key.clone())
                .or_default()
                .push(Revision {
                    block: block.number,
                    tx_id: block.tx_id.clone(),
                    timestamp: block.timestamp,
                    value: write.value.clone(),
                });
        }
        self.height = self.height.max(block.number);
    }
}

/// Result of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    pub tx_id: String,
    /// `None` for read-only transactions, which write no block.
    pub block: Option<u64>,
    pub event: Option<String>,
}

pub struct MemoryLedger {
    state: RwLock<LedgerState>,
    journal: Option<Mutex<Journal>>,
    events: Arc<EventQueue>,
    open_cursors: AtomicUsize,
    nonce: AtomicU64,
}

impl MemoryLedger {
    /// Volatile ledger; nothing survives the process.
    pub fn in_memory(events: Arc<EventQueue>) -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
            journal: None,
            events,
            open_cursors: AtomicUsize::new(0),
            nonce: AtomicU64::new(0),
        }
    }

    /// Ledger backed by a journal file, replaying any blocks already in it.
    pub fn open(path: &Path, events: Arc<EventQueue>) -> Result<Self, LedgerError> {
        let (journal, blocks) = Journal::open(path)?;
        let mut state = LedgerState::default();
        for block in &blocks {
            state.apply(block);
        }
        info!(
            target = SOURCE,
            path = %path.display(),
            height = state.height,
            keys = state.keys.len(),
            "ledger restored from journal"
        );
        Ok(Self {
            state: RwLock::new(state),
            journal: Some(Mutex::new(journal)),
            events,
            open_cursors: AtomicUsize::new(0),
            nonce: AtomicU64::new(0),
        })
    }

    pub fn events(&self) -> &Arc<EventQueue> {
        &self.events
    }

    /// Number of committed blocks.
    pub fn height(&self) -> u64 {
        rw_read(&self.state, SOURCE, "height").height
    }

    /// Scan and history iterators currently alive.
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::SeqCst)
    }

    pub fn begin(&self) -> Transaction<'_> {
        self.begin_at(OffsetDateTime::now_utc())
    }

    /// Starts a transaction with a caller-chosen timestamp.
    pub fn begin_at(&self, timestamp: OffsetDateTime) -> Transaction<'_> {
        let snapshot = self.height();
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        let mut hasher = Sha256::new();
        hasher.update(snapshot.to_be_bytes());
        hasher.update(nonce.to_be_bytes());
        hasher.update(timestamp.unix_timestamp_nanos().to_be_bytes());
        let tx_id = hex::encode(hasher.finalize());

        Transaction {
            ledger: self,
            tx_id,
            timestamp,
            snapshot,
            reads: RefCell::new(BTreeSet::new()),
            scans: RefCell::new(BTreeSet::new()),
            writes: BTreeMap::new(),
            event: None,
        }
    }

    fn commit(&self, tx: Transaction<'_>) -> Result<CommitReceipt, LedgerError> {
        let Transaction {
            tx_id,
            timestamp,
            snapshot,
            reads,
            scans,
            writes,
            event,
            ..
        } = tx;

        if writes.is_empty() && event.is_none() {
            return Ok(CommitReceipt {
                tx_id,
                block: None,
                event: None,
            });
        }

        let mut state = rw_write(&self.state, SOURCE, "commit");
        let conflict = reads
            .borrow()
            .iter()
            .find(|key| state.changed_since(key, snapshot))
            .cloned()
            .or_else(|| {
                scans
                    .borrow()
                    .iter()
                    .find_map(|prefix| state.prefix_changed_since(prefix, snapshot))
            });
        if let Some(key) = conflict {
            counter!("marquee_commit_conflicts_total").increment(1);
            warn!(
                target = SOURCE,
                tx_id = %tx_id,
                snapshot,
                key = %display_key(&key),
                "transaction refused: read set changed after snapshot"
            );
            return Err(LedgerError::conflict(display_key(&key)));
        }

        let block = Block {
            number: state.height + 1,
            tx_id: tx_id.clone(),
            timestamp,
            writes: writes
                .into_iter()
                .map(|(key, value)| BlockWrite { key, value })
                .collect(),
            event: event.map(|(name, payload)| BlockEvent { name, payload }),
        };

        if let Some(journal) = &self.journal {
            mutex_lock(journal, SOURCE, "append").append(&block)?;
        }
        state.apply(&block);
        drop(state);

        debug!(
            target = SOURCE,
            tx_id = %tx_id,
            block = block.number,
            writes = block.writes.len(),
            "block committed"
        );

        let event_name = block.event.as_ref().map(|event| event.name.clone());
        if let Some(event) = &block.event {
            self.events
                .publish(block.number, &block.tx_id, &event.name, &event.payload);
        }
        Ok(CommitReceipt {
            tx_id,
            block: Some(block.number),
            event: event_name,
        })
    }

    fn cursor(&self) -> CursorGuard<'_> {
        self.open_cursors.fetch_add(1, Ordering::SeqCst);
        CursorGuard { ledger: self }
    }
}

struct CursorGuard<'l> {
    ledger: &'l MemoryLedger,
}

impl Drop for CursorGuard<'_> {
    fn drop(&mut self) {
        self.ledger.open_cursors.fetch_sub(1, Ordering::SeqCst);
    }
}

/// One invocation's view of the ledger. Dropping it without committing
/// discards every buffered write.
pub struct Transaction<'l> {
    ledger: &'l MemoryLedger,
    tx_id: String,
    timestamp: OffsetDateTime,
    snapshot: u64,
    reads: RefCell<BTreeSet<String>>,
    scans: RefCell<BTreeSet<String>>,
    writes: BTreeMap<String, Vec<u8>>,
    event: Option<(String, Vec<u8>)>,
}

impl Transaction<'_> {
    pub fn commit(self) -> Result<CommitReceipt, LedgerError> {
        let ledger = self.ledger;
        ledger.commit(self)
    }

    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    fn prefix_scan(&self, prefix: &str, after: Option<String>) -> PrefixScan<'_> {
        self.scans.borrow_mut().insert(prefix.to_string());
        PrefixScan {
            ledger: self.ledger,
            snapshot: self.snapshot,
            prefix: prefix.to_string(),
            after,
            done: false,
            _cursor: self.ledger.cursor(),
        }
    }
}

impl LedgerStub for Transaction<'_> {
    fn tx_id(&self) -> &str {
        &self.tx_id
    }

    fn tx_timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }

    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        self.reads.borrow_mut().insert(key.to_string());
        let state = rw_read(&self.ledger.state, SOURCE, "get_state");
        Ok(state
            .visible(key, self.snapshot)
            .map(|revision| revision.value.clone()))
    }

    fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<(), LedgerError> {
        if key.is_empty() {
            return Err(LedgerError::invalid_key("key must not be empty"));
        }
        if value.is_empty() {
            return Err(LedgerError::invalid_key(format!(
                "value for `{}` must not be empty",
                display_key(key)
            )));
        }
        self.writes.insert(key.to_string(), value);
        Ok(())
    }

    fn scan_prefix(&self, prefix: &str) -> Result<LedgerIter<'_, KeyValue>, LedgerError> {
        Ok(Box::new(self.prefix_scan(prefix, None)))
    }

    fn scan_prefix_after(
        &self,
        prefix: &str,
        after: &str,
    ) -> Result<LedgerIter<'_, KeyValue>, LedgerError> {
        // A position before the prefix would end the scan on a foreign key.
        let after = (after >= prefix).then(|| after.to_string());
        Ok(Box::new(self.prefix_scan(prefix, after)))
    }

    fn history_for_key(&self, key: &str) -> Result<LedgerIter<'_, KeyModification>, LedgerError> {
        Ok(Box::new(HistoryScan {
            ledger: self.ledger,
            snapshot: self.snapshot,
            key: key.to_string(),
            position: 0,
            _cursor: self.ledger.cursor(),
        }))
    }

    fn set_event(&mut self, name: &str, payload: Vec<u8>) -> Result<(), LedgerError> {
        if let Some((previous, _)) = &self.event {
            debug!(
                target = SOURCE,
                tx_id = %self.tx_id,
                previous = %previous,
                replacement = name,
                "transaction event replaced"
            );
        }
        self.event = Some((name.to_string(), payload));
        Ok(())
    }
}

/// Walks the key range one step at a time, re-locking per step so no lock
/// is held between calls.
struct PrefixScan<'l> {
    ledger: &'l MemoryLedger,
    snapshot: u64,
    prefix: String,
    after: Option<String>,
    done: bool,
    _cursor: CursorGuard<'l>,
}

impl Iterator for PrefixScan<'_> {
    type Item = Result<KeyValue, LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let state = rw_read(&self.ledger.state, SOURCE, "scan_prefix");
        let lower = match &self.after {
            Some(after) => Bound::Excluded(after.as_str()),
            None => Bound::Included(self.prefix.as_str()),
        };
        let found = state
            .keys
            .range::<str, _>((lower, Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(&self.prefix))
            .find_map(|(key, _)| {
                state
                    .visible(key, self.snapshot)
                    .map(|revision| KeyValue {
                        key: key.clone(),
                        value: revision.value.clone(),
                    })
            });
        drop(state);

        match found {
            Some(kv) => {
                self.after = Some(kv.key.clone());
                Some(Ok(kv))
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}

struct HistoryScan<'l> {
    ledger: &'l MemoryLedger,
    snapshot: u64,
    key: String,
    position: usize,
    _cursor: CursorGuard<'l>,
}

impl Iterator for HistoryScan<'_> {
    type Item = Result<KeyModification, LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        let state = rw_read(&self.ledger.state, SOURCE, "history_for_key");
        let revision = state
            .keys
            .get(&self.key)?
            .get(self.position)
            .filter(|revision| revision.block <= self.snapshot)?
            .clone();
        drop(state);

        self.position += 1;
        Some(
            ledger_timestamp(revision.timestamp)
                .map(|timestamp| KeyModification {
                    tx_id: revision.tx_id,
                    timestamp,
                    is_delete: false,
                    value: revision.value,
                })
                .map_err(|err| LedgerError::storage(format!("unformattable block time: {err}"))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> MemoryLedger {
        MemoryLedger::in_memory(Arc::new(EventQueue::new()))
    }

    fn put(ledger: &MemoryLedger, key: &str, value: &str) {
        let mut tx = ledger.begin();
        tx.put_state(key, value.as_bytes().to_vec()).unwrap();
        tx.commit().unwrap();
    }

    #[test]
    fn reads_see_the_snapshot_not_own_writes() {
        let ledger = ledger();
        put(&ledger, "a", "1");

        let mut tx = ledger.begin();
        tx.put_state("a", b"2".to_vec()).unwrap();
        assert_eq!(tx.get_state("a").unwrap(), Some(b"1".to_vec()));
        tx.commit().unwrap();

        let tx = ledger.begin();
        assert_eq!(tx.get_state("a").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn dropped_transactions_write_nothing() {
        let ledger = ledger();
        {
            let mut tx = ledger.begin();
            tx.put_state("a", b"1".to_vec()).unwrap();
        }
        assert_eq!(ledger.height(), 0);
        assert_eq!(ledger.begin().get_state("a").unwrap(), None);
    }

    #[test]
    fn concurrent_writer_on_a_read_key_conflicts() {
        let ledger = ledger();
        put(&ledger, "a", "1");

        let mut first = ledger.begin();
        let mut second = ledger.begin();
        first.get_state("a").unwrap();
        second.get_state("a").unwrap();
        first.put_state("a", b"2".to_vec()).unwrap();
        second.put_state("a", b"3".to_vec()).unwrap();

        first.commit().unwrap();
        assert!(matches!(second.commit(), Err(LedgerError::Conflict { .. })));
    }

    #[test]
    fn phantom_inserts_under_a_scanned_prefix_conflict() {
        let ledger = ledger();
        let mut reader = ledger.begin();
        assert_eq!(reader.scan_prefix("p/").unwrap().count(), 0);
        reader.put_state("summary", b"0".to_vec()).unwrap();

        put(&ledger, "p/1", "x");
        assert!(matches!(reader.commit(), Err(LedgerError::Conflict { .. })));
    }

    #[test]
    fn scans_are_ordered_bounded_and_release_cursors() {
        let ledger = ledger();
        for key in ["p/b", "p/a", "q/a", "p/c"] {
            put(&ledger, key, key);
        }

        let tx = ledger.begin();
        let mut scan = tx.scan_prefix("p/").unwrap();
        assert_eq!(ledger.open_cursors(), 1);
        assert_eq!(scan.next().unwrap().unwrap().key, "p/a");
        drop(scan);
        assert_eq!(ledger.open_cursors(), 0);

        let keys: Vec<_> = tx
            .scan_prefix("p/")
            .unwrap()
            .map(|kv| kv.unwrap().key)
            .collect();
        assert_eq!(keys, vec!["p/a", "p/b", "p/c"]);
        assert_eq!(ledger.open_cursors(), 0);
    }

    #[test]
    fn scans_can_resume_after_a_key() {
        let ledger = ledger();
        for key in ["o/z", "p/a", "p/b", "p/c", "q/a"] {
            put(&ledger, key, key);
        }

        let tx = ledger.begin();
        let resume = |after: &str| -> Vec<String> {
            tx.scan_prefix_after("p/", after)
                .unwrap()
                .map(|kv| kv.unwrap().key)
                .collect()
        };
        assert_eq!(resume("p/a"), vec!["p/b", "p/c"]);
        assert_eq!(resume("p/bb"), vec!["p/c"]);
        assert_eq!(resume("a"), vec!["p/a", "p/b", "p/c"]);
        assert!(resume("p/c").is_empty());
        assert_eq!(ledger.open_cursors(), 0);
    }

    #[test]
    fn history_lists_committed_revisions_oldest_first() {
        let ledger = ledger();
        put(&ledger, "a", "1");
        put(&ledger, "a", "2");

        let tx = ledger.begin();
        let values: Vec<_> = tx
            .history_for_key("a")
            .unwrap()
            .map(|revision| revision.unwrap().value)
            .collect();
        assert_eq!(values, vec![b"1".to_vec(), b"2".to_vec()]);
    }

    #[test]
    fn only_the_last_event_of_a_transaction_is_published() {
        let ledger = ledger();
        let mut tx = ledger.begin();
        tx.put_state("a", b"1".to_vec()).unwrap();
        tx.set_event("First", b"{}".to_vec()).unwrap();
        tx.set_event("Second", b"{}".to_vec()).unwrap();
        let receipt = tx.commit().unwrap();

        assert_eq!(receipt.event.as_deref(), Some("Second"));
        let events = ledger.events().drain(10);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "Second");
    }

    #[test]
    fn journal_replay_restores_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        {
            let ledger = MemoryLedger::open(&path, Arc::new(EventQueue::new())).unwrap();
            put(&ledger, "a", "1");
            put(&ledger, "a", "2");
        }

        let ledger = MemoryLedger::open(&path, Arc::new(EventQueue::new())).unwrap();
        assert_eq!(ledger.height(), 2);
        let tx = ledger.begin();
        assert_eq!(tx.get_state("a").unwrap(), Some(b"2".to_vec()));
        assert_eq!(tx.history_for_key("a").unwrap().count(), 2);
    }
}
