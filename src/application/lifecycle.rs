//! Versioned record lifecycle shared by every persisted document.
//!
//! Each accepted mutation reads the current revision immediately before
//! writing the next one, so a concurrent writer on the same key is caught
//! by the host's commit validation instead of being silently overwritten.

use serde::{Serialize, de::DeserializeOwned};

use crate::application::{
    error::ContractError,
    keys::{IndexKey, KeyError, RecordKey},
    store::RecordStore,
};
use crate::domain::{
    catalog::{CatalogEntry, ContentRequest},
    engagement::{Comment, Rating},
    entries::Entry,
    types::{CommentStatus, DocType, EntryStatus, RatingStatus},
};

pub trait LedgerRecord: Serialize + DeserializeOwned {
    const DOC_TYPE: DocType;
    /// Human name used in error messages.
    const ENTITY: &'static str;

    fn doc_type(&self) -> DocType;

    fn record_key(&self) -> RecordKey<'_>;

    fn primary_key(&self) -> Result<String, KeyError> {
        self.record_key().encode()
    }

    fn index_keys(&self) -> Result<Vec<String>, KeyError> {
        Ok(Vec::new())
    }

    fn version(&self) -> u64;

    /// Sets the new version and `updated_at`.
    fn stamp(&mut self, version: u64, at: &str);

    fn is_deleted(&self) -> bool {
        false
    }

    /// Records carrying an edit log append to it; others ignore the line.
    fn append_history(&mut self, _line: String) {}
}

pub trait SoftDelete: LedgerRecord {
    fn mark_deleted(&mut self);
}

/// Persists a brand-new record, refusing to overwrite an existing key.
pub fn create<R: LedgerRecord>(store: &mut RecordStore<'_>, record: &R) -> Result<(), ContractError> {
    let key = record.record_key();
    if store.exists(key)? {
        return Err(ContractError::duplicate(R::ENTITY, key.label()));
    }
    store.insert(record)
}

/// Applies `apply` to the live record under `key` and writes the next revision.
pub fn update<R, F>(
    store: &mut RecordStore<'_>,
    key: RecordKey<'_>,
    actor: &str,
    apply: F,
) -> Result<R, ContractError>
where
    R: LedgerRecord,
    F: FnOnce(&mut R) -> Result<(), ContractError>,
{
    let mut record: R = store.require(key)?;
    if record.is_deleted() {
        return Err(ContractError::invalid_state(format!(
            "{} `{}` is deleted",
            R::ENTITY,
            key.label()
        )));
    }
    apply(&mut record)?;
    revise(store, &mut record, actor, "updated")?;
    Ok(record)
}

/// Marks the record deleted; it stays readable by point lookup.
pub fn soft_delete<R: SoftDelete>(
    store: &mut RecordStore<'_>,
    key: RecordKey<'_>,
    actor: &str,
) -> Result<R, ContractError> {
    let mut record: R = store.require(key)?;
    if record.is_deleted() {
        return Err(ContractError::invalid_state(format!(
            "{} `{}` is already deleted",
            R::ENTITY,
            key.label()
        )));
    }
    record.mark_deleted();
    revise(store, &mut record, actor, "deleted")?;
    Ok(record)
}

/// Bumps the version by one, stamps the transaction time and rewrites.
pub fn revise<R: LedgerRecord>(
    store: &mut RecordStore<'_>,
    record: &mut R,
    actor: &str,
    verb: &str,
) -> Result<(), ContractError> {
    let at = store.now()?;
    let version = record.version() + 1;
    record.stamp(version, &at);
    record.append_history(format!("v{version} {verb} by {actor} at {at}"));
    store.replace(record)
}

impl LedgerRecord for ContentRequest {
    const DOC_TYPE: DocType = DocType::ContentRequest;
    const ENTITY: &'static str = "content request";

    fn doc_type(&self) -> DocType {
        self.doc_type
    }

    fn record_key(&self) -> RecordKey<'_> {
        RecordKey::Request(&self.catalog_id)
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn stamp(&mut self, version: u64, at: &str) {
        self.version = version;
        self.updated_at = at.to_string();
    }
}

impl LedgerRecord for CatalogEntry {
    const DOC_TYPE: DocType = DocType::CatalogEntry;
    const ENTITY: &'static str = "catalog entry";

    fn doc_type(&self) -> DocType {
        self.doc_type
    }

    fn record_key(&self) -> RecordKey<'_> {
        RecordKey::Catalog(&self.catalog_id)
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn stamp(&mut self, version: u64, at: &str) {
        self.version = version;
        self.updated_at = at.to_string();
    }
}

impl LedgerRecord for Entry {
    const DOC_TYPE: DocType = DocType::Entry;
    const ENTITY: &'static str = "entry";

    fn doc_type(&self) -> DocType {
        self.doc_type
    }

    fn record_key(&self) -> RecordKey<'_> {
        RecordKey::Entry {
            entry_id: &self.entry_id,
            repo: &self.repo_name,
        }
    }

    fn index_keys(&self) -> Result<Vec<String>, KeyError> {
        let index = IndexKey::EntryByRepo {
            repo: &self.repo_name,
            entry_id: &self.entry_id,
        };
        Ok(vec![index.encode()?])
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn stamp(&mut self, version: u64, at: &str) {
        self.version = version;
        self.updated_at = at.to_string();
    }

    fn is_deleted(&self) -> bool {
        self.status == EntryStatus::Deleted
    }

    fn append_history(&mut self, line: String) {
        self.edit_history.push(line);
    }
}

impl SoftDelete for Entry {
    fn mark_deleted(&mut self) {
        self.status = EntryStatus::Deleted;
    }
}

impl LedgerRecord for Comment {
    const DOC_TYPE: DocType = DocType::Comment;
    const ENTITY: &'static str = "comment";

    fn doc_type(&self) -> DocType {
        self.doc_type
    }

    fn record_key(&self) -> RecordKey<'_> {
        RecordKey::Comment {
            comment_id: &self.comment_id,
            entry_id: &self.entry_id,
        }
    }

    fn index_keys(&self) -> Result<Vec<String>, KeyError> {
        let index = IndexKey::CommentByEntry {
            entry_id: &self.entry_id,
            comment_id: &self.comment_id,
        };
        Ok(vec![index.encode()?])
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn stamp(&mut self, version: u64, at: &str) {
        self.version = version;
        self.updated_at = at.to_string();
    }

    fn is_deleted(&self) -> bool {
        self.status == CommentStatus::Deleted
    }
}

impl SoftDelete for Comment {
    fn mark_deleted(&mut self) {
        self.status = CommentStatus::Deleted;
    }
}

impl LedgerRecord for Rating {
    const DOC_TYPE: DocType = DocType::Rating;
    const ENTITY: &'static str = "rating";

    fn doc_type(&self) -> DocType {
        self.doc_type
    }

    fn record_key(&self) -> RecordKey<'_> {
        RecordKey::Rating {
            rating_id: &self.rating_id,
            entry_id: &self.entry_id,
        }
    }

    fn index_keys(&self) -> Result<Vec<String>, KeyError> {
        let index = IndexKey::RatingByEntry {
            entry_id: &self.entry_id,
            rating_id: &self.rating_id,
        };
        Ok(vec![index.encode()?])
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn stamp(&mut self, version: u64, at: &str) {
        self.version = version;
        self.updated_at = at.to_string();
    }

    fn is_deleted(&self) -> bool {
        self.status == RatingStatus::Deleted
    }
}

impl SoftDelete for Rating {
    fn mark_deleted(&mut self) {
        self.status = RatingStatus::Deleted;
    }
}
