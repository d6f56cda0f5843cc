//! Repository entries with an append-only edit log.

use std::ops::ControlFlow;

use tracing::info;

use crate::application::{
    args::require_arg,
    error::ContractError,
    keys::{RecordKey, ScanPrefix},
    lifecycle,
    store::RecordStore,
};
use crate::domain::{
    entries::Entry,
    types::{DocType, EntryStatus, EventName},
    validation::{TITLE_MAX_LEN, ValidationCode, ValidationErrors, parse_string_list},
};

const SOURCE: &str = "marquee::entries";

pub const DEFAULT_LIST_LIMIT: usize = 100;

#[derive(Debug, Clone, Default)]
pub struct CreateEntryCommand {
    pub entry_id: String,
    pub repo_name: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub author: String,
    pub content_hash: String,
    pub tags_json: String,
}

/// Blank fields leave the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateEntryCommand {
    pub entry_id: String,
    pub repo_name: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub updated_by: String,
    pub content_hash: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EntryService;

impl EntryService {
    pub fn create(
        &self,
        store: &mut RecordStore<'_>,
        command: CreateEntryCommand,
    ) -> Result<Entry, ContractError> {
        let mut errors = ValidationErrors::new();
        errors.require("entry_id", &command.entry_id);
        errors.require("repo_name", &command.repo_name);
        errors.require("title", &command.title);
        errors.max_length("title", &command.title, TITLE_MAX_LEN);
        errors.require("author", &command.author);
        let tags = match parse_string_list(&command.tags_json) {
            Ok(tags) => tags,
            Err(_) => {
                errors.push(
                    "tags",
                    ValidationCode::InvalidFormat,
                    "tags must be a JSON array of strings",
                );
                Vec::new()
            }
        };
        if !errors.is_empty() {
            return Err(ContractError::Validation(errors));
        }

        let now = store.now()?;
        let entry = Entry {
            doc_type: DocType::Entry,
            edit_history: vec![format!("v1 created by {} at {now}", command.author)],
            entry_id: command.entry_id,
            repo_name: command.repo_name,
            title: command.title,
            description: command.description,
            content: command.content,
            author: command.author,
            tags,
            content_hash: command.content_hash,
            status: EntryStatus::Active,
            created_at: now.clone(),
            updated_at: now,
            version: 1,
        };

        lifecycle::create(store, &entry)?;
        store.emit(EventName::EntryCreated, &entry)?;
        info!(
            target = SOURCE,
            tx_id = store.tx_id(),
            entry_id = %entry.entry_id,
            repo = %entry.repo_name,
            "entry created"
        );
        Ok(entry)
    }

    pub fn get(
        &self,
        store: &RecordStore<'_>,
        entry_id: &str,
        repo_name: &str,
    ) -> Result<Entry, ContractError> {
        store.require(RecordKey::Entry {
            entry_id,
            repo: repo_name,
        })
    }

    pub fn update(
        &self,
        store: &mut RecordStore<'_>,
        command: UpdateEntryCommand,
    ) -> Result<Entry, ContractError> {
        let mut errors = ValidationErrors::new();
        errors.require("updated_by", &command.updated_by);
        errors.max_length("title", &command.title, TITLE_MAX_LEN);
        if !errors.is_empty() {
            return Err(ContractError::Validation(errors));
        }

        let key = RecordKey::Entry {
            entry_id: &command.entry_id,
            repo: &command.repo_name,
        };
        let entry = lifecycle::update(store, key, &command.updated_by, |entry: &mut Entry| {
            overwrite_if_present(&mut entry.title, &command.title);
            overwrite_if_present(&mut entry.description, &command.description);
            overwrite_if_present(&mut entry.content, &command.content);
            overwrite_if_present(&mut entry.content_hash, &command.content_hash);
            Ok(())
        })?;

        store.emit(EventName::EntryUpdated, &entry)?;
        info!(
            target = SOURCE,
            tx_id = store.tx_id(),
            entry_id = %entry.entry_id,
            repo = %entry.repo_name,
            version = entry.version,
            "entry updated"
        );
        Ok(entry)
    }

    pub fn delete(
        &self,
        store: &mut RecordStore<'_>,
        entry_id: &str,
        repo_name: &str,
        deleted_by: &str,
    ) -> Result<Entry, ContractError> {
        require_arg("deleted_by", deleted_by)?;
        let key = RecordKey::Entry {
            entry_id,
            repo: repo_name,
        };
        let entry: Entry = lifecycle::soft_delete(store, key, deleted_by)?;
        store.emit(EventName::EntryDeleted, &entry)?;
        info!(
            target = SOURCE,
            tx_id = store.tx_id(),
            entry_id,
            repo = repo_name,
            deleted_by,
            "entry deleted"
        );
        Ok(entry)
    }

    /// Entries of one repository with the given status, in entry-ID order.
    pub fn list(
        &self,
        store: &RecordStore<'_>,
        repo_name: &str,
        status: Option<&str>,
        limit: Option<&str>,
    ) -> Result<Vec<Entry>, ContractError> {
        require_arg("repo_name", repo_name)?;
        let status = match status {
            Some(raw) => raw.parse::<EntryStatus>()?,
            None => EntryStatus::Active,
        };
        let limit = list_limit(limit);

        let mut entries = Vec::new();
        store.scan_index(ScanPrefix::EntriesInRepo(repo_name), |entry: Entry| {
            if entry.status == status {
                entries.push(entry);
            }
            if entries.len() >= limit {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;
        Ok(entries)
    }

    pub fn history(
        &self,
        store: &RecordStore<'_>,
        entry_id: &str,
        repo_name: &str,
    ) -> Result<Vec<String>, ContractError> {
        Ok(self.get(store, entry_id, repo_name)?.edit_history)
    }

    /// Case-insensitive substring search over active entries. A blank query
    /// matches everything.
    pub fn search(
        &self,
        store: &RecordStore<'_>,
        repo_name: &str,
        query: &str,
    ) -> Result<Vec<Entry>, ContractError> {
        require_arg("repo_name", repo_name)?;
        let needle = query.trim().to_lowercase();
        store.collect_index(ScanPrefix::EntriesInRepo(repo_name), |entry: &Entry| {
            entry.status == EntryStatus::Active && entry.matches(&needle)
        })
    }

    pub fn count(&self, store: &RecordStore<'_>, repo_name: &str) -> Result<usize, ContractError> {
        require_arg("repo_name", repo_name)?;
        let mut count = 0;
        store.scan_index(ScanPrefix::EntriesInRepo(repo_name), |entry: Entry| {
            if entry.status == EntryStatus::Active {
                count += 1;
            }
            ControlFlow::Continue(())
        })?;
        Ok(count)
    }
}

fn overwrite_if_present(field: &mut String, value: &str) {
    if !value.is_empty() {
        *field = value.to_string();
    }
}

/// Non-positive or unparsable limits fall back to the default.
fn list_limit(raw: Option<&str>) -> usize {
    raw.and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|limit| *limit > 0)
        .unwrap_or(DEFAULT_LIST_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_limits_fall_back_to_default() {
        assert_eq!(list_limit(None), DEFAULT_LIST_LIMIT);
        assert_eq!(list_limit(Some("0")), DEFAULT_LIST_LIMIT);
        assert_eq!(list_limit(Some("-3")), DEFAULT_LIST_LIMIT);
        assert_eq!(list_limit(Some("7")), 7);
    }

    #[test]
    fn blank_update_fields_are_ignored() {
        let mut title = "Inception".to_string();
        overwrite_if_present(&mut title, "");
        assert_eq!(title, "Inception");
        overwrite_if_present(&mut title, "Tenet");
        assert_eq!(title, "Tenet");
    }
}
