//! Content review workflow: submission, approval, rejection and catalog queries.

use std::ops::ControlFlow;

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::{
    args::require_arg,
    error::ContractError,
    keys::{RecordKey, ScanPrefix},
    lifecycle::{self, LedgerRecord},
    pagination::{Bookmark, BookmarkError, QueryLimits, QueryResultSet},
    response::{OperationResponse, to_value},
    store::{RecordStore, decode},
};
use crate::domain::{
    catalog::{CatalogEntry, ContentHashes, ContentRequest, parse_content_hashes},
    types::{DocType, EventName, RequestStatus},
    validation::{
        DESCRIPTION_MAX_LEN, DIRECTOR_MAX_LEN, NOTES_MAX_LEN, TITLE_MAX_LEN, ValidationCode,
        ValidationErrors, is_valid_catalog_id, parse_string_list,
    },
};

const SOURCE: &str = "marquee::catalog";

#[derive(Debug, Clone, Default)]
pub struct SubmitContentCommand {
    pub catalog_id: String,
    pub title: String,
    pub director: String,
    pub release_year: String,
    pub genres_json: String,
    pub description: String,
    pub submitter_id: String,
    pub notes: String,
    pub content_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct RequestedEvent<'a> {
    catalog_id: &'a str,
    request_id: &'a str,
    title: &'a str,
    submitter: &'a str,
    timestamp: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct ApprovedEvent<'a> {
    catalog_id: &'a str,
    entry_id: &'a str,
    title: &'a str,
    approved_by: &'a str,
    timestamp: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct RejectedEvent<'a> {
    catalog_id: &'a str,
    rejected_by: &'a str,
    reason: &'a str,
    timestamp: &'a str,
}

/// One committed revision of a content request.
#[derive(Debug, Clone, Serialize)]
pub struct RequestRevision {
    pub tx_id: String,
    pub timestamp: String,
    pub is_delete: bool,
    pub value: Option<ContentRequest>,
}

/// Whether the request and catalog namespaces agree for one catalog ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    Consistent,
    Pending,
    Rejected,
    /// Request approved but no catalog entry was written.
    MissingEntry,
    /// Catalog entry present without an approved request.
    OrphanEntry,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApprovalCheck {
    pub catalog_id: String,
    pub state: ApprovalState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_status: Option<RequestStatus>,
    pub entry_present: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogService {
    limits: QueryLimits,
}

impl CatalogService {
    pub fn new(limits: QueryLimits) -> Self {
        Self { limits }
    }

    pub fn submit(
        &self,
        store: &mut RecordStore<'_>,
        command: SubmitContentCommand,
    ) -> Result<OperationResponse, ContractError> {
        let result = self.try_submit(store, command);
        fold(store, result, "content request submitted")
    }

    fn try_submit(
        &self,
        store: &mut RecordStore<'_>,
        command: SubmitContentCommand,
    ) -> Result<serde_json::Value, ContractError> {
        let mut errors = ValidationErrors::new();

        if command.catalog_id.trim().is_empty() {
            errors.require("catalog_id", &command.catalog_id);
        } else if !is_valid_catalog_id(&command.catalog_id) {
            errors.push(
                "catalog_id",
                ValidationCode::InvalidFormat,
                format!(
                    "expected `tt` followed by 7 or 8 digits, got `{}`",
                    command.catalog_id
                ),
            );
        }

        errors.require("title", &command.title);
        errors.max_length("title", &command.title, TITLE_MAX_LEN);
        errors.max_length("director", &command.director, DIRECTOR_MAX_LEN);
        errors.max_length("description", &command.description, DESCRIPTION_MAX_LEN);
        errors.max_length("notes", &command.notes, NOTES_MAX_LEN);

        let genres = match parse_string_list(&command.genres_json) {
            Ok(genres) => genres,
            Err(_) => {
                errors.push(
                    "genres",
                    ValidationCode::InvalidFormat,
                    "genres must be a JSON array of strings",
                );
                Vec::new()
            }
        };

        let raw_hashes = command.content_hash.as_deref().unwrap_or("");
        let content_hashes = match parse_content_hashes(raw_hashes) {
            Ok(hashes) => hashes,
            Err(_) => {
                errors.push(
                    "content_hashes",
                    ValidationCode::InvalidFormat,
                    "content hashes must be a hash or a JSON object of variant to hash",
                );
                ContentHashes::new()
            }
        };

        let release_year = match command.release_year.trim() {
            "" => None,
            raw => match raw.parse::<i32>() {
                Ok(year) => Some(year),
                Err(_) => {
                    errors.push(
                        "release_year",
                        ValidationCode::InvalidFormat,
                        "release year must be an integer",
                    );
                    None
                }
            },
        };

        if !errors.is_empty() {
            return Err(ContractError::Validation(errors));
        }

        let catalog_id = command.catalog_id.as_str();
        if store.exists(RecordKey::Request(catalog_id))?
            || store.exists(RecordKey::Catalog(catalog_id))?
        {
            return Err(ContractError::duplicate(ContentRequest::ENTITY, catalog_id));
        }

        let now = store.now()?;
        let request = ContentRequest {
            doc_type: DocType::ContentRequest,
            catalog_id: command.catalog_id.clone(),
            request_id: Uuid::new_v4().to_string(),
            title: command.title,
            director: command.director,
            release_year,
            genres,
            description: command.description,
            submitter_id: command.submitter_id,
            notes: command.notes,
            content_hashes,
            status: RequestStatus::PendingReview,
            submitted_at: now.clone(),
            updated_at: now.clone(),
            reviewed_by: None,
            reviewed_at: None,
            rejection_reason: None,
            version: 1,
        };

        lifecycle::create(store, &request)?;
        store.emit(
            EventName::ContentRequested,
            &RequestedEvent {
                catalog_id: &request.catalog_id,
                request_id: &request.request_id,
                title: &request.title,
                submitter: &request.submitter_id,
                timestamp: &now,
            },
        )?;

        info!(
            target = SOURCE,
            tx_id = store.tx_id(),
            catalog_id = %request.catalog_id,
            request_id = %request.request_id,
            "content request submitted"
        );
        to_value(&request)
    }

    pub fn approve(
        &self,
        store: &mut RecordStore<'_>,
        catalog_id: &str,
        reviewer: &str,
    ) -> Result<OperationResponse, ContractError> {
        let result = self.try_approve(store, catalog_id, reviewer);
        fold(store, result, "content request approved")
    }

    fn try_approve(
        &self,
        store: &mut RecordStore<'_>,
        catalog_id: &str,
        reviewer: &str,
    ) -> Result<serde_json::Value, ContractError> {
        require_arg("reviewer", reviewer)?;
        let current: ContentRequest = store.require(RecordKey::Request(catalog_id))?;
        if current.status == RequestStatus::Approved {
            return Err(ContractError::invalid_state(format!(
                "content request `{catalog_id}` is already approved"
            )));
        }
        if store.exists(RecordKey::Catalog(catalog_id))? {
            return Err(ContractError::invalid_state(format!(
                "catalog entry `{catalog_id}` already exists without an approved request"
            )));
        }

        let now = store.now()?;
        let request = lifecycle::update(
            store,
            RecordKey::Request(catalog_id),
            reviewer,
            |request: &mut ContentRequest| {
                request.status = RequestStatus::Approved;
                request.reviewed_by = Some(reviewer.to_string());
                request.reviewed_at = Some(now.clone());
                Ok(())
            },
        )?;

        let entry = CatalogEntry::from_approved(&request, Uuid::new_v4().to_string(), reviewer, &now);
        lifecycle::create(store, &entry)?;

        store.emit(
            EventName::ContentApproved,
            &ApprovedEvent {
                catalog_id: &entry.catalog_id,
                entry_id: &entry.entry_id,
                title: &entry.title,
                approved_by: reviewer,
                timestamp: &now,
            },
        )?;

        info!(
            target = SOURCE,
            tx_id = store.tx_id(),
            catalog_id,
            entry_id = %entry.entry_id,
            reviewer,
            "content request approved"
        );
        Ok(json!({ "content_request": request, "catalog_entry": entry }))
    }

    pub fn reject(
        &self,
        store: &mut RecordStore<'_>,
        catalog_id: &str,
        reviewer: &str,
        reason: &str,
    ) -> Result<OperationResponse, ContractError> {
        let result = self.try_reject(store, catalog_id, reviewer, reason);
        fold(store, result, "content request rejected")
    }

    fn try_reject(
        &self,
        store: &mut RecordStore<'_>,
        catalog_id: &str,
        reviewer: &str,
        reason: &str,
    ) -> Result<serde_json::Value, ContractError> {
        require_arg("reviewer", reviewer)?;
        let now = store.now()?;
        let request = lifecycle::update(
            store,
            RecordKey::Request(catalog_id),
            reviewer,
            |request: &mut ContentRequest| {
                if request.status == RequestStatus::Approved {
                    return Err(ContractError::invalid_state(format!(
                        "content request `{catalog_id}` is already approved"
                    )));
                }
                request.status = RequestStatus::Rejected;
                request.reviewed_by = Some(reviewer.to_string());
                request.reviewed_at = Some(now.clone());
                request.rejection_reason = Some(reason.to_string());
                Ok(())
            },
        )?;

        store.emit(
            EventName::ContentRejected,
            &RejectedEvent {
                catalog_id,
                rejected_by: reviewer,
                reason,
                timestamp: &now,
            },
        )?;

        info!(
            target = SOURCE,
            tx_id = store.tx_id(),
            catalog_id,
            reviewer,
            version = request.version,
            "content request rejected"
        );
        to_value(&request)
    }

    pub fn query_all(
        &self,
        store: &RecordStore<'_>,
        page_size: Option<&str>,
        bookmark: Option<&str>,
    ) -> Result<QueryResultSet<CatalogEntry>, ContractError> {
        let fetch_size = self.limits.resolve(page_size);
        let start = Bookmark::parse_optional(bookmark).map_err(bookmark_error)?;

        let mut records: Vec<CatalogEntry> = Vec::with_capacity(fetch_size);
        let mut has_more = false;
        let after = start
            .as_ref()
            .map(|start| RecordKey::Catalog(start.position()));
        store.scan_records_from(ScanPrefix::AllCatalogEntries, after, |_, entry: CatalogEntry| {
            if records.len() == fetch_size {
                has_more = true;
                return ControlFlow::Break(());
            }
            records.push(entry);
            ControlFlow::Continue(())
        })?;

        let bookmark = match records.last() {
            Some(last) if has_more => Bookmark::after(last.catalog_id.clone())
                .encode()
                .map_err(bookmark_error)?,
            _ => String::new(),
        };
        Ok(QueryResultSet {
            record_count: records.len(),
            records,
            fetch_size,
            bookmark,
        })
    }

    pub fn search_by_title(
        &self,
        store: &RecordStore<'_>,
        query: &str,
        limit: Option<&str>,
    ) -> Result<Vec<CatalogEntry>, ContractError> {
        let limit = self.limits.resolve(limit);
        let needle = query.trim().to_lowercase();
        let mut matches = Vec::new();
        store.scan_records(ScanPrefix::AllCatalogEntries, |_, entry: CatalogEntry| {
            if entry.title_contains(&needle) {
                matches.push(entry);
            }
            if matches.len() >= limit {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;
        Ok(matches)
    }

    pub fn request_history(
        &self,
        store: &RecordStore<'_>,
        catalog_id: &str,
        limit: Option<&str>,
    ) -> Result<Vec<RequestRevision>, ContractError> {
        let bound = match limit.map(str::trim).filter(|raw| !raw.is_empty()) {
            Some(raw) => Some(raw.parse::<usize>().map_err(|_| {
                ContractError::invalid_argument(format!("history limit `{raw}` is not a count"))
            })?),
            None => None,
        };

        let revisions = store.history(RecordKey::Request(catalog_id), bound)?;
        let mut history = Vec::with_capacity(revisions.len());
        for revision in revisions {
            let value = if revision.is_delete {
                None
            } else {
                match decode::<ContentRequest>(&revision.value) {
                    Ok(request) => Some(request),
                    Err(err) => {
                        warn!(
                            target = SOURCE,
                            catalog_id,
                            tx_id = %revision.tx_id,
                            error = %err,
                            "skipping undecodable request revision"
                        );
                        continue;
                    }
                }
            };
            history.push(RequestRevision {
                tx_id: revision.tx_id,
                timestamp: revision.timestamp,
                is_delete: revision.is_delete,
                value,
            });
        }
        Ok(history)
    }

    pub fn entry_by_id(
        &self,
        store: &RecordStore<'_>,
        catalog_id: &str,
    ) -> Result<CatalogEntry, ContractError> {
        store.require(RecordKey::Catalog(catalog_id))
    }

    pub fn request_by_id(
        &self,
        store: &RecordStore<'_>,
        catalog_id: &str,
    ) -> Result<ContentRequest, ContractError> {
        store.require(RecordKey::Request(catalog_id))
    }

    /// Cross-checks the request and catalog namespaces for one ID.
    pub fn check_approval(
        &self,
        store: &RecordStore<'_>,
        catalog_id: &str,
    ) -> Result<ApprovalCheck, ContractError> {
        let request: Option<ContentRequest> = store.fetch(RecordKey::Request(catalog_id))?;
        let entry_present = store.exists(RecordKey::Catalog(catalog_id))?;

        let request_status = request.as_ref().map(|request| request.status);
        let state = match (request_status, entry_present) {
            (None, false) => {
                return Err(ContractError::not_found(ContentRequest::ENTITY, catalog_id));
            }
            (Some(RequestStatus::Approved), true) => ApprovalState::Consistent,
            (Some(RequestStatus::Approved), false) => ApprovalState::MissingEntry,
            (_, true) => ApprovalState::OrphanEntry,
            (Some(RequestStatus::PendingReview), false) => ApprovalState::Pending,
            (Some(RequestStatus::Rejected), false) => ApprovalState::Rejected,
        };

        if matches!(state, ApprovalState::MissingEntry | ApprovalState::OrphanEntry) {
            warn!(
                target = SOURCE,
                catalog_id,
                state = ?state,
                "request and catalog entry disagree"
            );
        }

        Ok(ApprovalCheck {
            catalog_id: catalog_id.to_string(),
            state,
            request_status,
            entry_present,
        })
    }
}

fn bookmark_error(err: BookmarkError) -> ContractError {
    ContractError::invalid_argument(err.to_string())
}

/// Wraps an operation result in the response envelope.
fn fold(
    store: &RecordStore<'_>,
    result: Result<serde_json::Value, ContractError>,
    message: &str,
) -> Result<OperationResponse, ContractError> {
    let timestamp = store.now()?;
    let tx_id = store.tx_id().to_string();
    match result {
        Ok(data) => Ok(OperationResponse::success(message, data, tx_id, timestamp)),
        Err(ContractError::Duplicate { entity, id }) => {
            let mut errors = ValidationErrors::new();
            errors.push(
                "catalog_id",
                ValidationCode::Duplicate,
                format!("{id} has already been submitted or approved"),
            );
            let mut response =
                OperationResponse::refusal(ContractError::Validation(errors), tx_id, timestamp)?;
            response.message = format!("{entity} `{id}` already exists");
            Ok(response)
        }
        Err(err) => {
            warn!(
                target = SOURCE,
                tx_id = %tx_id,
                code = err.code(),
                error = %err,
                "content operation refused"
            );
            OperationResponse::refusal(err, tx_id, timestamp)
        }
    }
}
