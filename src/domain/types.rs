//! Shared domain enumerations aligned with persisted ledger documents.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, UtcOffset, format_description::FormatItem, macros::format_description};

use super::error::DomainError;

/// Fixed, timezone-normalized format used for every persisted timestamp.
pub const LEDGER_TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");

pub fn ledger_timestamp(at: OffsetDateTime) -> Result<String, time::error::Format> {
    at.to_offset(UtcOffset::UTC).format(LEDGER_TIMESTAMP_FORMAT)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    ContentRequest,
    CatalogEntry,
    Entry,
    Comment,
    Rating,
}

impl DocType {
    pub fn as_str(self) -> &'static str {
        match self {
            DocType::ContentRequest => "content_request",
            DocType::CatalogEntry => "catalog_entry",
            DocType::Entry => "entry",
            DocType::Comment => "comment",
            DocType::Rating => "rating",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    PendingReview,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::PendingReview => "pending_review",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Active,
    Archived,
    Deleted,
}

impl EntryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryStatus::Active => "active",
            EntryStatus::Archived => "archived",
            EntryStatus::Deleted => "deleted",
        }
    }
}

impl FromStr for EntryStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(EntryStatus::Active),
            "archived" => Ok(EntryStatus::Archived),
            "deleted" => Ok(EntryStatus::Deleted),
            other => Err(DomainError::unknown_variant("entry status", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentStatus {
    Active,
    Flagged,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingStatus {
    Active,
    Deleted,
}

/// Named ledger events emitted by mutating operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventName {
    ContentRequested,
    ContentApproved,
    ContentRejected,
    EntryCreated,
    EntryUpdated,
    EntryDeleted,
    CommentAdded,
    CommentUpdated,
    CommentDeleted,
    RatingSubmitted,
    RatingUpdated,
    RatingDeleted,
}

impl EventName {
    pub fn as_str(self) -> &'static str {
        match self {
            EventName::ContentRequested => "ContentRequested",
            EventName::ContentApproved => "ContentApproved",
            EventName::ContentRejected => "ContentRejected",
            EventName::EntryCreated => "EntryCreated",
            EventName::EntryUpdated => "EntryUpdated",
            EventName::EntryDeleted => "EntryDeleted",
            EventName::CommentAdded => "CommentAdded",
            EventName::CommentUpdated => "CommentUpdated",
            EventName::CommentDeleted => "CommentDeleted",
            EventName::RatingSubmitted => "RatingSubmitted",
            EventName::RatingUpdated => "RatingUpdated",
            EventName::RatingDeleted => "RatingDeleted",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn timestamps_are_normalized_to_utc() {
        let at = datetime!(2024-03-01 09:30:15 +02:00);
        assert_eq!(ledger_timestamp(at).unwrap(), "2024-03-01T07:30:15Z");
    }

    #[test]
    fn entry_status_parses_case_insensitively() {
        assert_eq!("Archived".parse::<EntryStatus>().unwrap(), EntryStatus::Archived);
        assert!("gone".parse::<EntryStatus>().is_err());
    }

    #[test]
    fn status_strings_match_serde_names() {
        let json = serde_json::to_string(&RequestStatus::PendingReview).unwrap();
        assert_eq!(json, format!("\"{}\"", RequestStatus::PendingReview.as_str()));
    }
}
