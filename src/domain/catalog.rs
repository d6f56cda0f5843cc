//! Content requests and the catalog entries they turn into once approved.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::engagement::RatingSummary;
use super::types::{DocType, RequestStatus};

/// Variant name to content hash.
pub type ContentHashes = BTreeMap<String, String>;

pub const DEFAULT_CONTENT_VARIANT: &str = "default";

/// Reads a content-hash argument. A JSON object maps variant names to
/// hashes; any other non-blank value is one hash for the default variant.
pub fn parse_content_hashes(raw: &str) -> Result<ContentHashes, serde_json::Error> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(ContentHashes::new());
    }
    if !raw.starts_with('{') {
        return Ok(ContentHashes::from([(
            DEFAULT_CONTENT_VARIANT.to_string(),
            raw.to_string(),
        )]));
    }

    let hashes: ContentHashes = serde_json::from_str(raw)?;
    Ok(hashes
        .into_iter()
        .map(|(variant, hash)| (variant.trim().to_string(), hash.trim().to_string()))
        .filter(|(variant, hash)| !variant.is_empty() && !hash.is_empty())
        .collect())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRequest {
    pub doc_type: DocType,
    pub catalog_id: String,
    pub request_id: String,
    pub title: String,
    #[serde(default)]
    pub director: String,
    #[serde(default)]
    pub release_year: Option<i32>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub description: String,
    pub submitter_id: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub content_hashes: ContentHashes,
    pub status: RequestStatus,
    pub submitted_at: String,
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub doc_type: DocType,
    pub catalog_id: String,
    pub entry_id: String,
    pub request_id: String,
    pub title: String,
    #[serde(default)]
    pub director: String,
    #[serde(default)]
    pub release_year: Option<i32>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content_hashes: ContentHashes,
    pub submitter_id: String,
    pub approved_by: String,
    pub approved_at: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub duration: u64,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub rating_summary: RatingSummary,
    pub version: u64,
}

impl CatalogEntry {
    /// Builds the first revision of an entry from the request being approved.
    pub fn from_approved(
        request: &ContentRequest,
        entry_id: String,
        approved_by: &str,
        approved_at: &str,
    ) -> Self {
        Self {
            doc_type: DocType::CatalogEntry,
            catalog_id: request.catalog_id.clone(),
            entry_id,
            request_id: request.request_id.clone(),
            title: request.title.clone(),
            director: request.director.clone(),
            release_year: request.release_year,
            genres: request.genres.clone(),
            description: request.description.clone(),
            content_hashes: request.content_hashes.clone(),
            submitter_id: request.submitter_id.clone(),
            approved_by: approved_by.to_string(),
            approved_at: approved_at.to_string(),
            file_size: 0,
            duration: 0,
            created_at: approved_at.to_string(),
            updated_at: approved_at.to_string(),
            rating_summary: RatingSummary::default(),
            version: 1,
        }
    }

    pub fn title_contains(&self, needle_lower: &str) -> bool {
        self.title.to_lowercase().contains(needle_lower)
    }
}
