//! Page sizing and opaque bookmarks for range queries.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;
pub const MIN_PAGE_SIZE: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl QueryLimits {
    /// Resolves a caller-supplied size. Blank or unparsable input falls back
    /// to the default; anything else is clamped into range.
    pub fn resolve(&self, raw: Option<&str>) -> usize {
        let requested = raw
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .and_then(|value| value.parse::<i64>().ok());
        match requested {
            Some(value) => {
                let max = self.max_page_size.max(MIN_PAGE_SIZE);
                usize::try_from(value.max(0))
                    .unwrap_or(max)
                    .clamp(MIN_PAGE_SIZE, max)
            }
            None => self.default_page_size,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BookmarkError {
    #[error("bookmark is not valid base64")]
    Encoding,
    #[error("bookmark payload is malformed")]
    Payload,
    #[error("bookmark could not be encoded: {0}")]
    Unencodable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct BookmarkPayload {
    after: String,
}

/// Resume position of a key-ordered scan. Opaque to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookmark {
    after: String,
}

impl Bookmark {
    pub fn after(position: impl Into<String>) -> Self {
        Self {
            after: position.into(),
        }
    }

    pub fn position(&self) -> &str {
        &self.after
    }

    pub fn encode(&self) -> Result<String, BookmarkError> {
        let payload = BookmarkPayload {
            after: self.after.clone(),
        };
        let json = serde_json::to_vec(&payload)
            .map_err(|err| BookmarkError::Unencodable(err.to_string()))?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    pub fn decode(raw: &str) -> Result<Self, BookmarkError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(raw.trim())
            .map_err(|_| BookmarkError::Encoding)?;
        let payload: BookmarkPayload =
            serde_json::from_slice(&bytes).map_err(|_| BookmarkError::Payload)?;
        Ok(Self {
            after: payload.after,
        })
    }

    /// Treats a blank bookmark as "start from the beginning".
    pub fn parse_optional(raw: Option<&str>) -> Result<Option<Self>, BookmarkError> {
        match raw.map(str::trim).filter(|value| !value.is_empty()) {
            Some(value) => Self::decode(value).map(Some),
            None => Ok(None),
        }
    }
}

/// One page of records plus the bookmark for the next page (empty when done).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResultSet<T> {
    pub records: Vec<T>,
    pub record_count: usize,
    pub fetch_size: usize,
    pub bookmark: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_sizes_are_clamped() {
        let limits = QueryLimits::default();
        assert_eq!(limits.resolve(None), DEFAULT_PAGE_SIZE);
        assert_eq!(limits.resolve(Some("")), DEFAULT_PAGE_SIZE);
        assert_eq!(limits.resolve(Some("abc")), DEFAULT_PAGE_SIZE);
        assert_eq!(limits.resolve(Some("0")), MIN_PAGE_SIZE);
        assert_eq!(limits.resolve(Some("-5")), MIN_PAGE_SIZE);
        assert_eq!(limits.resolve(Some("35")), 35);
        assert_eq!(limits.resolve(Some("5000")), MAX_PAGE_SIZE);
    }

    #[test]
    fn bookmarks_round_trip() {
        let bookmark = Bookmark::after("tt1375666");
        let encoded = bookmark.encode().expect("bookmark encodes");
        let decoded = Bookmark::decode(&encoded).expect("bookmark decodes");
        assert_eq!(decoded.position(), "tt1375666");
    }

    #[test]
    fn garbage_bookmarks_are_rejected() {
        assert_eq!(Bookmark::decode("***"), Err(BookmarkError::Encoding));
        let not_json = URL_SAFE_NO_PAD.encode(b"plain");
        assert_eq!(Bookmark::decode(&not_json), Err(BookmarkError::Payload));
        assert_eq!(Bookmark::parse_optional(Some("  ")), Ok(None));
    }
}
