//! Composite key scheme.
//!
//! Keys are `\0tag\0component\0component\0...`. Every component is followed
//! by the delimiter, so a partial key built from the leading components is a
//! strict prefix of exactly the keys that share those components: the prefix
//! for repo `films` can never match a key for repo `films-archive`.
//!
//! Primary keys lead with the record identity. Index keys lead with the
//! parent (entry or repo) so that "all children of X" is one prefix scan.

use thiserror::Error;

pub const DELIMITER: char = '\u{0}';

/// Value stored under index keys; the key itself carries the information.
pub const INDEX_MARKER: &[u8] = &[0];

pub mod tags {
    pub const REQUEST: &str = "request";
    pub const CATALOG: &str = "catalog";
    pub const ENTRY: &str = "entry";
    pub const COMMENT: &str = "comment";
    pub const RATING: &str = "rating";
    pub const ENTRY_BY_REPO: &str = "entry~repo";
    pub const COMMENT_BY_ENTRY: &str = "comment~entry";
    pub const RATING_BY_ENTRY: &str = "rating~entry";
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("key tag must not be empty")]
    EmptyTag,
    #[error("component {index} of `{tag}` key must not be empty")]
    EmptyComponent { tag: String, index: usize },
    #[error("`{tag}` key contains a reserved delimiter character")]
    ReservedCharacter { tag: String },
    #[error("`{tag}` key requires {expected} components, got {actual}")]
    Arity {
        tag: String,
        expected: usize,
        actual: usize,
    },
    #[error("malformed composite key")]
    Malformed,
    #[error("`{tag}` is not an index namespace")]
    NotAnIndex { tag: String },
}

/// Builds a key from a tag and a possibly empty list of leading components.
pub fn partial_key(tag: &str, components: &[&str]) -> Result<String, KeyError> {
    if tag.is_empty() {
        return Err(KeyError::EmptyTag);
    }
    if tag.contains(DELIMITER) {
        return Err(KeyError::ReservedCharacter {
            tag: tag.to_string(),
        });
    }

    let capacity = 2 + tag.len() + components.iter().map(|c| c.len() + 1).sum::<usize>();
    let mut key = String::with_capacity(capacity);
    key.push(DELIMITER);
    key.push_str(tag);
    key.push(DELIMITER);

    for (index, component) in components.iter().enumerate() {
        if component.is_empty() {
            return Err(KeyError::EmptyComponent {
                tag: tag.to_string(),
                index,
            });
        }
        if component.contains(DELIMITER) {
            return Err(KeyError::ReservedCharacter {
                tag: tag.to_string(),
            });
        }
        key.push_str(component);
        key.push(DELIMITER);
    }

    Ok(key)
}

/// Builds a full key; at least one component is required.
pub fn composite_key(tag: &str, components: &[&str]) -> Result<String, KeyError> {
    if components.is_empty() {
        return Err(KeyError::Arity {
            tag: tag.to_string(),
            expected: 1,
            actual: 0,
        });
    }
    partial_key(tag, components)
}

pub fn split_composite_key(key: &str) -> Result<(String, Vec<String>), KeyError> {
    let body = key
        .strip_prefix(DELIMITER)
        .and_then(|rest| rest.strip_suffix(DELIMITER))
        .ok_or(KeyError::Malformed)?;

    let mut parts = body.split(DELIMITER);
    let tag = parts.next().filter(|tag| !tag.is_empty()).ok_or(KeyError::EmptyTag)?;
    let components: Vec<String> = parts.map(str::to_string).collect();
    if let Some(index) = components.iter().position(String::is_empty) {
        return Err(KeyError::EmptyComponent {
            tag: tag.to_string(),
            index,
        });
    }

    Ok((tag.to_string(), components))
}

/// Point-lookup key for a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKey<'a> {
    Request(&'a str),
    Catalog(&'a str),
    Entry { entry_id: &'a str, repo: &'a str },
    Comment { comment_id: &'a str, entry_id: &'a str },
    Rating { rating_id: &'a str, entry_id: &'a str },
}

impl RecordKey<'_> {
    pub fn encode(&self) -> Result<String, KeyError> {
        match *self {
            RecordKey::Request(id) => composite_key(tags::REQUEST, &[id]),
            RecordKey::Catalog(id) => composite_key(tags::CATALOG, &[id]),
            RecordKey::Entry { entry_id, repo } => composite_key(tags::ENTRY, &[entry_id, repo]),
            RecordKey::Comment {
                comment_id,
                entry_id,
            } => composite_key(tags::COMMENT, &[comment_id, entry_id]),
            RecordKey::Rating {
                rating_id,
                entry_id,
            } => composite_key(tags::RATING, &[rating_id, entry_id]),
        }
    }

    /// Identifier used in not-found and duplicate messages.
    pub fn label(&self) -> String {
        match *self {
            RecordKey::Request(id) | RecordKey::Catalog(id) => id.to_string(),
            RecordKey::Entry { entry_id, repo } => format!("{entry_id} in {repo}"),
            RecordKey::Comment {
                comment_id,
                entry_id,
            } => format!("{comment_id} on {entry_id}"),
            RecordKey::Rating {
                rating_id,
                entry_id,
            } => format!("{rating_id} on {entry_id}"),
        }
    }
}

/// Secondary key pointing a parent at one of its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKey<'a> {
    EntryByRepo { repo: &'a str, entry_id: &'a str },
    CommentByEntry { entry_id: &'a str, comment_id: &'a str },
    RatingByEntry { entry_id: &'a str, rating_id: &'a str },
}

impl IndexKey<'_> {
    pub fn encode(&self) -> Result<String, KeyError> {
        match *self {
            IndexKey::EntryByRepo { repo, entry_id } => {
                composite_key(tags::ENTRY_BY_REPO, &[repo, entry_id])
            }
            IndexKey::CommentByEntry {
                entry_id,
                comment_id,
            } => composite_key(tags::COMMENT_BY_ENTRY, &[entry_id, comment_id]),
            IndexKey::RatingByEntry {
                entry_id,
                rating_id,
            } => composite_key(tags::RATING_BY_ENTRY, &[entry_id, rating_id]),
        }
    }
}

/// Range enumerations supported without a full scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPrefix<'a> {
    AllCatalogEntries,
    EntriesInRepo(&'a str),
    CommentsOnEntry(&'a str),
    RatingsOnEntry(&'a str),
}

impl ScanPrefix<'_> {
    pub fn encode(&self) -> Result<String, KeyError> {
        match *self {
            ScanPrefix::AllCatalogEntries => partial_key(tags::CATALOG, &[]),
            ScanPrefix::EntriesInRepo(repo) => partial_key(tags::ENTRY_BY_REPO, &[repo]),
            ScanPrefix::CommentsOnEntry(entry_id) => {
                partial_key(tags::COMMENT_BY_ENTRY, &[entry_id])
            }
            ScanPrefix::RatingsOnEntry(entry_id) => partial_key(tags::RATING_BY_ENTRY, &[entry_id]),
        }
    }
}

/// Resolves an index key to the primary key of the record it points at.
pub fn primary_from_index(index_key: &str) -> Result<String, KeyError> {
    let (tag, components) = split_composite_key(index_key)?;
    let [parent, child] = components.as_slice() else {
        return Err(KeyError::Arity {
            tag,
            expected: 2,
            actual: components.len(),
        });
    };

    let record = match tag.as_str() {
        tags::ENTRY_BY_REPO => RecordKey::Entry {
            entry_id: child,
            repo: parent,
        },
        tags::COMMENT_BY_ENTRY => RecordKey::Comment {
            comment_id: child,
            entry_id: parent,
        },
        tags::RATING_BY_ENTRY => RecordKey::Rating {
            rating_id: child,
            entry_id: parent,
        },
        _ => return Err(KeyError::NotAnIndex { tag: tag.clone() }),
    };
    record.encode()
}

/// Human-readable form for logs and error messages.
pub fn display_key(key: &str) -> String {
    key.trim_matches(DELIMITER).replace(DELIMITER, "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_keys_round_trip_through_split() {
        let key = RecordKey::Entry {
            entry_id: "e-1",
            repo: "films",
        }
        .encode()
        .unwrap();
        assert_eq!(key, "\u{0}entry\u{0}e-1\u{0}films\u{0}");

        let (tag, components) = split_composite_key(&key).unwrap();
        assert_eq!(tag, "entry");
        assert_eq!(components, vec!["e-1".to_string(), "films".to_string()]);
    }

    #[test]
    fn repo_prefix_does_not_match_longer_repo_names() {
        let prefix = ScanPrefix::EntriesInRepo("films").encode().unwrap();
        let own = IndexKey::EntryByRepo {
            repo: "films",
            entry_id: "e-1",
        }
        .encode()
        .unwrap();
        let other = IndexKey::EntryByRepo {
            repo: "films-archive",
            entry_id: "e-1",
        }
        .encode()
        .unwrap();

        assert!(own.starts_with(&prefix));
        assert!(!other.starts_with(&prefix));
    }

    #[test]
    fn index_keys_resolve_to_primary_keys() {
        let index = IndexKey::CommentByEntry {
            entry_id: "e-1",
            comment_id: "c-9",
        }
        .encode()
        .unwrap();
        let primary = RecordKey::Comment {
            comment_id: "c-9",
            entry_id: "e-1",
        }
        .encode()
        .unwrap();

        assert_eq!(primary_from_index(&index).unwrap(), primary);
    }

    #[test]
    fn primary_keys_are_not_index_namespaces() {
        let key = RecordKey::Rating {
            rating_id: "r",
            entry_id: "e",
        }
        .encode()
        .unwrap();
        assert!(matches!(
            primary_from_index(&key),
            Err(KeyError::NotAnIndex { .. })
        ));
    }

    #[test]
    fn components_are_validated() {
        assert!(matches!(
            composite_key("entry", &["", "films"]),
            Err(KeyError::EmptyComponent { index: 0, .. })
        ));
        assert!(matches!(
            composite_key("entry", &["a\u{0}b"]),
            Err(KeyError::ReservedCharacter { .. })
        ));
        assert!(matches!(composite_key("entry", &[]), Err(KeyError::Arity { .. })));
        assert!(matches!(split_composite_key("entry"), Err(KeyError::Malformed)));
    }

    #[test]
    fn catalog_prefix_covers_every_catalog_key() {
        let prefix = ScanPrefix::AllCatalogEntries.encode().unwrap();
        let key = RecordKey::Catalog("tt1375666").encode().unwrap();
        let request = RecordKey::Request("tt1375666").encode().unwrap();
        assert!(key.starts_with(&prefix));
        assert!(!request.starts_with(&prefix));
    }

    #[test]
    fn display_key_is_slash_separated() {
        let key = RecordKey::Request("tt1375666").encode().unwrap();
        assert_eq!(display_key(&key), "request/tt1375666");
    }
}
