use serde::{Deserialize, Serialize};

use super::types::{DocType, EntryStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub doc_type: DocType,
    pub entry_id: String,
    pub repo_name: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: String,
    pub author: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub content_hash: String,
    pub status: EntryStatus,
    pub created_at: String,
    pub updated_at: String,
    pub version: u64,
    #[serde(default)]
    pub edit_history: Vec<String>,
}

impl Entry {
    /// Case-insensitive substring match over title, description and body.
    pub fn matches(&self, needle_lower: &str) -> bool {
        [&self.title, &self.description, &self.content]
            .iter()
            .any(|field| field.to_lowercase().contains(needle_lower))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_matches_any_text_field() {
        let entry = Entry {
            doc_type: DocType::Entry,
            entry_id: "e1".into(),
            repo_name: "films".into(),
            title: "Inception".into(),
            description: "A heist inside dreams".into(),
            content: "".into(),
            author: "ann".into(),
            tags: vec![],
            content_hash: "".into(),
            status: EntryStatus::Active,
            created_at: "".into(),
            updated_at: "".into(),
            version: 1,
            edit_history: vec![],
        };

        assert!(entry.matches("incep"));
        assert!(entry.matches("heist"));
        assert!(!entry.matches("zebra"));
    }
}
