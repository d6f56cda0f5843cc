//! Threaded comments on entries.

use tracing::info;

use crate::application::{
    args::require_arg,
    error::ContractError,
    keys::{RecordKey, ScanPrefix},
    lifecycle::{self, LedgerRecord},
    store::RecordStore,
};
use crate::domain::{
    engagement::{Comment, MAX_SCORE, comment_average},
    types::{CommentStatus, DocType, EventName},
    validation::ValidationErrors,
};

const SOURCE: &str = "marquee::comments";

#[derive(Debug, Clone, Default)]
pub struct AddCommentCommand {
    pub comment_id: String,
    pub entry_id: String,
    pub repo_name: String,
    pub content: String,
    pub author: String,
    pub rating: String,
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CommentService;

impl CommentService {
    /// Stores a comment. A reply is also appended to its parent's `replies`
    /// in the same transaction; only `CommentAdded` is emitted.
    pub fn add(
        &self,
        store: &mut RecordStore<'_>,
        command: AddCommentCommand,
    ) -> Result<Comment, ContractError> {
        let mut errors = ValidationErrors::new();
        errors.require("comment_id", &command.comment_id);
        errors.require("entry_id", &command.entry_id);
        errors.require("repo_name", &command.repo_name);
        errors.require("author", &command.author);
        errors.require("content", &command.content);
        if !errors.is_empty() {
            return Err(ContractError::Validation(errors));
        }

        let parent_id = command.parent_id.filter(|id| !id.trim().is_empty());
        if let Some(parent_id) = parent_id.as_deref() {
            let parent: Comment = store.require(RecordKey::Comment {
                comment_id: parent_id,
                entry_id: &command.entry_id,
            })?;
            if parent.is_deleted() {
                return Err(ContractError::invalid_state(format!(
                    "cannot reply to deleted comment `{parent_id}`"
                )));
            }
        }

        let now = store.now()?;
        let comment = Comment {
            doc_type: DocType::Comment,
            comment_id: command.comment_id,
            entry_id: command.entry_id,
            repo_name: command.repo_name,
            content: command.content,
            author: command.author,
            rating: comment_score(&command.rating),
            status: CommentStatus::Active,
            edit_count: 0,
            parent_id,
            replies: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
            version: 1,
        };
        lifecycle::create(store, &comment)?;

        if let Some(parent_id) = comment.parent_id.as_deref() {
            let key = RecordKey::Comment {
                comment_id: parent_id,
                entry_id: &comment.entry_id,
            };
            lifecycle::update(store, key, &comment.author, |parent: &mut Comment| {
                parent.replies.push(comment.comment_id.clone());
                Ok(())
            })?;
        }

        store.emit(EventName::CommentAdded, &comment)?;
        info!(
            target = SOURCE,
            tx_id = store.tx_id(),
            comment_id = %comment.comment_id,
            entry_id = %comment.entry_id,
            parent_id = comment.parent_id.as_deref().unwrap_or(""),
            "comment added"
        );
        Ok(comment)
    }

    pub fn get(
        &self,
        store: &RecordStore<'_>,
        comment_id: &str,
        entry_id: &str,
    ) -> Result<Comment, ContractError> {
        store.require(RecordKey::Comment {
            comment_id,
            entry_id,
        })
    }

    pub fn update(
        &self,
        store: &mut RecordStore<'_>,
        comment_id: &str,
        entry_id: &str,
        content: &str,
        updated_by: &str,
    ) -> Result<Comment, ContractError> {
        let mut errors = ValidationErrors::new();
        errors.require("content", content);
        errors.require("updated_by", updated_by);
        if !errors.is_empty() {
            return Err(ContractError::Validation(errors));
        }

        let key = RecordKey::Comment {
            comment_id,
            entry_id,
        };
        let comment = lifecycle::update(store, key, updated_by, |comment: &mut Comment| {
            comment.content = content.to_string();
            comment.edit_count += 1;
            Ok(())
        })?;

        store.emit(EventName::CommentUpdated, &comment)?;
        info!(
            target = SOURCE,
            tx_id = store.tx_id(),
            comment_id,
            entry_id,
            updated_by,
            edit_count = comment.edit_count,
            "comment updated"
        );
        Ok(comment)
    }

    pub fn delete(
        &self,
        store: &mut RecordStore<'_>,
        comment_id: &str,
        entry_id: &str,
        deleted_by: &str,
    ) -> Result<Comment, ContractError> {
        let key = RecordKey::Comment {
            comment_id,
            entry_id,
        };
        let comment: Comment = lifecycle::soft_delete(store, key, deleted_by)?;
        store.emit(EventName::CommentDeleted, &comment)?;
        info!(
            target = SOURCE,
            tx_id = store.tx_id(),
            comment_id,
            entry_id,
            deleted_by,
            "comment deleted"
        );
        Ok(comment)
    }

    pub fn entry_comments(
        &self,
        store: &RecordStore<'_>,
        entry_id: &str,
        include_deleted: bool,
    ) -> Result<Vec<Comment>, ContractError> {
        require_arg("entry_id", entry_id)?;
        store.collect_index(ScanPrefix::CommentsOnEntry(entry_id), |comment: &Comment| {
            include_deleted || comment.is_visible()
        })
    }

    /// Visible replies of a comment in insertion order.
    pub fn thread_replies(
        &self,
        store: &RecordStore<'_>,
        comment_id: &str,
        entry_id: &str,
    ) -> Result<Vec<Comment>, ContractError> {
        let parent = self.get(store, comment_id, entry_id)?;
        let mut replies = Vec::with_capacity(parent.replies.len());
        for reply_id in &parent.replies {
            let reply: Option<Comment> = store.fetch(RecordKey::Comment {
                comment_id: reply_id,
                entry_id,
            })?;
            if let Some(reply) = reply.filter(Comment::is_visible) {
                replies.push(reply);
            }
        }
        Ok(replies)
    }

    pub fn average_rating(
        &self,
        store: &RecordStore<'_>,
        entry_id: &str,
    ) -> Result<f64, ContractError> {
        let comments = self.entry_comments(store, entry_id, false)?;
        Ok(comment_average(&comments))
    }
}

/// Unparsable or out-of-range scores mean "no rating".
fn comment_score(raw: &str) -> u8 {
    raw.trim()
        .parse::<u8>()
        .ok()
        .filter(|score| *score <= MAX_SCORE)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_scores_outside_range_are_unset() {
        assert_eq!(comment_score("4"), 4);
        assert_eq!(comment_score("0"), 0);
        assert_eq!(comment_score("6"), 0);
        assert_eq!(comment_score("-1"), 0);
        assert_eq!(comment_score("great"), 0);
        assert_eq!(comment_score(""), 0);
    }
}
