//! Comments, ratings and the statistics folded from them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::types::{CommentStatus, DocType, RatingStatus};

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub doc_type: DocType,
    pub comment_id: String,
    pub entry_id: String,
    #[serde(default)]
    pub repo_name: String,
    pub content: String,
    pub author: String,
    /// 0 means no rating was given.
    #[serde(default)]
    pub rating: u8,
    pub status: CommentStatus,
    #[serde(default)]
    pub edit_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub replies: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
    pub version: u64,
}

impl Comment {
    pub fn is_visible(&self) -> bool {
        self.status != CommentStatus::Deleted
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    pub doc_type: DocType,
    pub rating_id: String,
    pub entry_id: String,
    #[serde(default)]
    pub repo_name: String,
    pub rater: String,
    pub rating: u8,
    #[serde(default)]
    pub review: String,
    pub status: RatingStatus,
    pub created_at: String,
    pub updated_at: String,
    pub version: u64,
}

impl Rating {
    pub fn is_active(&self) -> bool {
        self.status == RatingStatus::Active
    }
}

pub fn is_valid_score(score: u8) -> bool {
    (MIN_SCORE..=MAX_SCORE).contains(&score)
}

/// Fixed five-bucket histogram keyed by score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RatingDistribution(BTreeMap<u8, u32>);

impl Default for RatingDistribution {
    fn default() -> Self {
        Self((MIN_SCORE..=MAX_SCORE).map(|score| (score, 0)).collect())
    }
}

impl RatingDistribution {
    pub fn record(&mut self, score: u8) {
        if is_valid_score(score) {
            *self.0.entry(score).or_insert(0) += 1;
        }
    }

    pub fn count(&self, score: u8) -> u32 {
        self.0.get(&score).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    pub count: u32,
    pub total: u64,
    pub average: f64,
    pub distribution: RatingDistribution,
}

impl Default for RatingSummary {
    fn default() -> Self {
        Self {
            count: 0,
            total: 0,
            average: 0.0,
            distribution: RatingDistribution::default(),
        }
    }
}

impl RatingSummary {
    /// Folds scores in a single pass; out-of-range scores are ignored.
    pub fn from_scores(scores: impl IntoIterator<Item = u8>) -> Self {
        let mut summary = Self::default();
        for score in scores.into_iter().filter(|score| is_valid_score(*score)) {
            summary.count += 1;
            summary.total += u64::from(score);
            summary.distribution.record(score);
        }
        if summary.count > 0 {
            summary.average = summary.total as f64 / f64::from(summary.count);
        }
        summary
    }
}

/// Mean of the non-zero ratings on active comments, 0 when there are none.
///
/// Flagged comments stay visible in listings but drop out of the average.
pub fn comment_average<'a>(comments: impl IntoIterator<Item = &'a Comment>) -> f64 {
    let (sum, count) = comments
        .into_iter()
        .filter(|comment| comment.status == CommentStatus::Active && comment.rating > 0)
        .fold((0u64, 0u32), |(sum, count), comment| {
            (sum + u64::from(comment.rating), count + 1)
        });
    if count == 0 {
        0.0
    } else {
        sum as f64 / f64::from(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(rating: u8, status: CommentStatus) -> Comment {
        Comment {
            doc_type: DocType::Comment,
            comment_id: "c".into(),
            entry_id: "e".into(),
            repo_name: String::new(),
            content: "text".into(),
            author: "ann".into(),
            rating,
            status,
            edit_count: 0,
            parent_id: None,
            replies: Vec::new(),
            created_at: String::new(),
            updated_at: String::new(),
            version: 1,
        }
    }

    #[test]
    fn empty_summary_averages_to_zero() {
        let summary = RatingSummary::from_scores([]);
        assert_eq!(summary.count, 0);
        assert_eq!(summary.average, 0.0);
        assert_eq!(summary.distribution, RatingDistribution::default());
    }

    #[test]
    fn distribution_keeps_all_five_buckets() {
        let summary = RatingSummary::from_scores([1, 1, 3, 5, 5, 5]);
        let buckets: Vec<_> = (1..=5).map(|s| summary.distribution.count(s)).collect();
        assert_eq!(buckets, vec![2, 0, 1, 0, 3]);
        assert_eq!(summary.count, 6);
        assert_eq!(summary.total, 20);
    }

    #[test]
    fn distribution_serializes_with_score_keys() {
        let summary = RatingSummary::from_scores([2]);
        let json = serde_json::to_value(&summary.distribution).unwrap();
        assert_eq!(json, serde_json::json!({"1": 0, "2": 1, "3": 0, "4": 0, "5": 0}));
    }

    #[test]
    fn only_rated_active_comments_count() {
        let comments = [
            comment(4, CommentStatus::Active),
            comment(0, CommentStatus::Active),
            comment(2, CommentStatus::Active),
            comment(1, CommentStatus::Deleted),
            comment(5, CommentStatus::Flagged),
        ];
        assert_eq!(comment_average(&comments), 3.0);
        assert_eq!(comment_average(std::iter::empty()), 0.0);
    }
}
