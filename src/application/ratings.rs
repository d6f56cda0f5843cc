//! Star ratings and the statistics derived from them.
//!
//! A rating is upserted under `(rating_id, entry_id)`. When `entry_id` names
//! a catalog entry, the entry's `rating_summary` is recomputed in the same
//! transaction.

use tracing::{debug, info};

use crate::application::{
    args::require_arg,
    error::ContractError,
    keys::{RecordKey, ScanPrefix},
    lifecycle,
    store::RecordStore,
};
use crate::domain::{
    catalog::CatalogEntry,
    engagement::{Rating, RatingDistribution, RatingSummary, is_valid_score},
    types::{DocType, EventName, RatingStatus},
    validation::{ValidationCode, ValidationErrors},
};

const SOURCE: &str = "marquee::ratings";

#[derive(Debug, Clone, Default)]
pub struct SubmitRatingCommand {
    pub rating_id: String,
    pub entry_id: String,
    pub repo_name: String,
    pub rater: String,
    pub score: String,
    pub review: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RatingService;

impl RatingService {
    pub fn submit(
        &self,
        store: &mut RecordStore<'_>,
        command: SubmitRatingCommand,
    ) -> Result<Rating, ContractError> {
        let mut errors = ValidationErrors::new();
        errors.require("rating_id", &command.rating_id);
        errors.require("entry_id", &command.entry_id);
        errors.require("repo_name", &command.repo_name);
        errors.require("rater", &command.rater);
        let score = match parse_score(&command.score) {
            Some(score) => score,
            None => {
                errors.push(
                    "rating",
                    ValidationCode::OutOfRange,
                    format!(
                        "rating must be an integer between 1 and 5, got `{}`",
                        command.score
                    ),
                );
                0
            }
        };
        if !errors.is_empty() {
            return Err(ContractError::Validation(errors));
        }

        let key = RecordKey::Rating {
            rating_id: &command.rating_id,
            entry_id: &command.entry_id,
        };
        let (rating, event) = match store.fetch::<Rating>(key)? {
            Some(mut existing) => {
                existing.rating = score;
                existing.review = command.review.clone();
                existing.status = RatingStatus::Active;
                lifecycle::revise(store, &mut existing, &command.rater, "updated")?;
                (existing, EventName::RatingUpdated)
            }
            None => {
                let now = store.now()?;
                let rating = Rating {
                    doc_type: DocType::Rating,
                    rating_id: command.rating_id.clone(),
                    entry_id: command.entry_id.clone(),
                    repo_name: command.repo_name.clone(),
                    rater: command.rater.clone(),
                    rating: score,
                    review: command.review.clone(),
                    status: RatingStatus::Active,
                    created_at: now.clone(),
                    updated_at: now,
                    version: 1,
                };
                lifecycle::create(store, &rating)?;
                (rating, EventName::RatingSubmitted)
            }
        };

        self.refresh_catalog_summary(store, &rating)?;
        store.emit(event, &rating)?;
        info!(
            target = SOURCE,
            tx_id = store.tx_id(),
            rating_id = %rating.rating_id,
            entry_id = %rating.entry_id,
            rater = %rating.rater,
            score,
            event = %event,
            "rating stored"
        );
        Ok(rating)
    }

    pub fn get(
        &self,
        store: &RecordStore<'_>,
        rating_id: &str,
        entry_id: &str,
    ) -> Result<Rating, ContractError> {
        store.require(RecordKey::Rating {
            rating_id,
            entry_id,
        })
    }

    pub fn delete(
        &self,
        store: &mut RecordStore<'_>,
        rating_id: &str,
        entry_id: &str,
    ) -> Result<Rating, ContractError> {
        let key = RecordKey::Rating {
            rating_id,
            entry_id,
        };
        let rating: Rating = lifecycle::soft_delete(store, key, "")?;
        self.refresh_catalog_summary(store, &rating)?;
        store.emit(EventName::RatingDeleted, &rating)?;
        info!(
            target = SOURCE,
            tx_id = store.tx_id(),
            rating_id,
            entry_id,
            "rating deleted"
        );
        Ok(rating)
    }

    /// Active ratings of an entry in rating-ID order.
    pub fn entry_ratings(
        &self,
        store: &RecordStore<'_>,
        entry_id: &str,
    ) -> Result<Vec<Rating>, ContractError> {
        require_arg("entry_id", entry_id)?;
        store.collect_index(ScanPrefix::RatingsOnEntry(entry_id), Rating::is_active)
    }

    pub fn summary(
        &self,
        store: &RecordStore<'_>,
        entry_id: &str,
    ) -> Result<RatingSummary, ContractError> {
        let ratings = self.entry_ratings(store, entry_id)?;
        Ok(RatingSummary::from_scores(ratings.iter().map(|rating| rating.rating)))
    }

    pub fn average(&self, store: &RecordStore<'_>, entry_id: &str) -> Result<f64, ContractError> {
        Ok(self.summary(store, entry_id)?.average)
    }

    pub fn distribution(
        &self,
        store: &RecordStore<'_>,
        entry_id: &str,
    ) -> Result<RatingDistribution, ContractError> {
        Ok(self.summary(store, entry_id)?.distribution)
    }

    pub fn rater_rating(
        &self,
        store: &RecordStore<'_>,
        entry_id: &str,
        rater: &str,
    ) -> Result<Rating, ContractError> {
        require_arg("rater", rater)?;
        self.entry_ratings(store, entry_id)?
            .into_iter()
            .find(|rating| rating.rater == rater)
            .ok_or_else(|| ContractError::not_found("rating", format!("from {rater} on {entry_id}")))
    }

    pub fn count(&self, store: &RecordStore<'_>, entry_id: &str) -> Result<usize, ContractError> {
        Ok(self.entry_ratings(store, entry_id)?.len())
    }

    /// Recomputes the summary of the catalog entry a rating targets, if any.
    ///
    /// Reads see the committed snapshot, so the rating written by this
    /// transaction replaces its previous revision in the fold.
    fn refresh_catalog_summary(
        &self,
        store: &mut RecordStore<'_>,
        changed: &Rating,
    ) -> Result<(), ContractError> {
        let catalog_id = changed.entry_id.as_str();
        if !store.exists(RecordKey::Catalog(catalog_id))? {
            return Ok(());
        }

        let mut ratings = store.collect_index(ScanPrefix::RatingsOnEntry(catalog_id), |rating: &Rating| {
            rating.rating_id != changed.rating_id && rating.is_active()
        })?;
        if changed.is_active() {
            ratings.push(changed.clone());
        }
        let summary = RatingSummary::from_scores(ratings.iter().map(|rating| rating.rating));

        let actor = changed.rater.clone();
        let entry = lifecycle::update(
            store,
            RecordKey::Catalog(catalog_id),
            &actor,
            |entry: &mut CatalogEntry| {
                entry.rating_summary = summary;
                Ok(())
            },
        )?;
        debug!(
            target = SOURCE,
            catalog_id,
            count = entry.rating_summary.count,
            average = entry.rating_summary.average,
            version = entry.version,
            "catalog rating summary refreshed"
        );
        Ok(())
    }
}

fn parse_score(raw: &str) -> Option<u8> {
    raw.trim()
        .parse::<u8>()
        .ok()
        .filter(|score| is_valid_score(*score))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_must_be_between_one_and_five() {
        assert_eq!(parse_score("1"), Some(1));
        assert_eq!(parse_score(" 5 "), Some(5));
        assert_eq!(parse_score("0"), None);
        assert_eq!(parse_score("6"), None);
        assert_eq!(parse_score("4.5"), None);
        assert_eq!(parse_score(""), None);
    }
}
