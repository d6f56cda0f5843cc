//! Operation-name dispatch over positional string arguments.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

use crate::application::{
    args::Args,
    catalog::{CatalogService, SubmitContentCommand},
    comments::{AddCommentCommand, CommentService},
    entries::{CreateEntryCommand, EntryService, UpdateEntryCommand},
    error::ContractError,
    pagination::QueryLimits,
    ratings::{RatingService, SubmitRatingCommand},
    response::{OperationResponse, to_value},
    store::RecordStore,
};
use crate::domain::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Contract {
    Content,
    Entries,
    Comments,
    Ratings,
}

impl Contract {
    pub const ALL: [Contract; 4] = [
        Contract::Content,
        Contract::Entries,
        Contract::Comments,
        Contract::Ratings,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Contract::Content => "content",
            Contract::Entries => "entries",
            Contract::Comments => "comments",
            Contract::Ratings => "ratings",
        }
    }
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Contract {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Contract::ALL
            .into_iter()
            .find(|contract| contract.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| DomainError::unknown_variant("contract", value))
    }
}

/// Outcome of one invocation. Writes are committed only when `accepted`.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationResult {
    pub payload: Value,
    pub accepted: bool,
}

impl InvocationResult {
    fn accepted(payload: Value) -> Self {
        Self {
            payload,
            accepted: true,
        }
    }

    fn envelope(response: OperationResponse) -> Result<Self, ContractError> {
        let accepted = response.success;
        Ok(Self {
            payload: to_value(&response)?,
            accepted,
        })
    }
}

/// The four contracts sharing one ledger.
#[derive(Debug, Clone, Copy, Default)]
pub struct Contracts {
    pub catalog: CatalogService,
    pub entries: EntryService,
    pub comments: CommentService,
    pub ratings: RatingService,
}

impl Contracts {
    pub fn new(limits: QueryLimits) -> Self {
        Self {
            catalog: CatalogService::new(limits),
            ..Self::default()
        }
    }

    pub fn dispatch(
        &self,
        store: &mut RecordStore<'_>,
        contract: Contract,
        operation: &str,
        values: &[String],
    ) -> Result<InvocationResult, ContractError> {
        let args = Args::new(operation, values);
        match contract {
            Contract::Content => self.dispatch_content(store, operation, args),
            Contract::Entries => self.dispatch_entries(store, operation, args),
            Contract::Comments => self.dispatch_comments(store, operation, args),
            Contract::Ratings => self.dispatch_ratings(store, operation, args),
        }
    }

    fn dispatch_content(
        &self,
        store: &mut RecordStore<'_>,
        operation: &str,
        args: Args<'_>,
    ) -> Result<InvocationResult, ContractError> {
        let catalog = &self.catalog;
        match operation {
            "SubmitContentRequest" => {
                args.expect_at_least(8)?;
                let command = SubmitContentCommand {
                    catalog_id: args.get(0).to_string(),
                    title: args.get(1).to_string(),
                    director: args.get(2).to_string(),
                    release_year: args.get(3).to_string(),
                    genres_json: args.get(4).to_string(),
                    description: args.get(5).to_string(),
                    submitter_id: args.get(6).to_string(),
                    notes: args.get(7).to_string(),
                    content_hash: args.optional(8).map(str::to_string),
                };
                InvocationResult::envelope(catalog.submit(store, command)?)
            }
            "ApproveContentRequest" => {
                args.expect_at_least(2)?;
                InvocationResult::envelope(catalog.approve(store, args.get(0), args.get(1))?)
            }
            "RejectContentRequest" => {
                args.expect_at_least(3)?;
                let response = catalog.reject(store, args.get(0), args.get(1), args.get(2))?;
                InvocationResult::envelope(response)
            }
            "QueryAllCatalogEntries" => {
                let page = catalog.query_all(store, args.optional(0), args.optional(1))?;
                value(&page)
            }
            "SearchCatalogByTitle" => {
                args.expect_at_least(1)?;
                value(&catalog.search_by_title(store, args.get(0), args.optional(1))?)
            }
            "GetRequestHistory" => {
                let catalog_id = args.required(0, "catalog_id")?;
                value(&catalog.request_history(store, catalog_id, args.optional(1))?)
            }
            "GetCatalogEntryByID" => {
                let catalog_id = args.required(0, "catalog_id")?;
                value(&catalog.entry_by_id(store, catalog_id)?)
            }
            "GetContentRequest" => {
                let catalog_id = args.required(0, "catalog_id")?;
                value(&catalog.request_by_id(store, catalog_id)?)
            }
            "CheckApproval" => {
                let catalog_id = args.required(0, "catalog_id")?;
                value(&catalog.check_approval(store, catalog_id)?)
            }
            _ => Err(unknown(Contract::Content, operation)),
        }
    }

    fn dispatch_entries(
        &self,
        store: &mut RecordStore<'_>,
        operation: &str,
        args: Args<'_>,
    ) -> Result<InvocationResult, ContractError> {
        let entries = &self.entries;
        match operation {
            "CreateEntry" => {
                args.expect_at_least(7)?;
                let command = CreateEntryCommand {
                    entry_id: args.get(0).to_string(),
                    repo_name: args.get(1).to_string(),
                    title: args.get(2).to_string(),
                    description: args.get(3).to_string(),
                    content: args.get(4).to_string(),
                    author: args.get(5).to_string(),
                    content_hash: args.get(6).to_string(),
                    tags_json: args.get(7).to_string(),
                };
                value(&entries.create(store, command)?)
            }
            "GetEntry" => {
                args.expect_at_least(2)?;
                value(&entries.get(store, args.get(0), args.get(1))?)
            }
            "UpdateEntry" => {
                args.expect_at_least(6)?;
                let command = UpdateEntryCommand {
                    entry_id: args.get(0).to_string(),
                    repo_name: args.get(1).to_string(),
                    title: args.get(2).to_string(),
                    description: args.get(3).to_string(),
                    content: args.get(4).to_string(),
                    updated_by: args.get(5).to_string(),
                    content_hash: args.get(6).to_string(),
                };
                value(&entries.update(store, command)?)
            }
            "DeleteEntry" => {
                args.expect_at_least(3)?;
                value(&entries.delete(store, args.get(0), args.get(1), args.get(2))?)
            }
            "ListEntries" => {
                let repo = args.required(0, "repo_name")?;
                value(&entries.list(store, repo, args.optional(1), args.optional(2))?)
            }
            "GetEntryHistory" => {
                args.expect_at_least(2)?;
                value(&entries.history(store, args.get(0), args.get(1))?)
            }
            "Search" => {
                let repo = args.required(0, "repo_name")?;
                value(&entries.search(store, repo, args.get(1))?)
            }
            "GetEntryCount" => {
                let repo = args.required(0, "repo_name")?;
                value(&entries.count(store, repo)?)
            }
            _ => Err(unknown(Contract::Entries, operation)),
        }
    }

    fn dispatch_comments(
        &self,
        store: &mut RecordStore<'_>,
        operation: &str,
        args: Args<'_>,
    ) -> Result<InvocationResult, ContractError> {
        let comments = &self.comments;
        match operation {
            "AddComment" => {
                args.expect_at_least(6)?;
                let command = AddCommentCommand {
                    comment_id: args.get(0).to_string(),
                    entry_id: args.get(1).to_string(),
                    repo_name: args.get(2).to_string(),
                    content: args.get(3).to_string(),
                    author: args.get(4).to_string(),
                    rating: args.get(5).to_string(),
                    parent_id: args.optional(6).map(str::to_string),
                };
                value(&comments.add(store, command)?)
            }
            "GetComment" => {
                args.expect_at_least(2)?;
                value(&comments.get(store, args.get(0), args.get(1))?)
            }
            "UpdateComment" => {
                args.expect_at_least(3)?;
                let comment =
                    comments.update(store, args.get(0), args.get(1), args.get(2), args.get(3))?;
                value(&comment)
            }
            "DeleteComment" => {
                args.expect_at_least(2)?;
                value(&comments.delete(store, args.get(0), args.get(1), args.get(2))?)
            }
            "GetEntryComments" => {
                let entry_id = args.required(0, "entry_id")?;
                let include_deleted = args.get(1).trim() == "true";
                value(&comments.entry_comments(store, entry_id, include_deleted)?)
            }
            "GetThreadReplies" => {
                args.expect_at_least(2)?;
                value(&comments.thread_replies(store, args.get(0), args.get(1))?)
            }
            "GetAverageRating" => {
                let entry_id = args.required(0, "entry_id")?;
                value(&comments.average_rating(store, entry_id)?)
            }
            _ => Err(unknown(Contract::Comments, operation)),
        }
    }

    fn dispatch_ratings(
        &self,
        store: &mut RecordStore<'_>,
        operation: &str,
        args: Args<'_>,
    ) -> Result<InvocationResult, ContractError> {
        let ratings = &self.ratings;
        match operation {
            "SubmitRating" => {
                args.expect_at_least(5)?;
                let command = SubmitRatingCommand {
                    rating_id: args.get(0).to_string(),
                    entry_id: args.get(1).to_string(),
                    repo_name: args.get(2).to_string(),
                    rater: args.get(3).to_string(),
                    score: args.get(4).to_string(),
                    review: args.get(5).to_string(),
                };
                value(&ratings.submit(store, command)?)
            }
            "GetRating" => {
                args.expect_at_least(2)?;
                value(&ratings.get(store, args.get(0), args.get(1))?)
            }
            "DeleteRating" => {
                args.expect_at_least(2)?;
                value(&ratings.delete(store, args.get(0), args.get(1))?)
            }
            "GetEntryRatings" => {
                let entry_id = args.required(0, "entry_id")?;
                value(&ratings.entry_ratings(store, entry_id)?)
            }
            "GetAverageRating" => {
                let entry_id = args.required(0, "entry_id")?;
                value(&ratings.average(store, entry_id)?)
            }
            "GetRatingDistribution" => {
                let entry_id = args.required(0, "entry_id")?;
                value(&ratings.distribution(store, entry_id)?)
            }
            "GetRaterRating" => {
                args.expect_at_least(2)?;
                value(&ratings.rater_rating(store, args.get(0), args.get(1))?)
            }
            "GetRatingCount" => {
                let entry_id = args.required(0, "entry_id")?;
                value(&ratings.count(store, entry_id)?)
            }
            _ => Err(unknown(Contract::Ratings, operation)),
        }
    }
}

fn value<T: Serialize>(result: &T) -> Result<InvocationResult, ContractError> {
    Ok(InvocationResult::accepted(to_value(result)?))
}

fn unknown(contract: Contract, operation: &str) -> ContractError {
    ContractError::UnknownOperation {
        contract: contract.to_string(),
        operation: operation.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_names_parse_case_insensitively() {
        assert_eq!("content".parse::<Contract>().unwrap(), Contract::Content);
        assert_eq!("Ratings".parse::<Contract>().unwrap(), Contract::Ratings);
        assert!("movies".parse::<Contract>().is_err());
    }
}
