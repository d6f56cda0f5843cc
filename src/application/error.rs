use std::error::Error as StdError;

use axum::{http::StatusCode, response::Response};
use thiserror::Error;

use crate::{
    application::{keys::KeyError, ledger::LedgerError},
    domain::{error::DomainError, validation::ValidationErrors},
    infra::error::InfraError,
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Failure of a single contract operation.
///
/// Everything up to `Key` describes a refused request and leaves the ledger
/// untouched. `Codec`, `Clock` and `Ledger` are fatal: the host drops the
/// transaction and nothing it wrote is committed.
#[derive(Debug, Error)]
pub enum ContractError {
    #[error("validation failed: {}", .0.summary())]
    Validation(ValidationErrors),
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },
    #[error("{entity} `{id}` already exists")]
    Duplicate { entity: &'static str, id: String },
    #[error("invalid state: {message}")]
    InvalidState { message: String },
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },
    #[error("unknown operation `{operation}` on contract `{contract}`")]
    UnknownOperation { contract: String, operation: String },
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error("{entity} document could not be encoded or decoded: {source}")]
    Codec {
        entity: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to format transaction timestamp: {0}")]
    Clock(#[from] time::error::Format),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl ContractError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn duplicate(entity: &'static str, id: impl Into<String>) -> Self {
        Self::Duplicate {
            entity,
            id: id.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn codec(entity: &'static str, source: serde_json::Error) -> Self {
        Self::Codec { entity, source }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ContractError::Codec { .. } | ContractError::Clock(_) | ContractError::Ledger(_)
        )
    }

    pub fn code(&self) -> &'static str {
        match self {
            ContractError::Validation(_) => "validation_failed",
            ContractError::NotFound { .. } => "not_found",
            ContractError::Duplicate { .. } => "duplicate",
            ContractError::InvalidState { .. } => "invalid_state",
            ContractError::InvalidArgument { .. } | ContractError::Domain(_) => "invalid_argument",
            ContractError::UnknownOperation { .. } => "unknown_operation",
            ContractError::Key(_) => "invalid_key",
            ContractError::Ledger(LedgerError::Conflict { .. }) => "conflict",
            ContractError::Codec { .. } | ContractError::Clock(_) | ContractError::Ledger(_) => {
                "storage_error"
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Contract(#[from] ContractError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
