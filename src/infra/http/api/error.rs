use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::error::{ContractError, ErrorReport};
use crate::application::ledger::LedgerError;
use crate::domain::validation::ValidationError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const VALIDATION: &str = "validation_failed";
    pub const NOT_FOUND: &str = "not_found";
    pub const DUPLICATE: &str = "duplicate";
    pub const INVALID_STATE: &str = "invalid_state";
    pub const UNKNOWN_OPERATION: &str = "unknown_operation";
    pub const CONFLICT: &str = "conflict";
    pub const STORAGE: &str = "storage_error";
    pub const INTERNAL: &str = "internal_error";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<ValidationError>,
}

const SOURCE: &str = "infra::http::api";

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
    fields: Vec<ValidationError>,
    report: ErrorReport,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        let detail = format!("{code}: {}", hint.as_deref().unwrap_or(message));
        Self {
            status,
            code,
            message,
            hint,
            fields: Vec::new(),
            report: ErrorReport::from_message(SOURCE, status, detail),
        }
    }

    fn with_report(mut self, err: &ContractError) -> Self {
        self.report = ErrorReport::from_error(SOURCE, self.status, err);
        self
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn internal(hint: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::INTERNAL,
            "Internal error",
            Some(hint.into()),
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ContractError> for ApiError {
    fn from(err: ContractError) -> Self {
        let hint = Some(err.to_string());
        let api_error = match &err {
            ContractError::Validation(errors) => Self {
                fields: errors.clone().into_vec(),
                ..Self::new(
                    StatusCode::BAD_REQUEST,
                    codes::VALIDATION,
                    "Validation failed",
                    hint,
                )
            },
            ContractError::NotFound { .. } => Self::new(
                StatusCode::NOT_FOUND,
                codes::NOT_FOUND,
                "Record not found",
                hint,
            ),
            ContractError::Duplicate { .. } => Self::new(
                StatusCode::CONFLICT,
                codes::DUPLICATE,
                "Record already exists",
                hint,
            ),
            ContractError::InvalidState { .. } => Self::new(
                StatusCode::CONFLICT,
                codes::INVALID_STATE,
                "Operation not allowed in the current state",
                hint,
            ),
            ContractError::UnknownOperation { .. } => Self::new(
                StatusCode::NOT_FOUND,
                codes::UNKNOWN_OPERATION,
                "Unknown operation",
                hint,
            ),
            ContractError::InvalidArgument { .. }
            | ContractError::Domain(_)
            | ContractError::Key(_) => Self::bad_request("Invalid argument", hint),
            ContractError::Ledger(LedgerError::Conflict { .. }) => Self::new(
                StatusCode::CONFLICT,
                codes::CONFLICT,
                "Concurrent modification; retry the invocation",
                hint,
            ),
            ContractError::Codec { .. } | ContractError::Clock(_) | ContractError::Ledger(_) => {
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    codes::STORAGE,
                    "Ledger storage failure",
                    hint,
                )
            }
        };
        api_error.with_report(&err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
                fields: self.fields,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        self.report.attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_errors_map_to_statuses() {
        let cases = [
            (ContractError::not_found("entry", "e1"), StatusCode::NOT_FOUND),
            (ContractError::duplicate("entry", "e1"), StatusCode::CONFLICT),
            (ContractError::invalid_state("deleted"), StatusCode::CONFLICT),
            (ContractError::invalid_argument("limit"), StatusCode::BAD_REQUEST),
            (
                ContractError::from(LedgerError::conflict("entry/e1/films")),
                StatusCode::CONFLICT,
            ),
            (
                ContractError::from(LedgerError::storage("disk")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError::from(error).status(), status);
        }
    }
}
