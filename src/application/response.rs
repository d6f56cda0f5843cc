use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::application::error::ContractError;
use crate::domain::validation::ValidationError;

/// Envelope returned by the content review operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ValidationError>,
    pub txn_id: String,
    pub timestamp: String,
}

impl OperationResponse {
    pub fn success(
        message: impl Into<String>,
        data: Value,
        txn_id: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            errors: Vec::new(),
            txn_id: txn_id.into(),
            timestamp: timestamp.into(),
        }
    }

    /// Folds a refused operation into a failure envelope.
    ///
    /// Fatal errors are handed back unchanged so the host aborts the
    /// transaction instead of reporting a soft failure.
    pub fn refusal(
        error: ContractError,
        txn_id: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Result<Self, ContractError> {
        if error.is_fatal() {
            return Err(error);
        }
        let (message, errors) = match error {
            ContractError::Validation(errors) => {
                ("validation failed".to_string(), errors.into_vec())
            }
            other => (other.to_string(), Vec::new()),
        };
        Ok(Self {
            success: false,
            message,
            data: None,
            errors,
            txn_id: txn_id.into(),
            timestamp: timestamp.into(),
        })
    }
}

pub fn to_value<T: Serialize>(value: &T) -> Result<Value, ContractError> {
    serde_json::to_value(value).map_err(|err| ContractError::codec("response", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ledger::LedgerError;
    use crate::domain::validation::{ValidationCode, ValidationErrors};

    #[test]
    fn validation_failures_carry_field_errors() {
        let mut errors = ValidationErrors::new();
        errors.require("title", "");
        let response =
            OperationResponse::refusal(ContractError::Validation(errors), "tx", "now").unwrap();

        assert!(!response.success);
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].code, ValidationCode::Required);
        assert!(response.data.is_none());
    }

    #[test]
    fn storage_errors_are_not_folded() {
        let result = OperationResponse::refusal(
            ContractError::from(LedgerError::storage("boom")),
            "tx",
            "now",
        );
        assert!(result.is_err());
    }

    #[test]
    fn empty_error_lists_are_omitted() {
        let response = OperationResponse::success("ok", Value::Null, "tx", "now");
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("errors").is_none());
        assert_eq!(json["success"], Value::Bool(true));
    }
}
