//! Positional string arguments as received by contract operations.

use crate::application::error::ContractError;
use crate::domain::validation::ValidationErrors;

#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    operation: &'a str,
    values: &'a [String],
}

impl<'a> Args<'a> {
    pub fn new(operation: &'a str, values: &'a [String]) -> Self {
        Self { operation, values }
    }

    /// Refuses the call unless at least `count` arguments were supplied.
    pub fn expect_at_least(&self, count: usize) -> Result<(), ContractError> {
        if self.values.len() < count {
            return Err(ContractError::invalid_argument(format!(
                "{} expects at least {count} argument(s), got {}",
                self.operation,
                self.values.len()
            )));
        }
        Ok(())
    }

    /// Positional argument, empty when absent.
    pub fn get(&self, index: usize) -> &'a str {
        self.values.get(index).map(String::as_str).unwrap_or("")
    }

    /// Positional argument, `None` when absent or blank.
    pub fn optional(&self, index: usize) -> Option<&'a str> {
        self.values
            .get(index)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    pub fn required(&self, index: usize, name: &str) -> Result<&'a str, ContractError> {
        let value = self.get(index);
        require_arg(name, value)?;
        Ok(value)
    }
}

/// A blank required argument is reported like any other missing field.
pub fn require_arg(name: &str, value: &str) -> Result<(), ContractError> {
    let mut errors = ValidationErrors::new();
    errors.require(name, value);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ContractError::Validation(errors))
    }
}
