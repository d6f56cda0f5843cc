//! Field-level validation that is reported back as data instead of aborting.

use serde::{Deserialize, Serialize};

pub const CATALOG_ID_PREFIX: &str = "tt";
pub const CATALOG_ID_MIN_LEN: usize = 9;
pub const CATALOG_ID_MAX_LEN: usize = 10;

pub const TITLE_MAX_LEN: usize = 500;
pub const DIRECTOR_MAX_LEN: usize = 200;
pub const DESCRIPTION_MAX_LEN: usize = 5000;
pub const NOTES_MAX_LEN: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationCode {
    Required,
    InvalidFormat,
    MaxLength,
    OutOfRange,
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub code: ValidationCode,
}

/// Accumulates every failing field so a caller sees all problems at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, code: ValidationCode, message: impl Into<String>) {
        self.0.push(ValidationError {
            field: field.to_string(),
            message: message.into(),
            code,
        });
    }

    pub fn require(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.push(field, ValidationCode::Required, format!("{field} is required"));
        }
    }

    pub fn max_length(&mut self, field: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.push(
                field,
                ValidationCode::MaxLength,
                format!("{field} must be at most {max} characters"),
            );
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<ValidationError> {
        self.0
    }

    pub fn summary(&self) -> String {
        self.0
            .iter()
            .map(|error| format!("{}: {}", error.field, error.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// `tt` followed by 7 or 8 ASCII digits.
pub fn is_valid_catalog_id(id: &str) -> bool {
    if !(CATALOG_ID_MIN_LEN..=CATALOG_ID_MAX_LEN).contains(&id.len()) {
        return false;
    }
    match id.strip_prefix(CATALOG_ID_PREFIX) {
        Some(digits) => digits.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

/// Parses a JSON array of names (genres, tags); blank names are dropped.
pub fn parse_string_list(raw: &str) -> Result<Vec<String>, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let names: Vec<String> = serde_json::from_str(raw)?;
    Ok(names
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_ids_follow_the_fixed_format() {
        assert!(is_valid_catalog_id("tt1375666"));
        assert!(is_valid_catalog_id("tt12345678"));
        assert!(!is_valid_catalog_id("1375666"));
        assert!(!is_valid_catalog_id("ttX123456"));
        assert!(!is_valid_catalog_id("tt123456"));
        assert!(!is_valid_catalog_id("tt123456789"));
        assert!(!is_valid_catalog_id("TT1375666"));
    }

    #[test]
    fn errors_accumulate_across_fields() {
        let mut errors = ValidationErrors::new();
        errors.require("title", "   ");
        errors.max_length("notes", &"n".repeat(NOTES_MAX_LEN + 1), NOTES_MAX_LEN);
        errors.max_length("director", "Nolan", DIRECTOR_MAX_LEN);

        let codes: Vec<_> = errors.iter().map(|e| (e.field.as_str(), e.code)).collect();
        assert_eq!(
            codes,
            vec![
                ("title", ValidationCode::Required),
                ("notes", ValidationCode::MaxLength)
            ]
        );
    }

    #[test]
    fn genre_lists_must_be_json_string_arrays() {
        assert_eq!(
            parse_string_list(r#"["Sci-Fi", " ", "Thriller"]"#).unwrap(),
            vec!["Sci-Fi".to_string(), "Thriller".to_string()]
        );
        assert!(parse_string_list("").unwrap().is_empty());
        assert!(parse_string_list("Sci-Fi,Thriller").is_err());
        assert!(parse_string_list("[1, 2]").is_err());
    }
}
