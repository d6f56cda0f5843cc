//! Domain records, enumerations and validation rules.

pub mod catalog;
pub mod engagement;
pub mod entries;
pub mod error;
pub mod types;
pub mod validation;
