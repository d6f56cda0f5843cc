use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("unknown {kind} value `{value}`")]
    UnknownVariant { kind: &'static str, value: String },
    #[error("record invariant violated: {message}")]
    Invariant { message: String },
}

impl DomainError {
    pub fn unknown_variant(kind: &'static str, value: impl Into<String>) -> Self {
        Self::UnknownVariant {
            kind,
            value: value.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
        }
    }
}
