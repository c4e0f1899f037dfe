//! Fatal errors.
//!
//! Anything that aborts construction of a document (or the carrier image
//! around it) ends up here. Recoverable problems go to
//! [`Diagnostics`](crate::diagnostics::Diagnostics) instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CardError {
    #[error("Missing required entry: {0}")]
    MissingRequired(String),

    #[error("{0} must not be empty")]
    EmptyField(String),

    #[error("{0} must be a list")]
    NotAList(String),

    #[error("{0} must be a single value, not a list")]
    ExpectedText(String),

    #[error("If defined, {field} must be one of: {}", .allowed.join(", "))]
    InvalidChoice {
        field: String,
        allowed: Vec<&'static str>,
    },

    #[error("Invalid PNG: {0}")]
    InvalidImage(String),

    #[error("No embedded card found in image")]
    MissingCard,

    #[error("Invalid embedded card payload: {0}")]
    InvalidPayload(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CardError {
    /// True when the failure came from the card text itself rather than
    /// from the environment (files, images, encoding).
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            CardError::MissingRequired(_)
                | CardError::EmptyField(_)
                | CardError::NotAList(_)
                | CardError::ExpectedText(_)
                | CardError::InvalidChoice { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_choice_lists_allowed_values() {
        let err = CardError::InvalidChoice {
            field: "position".to_string(),
            allowed: vec!["before_char", "after_char"],
        };
        assert_eq!(
            err.to_string(),
            "If defined, position must be one of: before_char, after_char"
        );
        assert!(err.is_parse_error());
    }

    #[test]
    fn test_environment_errors_are_not_parse_errors() {
        let err = CardError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(!err.is_parse_error());
        assert!(!CardError::MissingCard.is_parse_error());
    }
}
