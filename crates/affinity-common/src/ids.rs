//! Identifier rules
//!
//! Subject and object ids arrive in URL paths and bearer sessions. They are
//! opaque to the relationship core but must be short, non-empty and limited
//! to URL-safe characters so they can be used as path segments and cache keys.

use thiserror::Error;

/// Longest identifier accepted anywhere in the API.
pub const MAX_ID_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("identifier is empty")]
    Empty,
    #[error("identifier exceeds {MAX_ID_LEN} characters")]
    TooLong,
    #[error("identifier contains invalid character {0:?}")]
    InvalidChar(char),
}

/// Check that `id` is a well-formed entity identifier.
pub fn validate_id(id: &str) -> Result<(), IdError> {
    if id.is_empty() {
        return Err(IdError::Empty);
    }
    if id.len() > MAX_ID_LEN {
        return Err(IdError::TooLong);
    }
    match id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        Some(c) => Err(IdError::InvalidChar(c)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_uuid_and_slug() {
        assert!(validate_id("0b6c3f9e-3a55-4c1a-9d55-1f0e2a7b9c10").is_ok());
        assert!(validate_id("post_42").is_ok());
    }

    #[test]
    fn test_rejects_malformed() {
        assert_eq!(validate_id(""), Err(IdError::Empty));
        assert_eq!(validate_id(&"a".repeat(MAX_ID_LEN + 1)), Err(IdError::TooLong));
        assert_eq!(validate_id("a/b"), Err(IdError::InvalidChar('/')));
        assert_eq!(validate_id("a b"), Err(IdError::InvalidChar(' ')));
    }
}
