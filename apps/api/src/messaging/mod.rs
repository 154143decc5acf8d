pub mod handlers;
pub mod store;

use uuid::Uuid;

use crate::errors::AppError;

pub const MAX_MESSAGE_CHARS: usize = 4_000;

/// Participants in canonical order: smaller UUID first.
pub fn canonical_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Trims a message body and checks it is 1..=4000 characters.
pub fn validate_body(body: &str) -> Result<String, AppError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(AppError::Validation("Message body must not be empty".to_string()));
    }
    let len = body.chars().count();
    if len > MAX_MESSAGE_CHARS {
        return Err(AppError::Validation(format!(
            "Message body is {len} characters; the limit is {MAX_MESSAGE_CHARS}"
        )));
    }
    Ok(body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_pair_is_order_independent() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        assert_eq!(canonical_pair(a, b), (a, b));
        assert_eq!(canonical_pair(b, a), (a, b));
    }

    #[test]
    fn test_body_is_trimmed() {
        assert_eq!(validate_body("  hi there \n").unwrap(), "hi there");
    }

    #[test]
    fn test_blank_body_rejected() {
        assert!(matches!(validate_body(" \n\t "), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_body_limit_counts_characters() {
        let at_limit = "é".repeat(MAX_MESSAGE_CHARS);
        assert!(validate_body(&at_limit).is_ok());
        let over = "a".repeat(MAX_MESSAGE_CHARS + 1);
        assert!(validate_body(&over).is_err());
    }
}
