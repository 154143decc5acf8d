//! Input normalisation shared by profile and resume handling.

use std::collections::HashSet;

use crate::errors::AppError;

/// Syntactic email check: one `@`, non-empty local part, a dot inside the domain,
/// no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    if local.is_empty() || domain.is_empty() {
        return false;
    }
    match domain.rfind('.') {
        Some(idx) => idx > 0 && idx < domain.len() - 1 && !domain.starts_with('.'),
        None => false,
    }
}

/// Trims skills, drops empty ones and removes case-insensitive duplicates,
/// keeping the first spelling seen.
pub fn normalize_skills<I, S>(skills: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    skills
        .into_iter()
        .filter_map(|s| {
            let trimmed = s.as_ref().trim();
            if trimmed.is_empty() || !seen.insert(trimmed.to_lowercase()) {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}

/// Trims an optional field; blank becomes `None`.
pub fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Rejects blank required fields with a validation error naming the field.
pub fn require_non_empty(field: &str, value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{field} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_emails() {
        for email in ["a@b.co", "jane.doe+jobs@example.com", " x@y.io "] {
            assert!(is_valid_email(email), "{email} should be valid");
        }
    }

    #[test]
    fn test_invalid_emails() {
        for email in [
            "",
            "plainaddress",
            "@example.com",
            "a@",
            "a@b",
            "a@b.",
            "a@.com",
            "a@@b.com",
            "a b@c.com",
        ] {
            assert!(!is_valid_email(email), "{email} should be invalid");
        }
    }

    #[test]
    fn test_normalize_skills_dedups_case_insensitively() {
        let skills = normalize_skills(["Rust", " rust ", "", "  ", "Go", "GO", "SQL"]);
        assert_eq!(skills, vec!["Rust", "Go", "SQL"]);
    }

    #[test]
    fn test_clean_optional() {
        assert_eq!(clean_optional(Some("  ".into())), None);
        assert_eq!(clean_optional(Some(" Berlin ".into())), Some("Berlin".into()));
        assert_eq!(clean_optional(None), None);
    }

    #[test]
    fn test_require_non_empty() {
        assert!(require_non_empty("title", "  ").is_err());
        assert_eq!(require_non_empty("title", " Dev ").unwrap(), "Dev");
    }
}
