use lazy_static::lazy_static;
use regex::Regex;

use crate::error::AuthError;

/// Emails are compared and stored case-normalized.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Password composition rules. Messages are field-specific on purpose so a
/// registration form can tell the user exactly what to fix; login errors
/// stay generic elsewhere.
pub fn check_password_rules(password: &str) -> Result<(), AuthError> {
    lazy_static! {
        static ref UPPER: Regex = Regex::new("[A-Z]").unwrap();
        static ref LOWER: Regex = Regex::new("[a-z]").unwrap();
        static ref DIGIT: Regex = Regex::new("[0-9]").unwrap();
        static ref SPECIAL: Regex = Regex::new("[@$!%*?&#]").unwrap();
    }
    if password.chars().count() < 8 {
        return Err(AuthError::Validation(
            "Password must be at least 8 characters long".into(),
        ));
    }
    if !UPPER.is_match(password) {
        return Err(AuthError::Validation(
            "Password must contain at least one uppercase letter".into(),
        ));
    }
    if !LOWER.is_match(password) {
        return Err(AuthError::Validation(
            "Password must contain at least one lowercase letter".into(),
        ));
    }
    if !DIGIT.is_match(password) {
        return Err(AuthError::Validation(
            "Password must contain at least one number".into(),
        ));
    }
    if !SPECIAL.is_match(password) {
        return Err(AuthError::Validation(
            "Password must contain at least one special character (@$!%*?&#)".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn accepts_plain_addresses() {
        assert!(is_valid_email("alice@example.com"));
        assert!(is_valid_email("a.b+c@sub.example.org"));
    }

    #[test]
    fn rejects_junk_addresses() {
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a b@example.com"));
        assert!(!is_valid_email("a@b"));
    }

    #[test]
    fn accepts_compliant_password() {
        assert!(check_password_rules("Password123!").is_ok());
    }

    #[test]
    fn minimum_length_counts_characters_not_bytes() {
        // 7 characters, 8 bytes: the umlaut must not pad the length.
        let err = check_password_rules("Päss1!@").unwrap_err();
        assert!(err.to_string().contains("at least 8 characters"));
        assert!(check_password_rules("Pässw0rd1!").is_ok());
    }

    #[test]
    fn rule_messages_name_the_missing_class() {
        let cases = [
            ("Ab1!", "at least 8 characters"),
            ("password123!", "uppercase"),
            ("PASSWORD123!", "lowercase"),
            ("Passwords!", "number"),
            ("Password123", "special character"),
        ];
        for (password, fragment) in cases {
            let err = check_password_rules(password).unwrap_err();
            assert!(
                err.to_string().contains(fragment),
                "{password}: {err}"
            );
        }
    }
}
