//! Business rules on top of the store: input validation, existence checks and
//! translation of store outcomes into `AppError` kinds.

use regex::Regex;
use std::sync::{Arc, OnceLock};

use crate::auth::AuthService;
use crate::error::{AppError, AppResult};
use crate::models::MAX_PAGE_LIMIT;
use crate::store::aggregate::FIELD_SEPARATOR;
use crate::store::Store;

mod friends;
mod posts;
mod users;

pub struct SocialService {
    store: Arc<Store>,
    auth: Arc<AuthService>,
}

impl SocialService {
    pub fn new(store: Arc<Store>, auth: Arc<AuthService>) -> Self {
        Self { store, auth }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}

// ==================== Validation ====================

fn email_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Regex should compile")
    })
}

fn phone_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^\+[0-9]{7,13}$").expect("Regex should compile"))
}

fn url_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("Regex should compile")
    })
}

/// Length in characters, inclusive bounds.
pub(crate) fn validate_length(field: &str, value: &str, min: usize, max: usize) -> AppResult<()> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(AppError::validation(format!(
            "{} must be between {} and {} characters",
            field, min, max
        )));
    }
    Ok(())
}

/// Comment text, user names and image URLs are packed into one delimited
/// string per comment by the feed query, so they must not carry the delimiter.
pub(crate) fn validate_text(field: &str, value: &str) -> AppResult<()> {
    if value.contains(FIELD_SEPARATOR) {
        return Err(AppError::validation(format!(
            "{} contains an invalid control character",
            field
        )));
    }
    Ok(())
}

pub(crate) fn validate_email(email: &str) -> AppResult<()> {
    if !email_regex().is_match(email) {
        return Err(AppError::validation("invalid email format"));
    }
    Ok(())
}

pub(crate) fn validate_phone(phone: &str) -> AppResult<()> {
    if !phone_regex().is_match(phone) {
        return Err(AppError::validation(
            "phone must start with + and contain 7 to 13 digits",
        ));
    }
    Ok(())
}

pub(crate) fn validate_url(url: &str) -> AppResult<()> {
    if !url_regex().is_match(url) {
        return Err(AppError::validation("imageUrl must be a valid http(s) URL"));
    }
    Ok(())
}

pub(crate) fn validate_page(limit: i64, offset: i64) -> AppResult<()> {
    if !(0..=MAX_PAGE_LIMIT).contains(&limit) {
        return Err(AppError::validation(format!(
            "limit must be between 0 and {}",
            MAX_PAGE_LIMIT
        )));
    }
    if offset < 0 {
        return Err(AppError::validation("offset must not be negative"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_counts_characters() {
        assert!(validate_length("name", "Zoë K", 5, 50).is_ok());
        assert!(validate_length("name", "abcd", 5, 50).is_err());
        assert!(validate_length("comment", &"é".repeat(500), 2, 500).is_ok());
        assert!(validate_length("comment", &"é".repeat(501), 2, 500).is_err());
    }

    #[test]
    fn test_text_rejects_field_separator() {
        assert!(validate_text("comment", "plain text, with | pipes").is_ok());
        let err = validate_text("comment", "hi\u{1f}there").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ValidationError);
        assert!(validate_text("imageUrl", "https://img.test/a\u{1f}b.png").is_err());
    }

    #[test]
    fn test_credential_formats() {
        assert!(validate_email("someone.x+tag@mail.example.org").is_ok());
        assert!(validate_email("no-at-sign.example.org").is_err());
        assert!(validate_email("a@b.c").is_err());

        assert!(validate_phone("+6281234567").is_ok());
        assert!(validate_phone("081234567").is_err());
        assert!(validate_phone("+123456").is_err());
        assert!(validate_phone("+12345678901234").is_err());
    }

    #[test]
    fn test_url_format() {
        assert!(validate_url("https://cdn.example.com/a.png").is_ok());
        assert!(validate_url("http://example.com").is_ok());
        assert!(validate_url("ftp://example.com/a.png").is_err());
        assert!(validate_url("not a url").is_err());
    }

    #[test]
    fn test_page_bounds() {
        assert!(validate_page(0, 0).is_ok());
        assert!(validate_page(100, 10).is_ok());
        assert!(validate_page(101, 0).is_err());
        assert!(validate_page(-1, 0).is_err());
        assert!(validate_page(5, -1).is_err());
    }
}
