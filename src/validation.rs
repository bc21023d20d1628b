use std::fmt;

use serde::Serialize;
use utoipa::ToSchema;

/// A rejected input value, tagged with the request field it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub type FieldResult<T> = Result<T, FieldError>;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_COLLECTION_NAME_LEN: usize = 200;

/// Ratings across the system (reviews, personal ratings, vote averages) share the 0..=10 scale.
pub fn validate_rating(field: &str, value: f64) -> FieldResult<f64> {
    if !value.is_finite() || !(0.0..=10.0).contains(&value) {
        return Err(FieldError::new(field, "Rating must be between 0 and 10."));
    }
    Ok(value)
}

pub fn validate_optional_rating(field: &str, value: Option<f64>) -> FieldResult<Option<f64>> {
    value.map(|v| validate_rating(field, v)).transpose()
}

pub fn validate_vote_average(value: Option<f64>) -> FieldResult<Option<f64>> {
    match value {
        Some(v) if !v.is_finite() || !(0.0..=10.0).contains(&v) => Err(FieldError::new(
            "vote_average",
            "Vote average must be between 0 and 10.",
        )),
        other => Ok(other),
    }
}

pub fn validate_runtime(value: Option<i32>) -> FieldResult<Option<i32>> {
    match value {
        Some(v) if v < 0 => Err(FieldError::new("runtime", "Runtime cannot be negative.")),
        other => Ok(other),
    }
}

pub fn validate_required_text<'a>(field: &str, value: &'a str, max_len: Option<usize>) -> FieldResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(FieldError::new(field, "This field may not be blank."));
    }
    if let Some(max) = max_len {
        if trimmed.chars().count() > max {
            return Err(FieldError::new(field, format!("Ensure this field has no more than {max} characters.")));
        }
    }
    Ok(trimmed)
}

pub fn validate_email(value: &str) -> FieldResult<&str> {
    let value = value.trim();
    let valid = match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid || value.chars().any(char::is_whitespace) {
        return Err(FieldError::new("email", "Enter a valid email address."));
    }
    Ok(value)
}

/// Canonical stored form of an email: trimmed, domain lowercased, local part kept as given.
pub fn normalize_email(value: &str) -> String {
    let value = value.trim();
    match value.rsplit_once('@') {
        Some((local, domain)) => format!("{local}@{}", domain.to_lowercase()),
        None => value.to_string(),
    }
}

pub fn validate_password(value: &str) -> FieldResult<&str> {
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(FieldError::new(
            "password",
            format!("Password must be at least {MIN_PASSWORD_LEN} characters."),
        ));
    }
    Ok(value)
}

pub fn validate_username(value: &str) -> FieldResult<&str> {
    let value = validate_required_text("username", value, Some(150))?;
    if !value.chars().all(|c| c.is_alphanumeric() || "@.+-_".contains(c)) {
        return Err(FieldError::new(
            "username",
            "Username may contain only letters, numbers, and @/./+/-/_ characters.",
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_bounds_are_inclusive() {
        assert!(validate_rating("rating", 0.0).is_ok());
        assert!(validate_rating("rating", 10.0).is_ok());
        assert_eq!(validate_rating("rating", 10.5).unwrap_err().field, "rating");
        assert!(validate_rating("rating", -0.1).is_err());
        assert!(validate_rating("rating", f64::NAN).is_err());
    }

    #[test]
    fn runtime_and_vote_average() {
        assert!(validate_runtime(None).is_ok());
        assert!(validate_runtime(Some(0)).is_ok());
        assert_eq!(validate_runtime(Some(-1)).unwrap_err().field, "runtime");
        assert!(validate_vote_average(Some(9.3)).is_ok());
        assert_eq!(validate_vote_average(Some(11.0)).unwrap_err().field, "vote_average");
    }

    #[test]
    fn email_shape() {
        assert!(validate_email("a@example.com").is_ok());
        assert!(validate_email("nope").is_err());
        assert!(validate_email("a@b").is_err());
        assert!(validate_email("a b@example.com").is_err());
    }

    #[test]
    fn only_the_email_domain_is_case_folded() {
        assert_eq!(normalize_email(" Alice@Example.COM "), "Alice@example.com");
        assert_eq!(normalize_email("alice@example.com"), "alice@example.com");
    }

    #[test]
    fn blank_text_rejected() {
        assert!(validate_required_text("name", "   ", None).is_err());
        assert_eq!(validate_required_text("name", " Favs ", None).unwrap(), "Favs");
        assert!(validate_required_text("name", "abcdef", Some(3)).is_err());
    }
}
