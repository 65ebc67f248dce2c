//! Product field normalisation and validation rules.

use super::error::DomainError;

pub const DEFAULT_CURRENCY: &str = "EUR";
pub const DEFAULT_CATEGORY: &str = "uncategorized";

pub fn normalize_sku(value: &str) -> Result<String, DomainError> {
    non_empty(value, "sku")
}

pub fn normalize_name(value: &str) -> Result<String, DomainError> {
    non_empty(value, "name")
}

pub fn validate_price(value: f64) -> Result<f64, DomainError> {
    if !value.is_finite() {
        return Err(DomainError::validation("price", "must be a finite number"));
    }
    if value < 0.0 {
        return Err(DomainError::validation("price", "must not be negative"));
    }
    Ok(value)
}

/// ISO-4217 style code: three ASCII letters, stored upper-case.
pub fn normalize_currency(value: &str) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.len() != 3 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(DomainError::validation(
            "currency",
            format!("`{trimmed}` is not a three-letter currency code"),
        ));
    }
    Ok(trimmed.to_ascii_uppercase())
}

pub fn validate_stock(value: i32) -> Result<i32, DomainError> {
    if value < 0 {
        return Err(DomainError::validation("stock", "must not be negative"));
    }
    Ok(value)
}

pub fn normalize_category(value: &str) -> Result<String, DomainError> {
    non_empty(value, "category")
}

/// Blank descriptions are stored as `NULL`.
pub fn normalize_description(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn non_empty(value: &str, field: &'static str) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(field, "must not be empty"));
    }
    Ok(trimmed.to_string())
}
