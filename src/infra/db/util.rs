use crate::application::repos::RepoError;

// PostgreSQL SQLSTATE codes the catalog distinguishes.
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";
const NOT_NULL_VIOLATION: &str = "23502";
const INVALID_TEXT_REPRESENTATION: &str = "22P02";
const QUERY_CANCELED: &str = "57014";

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db) => classify_database_error(
            db.code().as_deref(),
            db.constraint(),
            db.message(),
        ),
        other => RepoError::from_persistence(other),
    }
}

fn classify_database_error(code: Option<&str>, constraint: Option<&str>, message: &str) -> RepoError {
    match code {
        Some(UNIQUE_VIOLATION) => RepoError::Duplicate {
            constraint: constraint.unwrap_or("unknown").to_string(),
        },
        Some(FOREIGN_KEY_VIOLATION) | Some(INVALID_TEXT_REPRESENTATION) => {
            RepoError::InvalidInput {
                message: message.to_string(),
            }
        }
        Some(CHECK_VIOLATION) | Some(NOT_NULL_VIOLATION) => RepoError::Integrity {
            message: constraint
                .and_then(describe_constraint)
                .map(str::to_string)
                .unwrap_or_else(|| message.to_string()),
        },
        Some(QUERY_CANCELED) => RepoError::Timeout,
        _ => RepoError::from_persistence(message),
    }
}

/// Client-facing wording for the catalog's named constraints.
pub fn describe_constraint(constraint: &str) -> Option<&'static str> {
    match constraint {
        "products_sku_key" => Some("a product with this sku already exists"),
        "categories_name_key" => Some("a category with this name already exists"),
        "products_price_check" => Some("price must not be negative"),
        "products_stock_check" => Some("stock must not be negative"),
        _ => None,
    }
}
