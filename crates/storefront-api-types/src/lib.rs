//! Request and response bodies of the storefront catalog API.
//!
//! The server serializes exactly these types, so clients can depend on this
//! crate instead of re-declaring the wire format.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Query string accepted by `GET /products`.
///
/// `sort` and `order` stay raw strings here; the server validates them and
/// answers `400` for unknown values.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ProductListQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProductCreateRequest {
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub currency: Option<String>,
    pub stock: Option<i32>,
    pub category: Option<String>,
    #[serde(default, alias = "imageUrl")]
    pub image_url: Option<String>,
}

/// Partial update: every absent field keeps its stored value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ProductUpdateRequest {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub stock: Option<i32>,
    pub category: Option<String>,
    #[serde(default, alias = "imageUrl")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CategoryResponse {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProductResponse {
    pub id: i64,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub currency: String,
    pub stock: i32,
    pub image_url: Option<String>,
    pub category: CategoryResponse,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProductListResponse {
    pub items: Vec<ProductResponse>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u64,
    pub duration_ms: f64,
    pub cached: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeleteResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub cache: String,
}
