//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::application::pagination::{PageRequest, PaginationError};
use crate::domain::entities::ProductRecord;
use crate::domain::types::{ProductSortField, SortOrder};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
    #[error(transparent)]
    Pagination(#[from] PaginationError),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Optional listing filters, combined with AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductQueryFilter {
    /// Case-insensitive substring of name, description or sku.
    pub search: Option<String>,
    /// Exact category name.
    pub category: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProductSort {
    pub field: ProductSortField,
    pub order: SortOrder,
}

#[derive(Debug, Clone)]
pub struct CreateProductParams {
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub currency: String,
    pub stock: i32,
    pub category: String,
    pub image_url: Option<String>,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct UpdateProductParams {
    pub id: i64,
    pub sku: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub stock: Option<i32>,
    pub category: Option<String>,
    pub image_url: Option<String>,
}

impl UpdateProductParams {
    pub fn is_empty(&self) -> bool {
        self.sku.is_none()
            && self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.currency.is_none()
            && self.stock.is_none()
            && self.category.is_none()
            && self.image_url.is_none()
    }
}

#[async_trait]
pub trait ProductsRepo: Send + Sync {
    /// One page of products and the total match count, read consistently.
    async fn list_with_count(
        &self,
        filter: &ProductQueryFilter,
        sort: ProductSort,
        page: PageRequest,
    ) -> Result<(Vec<ProductRecord>, u64), RepoError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<ProductRecord>, RepoError>;
}

#[async_trait]
pub trait ProductsWriteRepo: Send + Sync {
    /// Creates a product, upserting its category by name.
    async fn create_product(&self, params: CreateProductParams)
    -> Result<ProductRecord, RepoError>;

    /// Fails with [`RepoError::NotFound`] when the product does not exist.
    async fn update_product(&self, params: UpdateProductParams)
    -> Result<ProductRecord, RepoError>;

    /// Returns the deleted record, [`RepoError::NotFound`] when absent.
    async fn delete_product(&self, id: i64) -> Result<ProductRecord, RepoError>;
}

#[async_trait]
pub trait HealthRepo: Send + Sync {
    async fn ping(&self) -> Result<(), RepoError>;
}
