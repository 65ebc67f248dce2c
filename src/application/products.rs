//! Product catalog service: cached listings and cache-invalidating writes.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use metrics::histogram;
use thiserror::Error;
use tracing::{info, warn};

use crate::application::pagination::{PageRequest, PaginationError, ProductPage};
use crate::application::repos::{
    CreateProductParams, ProductQueryFilter, ProductSort, ProductsRepo, ProductsWriteRepo,
    RepoError, UpdateProductParams,
};
use crate::cache::{CacheStatus, FamilyCache, QueryDescriptor};
use crate::domain::entities::ProductRecord;
use crate::domain::error::DomainError;
use crate::domain::products::{
    DEFAULT_CATEGORY, DEFAULT_CURRENCY, normalize_category, normalize_currency,
    normalize_description, normalize_name, normalize_sku, validate_price, validate_stock,
};
use crate::domain::types::{ProductSortField, SortOrder};
use crate::infra::uploads::{UploadStorage, UploadStorageError};

const METRIC_PRODUCT_LIST_MS: &str = "storefront_product_list_ms";

#[derive(Debug, Error)]
pub enum ProductServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    #[error("product not found")]
    NotFound,
    #[error("invalid upload: {0}")]
    InvalidUpload(String),
    #[error("failed to store upload")]
    Upload(#[source] UploadStorageError),
    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for ProductServiceError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => ProductServiceError::NotFound,
            RepoError::Pagination(err) => ProductServiceError::Pagination(err),
            other => ProductServiceError::Repo(other),
        }
    }
}

/// Validated listing request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductListParams {
    pub filter: ProductQueryFilter,
    pub sort: ProductSort,
    pub page: PageRequest,
}

/// Raw listing parameters as received from a client.
#[derive(Debug, Clone, Default)]
pub struct RawListParams<'a> {
    pub q: Option<&'a str>,
    pub category: Option<&'a str>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub sort: Option<&'a str>,
    pub order: Option<&'a str>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl ProductListParams {
    /// Applies defaults, trims text filters and rejects out-of-range values.
    pub fn parse(raw: RawListParams<'_>) -> Result<Self, ProductServiceError> {
        let sort = ProductSort {
            field: raw
                .sort
                .map(str::parse::<ProductSortField>)
                .transpose()?
                .unwrap_or_default(),
            order: raw
                .order
                .map(str::parse::<SortOrder>)
                .transpose()?
                .unwrap_or_default(),
        };

        for (field, value) in [("min_price", raw.min_price), ("max_price", raw.max_price)] {
            if value.is_some_and(|value| !value.is_finite()) {
                return Err(DomainError::validation(field, "must be a finite number").into());
            }
        }

        Ok(Self {
            filter: ProductQueryFilter {
                search: non_blank(raw.q),
                category: non_blank(raw.category),
                min_price: raw.min_price,
                max_price: raw.max_price,
            },
            sort,
            page: PageRequest::from_query(raw.page, raw.page_size)?,
        })
    }

    /// Cache descriptor over the effective value of every parameter.
    pub fn descriptor(&self) -> QueryDescriptor {
        QueryDescriptor::new()
            .with("q", self.filter.search.clone())
            .with("category", self.filter.category.clone())
            .with("min_price", self.filter.min_price)
            .with("max_price", self.filter.max_price)
            .with("sort", self.sort.field.as_str())
            .with("order", self.sort.order.as_str())
            .with("page", self.page.page())
            .with("page_size", self.page.page_size())
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone)]
pub struct ProductListing {
    pub page: ProductPage<ProductRecord>,
    pub status: CacheStatus,
    pub duration_ms: f64,
}

/// Create request before validation.
#[derive(Debug, Clone, Default)]
pub struct CreateProductCommand {
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub currency: Option<String>,
    pub stock: Option<i32>,
    pub category: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateProductCommand {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub stock: Option<i32>,
    pub category: Option<String>,
    pub image_url: Option<String>,
}

/// Image part of a multipart create.
#[derive(Debug, Clone)]
pub struct ProductImage {
    pub file_name: String,
    pub data: Bytes,
}

#[derive(Clone)]
pub struct ProductService {
    reader: Arc<dyn ProductsRepo>,
    writer: Arc<dyn ProductsWriteRepo>,
    cache: FamilyCache,
    uploads: Arc<UploadStorage>,
}

impl ProductService {
    pub fn new(
        reader: Arc<dyn ProductsRepo>,
        writer: Arc<dyn ProductsWriteRepo>,
        cache: FamilyCache,
        uploads: Arc<UploadStorage>,
    ) -> Self {
        Self {
            reader,
            writer,
            cache,
            uploads,
        }
    }

    pub fn cache(&self) -> &FamilyCache {
        &self.cache
    }

    pub async fn list(
        &self,
        params: &ProductListParams,
    ) -> Result<ProductListing, ProductServiceError> {
        let started_at = Instant::now();
        let descriptor = params.descriptor();

        let cached = self
            .cache
            .reader()
            .read_through(&descriptor, || async move {
                let (items, total) = self
                    .reader
                    .list_with_count(&params.filter, params.sort, params.page)
                    .await?;
                Ok::<_, ProductServiceError>(ProductPage::new(items, params.page, total))
            })
            .await?;

        let duration_ms = started_at.elapsed().as_secs_f64() * 1000.0;
        histogram!(METRIC_PRODUCT_LIST_MS, "cache" => cached.status.header_value())
            .record(duration_ms);

        Ok(ProductListing {
            page: cached.value,
            status: cached.status,
            duration_ms,
        })
    }

    pub async fn find(&self, id: i64) -> Result<ProductRecord, ProductServiceError> {
        self.reader
            .find_by_id(id)
            .await?
            .ok_or(ProductServiceError::NotFound)
    }

    pub async fn create(
        &self,
        command: CreateProductCommand,
    ) -> Result<ProductRecord, ProductServiceError> {
        let params = validate_create(command)?;
        let product = self.writer.create_product(params).await?;
        self.committed("create", &product).await;
        Ok(product)
    }

    /// Creates a product with an uploaded image.
    ///
    /// The image is validated and stored before the record is written. If the
    /// record cannot be written the stored image is removed again.
    pub async fn create_with_image(
        &self,
        mut command: CreateProductCommand,
        image: ProductImage,
    ) -> Result<ProductRecord, ProductServiceError> {
        validate_image(&image)?;
        command.image_url = None;
        let mut params = validate_create(command)?;

        let stored = self
            .uploads
            .store(&image.file_name, image.data)
            .await
            .map_err(ProductServiceError::Upload)?;
        params.image_url = Some(stored.public_url());

        let product = match self.writer.create_product(params).await {
            Ok(product) => product,
            Err(err) => {
                if let Err(cleanup) = self.uploads.delete(&stored.stored_path).await {
                    warn!(
                        target = "storefront::application::products",
                        stored_path = %stored.stored_path,
                        error = %cleanup,
                        "Failed to remove image after product creation failed"
                    );
                }
                return Err(err.into());
            }
        };

        info!(
            target = "storefront::application::products",
            product_id = product.id,
            stored_path = %stored.stored_path,
            checksum = %stored.checksum,
            size_bytes = stored.size_bytes,
            "Product image stored"
        );
        self.committed("create", &product).await;
        Ok(product)
    }

    pub async fn update(
        &self,
        id: i64,
        command: UpdateProductCommand,
    ) -> Result<ProductRecord, ProductServiceError> {
        let params = validate_update(id, command)?;
        let product = self.writer.update_product(params).await?;
        self.committed("update", &product).await;
        Ok(product)
    }

    pub async fn delete(&self, id: i64) -> Result<ProductRecord, ProductServiceError> {
        let product = self.writer.delete_product(id).await?;
        self.committed("delete", &product).await;

        if let Some(stored_path) = product
            .image_url
            .as_deref()
            .and_then(|url| self.uploads.stored_path_for_url(url))
            && let Err(err) = self.uploads.delete(stored_path).await
        {
            warn!(
                target = "storefront::application::products",
                product_id = product.id,
                stored_path,
                error = %err,
                "Failed to remove image of deleted product"
            );
        }

        Ok(product)
    }

    async fn committed(&self, mutation: &'static str, product: &ProductRecord) {
        info!(
            target = "storefront::application::products",
            product_id = product.id,
            sku = %product.sku,
            mutation,
            "Product mutation committed"
        );
        self.cache.invalidator().mutation_committed(mutation).await;
    }
}

fn validate_create(command: CreateProductCommand) -> Result<CreateProductParams, DomainError> {
    let category = match non_blank(command.category.as_deref()) {
        Some(category) => normalize_category(&category)?,
        None => DEFAULT_CATEGORY.to_string(),
    };

    Ok(CreateProductParams {
        sku: normalize_sku(&command.sku)?,
        name: normalize_name(&command.name)?,
        description: normalize_description(command.description),
        price: validate_price(command.price)?,
        currency: normalize_currency(command.currency.as_deref().unwrap_or(DEFAULT_CURRENCY))?,
        stock: validate_stock(command.stock.unwrap_or(0))?,
        category,
        image_url: non_blank(command.image_url.as_deref()),
    })
}

fn validate_update(id: i64, command: UpdateProductCommand) -> Result<UpdateProductParams, DomainError> {
    Ok(UpdateProductParams {
        id,
        sku: command.sku.as_deref().map(normalize_sku).transpose()?,
        name: command.name.as_deref().map(normalize_name).transpose()?,
        description: normalize_description(command.description),
        price: command.price.map(validate_price).transpose()?,
        currency: command
            .currency
            .as_deref()
            .map(normalize_currency)
            .transpose()?,
        stock: command.stock.map(validate_stock).transpose()?,
        category: command
            .category
            .as_deref()
            .map(normalize_category)
            .transpose()?,
        image_url: non_blank(command.image_url.as_deref()),
    })
}

fn validate_image(image: &ProductImage) -> Result<(), ProductServiceError> {
    if image.file_name.trim().is_empty() {
        return Err(ProductServiceError::InvalidUpload(
            "image file name is missing".to_string(),
        ));
    }
    if image.data.is_empty() {
        return Err(ProductServiceError::InvalidUpload(
            "image file is empty".to_string(),
        ));
    }

    let guessed = mime_guess::from_path(&image.file_name).first_or_octet_stream();
    if guessed.type_() != mime_guess::mime::IMAGE {
        return Err(ProductServiceError::InvalidUpload(format!(
            "`{}` is not an image file name",
            image.file_name
        )));
    }

    imagesize::blob_size(&image.data).map_err(|err| {
        ProductServiceError::InvalidUpload(format!("image could not be decoded: {err}"))
    })?;

    Ok(())
}
