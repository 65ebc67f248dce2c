//! In-memory repositories and router wiring shared by the HTTP tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use time::macros::datetime;
use tokio::sync::Mutex;
use tower::ServiceExt;

use storefront::application::api_keys::StaticApiKey;
use storefront::application::pagination::PageRequest;
use storefront::application::products::ProductService;
use storefront::application::repos::{
    CreateProductParams, HealthRepo, ProductQueryFilter, ProductSort, ProductsRepo,
    ProductsWriteRepo, RepoError, UpdateProductParams,
};
use storefront::cache::{CacheConfig, FamilyCache, KeyValueStore, MemoryStore, ResourceFamily};
use storefront::domain::entities::{CategoryRecord, ProductRecord};
use storefront::domain::types::{ProductSortField, SortOrder};
use storefront::infra::http::{ApiRateLimiter, ApiState, build_router};
use storefront::infra::uploads::UploadStorage;

pub const API_KEY: &str = "test-admin-key";

#[derive(Default)]
struct Catalog {
    products: Vec<ProductRecord>,
    categories: Vec<CategoryRecord>,
    next_product_id: i64,
}

impl Catalog {
    fn category(&mut self, name: &str) -> CategoryRecord {
        if let Some(existing) = self.categories.iter().find(|c| c.name == name) {
            return existing.clone();
        }
        let category = CategoryRecord {
            id: self.categories.len() as i64 + 1,
            name: name.to_string(),
        };
        self.categories.push(category.clone());
        category
    }
}

/// Products kept in memory, counting listing queries.
#[derive(Default)]
pub struct InMemoryProducts {
    catalog: Mutex<Catalog>,
    list_calls: AtomicUsize,
    database_down: AtomicBool,
}

impl InMemoryProducts {
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn set_database_down(&self, down: bool) {
        self.database_down.store(down, Ordering::SeqCst);
    }

    pub async fn seed(&self, sku: &str, name: &str, price: f64, category: &str) -> ProductRecord {
        self.create_product(CreateProductParams {
            sku: sku.to_string(),
            name: name.to_string(),
            description: None,
            price,
            currency: "EUR".to_string(),
            stock: 1,
            category: category.to_string(),
            image_url: None,
        })
        .await
        .expect("seed product")
    }
}

fn matches(product: &ProductRecord, filter: &ProductQueryFilter) -> bool {
    if let Some(search) = filter.search.as_ref() {
        let needle = search.to_lowercase();
        let hit = product.name.to_lowercase().contains(&needle)
            || product.sku.to_lowercase().contains(&needle)
            || product
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle));
        if !hit {
            return false;
        }
    }
    if let Some(category) = filter.category.as_ref()
        && &product.category.name != category
    {
        return false;
    }
    if filter.min_price.is_some_and(|min| product.price < min) {
        return false;
    }
    if filter.max_price.is_some_and(|max| product.price > max) {
        return false;
    }
    true
}

#[async_trait]
impl ProductsRepo for InMemoryProducts {
    async fn list_with_count(
        &self,
        filter: &ProductQueryFilter,
        sort: ProductSort,
        page: PageRequest,
    ) -> Result<(Vec<ProductRecord>, u64), RepoError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let catalog = self.catalog.lock().await;

        let mut items: Vec<_> = catalog
            .products
            .iter()
            .filter(|product| matches(product, filter))
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            let ordering = match sort.field {
                ProductSortField::Price => a.price.total_cmp(&b.price),
                ProductSortField::CreatedAt => a.created_at.cmp(&b.created_at),
            }
            .then(a.id.cmp(&b.id));
            match sort.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        let total = items.len() as u64;
        let items = items
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();
        Ok((items, total))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<ProductRecord>, RepoError> {
        let catalog = self.catalog.lock().await;
        Ok(catalog.products.iter().find(|p| p.id == id).cloned())
    }
}

#[async_trait]
impl ProductsWriteRepo for InMemoryProducts {
    async fn create_product(
        &self,
        params: CreateProductParams,
    ) -> Result<ProductRecord, RepoError> {
        let mut catalog = self.catalog.lock().await;
        if catalog.products.iter().any(|p| p.sku == params.sku) {
            return Err(RepoError::Duplicate {
                constraint: "products_sku_key".to_string(),
            });
        }

        catalog.next_product_id += 1;
        let id = catalog.next_product_id;
        let created_at = datetime!(2024-05-01 10:00 UTC) + time::Duration::minutes(id);
        let category = catalog.category(&params.category);
        let product = ProductRecord {
            id,
            sku: params.sku,
            name: params.name,
            description: params.description,
            price: params.price,
            currency: params.currency,
            stock: params.stock,
            image_url: params.image_url,
            category,
            created_at,
            updated_at: created_at,
        };
        catalog.products.push(product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        params: UpdateProductParams,
    ) -> Result<ProductRecord, RepoError> {
        let mut catalog = self.catalog.lock().await;
        let category = params.category.as_deref().map(|name| catalog.category(name));
        let product = catalog
            .products
            .iter_mut()
            .find(|p| p.id == params.id)
            .ok_or(RepoError::NotFound)?;

        if let Some(sku) = params.sku {
            product.sku = sku;
        }
        if let Some(name) = params.name {
            product.name = name;
        }
        if let Some(description) = params.description {
            product.description = Some(description);
        }
        if let Some(price) = params.price {
            product.price = price;
        }
        if let Some(currency) = params.currency {
            product.currency = currency;
        }
        if let Some(stock) = params.stock {
            product.stock = stock;
        }
        if let Some(image_url) = params.image_url {
            product.image_url = Some(image_url);
        }
        if let Some(category) = category {
            product.category = category;
        }
        Ok(product.clone())
    }

    async fn delete_product(&self, id: i64) -> Result<ProductRecord, RepoError> {
        let mut catalog = self.catalog.lock().await;
        let index = catalog
            .products
            .iter()
            .position(|p| p.id == id)
            .ok_or(RepoError::NotFound)?;
        Ok(catalog.products.remove(index))
    }
}

#[async_trait]
impl HealthRepo for InMemoryProducts {
    async fn ping(&self) -> Result<(), RepoError> {
        if self.database_down.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("connection refused"));
        }
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub repo: Arc<InMemoryProducts>,
    pub store: Arc<MemoryStore>,
    pub uploads: TempDir,
}

pub struct TestOptions {
    pub cache_enabled: bool,
    pub max_requests: u32,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            max_requests: 500,
        }
    }
}

pub fn test_app(options: TestOptions) -> TestApp {
    let repo = Arc::new(InMemoryProducts::default());
    let store = Arc::new(MemoryStore::new());
    let uploads = TempDir::new().expect("temp dir");
    let upload_storage =
        Arc::new(UploadStorage::new(uploads.path().to_path_buf()).expect("upload storage"));

    let config = CacheConfig {
        enabled: options.cache_enabled,
        ..CacheConfig::default()
    };
    let shared: Arc<dyn KeyValueStore> = store.clone();
    let cache = FamilyCache::new(
        ResourceFamily::PRODUCTS,
        &config,
        options.cache_enabled.then_some(shared),
    );

    let products = Arc::new(ProductService::new(
        repo.clone(),
        repo.clone(),
        cache,
        upload_storage.clone(),
    ));

    let state = ApiState {
        products,
        health: repo.clone(),
        api_key: Arc::new(StaticApiKey::new(API_KEY)),
        upload_storage,
        rate_limiter: Arc::new(ApiRateLimiter::new(
            Duration::from_secs(60),
            options.max_requests,
        )),
        upload_limit_bytes: 1024 * 1024,
    };

    TestApp {
        router: build_router(state),
        repo,
        store,
        uploads,
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("json body")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn error_code(&self) -> String {
        self.json()["error"]["code"]
            .as_str()
            .unwrap_or_default()
            .to_string()
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");
    let status = response.status();
    let headers = response.headers().clone();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes()
        .to_vec();
    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request should build")
}

pub fn json_request(method: &str, uri: &str, key: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(key) = key {
        builder = builder.header("x-api-key", key);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request should build")
}

/// Smallest valid PNG: a single transparent pixel.
pub const PIXEL_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

const BOUNDARY: &str = "storefront-test-boundary";

/// Multipart create request with the given scalar fields and image part.
pub fn multipart_request(fields: &[(&str, &str)], image: Option<(&str, &[u8])>) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, data)) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/products/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header("authorization", format!("Bearer {API_KEY}"))
        .body(Body::from(body))
        .expect("request should build")
}

/// Regular files below `root`, recursively.
pub fn stored_files(root: &std::path::Path) -> Vec<std::path::PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files
}
