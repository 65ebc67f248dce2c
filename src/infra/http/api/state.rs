use std::sync::Arc;

use crate::application::api_keys::StaticApiKey;
use crate::application::products::ProductService;
use crate::application::repos::HealthRepo;
use crate::infra::uploads::UploadStorage;

use super::rate_limit::ApiRateLimiter;

#[derive(Clone)]
pub struct ApiState {
    pub products: Arc<ProductService>,
    pub health: Arc<dyn HealthRepo>,
    pub api_key: Arc<StaticApiKey>,
    pub upload_storage: Arc<UploadStorage>,
    pub rate_limiter: Arc<ApiRateLimiter>,
    /// Body limit applied to multipart product uploads.
    pub upload_limit_bytes: usize,
}
