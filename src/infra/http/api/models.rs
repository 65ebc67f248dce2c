pub use storefront_api_types::{
    CategoryResponse, DeleteResponse, HealthResponse, ProductCreateRequest, ProductListQuery,
    ProductListResponse, ProductResponse, ProductUpdateRequest,
};

use crate::application::products::{
    CreateProductCommand, ProductListing, RawListParams, UpdateProductCommand,
};
use crate::domain::entities::ProductRecord;

pub fn product_response(record: ProductRecord) -> ProductResponse {
    ProductResponse {
        id: record.id,
        sku: record.sku,
        name: record.name,
        description: record.description,
        price: record.price,
        currency: record.currency,
        stock: record.stock,
        image_url: record.image_url,
        category: CategoryResponse {
            id: record.category.id,
            name: record.category.name,
        },
        created_at: record.created_at,
        updated_at: record.updated_at,
    }
}

pub fn list_response(listing: ProductListing) -> ProductListResponse {
    let page = listing.page;
    ProductListResponse {
        items: page.items.into_iter().map(product_response).collect(),
        page: page.page,
        page_size: page.page_size,
        total: page.total,
        total_pages: page.total_pages,
        duration_ms: listing.duration_ms,
        cached: listing.status.is_hit(),
    }
}

pub fn raw_list_params(query: &ProductListQuery) -> RawListParams<'_> {
    RawListParams {
        q: query.q.as_deref(),
        category: query.category.as_deref(),
        min_price: query.min_price,
        max_price: query.max_price,
        sort: query.sort.as_deref(),
        order: query.order.as_deref(),
        page: query.page,
        page_size: query.page_size,
    }
}

impl From<ProductCreateRequest> for CreateProductCommand {
    fn from(request: ProductCreateRequest) -> Self {
        Self {
            sku: request.sku,
            name: request.name,
            description: request.description,
            price: request.price,
            currency: request.currency,
            stock: request.stock,
            category: request.category,
            image_url: request.image_url,
        }
    }
}

impl From<ProductUpdateRequest> for UpdateProductCommand {
    fn from(request: ProductUpdateRequest) -> Self {
        Self {
            sku: request.sku,
            name: request.name,
            description: request.description,
            price: request.price,
            currency: request.currency,
            stock: request.stock,
            category: request.category,
            image_url: request.image_url,
        }
    }
}
