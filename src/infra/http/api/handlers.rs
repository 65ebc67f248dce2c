use std::io::ErrorKind;

use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::application::error::{ErrorReport, HttpError};
use crate::application::products::{CreateProductCommand, ProductImage, ProductListParams};
use crate::domain::error::DomainError;
use crate::infra::uploads::UploadStorageError;

use super::error::{ApiError, codes, product_error_to_api};
use super::models::*;
use super::state::ApiState;

pub const CACHE_STATUS_HEADER: &str = "x-cache";

pub async fn health(State(state): State<ApiState>) -> Response {
    let database = state.health.ping().await;
    let cache = state.products.cache().reader().health().await;

    let (status, body) = match &database {
        Ok(()) => (
            StatusCode::OK,
            HealthResponse {
                status: "ok".to_string(),
                database: "ok".to_string(),
                cache: cache.as_str().to_string(),
            },
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            HealthResponse {
                status: "degraded".to_string(),
                database: "unavailable".to_string(),
                cache: cache.as_str().to_string(),
            },
        ),
    };

    let mut response = (status, Json(body)).into_response();
    if let Err(err) = database {
        ErrorReport::from_error("infra::http::api::health", status, &err).attach(&mut response);
    }
    response
}

pub async fn list_products(
    State(state): State<ApiState>,
    query: Result<Query<ProductListQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query
        .map_err(|err| ApiError::bad_request("Invalid query string", Some(err.body_text())))?;
    let params = ProductListParams::parse(raw_list_params(&query)).map_err(product_error_to_api)?;

    let listing = state
        .products
        .list(&params)
        .await
        .map_err(product_error_to_api)?;
    let cache_status = listing.status.header_value();

    Ok((
        [(CACHE_STATUS_HEADER, cache_status)],
        Json(list_response(listing)),
    )
        .into_response())
}

pub async fn get_product(
    State(state): State<ApiState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<ProductResponse>, ApiError> {
    let Path(id) = id.map_err(|_| ApiError::not_found("Product not found"))?;
    let product = state
        .products
        .find(id)
        .await
        .map_err(product_error_to_api)?;
    Ok(Json(product_response(product)))
}

pub async fn create_product(
    State(state): State<ApiState>,
    payload: Result<Json<ProductCreateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload.map_err(invalid_body)?;
    let product = state
        .products
        .create(payload.into())
        .await
        .map_err(product_error_to_api)?;
    Ok((StatusCode::CREATED, Json(product_response(product))))
}

pub async fn update_product(
    State(state): State<ApiState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<ProductUpdateRequest>, JsonRejection>,
) -> Result<Json<ProductResponse>, ApiError> {
    let Path(id) = id.map_err(|_| ApiError::not_found("Product not found"))?;
    let Json(payload) = payload.map_err(invalid_body)?;
    let product = state
        .products
        .update(id, payload.into())
        .await
        .map_err(product_error_to_api)?;
    Ok(Json(product_response(product)))
}

pub async fn delete_product(
    State(state): State<ApiState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let Path(id) = id.map_err(|_| ApiError::not_found("Product not found"))?;
    state
        .products
        .delete(id)
        .await
        .map_err(product_error_to_api)?;
    Ok(Json(DeleteResponse { ok: true }))
}

/// Multipart create: an `image` file part plus the scalar product fields.
pub async fn upload_product(
    State(state): State<ApiState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let mut multipart = multipart.map_err(|err| {
        ApiError::new(
            err.status(),
            codes::INVALID_UPLOAD,
            "Invalid multipart payload",
            Some(err.body_text()),
        )
    })?;

    let mut command = CreateProductCommand::default();
    let mut price = None;
    let mut image = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        ApiError::new(
            err.status(),
            codes::INVALID_UPLOAD,
            "Invalid multipart payload",
            Some(err.body_text()),
        )
    })? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == "image" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let data = field.bytes().await.map_err(|err| {
                ApiError::new(
                    err.status(),
                    codes::INVALID_UPLOAD,
                    "Failed to read image",
                    Some(err.body_text()),
                )
            })?;
            image = Some(ProductImage { file_name, data });
            continue;
        }

        let value = field.text().await.map_err(|err| {
            ApiError::new(
                err.status(),
                codes::INVALID_UPLOAD,
                "Failed to read form field",
                Some(err.body_text()),
            )
        })?;

        match name.as_str() {
            "sku" => command.sku = value,
            "name" => command.name = value,
            "description" => command.description = Some(value),
            "price" => price = Some(parse_field::<f64>("price", &value)?),
            "currency" => command.currency = Some(value),
            "stock" => command.stock = Some(parse_field::<i32>("stock", &value)?),
            "category" => command.category = Some(value),
            _ => {}
        }
    }

    let image = image.ok_or_else(|| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_UPLOAD,
            "Invalid upload",
            Some("an `image` file part is required".to_string()),
        )
    })?;
    command.price = price.ok_or_else(|| {
        product_error_to_api(DomainError::validation("price", "is required").into())
    })?;

    let product = state
        .products
        .create_with_image(command, image)
        .await
        .map_err(product_error_to_api)?;
    Ok((StatusCode::CREATED, Json(product_response(product))))
}

pub async fn serve_upload(State(state): State<ApiState>, Path(path): Path<String>) -> Response {
    const SOURCE: &str = "infra::http::api::serve_upload";

    match state.upload_storage.read(&path).await {
        Ok(bytes) => build_upload_response(&path, bytes),
        Err(UploadStorageError::InvalidPath) => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Upload not found",
            "The requested upload is not available",
        )
        .into_response(),
        Err(UploadStorageError::Io(err)) if err.kind() == ErrorKind::NotFound => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Upload not found",
            "The requested upload is not available",
        )
        .into_response(),
        Err(err) => {
            error!(
                target = "storefront::http::uploads",
                path = %path,
                error = %err,
                "failed to read stored upload"
            );
            HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read uploaded file",
                &err,
            )
            .into_response()
        }
    }
}

fn build_upload_response(path: &str, bytes: Bytes) -> Response {
    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}

fn invalid_body(err: JsonRejection) -> ApiError {
    ApiError::new(
        err.status(),
        codes::BAD_REQUEST,
        "Invalid request body",
        Some(err.body_text()),
    )
}

fn parse_field<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, ApiError> {
    value.trim().parse::<T>().map_err(|_| {
        product_error_to_api(DomainError::validation(field, "must be a number").into())
    })
}
