mod support;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;

use support::{
    API_KEY, PIXEL_PNG, TestOptions, get, json_request, multipart_request, send, stored_files,
    test_app,
};

#[tokio::test]
async fn identical_listing_is_served_from_cache() {
    let app = test_app(TestOptions::default());
    app.repo.seed("SKU-1", "Runner", 49.9, "shoes").await;
    app.repo.seed("SKU-2", "Trail", 89.0, "shoes").await;

    let first = send(&app.router, get("/products?category=shoes")).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.header("x-cache"), Some("MISS"));
    let body = first.json();
    assert_eq!(body["total"], 2);
    assert_eq!(body["total_pages"], 1);
    assert_eq!(body["cached"], false);

    let second = send(&app.router, get("/products?category=shoes")).await;
    assert_eq!(second.header("x-cache"), Some("HIT"));
    let cached = second.json();
    assert_eq!(cached["cached"], true);
    assert_eq!(cached["items"], body["items"]);
    assert_eq!(app.repo.list_calls(), 1);
}

#[tokio::test]
async fn explicit_defaults_share_the_cached_entry() {
    let app = test_app(TestOptions::default());
    app.repo.seed("SKU-1", "Runner", 49.9, "shoes").await;

    send(&app.router, get("/products")).await;
    let explicit = send(
        &app.router,
        get("/products?page=1&page_size=20&sort=createdAt&order=asc"),
    )
    .await;

    assert_eq!(explicit.header("x-cache"), Some("HIT"));
    assert_eq!(app.repo.list_calls(), 1);
}

#[tokio::test]
async fn responses_carry_request_id_and_security_headers() {
    let app = test_app(TestOptions::default());

    let response = send(&app.router, get("/products")).await;
    assert!(response.header("x-request-id").is_some());
    assert_eq!(response.header("x-content-type-options"), Some("nosniff"));
    assert_eq!(response.header("x-frame-options"), Some("DENY"));
    assert_eq!(response.header("referrer-policy"), Some("no-referrer"));
}

#[tokio::test]
async fn writes_require_the_api_key() {
    let app = test_app(TestOptions::default());
    let body = json!({"sku": "SKU-1", "name": "Runner", "price": 10.0});

    let missing = send(
        &app.router,
        json_request("POST", "/products", None, body.clone()),
    )
    .await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing.error_code(), "unauthorized");

    let wrong = send(
        &app.router,
        json_request("POST", "/products", Some("not-the-key"), body.clone()),
    )
    .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let delete = send(
        &app.router,
        Request::builder()
            .method("DELETE")
            .uri("/products/1")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(delete.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_invalidates_cached_listings() {
    let app = test_app(TestOptions::default());
    app.repo.seed("SKU-1", "Runner", 49.9, "shoes").await;

    send(&app.router, get("/products")).await;
    assert_eq!(
        send(&app.router, get("/products")).await.header("x-cache"),
        Some("HIT")
    );

    let created = send(
        &app.router,
        json_request(
            "POST",
            "/products",
            Some(API_KEY),
            json!({"sku": "SKU-2", "name": "Court", "price": 59.0, "category": "shoes"}),
        ),
    )
    .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let product = created.json();
    assert_eq!(product["currency"], "EUR");
    assert_eq!(product["stock"], 0);
    assert_eq!(product["category"]["name"], "shoes");

    let after = send(&app.router, get("/products")).await;
    assert_eq!(after.header("x-cache"), Some("MISS"));
    assert_eq!(after.json()["total"], 2);
}

#[tokio::test]
async fn create_without_category_uses_uncategorized() {
    let app = test_app(TestOptions::default());

    let created = send(
        &app.router,
        json_request(
            "POST",
            "/products",
            Some(API_KEY),
            json!({"sku": "SKU-9", "name": "Socks", "price": 5, "currency": "usd", "stock": 3}),
        ),
    )
    .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let product = created.json();
    assert_eq!(product["category"]["name"], "uncategorized");
    assert_eq!(product["currency"], "USD");
    assert_eq!(product["stock"], 3);
}

#[tokio::test]
async fn update_and_delete_each_invalidate() {
    let app = test_app(TestOptions::default());
    let product = app.repo.seed("SKU-1", "Runner", 49.9, "shoes").await;
    let uri = format!("/products/{}", product.id);

    send(&app.router, get("/products")).await;

    let updated = send(
        &app.router,
        json_request("PUT", &uri, Some(API_KEY), json!({"price": 39.9})),
    )
    .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.json()["price"], 39.9);
    assert_eq!(updated.json()["name"], "Runner");

    let listing = send(&app.router, get("/products")).await;
    assert_eq!(listing.header("x-cache"), Some("MISS"));
    assert_eq!(listing.json()["items"][0]["price"], 39.9);

    let deleted = send(
        &app.router,
        Request::builder()
            .method("DELETE")
            .uri(&uri)
            .header("authorization", format!("Bearer {API_KEY}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.json(), json!({"ok": true}));

    let listing = send(&app.router, get("/products")).await;
    assert_eq!(listing.header("x-cache"), Some("MISS"));
    assert_eq!(listing.json()["total"], 0);

    let missing = send(&app.router, get(&uri)).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.error_code(), "not_found");
}

#[tokio::test]
async fn failed_writes_leave_the_cache_untouched() {
    let app = test_app(TestOptions::default());
    app.repo.seed("SKU-1", "Runner", 49.9, "shoes").await;
    send(&app.router, get("/products")).await;

    let duplicate = send(
        &app.router,
        json_request(
            "POST",
            "/products",
            Some(API_KEY),
            json!({"sku": "SKU-1", "name": "Again", "price": 1.0}),
        ),
    )
    .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);
    assert_eq!(duplicate.error_code(), "duplicate");
    assert_eq!(
        duplicate.json()["error"]["hint"],
        "a product with this sku already exists"
    );

    let invalid = send(
        &app.router,
        json_request(
            "POST",
            "/products",
            Some(API_KEY),
            json!({"sku": "SKU-3", "name": "Broken", "price": -1.0}),
        ),
    )
    .await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    assert_eq!(invalid.error_code(), "validation_error");

    let missing = send(
        &app.router,
        json_request("PUT", "/products/404", Some(API_KEY), json!({"name": "Ghost"})),
    )
    .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let listing = send(&app.router, get("/products")).await;
    assert_eq!(listing.header("x-cache"), Some("HIT"));
}

#[tokio::test]
async fn invalid_listing_parameters_are_rejected_before_the_cache() {
    let app = test_app(TestOptions::default());

    let too_large = send(&app.router, get("/products?page_size=500")).await;
    assert_eq!(too_large.status, StatusCode::BAD_REQUEST);
    assert_eq!(too_large.error_code(), "invalid_pagination");

    let page_zero = send(&app.router, get("/products?page=0")).await;
    assert_eq!(page_zero.status, StatusCode::BAD_REQUEST);

    let unknown_sort = send(&app.router, get("/products?sort=name")).await;
    assert_eq!(unknown_sort.status, StatusCode::BAD_REQUEST);
    assert_eq!(unknown_sort.error_code(), "validation_error");

    let not_a_number = send(&app.router, get("/products?page=abc")).await;
    assert_eq!(not_a_number.status, StatusCode::BAD_REQUEST);
    assert_eq!(not_a_number.error_code(), "bad_request");

    assert_eq!(app.repo.list_calls(), 0);
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn filters_sorting_and_paging_apply() {
    let app = test_app(TestOptions::default());
    app.repo.seed("SKU-1", "Runner", 49.9, "shoes").await;
    app.repo.seed("SKU-2", "Trail Runner", 89.0, "shoes").await;
    app.repo.seed("SKU-3", "Beanie", 19.0, "hats").await;

    let search = send(&app.router, get("/products?q=runner&sort=price&order=desc")).await;
    let body = search.json();
    assert_eq!(body["total"], 2);
    assert_eq!(body["items"][0]["sku"], "SKU-2");

    let range = send(&app.router, get("/products?min_price=20&max_price=50")).await;
    assert_eq!(range.json()["total"], 1);

    let paged = send(&app.router, get("/products?page=2&page_size=2")).await;
    let body = paged.json();
    assert_eq!(body["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["total_pages"], 2);
    assert_eq!(body["page"], 2);
}

#[tokio::test]
async fn disabled_cache_bypasses_every_read() {
    let app = test_app(TestOptions {
        cache_enabled: false,
        ..TestOptions::default()
    });

    for _ in 0..2 {
        let response = send(&app.router, get("/products")).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.header("x-cache"), Some("BYPASS"));
        assert_eq!(response.json()["cached"], false);
    }
    assert_eq!(app.repo.list_calls(), 2);

    let created = send(
        &app.router,
        json_request(
            "POST",
            "/products",
            Some(API_KEY),
            json!({"sku": "SKU-1", "name": "Runner", "price": 10.0}),
        ),
    )
    .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn health_reports_database_and_cache_state() {
    let app = test_app(TestOptions::default());
    let healthy = send(&app.router, get("/health")).await;
    assert_eq!(healthy.status, StatusCode::OK);
    assert_eq!(
        healthy.json(),
        json!({"status": "ok", "database": "ok", "cache": "ok"})
    );

    app.repo.set_database_down(true);
    let degraded = send(&app.router, get("/health")).await;
    assert_eq!(degraded.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(degraded.json()["database"], "unavailable");

    let disabled = test_app(TestOptions {
        cache_enabled: false,
        ..TestOptions::default()
    });
    let response = send(&disabled.router, get("/health")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["cache"], "disabled");
}

#[tokio::test]
async fn rate_limit_rejects_excess_requests() {
    let app = test_app(TestOptions {
        max_requests: 2,
        ..TestOptions::default()
    });

    for _ in 0..2 {
        assert_eq!(
            send(&app.router, get("/products")).await.status,
            StatusCode::OK
        );
    }
    let limited = send(&app.router, get("/products")).await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.header("retry-after"), Some("60"));
    assert_eq!(limited.error_code(), "rate_limited");

    // Other routes keep their own budget.
    assert_eq!(
        send(&app.router, get("/health")).await.status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn multipart_upload_stores_image_and_invalidates() {
    let app = test_app(TestOptions::default());
    send(&app.router, get("/products")).await;

    let created = send(
        &app.router,
        multipart_request(
            &[
                ("sku", "SKU-IMG"),
                ("name", "Pictured"),
                ("price", "12.5"),
                ("stock", "4"),
                ("category", "posters"),
            ],
            Some(("Front View.png", PIXEL_PNG)),
        ),
    )
    .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let product = created.json();
    assert_eq!(product["category"]["name"], "posters");
    assert_eq!(product["stock"], 4);
    let image_url = product["image_url"].as_str().expect("image url").to_string();
    assert!(image_url.starts_with("/uploads/"));
    assert!(image_url.ends_with("front-view.png"));

    let image = send(&app.router, get(&image_url)).await;
    assert_eq!(image.status, StatusCode::OK);
    assert_eq!(image.header("content-type"), Some("image/png"));
    assert_eq!(image.body, PIXEL_PNG);

    let listing = send(&app.router, get("/products")).await;
    assert_eq!(listing.header("x-cache"), Some("MISS"));
    assert_eq!(listing.json()["total"], 1);

    let id = product["id"].as_i64().expect("id");
    send(
        &app.router,
        json_request("DELETE", &format!("/products/{id}"), Some(API_KEY), json!({})),
    )
    .await;
    assert!(stored_files(app.uploads.path()).is_empty());
}

#[tokio::test]
async fn upload_rejects_files_that_are_not_images() {
    let app = test_app(TestOptions::default());
    send(&app.router, get("/products")).await;

    let not_image = send(
        &app.router,
        multipart_request(
            &[("sku", "SKU-TXT"), ("name", "Notes"), ("price", "1")],
            Some(("notes.txt", b"plain text")),
        ),
    )
    .await;
    assert_eq!(not_image.status, StatusCode::BAD_REQUEST);
    assert_eq!(not_image.error_code(), "invalid_upload");

    let disguised = send(
        &app.router,
        multipart_request(
            &[("sku", "SKU-TXT"), ("name", "Notes"), ("price", "1")],
            Some(("notes.png", b"plain text")),
        ),
    )
    .await;
    assert_eq!(disguised.status, StatusCode::BAD_REQUEST);
    assert_eq!(disguised.error_code(), "invalid_upload");

    let missing_image = send(
        &app.router,
        multipart_request(&[("sku", "SKU-TXT"), ("name", "Notes"), ("price", "1")], None),
    )
    .await;
    assert_eq!(missing_image.error_code(), "invalid_upload");

    let bad_price = send(
        &app.router,
        multipart_request(
            &[("sku", "SKU-TXT"), ("name", "Notes"), ("price", "cheap")],
            Some(("front.png", PIXEL_PNG)),
        ),
    )
    .await;
    assert_eq!(bad_price.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad_price.error_code(), "validation_error");

    assert!(stored_files(app.uploads.path()).is_empty());
    assert_eq!(
        send(&app.router, get("/products")).await.header("x-cache"),
        Some("HIT")
    );
}

#[tokio::test]
async fn failed_record_write_removes_the_stored_image() {
    let app = test_app(TestOptions::default());
    app.repo.seed("SKU-1", "Runner", 49.9, "shoes").await;

    let duplicate = send(
        &app.router,
        multipart_request(
            &[("sku", "SKU-1"), ("name", "Runner again"), ("price", "10")],
            Some(("runner.png", PIXEL_PNG)),
        ),
    )
    .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);
    assert_eq!(duplicate.error_code(), "duplicate");
    assert!(stored_files(app.uploads.path()).is_empty());
}

#[tokio::test]
async fn missing_uploads_are_not_found() {
    let app = test_app(TestOptions::default());
    let response = send(&app.router, get("/uploads/2024/05/01/missing.png")).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}
