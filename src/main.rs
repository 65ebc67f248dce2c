use std::{net::SocketAddr, process, sync::Arc, time::Duration};

use storefront::{
    application::{
        api_keys::StaticApiKey,
        error::AppError,
        products::ProductService,
        repos::{HealthRepo, ProductsRepo, ProductsWriteRepo},
    },
    cache::{CacheBackendKind, CacheConfig, FamilyCache, ResourceFamily, VersionStore},
    config,
    infra::{
        cache::connect_store,
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiRateLimiter, ApiState},
        telemetry,
        uploads::UploadStorage,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match cli_args.command.unwrap_or_default() {
        config::Command::Serve => run_serve(settings).await,
        config::Command::Migrate => run_migrate(settings).await,
        config::Command::Cache { command } => run_cache_command(settings, command).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;

    let cache_config = CacheConfig::from(&settings.cache);
    let store = connect_store(&cache_config).await?;
    let products_cache = FamilyCache::new(ResourceFamily::PRODUCTS, &cache_config, store);

    let upload_storage = Arc::new(
        UploadStorage::new(settings.uploads.directory.clone()).map_err(InfraError::from)?,
    );

    let reader: Arc<dyn ProductsRepo> = repositories.clone();
    let writer: Arc<dyn ProductsWriteRepo> = repositories.clone();
    let health: Arc<dyn HealthRepo> = repositories;

    let products = Arc::new(ProductService::new(
        reader,
        writer,
        products_cache,
        upload_storage.clone(),
    ));

    let rate_limiter = Arc::new(ApiRateLimiter::new(
        Duration::from_secs(u64::from(settings.rate_limit.window_seconds.get())),
        settings.rate_limit.max_requests.get(),
    ));

    let upload_limit_bytes = usize::try_from(settings.uploads.max_request_bytes.get())
        .map_err(|_| {
            AppError::from(InfraError::configuration(
                "uploads.max_request_bytes exceeds the platform limit",
            ))
        })?;

    let state = ApiState {
        products,
        health,
        api_key: Arc::new(StaticApiKey::new(&settings.auth.api_key)),
        upload_storage,
        rate_limiter,
        upload_limit_bytes,
    };

    serve_http(&settings, state).await
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    init_repositories(&settings).await?;
    info!(
        target = "storefront::migrations",
        "database migrations applied"
    );
    Ok(())
}

async fn run_cache_command(
    settings: config::Settings,
    command: config::CacheCommand,
) -> Result<(), AppError> {
    if settings.cache.backend != CacheBackendKind::Redis {
        return Err(AppError::validation(
            "cache commands operate on the shared redis store; set cache.backend = \"redis\"",
        ));
    }

    let cache_config = CacheConfig {
        enabled: true,
        ..CacheConfig::from(&settings.cache)
    };
    let store = connect_store(&cache_config)
        .await?
        .ok_or_else(|| AppError::unexpected("cache store is not available"))?;
    let versions = VersionStore::new(store);
    let family = ResourceFamily::PRODUCTS;

    match command {
        config::CacheCommand::Version => {
            let version = versions.get_version(family).await?;
            println!("{family} version {version}");
        }
        config::CacheCommand::Bump => {
            let version = versions.bump_version(family).await?;
            info!(
                target = "storefront::cache",
                family = %family,
                version,
                "cache version bumped manually"
            );
            println!("{family} version bumped to {version}");
        }
    }

    Ok(())
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .require_url()
        .map_err(|err| InfraError::configuration(err.to_string()))?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

async fn serve_http(settings: &config::Settings, state: ApiState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "storefront::http",
        addr = %settings.server.addr,
        "storefront listening"
    );

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    info!(target = "storefront::http", "storefront stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(
            target = "storefront::http",
            error = %err,
            "failed to listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
}
