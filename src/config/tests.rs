use super::*;

#[test]
fn defaults_match_documented_values() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.to_string(), "0.0.0.0:3000");
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert_eq!(settings.database.max_connections.get(), 8);
    assert!(settings.database.url.is_none());
    assert!(settings.cache.enabled);
    assert_eq!(settings.cache.ttl_seconds.get(), 60);
    assert_eq!(settings.cache.backend, CacheBackendKind::Redis);
    assert_eq!(settings.auth.api_key, "dev-admin-key");
    assert_eq!(
        settings.uploads.max_request_bytes.get(),
        DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES
    );
    assert_eq!(settings.rate_limit.window_seconds.get(), 60);
    assert_eq!(settings.rate_limit.max_requests.get(), 500);
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());
    raw.cache.ttl_seconds = Some(30);

    let overrides = SettingsOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        cache_ttl_seconds: Some(5),
        cache_enabled: Some(false),
        ..Default::default()
    };

    raw.apply_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.cache.ttl_seconds.get(), 5);
    assert!(!settings.cache.enabled);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = SettingsOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn zero_ttl_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.ttl_seconds = Some(0);

    let err = Settings::from_raw(raw).unwrap_err();
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.ttl_seconds",
            ..
        }
    ));
}

#[test]
fn unknown_cache_backend_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.backend = Some("memcached".to_string());

    let err = Settings::from_raw(raw).unwrap_err();
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.backend",
            ..
        }
    ));
}

#[test]
fn memory_backend_needs_no_redis_url() {
    let mut raw = RawSettings::default();
    raw.cache.backend = Some("memory".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.cache.backend, CacheBackendKind::Memory);
    assert!(settings.cache.redis_url.is_none());
}

#[test]
fn blank_api_key_is_rejected() {
    let mut raw = RawSettings::default();
    raw.auth.api_key = Some("   ".to_string());

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn database_url_is_required_on_demand() {
    let mut raw = RawSettings::default();
    raw.database.url = Some("  ".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.database.require_url().is_err());

    let mut raw = RawSettings::default();
    raw.database.url = Some("postgres://localhost/storefront".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(
        settings.database.require_url().unwrap(),
        "postgres://localhost/storefront"
    );
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["storefront"]);
    assert_eq!(args.command.unwrap_or_default(), Command::Serve);
}

#[test]
fn parse_cache_subcommands() {
    let args = CliArgs::parse_from(["storefront", "cache", "bump"]);
    assert_eq!(
        args.command,
        Some(Command::Cache {
            command: CacheCommand::Bump
        })
    );

    let args = CliArgs::parse_from([
        "storefront",
        "--redis-url",
        "redis://cache:6379",
        "cache",
        "version",
    ]);
    assert_eq!(
        args.overrides.redis_url.as_deref(),
        Some("redis://cache:6379")
    );
    assert_eq!(
        args.command,
        Some(Command::Cache {
            command: CacheCommand::Version
        })
    );
}

#[test]
fn boolish_cache_flag_accepts_numeric_values() {
    let args = CliArgs::parse_from(["storefront", "--cache-enabled", "0", "serve"]);
    assert_eq!(args.overrides.cache_enabled, Some(false));
}
