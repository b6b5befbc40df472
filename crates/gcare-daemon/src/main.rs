//! gcare-daemon entry point.
//!
//! This file is intentionally thin: it sets up tracing, loads configuration
//! and secrets, picks the store, wires middleware, and starts the HTTP
//! server. All route handlers live in `routes.rs`; shared state in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use gcare_config::secrets::resolve_gateway_secrets;
use gcare_config::{load_layered_yaml, ServerSettings};
use gcare_daemon::{routes, state};
use gcare_db::{PgStore, Store, ENV_DB_URL};
use gcare_payment::VnpayGateway;
use gcare_testkit::MemoryStore;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

/// Comma-separated config layers, base first.
const ENV_CONFIG_PATHS: &str = "GENCARE_CONFIG";
const DEFAULT_CONFIG_PATHS: &str = "config/base.yaml";
const ENV_DAEMON_ADDR: &str = "GENCARE_DAEMON_ADDR";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let paths_raw =
        std::env::var(ENV_CONFIG_PATHS).unwrap_or_else(|_| DEFAULT_CONFIG_PATHS.to_string());
    let paths: Vec<&str> = paths_raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    let loaded = load_layered_yaml(&paths)?;
    let settings = loaded.settings()?;
    info!(config_hash = %loaded.config_hash, layers = ?paths, "config loaded");

    let secrets = resolve_gateway_secrets(&loaded.config_json)?;
    let gateway = VnpayGateway::new(settings.gateway.clone(), secrets)
        .context("gateway configuration rejected")?;

    let store = open_store().await?;

    let shared = Arc::new(state::AppState::new(
        store,
        gateway,
        settings.server.frontend_url.clone(),
    ));

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_from_settings(&settings.server));

    let addr = bind_addr(&settings.server)?;
    info!("gcare-daemon listening on http://{}", addr);

    axum::serve(
        tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("bind {addr}"))?,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// Postgres when `GENCARE_DATABASE_URL` is set, otherwise a process-local
/// store for development.
async fn open_store() -> anyhow::Result<Arc<dyn Store>> {
    if std::env::var(ENV_DB_URL).is_err() {
        warn!("{ENV_DB_URL} not set; using in-memory store (data is lost on exit)");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let pool = gcare_db::connect_from_env().await?;
    gcare_db::migrate(&pool).await?;
    info!("postgres store ready");
    Ok(Arc::new(PgStore::new(pool)))
}

/// `GENCARE_DAEMON_ADDR` overrides `/server/bind_addr`.
fn bind_addr(server: &ServerSettings) -> anyhow::Result<SocketAddr> {
    let raw = std::env::var(ENV_DAEMON_ADDR).unwrap_or_else(|_| server.bind_addr.clone());
    raw.parse()
        .with_context(|| format!("CONFIG_INVALID: bind address {raw:?} is not host:port"))
}

/// CORS: the configured frontend origins only.
fn cors_from_settings(server: &ServerSettings) -> CorsLayer {
    let mut origins: Vec<HeaderValue> = server
        .cors_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    if origins.is_empty() {
        if let Ok(v) = HeaderValue::from_str(server.frontend_url.trim_end_matches('/')) {
            origins.push(v);
        }
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}
