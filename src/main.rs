use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{http::HeaderValue, routing::get, Router};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

use wfzo_blob_api::config::{self, AppConfig};
use wfzo_blob_api::handlers;
use wfzo_blob_api::is_production;
use wfzo_blob_api::signing::UrlSigner;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up SIGNING_SECRET, API_PORT, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::config();
    tracing::info!("Starting WFZO blob API in {:?} mode", config.environment);

    let signer = UrlSigner::from_config(&config.signing).context("signing is misconfigured")?;
    if is_production!() && config.signing.base_url.starts_with("http://") {
        tracing::warn!("Issuing plain-http blob links in production: {}", config.signing.base_url);
    }

    let app = app(config, Arc::new(signer));

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("WFZO blob API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.context("server")?;
    Ok(())
}

fn app(config: &AppConfig, signer: Arc<UrlSigner>) -> Router {
    let mut app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(handlers::blob_routes(signer))
        .layer(TimeoutLayer::new(Duration::from_secs(config.api.request_timeout_secs)))
        .layer(cors(config));

    if config.api.enable_request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }
    app
}

fn cors(config: &AppConfig) -> CorsLayer {
    if !config.security.enable_cors {
        return CorsLayer::new();
    }
    if config.security.cors_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::new().allow_origin(Any).allow_methods(Any);
    }

    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();
    CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any)
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "success": true,
        "data": {
            "name": "WFZO Blob API",
            "version": version,
            "description": "Issues and checks signed, short-lived blob links",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "issue": "/api/blobs/url/*path[?ttl=seconds]",
                "verify": "/blobs/*path?se=&sig=",
            }
        }
    }))
}

async fn health() -> axum::response::Json<Value> {
    let config = config::config();

    axum::response::Json(json!({
        "success": true,
        "data": {
            "status": "ok",
            "timestamp": chrono::Utc::now(),
            "environment": format!("{:?}", config.environment),
            "linkTtlSecs": config.signing.ttl_secs
        }
    }))
}
