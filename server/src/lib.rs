//! HTTP process for the affiliate ledger: read-only list endpoints under
//! `/api` plus the built frontend served from `STATIC_DIR`.
//!
//! Every `/api` response uses the same envelope:
//! - `{ "success": true, "data": ... }` on success
//! - `{ "success": false, "error": "..." }` with HTTP 500 on failure
use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    routing::get,
    Router,
};
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
};

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use config::Config;
use routes::{
    customers_handler, health_handler, pin_requests_handler, promoters_handler, users_handler,
};
use state::AppState;

pub fn build_router(state: Arc<AppState>) -> Result<Router> {
    let origin: HeaderValue = state
        .config
        .cors_origin
        .parse()
        .with_context(|| format!("invalid CORS_ORIGIN '{}'", state.config.cors_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let static_dir = &state.config.static_dir;
    let frontend =
        ServeDir::new(static_dir).fallback(ServeFile::new(format!("{static_dir}/index.html")));

    let api = Router::new()
        .route("/health", get(health_handler))
        .route("/users", get(users_handler))
        .route("/promoters", get(promoters_handler))
        .route("/customers", get(customers_handler))
        .route("/pin-requests", get(pin_requests_handler));

    Ok(Router::new()
        .nest("/api", api)
        .fallback_service(frontend)
        .layer(cors)
        .with_state(state))
}

pub async fn start_server(config: Config) -> Result<()> {
    log::info!(
        "Opening ledger at {} ({})",
        config.database_path,
        config.environment
    );
    let address = format!("0.0.0.0:{}", config.port);
    let state = AppState::new(config)?;
    let app = build_router(state)?;

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    log::info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
        log::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                log::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
