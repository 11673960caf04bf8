//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: storage, materializer, runner, and packager wiring
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: query flags and response bodies
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, extract::DefaultBodyLimit, routing::get};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::Config;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Must be called from within a tokio runtime; build jobs are spawned onto it.
pub async fn build_app(config: Config) -> anyhow::Result<Router> {
    config.validate()?;
    let services = Arc::new(services::AppServices::from_config(&config)?);

    Ok(Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(Extension(services))
                .layer(DefaultBodyLimit::max(config.max_upload_bytes)),
        ))
}
