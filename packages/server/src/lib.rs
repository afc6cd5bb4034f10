#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for Data Coyote.
//!
//! Exposes a liveness root, a health check, and `GET /crime`, a read-through
//! proxy over an upstream open-data crime dataset with a short result cache.

pub mod cache;
mod handlers;
pub mod proxy;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use data_coyote_config::{ConfigError, env_or};

use crate::cache::ResultCache;
use crate::proxy::{FieldNames, IncidentUpstream, ProxyConfig, SocrataUpstream};

/// Port used when `PORT` is unset or invalid.
pub const DEFAULT_PORT: u16 = 8000;

/// Errors that prevent the server from starting.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Required proxy configuration is missing.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The upstream HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    /// Binding or serving failed.
    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared application state.
pub struct AppState {
    /// Where incidents come from.
    pub upstream: Arc<dyn IncidentUpstream>,
    /// Upstream field names used for reshaping.
    pub fields: FieldNames,
    /// Recent results keyed by query.
    pub cache: ResultCache,
}

impl AppState {
    /// Creates state with an empty cache.
    #[must_use]
    pub fn new(upstream: Arc<dyn IncidentUpstream>, fields: FieldNames) -> Self {
        Self {
            upstream,
            fields,
            cache: ResultCache::default(),
        }
    }
}

/// Registers the API routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(handlers::root))
        .route("/health", web::get().to(handlers::health))
        .route("/crime", web::get().to(handlers::crime));
}

/// Starts the API server.
///
/// Reads proxy settings from the environment and serves until shut down.
/// The caller provides the async runtime (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns [`ServerError::Config`] if `CRIME_API_DOMAIN` or
/// `CRIME_API_DATASET` is unset, or [`ServerError::Io`] if the server fails
/// to bind.
pub async fn run_server() -> Result<(), ServerError> {
    let config = ProxyConfig::from_env()?;
    log::info!("Proxying crime data from {}", config.resource_url());

    let fields = config.fields.clone();
    let upstream = SocrataUpstream::new(config)?;
    let state = web::Data::new(AppState::new(Arc::new(upstream), fields));

    let bind_addr = env_or("BIND_ADDR", "127.0.0.1");
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await?;

    Ok(())
}
