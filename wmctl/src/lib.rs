//! # wmctl: Worker Model Control Plane
//!
//! `wmctl` manages the catalog of worker models: reusable templates (container image or VM
//! pattern, advertised capabilities, provisioning count, restriction flag) from which a build
//! scheduler spawns ephemeral execution agents. Tenants are organized into groups that share
//! the catalog.
//!
//! ## Overview
//!
//! The interesting part is not the CRUD but the rules around it. What a caller may see depends
//! on their platform role and their group memberships; what they may set when creating or
//! updating a model depends on the same. Admins can do anything. Everyone else has their
//! definitions sanitized: non-restricted models cannot pre-provision instances and must point at
//! a shared pattern, and a model's type and type-specific configuration can only be changed by
//! an admin.
//!
//! ## Architecture
//!
//! The HTTP layer is [Axum](https://github.com/tokio-rs/axum). Storage is PostgreSQL through
//! sqlx, or a process-local in-memory store for development and tests.
//!
//! ### Request Flow
//!
//! A request to `/api/v1/*` is first authenticated by the
//! [`CurrentUser`](api::models::users::CurrentUser) extractor, which verifies the session JWT
//! and loads the caller's group memberships. Mutations then pass through [`policy::engine`]
//! (structure validation, role rules, type validation) before a single store transaction is
//! opened and committed. After the commit every cached listing is evicted and the model is read
//! back from the store, so the response reflects exactly what was persisted, including the
//! caller-specific `editable` flag. Reads resolve the caller's visible groups via
//! [`policy::visibility`] and push them into the store query.
//!
//! ### Core Components
//!
//! - [`policy`]: validation, role rules, visibility and the `editable` flag; pure functions
//! - [`db`]: repositories over PostgreSQL and the [`db::store`] traits handlers depend on
//! - [`cache`]: list caching and the invalidation contract
//! - [`api`]: route handlers and wire models
//! - [`auth`]: the caller extractor and JWT session tokens
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use wmctl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = wmctl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     wmctl::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod errors;
mod openapi;
pub mod policy;
pub mod telemetry;
mod types;

#[cfg(test)]
pub mod test_utils;

use crate::{
    cache::{CacheInvalidationCoordinator, MokaCache},
    config::{CorsOrigin, DatabaseConfig},
    db::store::{GroupDirectory, InMemoryStore, PgStore, Store},
    openapi::ApiDoc,
};
use api::handlers::worker_models;
use axum::{Json, Router, http, http::HeaderValue, routing::get};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument, warn};
use utoipa::OpenApi;

pub use types::{GroupId, PipelineId, ProjectId, UserId, WorkerModelId};

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .store(store.clone())
///     .cache(CacheInvalidationCoordinator::new(Arc::new(MokaCache::new(1000, ttl)), store))
///     .shared_infra_group(group.id)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub cache: CacheInvalidationCoordinator,
    /// Group whose worker models every caller can see
    pub shared_infra_group: GroupId,
}

/// Get the wmctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Open the configured store. Returns the pool too when it is PostgreSQL-backed, so it can be
/// closed on shutdown.
#[instrument(skip_all)]
async fn setup_store(config: &Config) -> anyhow::Result<(Arc<dyn Store>, Option<PgPool>)> {
    match &config.database {
        DatabaseConfig::External { url, pool } => {
            info!("Using external database");
            let mut options = PgPoolOptions::new()
                .max_connections(pool.max_connections)
                .min_connections(pool.min_connections)
                .acquire_timeout(Duration::from_secs(pool.acquire_timeout_secs));
            if pool.idle_timeout_secs > 0 {
                options = options.idle_timeout(Duration::from_secs(pool.idle_timeout_secs));
            }
            if pool.max_lifetime_secs > 0 {
                options = options.max_lifetime(Duration::from_secs(pool.max_lifetime_secs));
            }

            let pg = options.connect(url).await?;
            migrator().run(&pg).await?;
            Ok((Arc::new(PgStore::new(pg.clone())), Some(pg)))
        }
        DatabaseConfig::InMemory => {
            warn!("Using in-memory store: all data will be lost on shutdown");
            Ok((Arc::new(InMemoryStore::new()), None))
        }
    }
}

/// Assemble application state over `store`, creating the shared infrastructure group if needed.
#[instrument(skip_all, fields(shared_infra_group = %config.shared_infra_group))]
pub async fn build_state(config: Config, store: Arc<dyn Store>) -> anyhow::Result<AppState> {
    let shared = store.ensure_group(&config.shared_infra_group).await?;
    debug!(group_id = %shared.id, "Shared infrastructure group ready");

    let cache = Arc::new(MokaCache::new(config.cache.max_capacity, config.cache.time_to_live));
    let coordinator = CacheInvalidationCoordinator::new(cache, store.clone());

    Ok(AppState::builder()
        .config(config)
        .store(store)
        .cache(coordinator)
        .shared_infra_group(shared.id)
        .build())
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.auth.security.cors;

    let mut origins = Vec::new();
    for origin in &cors_config.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            CorsOrigin::Url(url) => url.as_str().trim_end_matches('/').parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut exposed = vec![http::header::LOCATION];
    for name in &cors_config.exposed_headers {
        let header = name.parse::<http::HeaderName>()?;
        if !exposed.contains(&header) {
            exposed.push(header);
        }
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::PUT,
            http::Method::DELETE,
        ])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE])
        .allow_credentials(cors_config.allow_credentials)
        .expose_headers(exposed);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router: the `/api/v1` routes and OpenAPI document, CORS, optional
/// Prometheus metrics at `/internal/metrics`, and request tracing.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let api_routes = Router::new()
        .route(
            "/worker-models",
            get(worker_models::list_worker_models).post(worker_models::create_worker_model),
        )
        .route("/worker-models/types", get(worker_models::list_worker_model_types))
        .route(
            "/worker-models/communications",
            get(worker_models::list_worker_model_communications),
        )
        .route(
            "/worker-models/{group_name}/{model_name}",
            get(worker_models::get_worker_model)
                .put(worker_models::update_worker_model)
                .delete(worker_models::delete_worker_model),
        )
        .route(
            "/worker-models/{group_name}/{model_name}/usage",
            get(worker_models::list_worker_model_usage),
        )
        .route(
            "/projects/{project_key}/worker-models",
            get(worker_models::list_project_worker_models),
        )
        .route("/groups/{group_id}/worker-models", get(worker_models::list_group_worker_models))
        .route("/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .with_state(state.clone());

    let mut router = Router::new()
        .nest("/api/v1", api_routes)
        .layer(create_cors_layer(&state.config)?);

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// The HTTP server and the resources it owns.
///
/// 1. **Create**: [`Application::new`] opens the store, runs migrations and builds the router
/// 2. **Serve**: [`Application::serve`] binds the configured address and handles requests
/// 3. **Shutdown**: when the shutdown future resolves, in-flight requests drain and the pool closes
pub struct Application {
    router: Router,
    config: Config,
    pool: Option<PgPool>,
}

impl Application {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting worker model control plane with configuration: {:#?}", config);

        let (store, pool) = setup_store(&config).await?;
        let state = build_state(config, store).await?;

        let mut app = Self::from_state(state)?;
        app.pool = pool;
        Ok(app)
    }

    /// Build an application around existing state
    pub fn from_state(state: AppState) -> anyhow::Result<Self> {
        let router = build_router(&state)?;
        Ok(Self {
            router,
            config: state.config,
            pool: None,
        })
    }

    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Worker model control plane listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        if let Some(pool) = self.pool {
            info!("Closing database connections...");
            pool.close().await;
        }

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
