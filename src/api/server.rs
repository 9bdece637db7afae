//! Migration API server
//!
//! HTTP server using Axum. Accepts an old workbook upload, migrates it into the
//! configured template and streams the result back; exposes per-request progress.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use chrono::{Duration, Utc};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use super::handlers;
use crate::error::MigrateResult;
use crate::migrate::{MigrationPlan, Migrator, TEMPLATE_LABEL};
use crate::progress::{ProgressStore, DEFAULT_CAPACITY, DEFAULT_TTL_SECS};
use crate::xlsx::read_workbook;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// API Server configuration
#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// The macro-enabled workbook every upload is migrated into
    pub template_path: PathBuf,
    /// YAML migration plan; the built-in plan when absent
    pub plan_path: Option<PathBuf>,
    pub max_upload_bytes: usize,
    pub progress_capacity: usize,
    pub progress_ttl_secs: i64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            template_path: PathBuf::from("template.xlsm"),
            plan_path: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            progress_capacity: DEFAULT_CAPACITY,
            progress_ttl_secs: DEFAULT_TTL_SECS,
        }
    }
}

/// Shared application state
pub struct AppState {
    pub version: String,
    pub template: Vec<u8>,
    /// Whether the template carries a VBA project; decides the download type
    pub macro_enabled: bool,
    pub migrator: Migrator,
    pub progress: Arc<ProgressStore>,
}

impl AppState {
    /// State around an in-memory template. The template is parsed once here so a
    /// broken one is reported at startup rather than on the first upload.
    pub fn new(template: Vec<u8>, plan: MigrationPlan, progress: ProgressStore) -> MigrateResult<Self> {
        plan.validate()?;
        let macro_enabled = read_workbook(&template, TEMPLATE_LABEL)?.has_vba_project();
        Ok(Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            template,
            macro_enabled,
            migrator: Migrator::new(plan),
            progress: Arc::new(progress),
        })
    }

    pub fn from_config(config: &ApiConfig) -> MigrateResult<Self> {
        let template = std::fs::read(&config.template_path)?;
        let plan = match &config.plan_path {
            Some(path) => MigrationPlan::from_file(path)?,
            None => MigrationPlan::default(),
        };
        let progress = ProgressStore::new(
            config.progress_capacity,
            Duration::seconds(config.progress_ttl_secs),
        );
        Self::new(template, plan, progress)
    }
}

/// Build the router with every endpoint and layer
pub fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/version", get(handlers::version))
        .route("/upload", post(handlers::upload))
        .route("/progress/:id", get(handlers::progress))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Run the API server
pub async fn run_api_server(config: ApiConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sheet_migrate=info,tower_http=info".into()),
        )
        .init();

    let state = Arc::new(AppState::from_config(&config).with_context(|| {
        format!("loading template {}", config.template_path.display())
    })?);
    info!(
        template = %config.template_path.display(),
        macro_enabled = state.macro_enabled,
        "Template loaded"
    );
    if !state.macro_enabled {
        warn!("Template has no VBA project; downloads will be plain .xlsx");
    }

    tokio::spawn(evict_expired(Arc::clone(&state.progress)));

    let app = router(state, config.max_upload_bytes);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Sheet migration server starting on http://{}", addr);
    info!("   Endpoints: POST /upload, GET /progress/:id");
    info!("   Health: /health, Version: /version");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Sheet migration server shutdown complete");
    Ok(())
}

/// Periodically drop finished progress entries past their TTL
async fn evict_expired(store: Arc<ProgressStore>) {
    let mut ticker = tokio::time::interval(StdDuration::from_secs(60));
    loop {
        ticker.tick().await;
        let evicted = store.evict_expired_at(Utc::now());
        if evicted > 0 {
            debug!(evicted, "Expired progress entries dropped");
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
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

    info!("Shutdown signal received, stopping server...");
}
