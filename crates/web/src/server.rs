//! HTTP server: shared state, router and listener

use axum::{routing::get, Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use testdeck_common::Database;
use testdeck_runner::{Orchestrator, PlaywrightRunner, ProcessRunner};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::ai::StepImporter;
use crate::auth::AuthService;
use crate::config::WebConfig;
use crate::routes;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub orchestrator: Orchestrator,
    pub importer: Arc<StepImporter>,
    pub auth: Arc<AuthService>,
    pub config: Arc<WebConfig>,
}

impl AppState {
    pub fn new(
        config: WebConfig,
        db: Database,
        runner: Arc<dyn PlaywrightRunner>,
        importer: StepImporter,
    ) -> Self {
        let orchestrator = Orchestrator::new(db.clone(), runner, config.runner.playwright());
        Self {
            db,
            orchestrator,
            importer: Arc::new(importer),
            auth: Arc::new(AuthService::new(&config.auth)),
            config: Arc::new(config),
        }
    }

    /// Open the database, wire the real Playwright runner and AI provider
    /// and create the bootstrap admin.
    pub fn from_config(config: WebConfig) -> anyhow::Result<Self> {
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::open(&config.database_path)?;
        info!("Database opened at {}", config.database_path.display());

        match (&config.auth.admin_email, &config.auth.admin_password) {
            (Some(email), Some(password)) => {
                let admin = db.ensure_admin(email, password)?;
                info!("Admin account: {}", admin.email);
            }
            _ if config.auth.enabled => {
                warn!("Auth is enabled but no admin_email/admin_password is configured")
            }
            _ => {}
        }

        let runner = Arc::new(ProcessRunner::new(config.runner.workdir.clone()));
        let importer = StepImporter::from_config(&config.ai);
        info!("AI provider: {}", importer.provider_kind());
        Ok(Self::new(config, db, runner, importer))
    }
}

/// Web server
pub struct WebServer {
    state: AppState,
}

impl WebServer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Create router
    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Start the web server
    pub async fn serve(self, addr: SocketAddr) -> anyhow::Result<()> {
        info!("Testdeck API starting on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Testdeck API stopped");
        Ok(())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .merge(routes::api_routes())
        .fallback(not_found_handler)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": testdeck_common::VERSION,
    }))
}

async fn not_found_handler() -> (axum::http::StatusCode, Json<serde_json::Value>) {
    (
        axum::http::StatusCode::NOT_FOUND,
        Json(json!({ "error": "not found" })),
    )
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
