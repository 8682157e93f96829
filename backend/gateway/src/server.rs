//! Router assembly and the HTTP listener.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::info;

use aquadash_channels::{Notifier, WeworkClient};
use aquadash_config::AquadashConfig;
use aquadash_core::LlmProvider;
use aquadash_store::{MemoryStore, ProjectStore, RiskStore, UserStore};

use crate::{auth, dashboard, health, insight, messages, risks};

/// Application state shared across routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AquadashConfig>,
    pub provider: Arc<dyn LlmProvider>,
    pub users: Arc<dyn UserStore>,
    pub projects: Arc<dyn ProjectStore>,
    pub risks: Arc<dyn RiskStore>,
    /// Present when WeWork credentials are configured.
    pub wework: Option<Arc<WeworkClient>>,
    pub notifier: Option<Arc<dyn Notifier>>,
    pub started_at: Instant,
}

impl AppState {
    /// State backed by one in-memory store and no WeWork integration.
    pub fn new(config: AquadashConfig, provider: Arc<dyn LlmProvider>, store: MemoryStore) -> Self {
        let store = Arc::new(store);
        Self {
            config: Arc::new(config),
            provider,
            users: store.clone(),
            projects: store.clone(),
            risks: store,
            wework: None,
            notifier: None,
            started_at: Instant::now(),
        }
    }

    /// Use `client` for login and as the notification channel.
    pub fn with_wework(mut self, client: WeworkClient) -> Self {
        let client = Arc::new(client);
        self.notifier = Some(client.clone());
        self.wework = Some(client);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Externally reachable base URL, without a trailing slash.
    pub fn public_base(&self) -> String {
        self.config
            .server
            .public_url
            .as_deref()
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("http://localhost:{}", self.config.server.port))
    }
}

pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/api/health", get(health::get_health))
        .route(&state.config.server.insight_path, post(insight::ai_insight))
        .route("/api/dashboard/summary", get(dashboard::get_summary))
        .route("/api/risks", get(risks::list_risks))
        .route("/api/messages", get(messages::list_messages))
        .route("/api/messages/send", post(messages::send_message))
        .route("/api/auth/wework", get(auth::wework_callback))
        .route("/api/auth/user", get(auth::current_user))
        .route("/api/auth/login", get(auth::login_redirect));

    if let Some(dir) = &state.config.server.static_dir {
        info!(dir = %dir, "Serving dashboard bundle");
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(middleware::from_fn_with_state(state.clone(), auth::page_guard))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(state: AppState) -> Result<()> {
    let addr = state.config.server.addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(
        addr = %addr,
        insight_path = %state.config.server.insight_path,
        provider = state.provider.name(),
        "aquadash gateway listening"
    );
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;
    info!("aquadash gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
