use crate::{
    config::Config,
    guard::PathGuard,
    headers,
    routes::{account, files, orders},
    security::{self, RateLimiters},
    session::SessionStore,
    store::RecordStore,
};
use anyhow::Context;
use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub guard: Arc<PathGuard>,
    pub store: Arc<dyn RecordStore>,
    pub sessions: Arc<SessionStore>,
    pub rls: RateLimiters,
}

impl AppState {
    pub fn new(cfg: Config, guard: PathGuard, store: impl RecordStore + 'static) -> Self {
        Self {
            rls: RateLimiters::new(&cfg.limits),
            sessions: Arc::new(SessionStore::new(cfg.session.ttl_secs)),
            guard: Arc::new(guard),
            store: Arc::new(store),
            cfg: Arc::new(cfg),
        }
    }
}

pub async fn serve(state: AppState) -> anyhow::Result<()> {
    if let Some(every) = state.cfg.session.sweep_interval_secs {
        spawn_sweeper(state.sessions.clone(), state.rls.clone(), every);
    }
    let bind = (state.cfg.server.bind_addr.clone(), state.cfg.server.port);
    let app = build_router(state)?;

    let listener = tokio::net::TcpListener::bind((bind.0.as_str(), bind.1))
        .await
        .with_context(|| format!("binding {}:{}", bind.0, bind.1))?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Periodically evict expired sessions and idle rate-limit keys.
pub fn spawn_sweeper(sessions: Arc<SessionStore>, rls: RateLimiters, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sweep(&sessions, &rls);
        }
    })
}

pub(crate) fn sweep(sessions: &SessionStore, rls: &RateLimiters) {
    let purged = sessions.purge_expired();
    let tracked = rls.prune();
    tracing::debug!(purged = purged, sessions = sessions.len(), limiter_keys = tracked, "sweep");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let policy = headers::build_policy(&state.cfg.headers).context("building header policy")?;
    let limit_bytes = state.cfg.limits.max_request_kb * 1024;
    Ok(Router::new()
        .route("/healthz", get(health))
        .route("/", get(orders::index))
        .route("/orders/:id", get(orders::get_order))
        .route("/read", post(files::read_file))
        .route("/files/*path", get(files::serve_file))
        .route("/csp-report", post(files::csp_report))
        .route("/api/login", post(account::login))
        .route("/api/me", get(account::me))
        .route("/api/logout", post(account::logout))
        .layer(RequestBodyLimitLayer::new(limit_bytes))
        .layer(middleware::from_fn(security::fetch_metadata))
        .layer(middleware::from_fn_with_state(policy, headers::apply))
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}
