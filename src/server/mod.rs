//! HTTP server.
//!
//! Exposes the application operations as a JSON API. Successful responses
//! are wrapped as `{"success": true, "data": ...}`, failures as
//! `{"success": false, "error": "..."}`. Callers are identified by the
//! `x-user-id` header set by the authenticating proxy in front of us.

mod error;
mod extract;
mod handlers;

pub use error::ApiError;
pub use extract::{CurrentUser, JsonBody, USER_HEADER};
pub use handlers::Envelope;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::extract::{DefaultBodyLimit, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, patch, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::Instrument;

use crate::app::App;

/// Build the API router over a shared app.
pub fn router(app: Arc<App>) -> Router {
    let body_limit = app.config.server.max_body_bytes;

    Router::new()
        .route("/health", get(handlers::health))
        .route("/tasks", get(handlers::list_my_tasks))
        .route("/tasks/:id", get(handlers::get_task).patch(handlers::update_task))
        .route("/tasks/:id/evidence", post(handlers::submit_evidence))
        .route("/tasks/:id/breakdown", post(handlers::breakdown_task))
        .route("/ai/analyze-quality", post(handlers::analyze_quality))
        .route("/ai/workload-risk", get(handlers::workload_risk))
        .route("/audit", get(handlers::audit_queue))
        .route("/audit/scan", post(handlers::audit_scan))
        .route("/projects", get(handlers::list_projects).post(handlers::create_project))
        .route(
            "/projects/:id",
            get(handlers::get_project)
                .patch(handlers::update_project)
                .delete(handlers::delete_project),
        )
        .route("/projects/:id/tasks", post(handlers::add_task))
        .route("/users", get(handlers::list_users).post(handlers::signup))
        .route("/users/:id", patch(handlers::update_user))
        .route("/dashboard/employee/stats", get(handlers::employee_stats))
        .route("/dashboard/employee/chart", get(handlers::employee_chart))
        .route("/dashboard/employee/performance", get(handlers::employee_performance))
        .route("/dashboard/pm/stats", get(handlers::pm_stats))
        .route("/dashboard/hr/stats", get(handlers::hr_stats))
        .route("/uploads", post(handlers::upload))
        .layer(middleware::from_fn(log_requests))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(app)
}

/// Bind the configured address and serve until Ctrl+C or SIGTERM.
pub async fn serve(app: Arc<App>) -> anyhow::Result<()> {
    let addr = app.config.socket_addr().context("Invalid server address")?;
    let listener =
        TcpListener::bind(addr).await.with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(addr = %addr, "Listening");

    axum::serve(listener, router(app))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let span = tracing::info_span!("request", method = %method, path = %path);
    let started = Instant::now();

    let response = next.run(request).instrument(span).await;

    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    if status.is_server_error() {
        tracing::warn!(%method, %path, status = status.as_u16(), elapsed_ms, "Request failed");
    } else {
        tracing::info!(%method, %path, status = status.as_u16(), elapsed_ms, "Request handled");
    }
    response
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    tracing::info!("Shutdown signal received");
}
