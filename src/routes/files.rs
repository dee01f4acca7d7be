use crate::{
    errors::{AppError, AppResult},
    guard::{PathGuard, TraversalError},
    logging::Audit,
    routes::respond,
    server::AppState,
};
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Request, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tower::ServiceExt;
use tower_http::services::ServeFile;

#[derive(Debug, Deserialize)]
pub struct ReadRequest {
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReadResponse {
    pub path: String,
    pub content: String,
}

/// Guard plus real-path check, on the blocking pool since it stats the disk.
async fn resolve(guard: Arc<PathGuard>, input: String) -> AppResult<PathBuf> {
    let resolved = tokio::task::spawn_blocking(move || guard.resolve(&input))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    resolved.map_err(|e| {
        tracing::debug!(kind = e.code(), "path rejected");
        AppError::from(e)
    })
}

async fn regular_file(path: &Path) -> AppResult<()> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(()),
        _ => Err(AppError::NotFound),
    }
}

fn display_relative(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// A body that is not a JSON object with a string `filename` counts as a
/// missing filename; the extractor's own rejection text is never sent.
pub async fn read_file(
    State(state): State<AppState>,
    body: Result<Json<ReadRequest>, JsonRejection>,
) -> Response {
    let audit = Audit::begin("read");
    let result = async move {
        let Json(req) = body.map_err(|rejection| {
            tracing::debug!(status = %rejection.status(), "read body rejected");
            AppError::Path(TraversalError::MissingInput)
        })?;
        let resolved = resolve(state.guard.clone(), req.filename.unwrap_or_default()).await?;
        regular_file(&resolved).await?;
        let content = tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| AppError::Internal(format!("failed to read file: {}", e.kind())))?;
        Ok::<_, AppError>(Json(ReadResponse {
            path: display_relative(state.guard.relative(&resolved)),
            content,
        }))
    }
    .await;
    respond(audit, result)
}

/// `GET /files/*path`. The raw, still-encoded URI path goes to the guard so
/// the reference is decoded exactly once.
pub async fn serve_file(State(state): State<AppState>, request: Request) -> Response {
    let audit = Audit::begin("files");
    let raw = request
        .uri()
        .path()
        .strip_prefix("/files/")
        .unwrap_or_default()
        .to_owned();
    let resolved = async {
        let resolved = resolve(state.guard.clone(), raw).await?;
        regular_file(&resolved).await?;
        Ok::<_, AppError>(resolved)
    }
    .await;
    let resolved = match resolved {
        Ok(resolved) => resolved,
        Err(e) => return respond::<()>(audit, Err(e)),
    };
    audit.allow();
    let mut response = match ServeFile::new(&resolved).oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    };
    response.headers_mut().remove(header::LAST_MODIFIED);
    response.headers_mut().remove(header::ETAG);
    response
}

pub async fn csp_report(body: Bytes) -> StatusCode {
    match serde_json::from_slice::<serde_json::Value>(&body) {
        Ok(report) => tracing::warn!(report = %report, "csp violation"),
        Err(_) => tracing::warn!(bytes = body.len(), "malformed csp report"),
    }
    StatusCode::NO_CONTENT
}
