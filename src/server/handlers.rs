//! Control-plane endpoint handlers

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::config::{FilterSet, FilterStore};
use crate::crawler::quota::QuotaMonitor;
use crate::crawler::{build_http_client, Driver};
use crate::output::{OutputKind, ResultSink};
use crate::ConfigError;

use super::AppState;

fn error_body(status: StatusCode, detail: impl Into<String>) -> Response {
    (status, Json(json!({ "detail": detail.into() }))).into_response()
}

/// PUT /api/filters - validate and replace the persisted filter configuration
///
/// Unknown fields and malformed values are rejected by the JSON extractor;
/// range violations by the validation layer. Nothing is written on rejection.
pub async fn update_filters(
    State(state): State<AppState>,
    payload: Result<Json<FilterSet>, JsonRejection>,
) -> Response {
    let Json(filters) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            return error_body(StatusCode::UNPROCESSABLE_ENTITY, rejection.body_text());
        }
    };

    let store = FilterStore::new(&state.config.filters_path);
    match store.save(&filters) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(ConfigError::Validation(message)) => {
            error_body(StatusCode::UNPROCESSABLE_ENTITY, message)
        }
        Err(e) => {
            tracing::error!("Failed to save filters: {}", e);
            error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to save filters: {}", e),
            )
        }
    }
}

/// POST /api/start - begin a crawl run if none is active
pub async fn start_run(State(state): State<AppState>) -> Response {
    if !state.run_state.try_begin_run() {
        return error_body(StatusCode::CONFLICT, "a run is already active");
    }

    let driver = match Driver::new(state.config.clone(), state.run_state.clone()) {
        Ok(driver) => driver,
        Err(e) => {
            state.run_state.finish_run(Some(e.to_string()));
            tracing::error!("Failed to set up crawl driver: {}", e);
            return error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };

    let run_state = state.run_state.clone();
    tokio::spawn(async move {
        let message = match driver.run().await {
            Ok(report) => report.status_message(),
            Err(e) => {
                tracing::error!("Crawl run failed: {}", e);
                e.to_string()
            }
        };
        run_state.finish_run(Some(message));
    });

    (StatusCode::ACCEPTED, Json(json!({ "msg": "started" }))).into_response()
}

/// POST /api/stop - request cooperative cancellation of the active run
pub async fn stop_run(State(state): State<AppState>) -> Response {
    if !state.run_state.is_running() {
        return error_body(StatusCode::CONFLICT, "no run is active");
    }

    state.run_state.stop.request();
    (StatusCode::ACCEPTED, Json(json!({ "msg": "stopping" }))).into_response()
}

/// GET /api/status - the current run state without blocking on the run
pub async fn run_status(State(state): State<AppState>) -> Response {
    Json(state.run_state.snapshot()).into_response()
}

/// GET /api/limits - fetch the account's current usage limits on demand
pub async fn list_limits(State(state): State<AppState>) -> Response {
    let client = match build_http_client(&state.config.http, &state.config.site.base_url) {
        Ok(client) => client,
        Err(e) => return error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    let monitor = QuotaMonitor::new(
        client,
        &state.config.site.base_url,
        &state.config.site.gate_limit_name,
    );

    match monitor.check().await {
        Ok(limits) => Json(limits).into_response(),
        Err(e) => error_body(
            StatusCode::BAD_GATEWAY,
            format!("failed to fetch limits: {}", e),
        ),
    }
}

/// GET /api/files-info - existence and size of both result artifacts
pub async fn files_info(State(state): State<AppState>) -> Response {
    let sink = ResultSink::new(&state.config.output.data_dir);

    let mut info = serde_json::Map::new();
    for kind in OutputKind::ALL {
        let path = sink.artifact_path(kind);
        let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        info.insert(
            kind.file_name().to_string(),
            json!({ "exists": path.exists(), "size": size }),
        );
    }

    Json(serde_json::Value::Object(info)).into_response()
}

/// GET /api/download/:kind - serve one result artifact
///
/// An absent or zero-length artifact is "not found": nothing meaningful has
/// been harvested yet.
pub async fn download(State(state): State<AppState>, Path(kind): Path<String>) -> Response {
    let Some(kind) = OutputKind::parse(&kind) else {
        return error_body(
            StatusCode::BAD_REQUEST,
            format!("unknown artifact kind '{}'", kind),
        );
    };

    let sink = ResultSink::new(&state.config.output.data_dir);
    let path = sink.artifact_path(kind);

    let body = match tokio::fs::read(&path).await {
        Ok(bytes) if !bytes.is_empty() => bytes,
        Ok(_) | Err(_) => {
            return error_body(
                StatusCode::NOT_FOUND,
                format!("artifact {} not available", kind.file_name()),
            );
        }
    };

    let disposition = format!("attachment; filename=\"{}\"", kind.file_name());
    (
        [
            (header::CONTENT_TYPE, kind.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        body,
    )
        .into_response()
}
