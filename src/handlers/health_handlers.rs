//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks the catalog and storage disk I/O

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::{collections::HashMap, path::Path};
use tokio::fs;
use uuid::Uuid;

/// `GET /healthz`
///
/// Liveness probe. Always 200 with `{"status":"ok"}`; performs no I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Readiness probe that:
/// 1. Pings the catalog database.
/// 2. Performs a best-effort write/read/delete in the object storage directory.
///
/// Returns JSON describing each check. HTTP 200 when all checks pass,
/// HTTP 503 when any check fails.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    // 1) SQLite check
    let sqlite_check = match state.catalog.ping().await {
        Ok(()) => (true, None::<String>),
        Err(e) => (false, Some(format!("error: {}", e))),
    };

    // 2) Disk write/read/delete check (the storage dir may not exist on a fresh install)
    let base_path = &state.objects.base_path;
    let tmp_path = base_path.join(format!(".readyz-{}", Uuid::new_v4()));
    let disk_check = match fs::create_dir_all(base_path).await {
        Err(e) => (false, Some(format!("could not create storage dir: {}", e))),
        Ok(()) => disk_probe(&tmp_path).await,
    };

    // Build response JSON
    let sqlite_ok = sqlite_check.0;
    let disk_ok = disk_check.0;
    let overall_ok = sqlite_ok && disk_ok;

    let mut checks = HashMap::new();
    checks.insert(
        "sqlite",
        CheckStatus {
            ok: sqlite_ok,
            error: sqlite_check.1,
        },
    );
    checks.insert(
        "disk",
        CheckStatus {
            ok: disk_ok,
            error: disk_check.1,
        },
    );

    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

async fn disk_probe(tmp_path: &Path) -> (bool, Option<String>) {
    match fs::write(tmp_path, b"readyz").await {
        Ok(_) => match fs::read(tmp_path).await {
            Ok(bytes) => {
                if bytes == b"readyz" {
                    // try to remove the temp file; ignore removal error but report if it happens
                    match fs::remove_file(tmp_path).await {
                        Ok(_) => (true, None::<String>),
                        Err(e) => (true, Some(format!("could not remove tmp file: {}", e))),
                    }
                } else {
                    // content mismatch
                    let _ = fs::remove_file(tmp_path).await; // best-effort cleanup
                    (false, Some("file content mismatch".to_string()))
                }
            }
            Err(e) => {
                let _ = fs::remove_file(tmp_path).await; // best-effort cleanup
                (false, Some(format!("could not read tmp file: {}", e)))
            }
        },
        Err(e) => (false, Some(format!("could not write tmp file: {}", e))),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
