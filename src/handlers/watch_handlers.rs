//! Playback page and its JSON twin.

use crate::{
    errors::AppError,
    services::{render, workflow},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, header},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct WatchQuery {
    pub lang: Option<String>,
}

/// The mobile app identifies itself through its HTTP client's user agent.
fn is_app_client(headers: &HeaderMap) -> bool {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|ua| {
            let ua = ua.to_ascii_lowercase();
            ua.contains("flutter") || ua.contains("dart")
        })
        .unwrap_or(false)
}

/// GET `/watch/{group_id}?lang=`
pub async fn watch_page(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Query(q): Query<WatchQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let view = workflow::watch(&state, &group_id, q.lang.as_deref()).await?;
    if is_app_client(&headers) {
        return Ok(Json(view).into_response());
    }

    let mut page = serde_json::to_value(&view)?;
    page["page_title"] = page["title"].clone();
    let html = state.templates.render(render::WATCH, &page)?;
    Ok(Html(html).into_response())
}

/// GET `/api/videos/{group_id}?lang=`
pub async fn watch_json(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Query(q): Query<WatchQuery>,
) -> Result<Json<workflow::WatchView>, AppError> {
    Ok(Json(
        workflow::watch(&state, &group_id, q.lang.as_deref()).await?,
    ))
}
