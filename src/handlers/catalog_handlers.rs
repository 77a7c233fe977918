//! Catalog browsing API and admin thumbnail management.

use crate::{
    errors::AppError,
    handlers::{
        auth_handlers::AdminApi,
        upload_handlers::{multipart_error, staging_error},
    },
    models::language::Language,
    services::{
        catalog::GroupFilter,
        workflow::{self, VideoSummary},
    },
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::io;

const DEFAULT_SEARCH_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub lang: Option<String>,
    /// Korean main category.
    pub category: Option<String>,
    pub level: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub lang: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct LangQuery {
    pub lang: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn listing(videos: Vec<VideoSummary>, lang: Language) -> Value {
    json!({
        "total": videos.len(),
        "videos": videos,
        "language": lang,
        "language_name": lang.display_name(),
    })
}

/// GET `/api/videos?lang=&category=&level=&limit=`
pub async fn list_videos(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Value>, AppError> {
    let lang = Language::resolve(q.lang.as_deref());
    let filter = GroupFilter {
        main_category: non_blank(q.category),
        level: non_blank(q.level),
        limit: q.limit.map(|l| l.max(0)),
    };
    let videos = workflow::list_videos(&state, &filter, lang).await?;
    Ok(Json(listing(videos, lang)))
}

/// GET `/api/videos/search?q=&lang=&limit=`
pub async fn search_videos(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> Result<Json<Value>, AppError> {
    let lang = Language::resolve(q.lang.as_deref());
    let query = q.q.unwrap_or_default();
    let limit = q.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    let videos = workflow::search_videos(&state, &query, lang, limit).await?;

    let mut body = listing(videos, lang);
    body["query"] = json!(query.trim());
    Ok(Json(body))
}

/// GET `/api/videos/category/{category}?lang=`
pub async fn videos_in_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(q): Query<LangQuery>,
) -> Result<Json<Value>, AppError> {
    let lang = Language::resolve(q.lang.as_deref());
    let videos = workflow::videos_in_category(&state, &category, lang).await?;

    let mut body = listing(videos, lang);
    body["category"] = json!(category);
    Ok(Json(body))
}

/// GET `/api/categories?lang=`
pub async fn categories(
    State(state): State<AppState>,
    Query(q): Query<LangQuery>,
) -> Result<Json<Value>, AppError> {
    let lang = Language::resolve(q.lang.as_deref());
    let taxonomy = state.catalog.load_taxonomy().await?;
    Ok(Json(json!({
        "categories": taxonomy,
        "language": lang,
        "language_name": lang.display_name(),
        "supported_languages": Language::ALL,
    })))
}

/// GET `/api/languages`
pub async fn languages() -> Json<Value> {
    let names: Map<String, Value> = Language::ALL
        .into_iter()
        .map(|lang| (lang.code().to_string(), json!(lang.display_name())))
        .collect();
    Json(json!({
        "total": names.len(),
        "languages": names,
    }))
}

/// POST `/api/videos/{group_id}/thumbnail` (multipart field `thumbnail`)
pub async fn upload_thumbnail(
    _admin: AdminApi,
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let mut thumbnail = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("thumbnail") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let stream = field.map(|chunk| chunk.map_err(io::Error::other));
        let staged = state
            .objects
            .stage_stream(file_name, stream)
            .await
            .map_err(staging_error)?;
        thumbnail = Some(staged);
    }

    let url = workflow::replace_thumbnail(&state, &group_id, thumbnail).await?;
    Ok(Json(json!({
        "message": "thumbnail updated",
        "thumbnail_url": url,
    })))
}

/// DELETE `/api/videos/{group_id}/thumbnail`
pub async fn delete_thumbnail(
    _admin: AdminApi,
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    workflow::delete_thumbnail(&state, &group_id).await?;
    Ok(Json(json!({ "message": "thumbnail deleted" })))
}
