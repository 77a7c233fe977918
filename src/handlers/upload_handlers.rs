//! Upload form and multipart submission.

use crate::{
    errors::AppError,
    handlers::auth_handlers::AdminPage,
    services::{
        object_store::StorageError,
        render::{self, script_json},
        workflow::{self, UploadSubmission},
    },
    state::AppState,
};
use axum::{
    extract::{Multipart, State, multipart::MultipartError},
    response::Html,
};
use futures::StreamExt;
use serde::Serialize;
use serde_json::json;
use std::io;

/// GET `/upload_form`
pub async fn upload_form(
    _admin: AdminPage,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    let taxonomy = state.catalog.load_taxonomy().await?;
    if taxonomy.is_empty() {
        tracing::warn!("category taxonomy is empty; was the database migrated?");
    }
    let html = state.templates.render(
        render::UPLOAD_FORM,
        &json!({
            "page_title": "동영상 업로드",
            "taxonomy": &taxonomy,
            "taxonomy_json": script_json(&taxonomy)?,
            "admin_enabled": state.admin.is_enabled(),
        }),
    )?;
    Ok(Html(html))
}

#[derive(Serialize)]
struct TranslationLine {
    name: &'static str,
    title: String,
}

/// POST `/upload`
///
/// File parts are spooled into staging as they arrive; nothing is stored
/// under a key until the whole submission has been validated.
pub async fn upload(
    _admin: AdminPage,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Html<String>, AppError> {
    let mut submission = UploadSubmission::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" | "thumbnail" => {
                let file_name = field.file_name().map(str::to_string);
                let stream = field.map(|chunk| chunk.map_err(io::Error::other));
                let staged = state
                    .objects
                    .stage_stream(file_name, stream)
                    .await
                    .map_err(staging_error)?;
                if name == "file" {
                    submission.video = Some(staged);
                } else {
                    submission.thumbnail = Some(staged);
                }
            }
            "group_name" | "main_category" | "sub_category" | "sub_sub_category" | "level"
            | "tag" => {
                let value = field.text().await.map_err(multipart_error)?;
                let slot = match name.as_str() {
                    "group_name" => &mut submission.group_name,
                    "main_category" => &mut submission.main_category,
                    "sub_category" => &mut submission.sub_category,
                    "sub_sub_category" => &mut submission.leaf_category,
                    "level" => &mut submission.level,
                    _ => &mut submission.tag,
                };
                *slot = Some(value);
            }
            other => tracing::debug!("ignoring unknown form field `{}`", other),
        }
    }

    let receipt = workflow::upload(&state, submission)
        .await
        .map_err(AppError::upload)?;
    let lines: Vec<TranslationLine> = receipt
        .translations
        .iter()
        .map(|(lang, title)| TranslationLine {
            name: lang.display_name(),
            title: title.clone(),
        })
        .collect();

    // The page lists translations in language order with display names.
    let mut page = serde_json::to_value(&receipt)?;
    page["translations"] = serde_json::to_value(lines)?;
    page["page_title"] = json!("업로드 완료");
    Ok(Html(state.templates.render(render::SUCCESS, &page)?))
}

pub(crate) fn multipart_error(err: MultipartError) -> AppError {
    AppError::new(err.status(), err.body_text())
}

/// A multipart failure surfacing through the staging stream keeps its
/// client-facing status (e.g. 413 when the body limit is hit).
pub(crate) fn staging_error(err: StorageError) -> AppError {
    if let StorageError::Io(io_err) = &err {
        if let Some(mp) = io_err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<MultipartError>())
        {
            return AppError::new(mp.status(), mp.body_text());
        }
    }
    err.into()
}
