//! Presigned object downloads.
//! Streams object bodies to avoid buffering videos in memory.

use crate::{errors::AppError, models::object::StoredObject, state::AppState};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use serde::Deserialize;
use tokio_util::io::ReaderStream;

/// Query string of a presigned link.
#[derive(Debug, Deserialize)]
pub struct PresignedQuery {
    pub expires: Option<i64>,
    pub signature: Option<String>,
}

/// GET `/objects/{*key}?expires=&signature=`
pub async fn get_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(q): Query<PresignedQuery>,
) -> Result<Response, AppError> {
    let (Some(expires), Some(signature)) = (q.expires, q.signature.as_deref()) else {
        return Err(AppError::forbidden("missing signature"));
    };
    state.signer.verify(&key, expires, signature)?;

    let (meta, file) = state.objects.get_object_reader(&key).await?;
    let body = Body::from_stream(ReaderStream::new(file));

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    set_object_headers(response.headers_mut(), &meta);

    Ok(response)
}

fn set_object_headers(headers: &mut HeaderMap, meta: &StoredObject) {
    let content_type = meta
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".into());
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );

    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&meta.size_bytes.max(0).to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );

    if let Some(etag) = meta.etag.as_ref() {
        if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", etag)) {
            headers.insert(header::ETAG, value);
        }
    }

    if let Ok(value) = HeaderValue::from_str(&meta.last_modified.to_rfc2822()) {
        headers.insert(header::LAST_MODIFIED, value);
    }
}
