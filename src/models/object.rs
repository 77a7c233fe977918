//! Represents a stored object (video, thumbnail or QR image).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Metadata for a single stored blob.
///
/// The `StoredObject` row describes the payload; the bytes themselves live
/// on disk under the object store's sharded layout.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct StoredObject {
    /// Object key (path-like identifier, e.g. `videos/{group_id}/video.mp4`).
    pub key: String,

    /// Content type (MIME type) reported by the uploader.
    pub content_type: Option<String>,

    /// Size in bytes.
    pub size_bytes: i64,

    /// MD5 checksum of the payload.
    pub etag: Option<String>,

    /// Timestamp when the object was written.
    pub last_modified: DateTime<Utc>,
}
