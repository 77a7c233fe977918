//! src/services/object_store.rs
//!
//! ObjectStore: blob storage for videos, thumbnails and QR images. Object
//! metadata is kept in SQLite and payloads on local disk, sharded beneath
//! `base_path/{shard}/{shard}/{key}`.
//!
//! Writes happen in two phases: a payload is first streamed into the staging
//! area (`base_path/.staging`) and only moved under its key by [`ObjectStore::commit`].
//! Callers can therefore validate a whole request before anything is stored.

use crate::models::object::StoredObject;
use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt, pin_mut, stream};
use md5::Context;
use sqlx::SqlitePool;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object `{0}` not found")]
    ObjectNotFound(String),
    #[error("invalid object key")]
    InvalidObjectKey,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

const MAX_OBJECT_KEY_LEN: usize = 1024;
const STAGING_DIR: &str = ".staging";

/// A payload spooled into the staging area but not yet stored under a key.
///
/// The staged file is removed when this value is dropped, so an upload that
/// fails validation leaves nothing behind.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    size_bytes: i64,
    etag: String,
    /// Client-supplied file name, if any.
    pub file_name: Option<String>,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size_bytes(&self) -> i64 {
        self.size_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.size_bytes == 0
    }

    /// Lower-cased extension of the client file name, including the dot.
    pub fn extension(&self) -> Option<String> {
        self.file_name
            .as_deref()
            .map(Path::new)
            .and_then(Path::extension)
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        // Already moved into place after a successful commit.
        let _ = std::fs::remove_file(&self.path);
    }
}

/// ObjectStore provides the storage calls the catalog needs:
/// - Stage a payload stream (writes bytes to a scratch file, computes MD5)
/// - Commit a staged payload under a key (moves it and upserts metadata)
/// - Open an object for streaming out
#[derive(Clone)]
pub struct ObjectStore {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: Arc<SqlitePool>,

    /// Base directory on disk where object payloads are stored.
    pub base_path: PathBuf,
}

impl ObjectStore {
    /// Create a new ObjectStore backed by the provided SQLite pool and
    /// using `base_path` as the root directory for object payloads.
    pub fn new(db: Arc<SqlitePool>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            db,
            base_path: base_path.into(),
        }
    }

    /// Reject keys that could escape `base_path` or collide with staging.
    fn ensure_key_safe(&self, key: &str) -> StorageResult<()> {
        if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
            return Err(StorageError::InvalidObjectKey);
        }
        if key.starts_with('/') || key.starts_with('.') || key.contains("..") {
            return Err(StorageError::InvalidObjectKey);
        }
        if key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(StorageError::InvalidObjectKey);
        }
        Ok(())
    }

    /// Two-level shard identifiers: the first two bytes of MD5(key) as hex.
    fn object_shards(key: &str) -> (String, String) {
        let digest = md5::compute(key);
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// Fully-qualified payload path: `base_path/{shard}/{shard}/{key}`.
    /// Parent directories may not exist yet.
    pub fn object_path(&self, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(key);
        let mut path = self.base_path.clone();
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    fn staging_dir(&self) -> PathBuf {
        self.base_path.join(STAGING_DIR)
    }

    /// Stream a payload into the staging area.
    ///
    /// Computes size and MD5 while writing and fsyncs before returning.
    /// The scratch file is removed on any error.
    pub async fn stage_stream<S>(
        &self,
        file_name: Option<String>,
        stream: S,
    ) -> StorageResult<StagedFile>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let staging = self.staging_dir();
        fs::create_dir_all(&staging).await?;
        let tmp_path = staging.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size_bytes: i64 = 0;
        let mut digest = Context::new();
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(StorageError::Io(err));
                }
            };
            size_bytes += chunk.len() as i64;
            digest.consume(&chunk);
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StorageError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }

        Ok(StagedFile {
            path: tmp_path,
            size_bytes,
            etag: format!("{:x}", digest.compute()),
            file_name,
        })
    }

    /// Move a staged payload under `key` and upsert its metadata row.
    ///
    /// `content_type` is what the object will be served as; callers choose it
    /// from the validated extension, never from the client.
    /// Overwrites any existing object with the same key.
    pub async fn commit(
        &self,
        key: &str,
        staged: StagedFile,
        content_type: &str,
    ) -> StorageResult<StoredObject> {
        self.ensure_key_safe(key)?;

        let file_path = self.object_path(key);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StorageError::Io(io::Error::new(
                ErrorKind::Other,
                "object path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;

        if let Err(err) = fs::rename(&staged.path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(&staged.path, &file_path).await?;
            } else {
                return Err(StorageError::Io(err));
            }
        }

        let insert_result = sqlx::query_as::<_, StoredObject>(
            r#"
            INSERT INTO objects (key, content_type, size_bytes, etag, last_modified)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                content_type = excluded.content_type,
                size_bytes = excluded.size_bytes,
                etag = excluded.etag,
                last_modified = excluded.last_modified
            RETURNING key, content_type, size_bytes, etag, last_modified
            "#,
        )
        .bind(key)
        .bind(content_type)
        .bind(staged.size_bytes)
        .bind(&staged.etag)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await;

        match insert_result {
            Ok(obj) => {
                debug!("stored object {} ({} bytes)", key, obj.size_bytes);
                Ok(obj)
            }
            Err(err) => {
                let _ = fs::remove_file(&file_path).await;
                Err(StorageError::Sqlx(err))
            }
        }
    }

    /// Store an in-memory payload under `key`.
    pub async fn put_bytes(
        &self,
        key: &str,
        content_type: &str,
        bytes: Bytes,
    ) -> StorageResult<StoredObject> {
        let staged = self
            .stage_stream(None, stream::once(async move { Ok::<_, io::Error>(bytes) }))
            .await?;
        self.commit(key, staged, content_type).await
    }

    /// Remove an object's metadata row and payload.
    pub async fn delete_object(&self, key: &str) -> StorageResult<()> {
        self.ensure_key_safe(key)?;
        let deleted = sqlx::query("DELETE FROM objects WHERE key = ?")
            .bind(key)
            .execute(&*self.db)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(StorageError::ObjectNotFound(key.to_string()));
        }

        match fs::remove_file(self.object_path(key)).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("payload of {} was already gone", key)
            }
            Err(err) => return Err(StorageError::Io(err)),
        }
        debug!("deleted object {}", key);
        Ok(())
    }

    /// Fetch object metadata.
    pub async fn get_object_metadata(&self, key: &str) -> StorageResult<StoredObject> {
        self.ensure_key_safe(key)?;
        sqlx::query_as::<_, StoredObject>(
            "SELECT key, content_type, size_bytes, etag, last_modified
             FROM objects WHERE key = ?",
        )
        .bind(key)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => StorageError::ObjectNotFound(key.to_string()),
            other => StorageError::Sqlx(other),
        })
    }

    /// Fetch an object for reading.
    ///
    /// Returns metadata and an opened File handle ready for streaming out.
    /// Returns ObjectNotFound if metadata exists but the payload is missing.
    pub async fn get_object_reader(&self, key: &str) -> StorageResult<(StoredObject, File)> {
        let object = self.get_object_metadata(key).await?;

        let file = File::open(self.object_path(key)).await.map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                StorageError::ObjectNotFound(key.to_string())
            } else {
                StorageError::Io(err)
            }
        })?;

        Ok((object, file))
    }
}
