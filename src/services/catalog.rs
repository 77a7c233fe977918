//! CatalogStore: one row per video group plus the category taxonomy.
//!
//! Translations are stored as a JSON object keyed by language code in the
//! `translations` column; `translations_complete` mirrors whether all seven
//! languages are present so the poller can find unfinished rows by index.
//! Category names per language live in `category_translations` the same way.
//!
//! Each poller pass stamps the rows it touched (`*_attempts`,
//! `*_attempted_at`) and picks the least recently attempted rows first, so
//! rows that keep failing cannot starve newer ones.

use crate::models::{
    category::{CategoryPath, CategoryTaxonomy, CategoryTranslations},
    language::Translations,
    video_group::VideoGroup,
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("group `{0}` already exists")]
    DuplicateGroup(String),
    #[error("group `{group_id}` has malformed translations: {source}")]
    MalformedTranslations {
        group_id: String,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

const GROUP_COLUMNS: &str = "group_id, group_name, translations, main_category, sub_category, \
     leaf_category, category_translations, level, tag, video_key, thumbnail_key, qr_key, qr_link, \
     duration_seconds, created_at, updated_at";

/// Deferred work the poller retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollTask {
    Translation,
    Duration,
}

impl PollTask {
    /// `(attempt counter, last attempt timestamp)` columns.
    fn columns(self) -> (&'static str, &'static str) {
        match self {
            PollTask::Translation => ("translation_attempts", "translation_attempted_at"),
            PollTask::Duration => ("duration_attempts", "duration_attempted_at"),
        }
    }
}

/// Equality filters for catalog listings. `None` matches everything.
#[derive(Debug, Clone, Default)]
pub struct GroupFilter {
    pub main_category: Option<String>,
    pub level: Option<String>,
    pub limit: Option<i64>,
}

#[derive(FromRow)]
struct GroupRow {
    group_id: String,
    group_name: String,
    translations: String,
    main_category: String,
    sub_category: String,
    leaf_category: String,
    category_translations: String,
    level: String,
    tag: Option<String>,
    video_key: String,
    thumbnail_key: Option<String>,
    qr_key: String,
    qr_link: String,
    duration_seconds: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<GroupRow> for VideoGroup {
    type Error = CatalogError;

    fn try_from(row: GroupRow) -> CatalogResult<Self> {
        let translations: Translations =
            serde_json::from_str(&row.translations).map_err(|source| {
                CatalogError::MalformedTranslations {
                    group_id: row.group_id.clone(),
                    source,
                }
            })?;
        let category_translations: CategoryTranslations =
            serde_json::from_str(&row.category_translations).map_err(|source| {
                CatalogError::MalformedTranslations {
                    group_id: row.group_id.clone(),
                    source,
                }
            })?;
        let mut group = VideoGroup {
            group_id: row.group_id,
            group_name: row.group_name,
            translations,
            category: CategoryPath {
                main_category: row.main_category,
                sub_category: row.sub_category,
                leaf_category: row.leaf_category,
            },
            category_translations,
            level: row.level,
            tag: row.tag,
            video_key: row.video_key,
            thumbnail_key: row.thumbnail_key,
            qr_key: row.qr_key,
            qr_link: row.qr_link,
            duration_seconds: row.duration_seconds,
            created_at: row.created_at,
            updated_at: row.updated_at,
        };
        // Re-assert the Korean entry in case the row was edited by hand.
        group.merge_translations(Translations::new());
        Ok(group)
    }
}

#[derive(Clone)]
pub struct CatalogStore {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

impl CatalogStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Cheap connectivity check used by readiness probes.
    pub async fn ping(&self) -> CatalogResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        Ok(())
    }

    /// Insert a new group. Group IDs are never reused.
    pub async fn insert_group(&self, group: &VideoGroup) -> CatalogResult<()> {
        let translations = serde_json::to_string(&group.translations)?;
        let category_translations = serde_json::to_string(&group.category_translations)?;
        let result = sqlx::query(
            "INSERT INTO video_groups (
                group_id, group_name, translations, translations_complete,
                main_category, sub_category, leaf_category, category_translations, level, tag,
                video_key, thumbnail_key, qr_key, qr_link, duration_seconds,
                created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&group.group_id)
        .bind(&group.group_name)
        .bind(translations)
        .bind(group.is_translation_complete())
        .bind(&group.category.main_category)
        .bind(&group.category.sub_category)
        .bind(&group.category.leaf_category)
        .bind(category_translations)
        .bind(&group.level)
        .bind(&group.tag)
        .bind(&group.video_key)
        .bind(&group.thumbnail_key)
        .bind(&group.qr_key)
        .bind(&group.qr_link)
        .bind(group.duration_seconds)
        .bind(group.created_at)
        .bind(group.updated_at)
        .execute(&*self.db)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(CatalogError::DuplicateGroup(group.group_id.clone()))
            }
            Err(err) => Err(CatalogError::Sqlx(err)),
        }
    }

    pub async fn get_group(&self, group_id: &str) -> CatalogResult<Option<VideoGroup>> {
        let row = sqlx::query_as::<_, GroupRow>(&format!(
            "SELECT {GROUP_COLUMNS} FROM video_groups WHERE group_id = ?"
        ))
        .bind(group_id)
        .fetch_optional(&*self.db)
        .await?;

        row.map(VideoGroup::try_from).transpose()
    }

    /// Groups still missing at least one translation, never-attempted and
    /// least recently attempted first.
    pub async fn pending_translations(&self, limit: i64) -> CatalogResult<Vec<VideoGroup>> {
        self.fetch_pending("translations_complete = 0", PollTask::Translation, limit)
            .await
    }

    /// Groups whose duration has not been probed yet, in the same order.
    pub async fn missing_durations(&self, limit: i64) -> CatalogResult<Vec<VideoGroup>> {
        self.fetch_pending("duration_seconds IS NULL", PollTask::Duration, limit)
            .await
    }

    async fn fetch_pending(
        &self,
        condition: &str,
        task: PollTask,
        limit: i64,
    ) -> CatalogResult<Vec<VideoGroup>> {
        let (_, attempted_at) = task.columns();
        let rows = sqlx::query_as::<_, GroupRow>(&format!(
            "SELECT {GROUP_COLUMNS} FROM video_groups
             WHERE {condition}
             ORDER BY {attempted_at} IS NOT NULL, {attempted_at} ASC, created_at ASC
             LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&*self.db)
        .await?;
        Ok(decode_rows(rows))
    }

    /// Stamp a poller attempt on a group, successful or not.
    pub async fn record_attempt(&self, group_id: &str, task: PollTask) -> CatalogResult<()> {
        let (attempts, attempted_at) = task.columns();
        sqlx::query(&format!(
            "UPDATE video_groups SET {attempts} = {attempts} + 1, {attempted_at} = ?
             WHERE group_id = ?"
        ))
        .bind(Utc::now())
        .bind(group_id)
        .execute(&*self.db)
        .await?;
        Ok(())
    }

    /// Newest groups first, optionally filtered by main category and level.
    pub async fn list_groups(&self, filter: &GroupFilter) -> CatalogResult<Vec<VideoGroup>> {
        let rows = sqlx::query_as::<_, GroupRow>(&format!(
            "SELECT {GROUP_COLUMNS} FROM video_groups
             WHERE (?1 IS NULL OR main_category = ?1)
               AND (?2 IS NULL OR level = ?2)
             ORDER BY created_at DESC
             LIMIT ?3"
        ))
        .bind(&filter.main_category)
        .bind(&filter.level)
        // SQLite treats a negative LIMIT as "no limit".
        .bind(filter.limit.unwrap_or(-1))
        .fetch_all(&*self.db)
        .await?;
        Ok(decode_rows(rows))
    }

    /// Overwrite a group's translations (last write wins).
    pub async fn update_translations(&self, group: &VideoGroup) -> CatalogResult<()> {
        let translations = serde_json::to_string(&group.translations)?;
        sqlx::query(
            "UPDATE video_groups
             SET translations = ?, translations_complete = ?, updated_at = ?
             WHERE group_id = ?",
        )
        .bind(translations)
        .bind(group.is_translation_complete())
        .bind(Utc::now())
        .bind(&group.group_id)
        .execute(&*self.db)
        .await?;
        Ok(())
    }

    /// Point a group at a new thumbnail object, or clear it.
    pub async fn set_thumbnail(
        &self,
        group_id: &str,
        thumbnail_key: Option<&str>,
    ) -> CatalogResult<()> {
        sqlx::query("UPDATE video_groups SET thumbnail_key = ?, updated_at = ? WHERE group_id = ?")
            .bind(thumbnail_key)
            .bind(Utc::now())
            .bind(group_id)
            .execute(&*self.db)
            .await?;
        Ok(())
    }

    pub async fn update_duration(&self, group_id: &str, seconds: i64) -> CatalogResult<()> {
        sqlx::query(
            "UPDATE video_groups SET duration_seconds = ?, updated_at = ? WHERE group_id = ?",
        )
        .bind(seconds)
        .bind(Utc::now())
        .bind(group_id)
        .execute(&*self.db)
        .await?;
        Ok(())
    }

    /// Load the whole category tree in display order.
    pub async fn load_taxonomy(&self) -> CatalogResult<CategoryTaxonomy> {
        let paths = sqlx::query_as::<_, CategoryPath>(
            "SELECT main_category, sub_category, leaf_category
             FROM categories ORDER BY position ASC",
        )
        .fetch_all(&*self.db)
        .await?;
        Ok(CategoryTaxonomy::from_paths(paths))
    }
}

fn decode_rows(rows: Vec<GroupRow>) -> Vec<VideoGroup> {
    let mut groups = Vec::with_capacity(rows.len());
    for row in rows {
        match VideoGroup::try_from(row) {
            Ok(group) => groups.push(group),
            // One bad row must not stall the rest of the batch.
            Err(err) => tracing::warn!("skipping unreadable group: {}", err),
        }
    }
    groups
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}
