//! Shared fixtures for unit tests.

use crate::{
    models::language::Language,
    services::{
        admin::AdminAuth,
        catalog::CatalogStore,
        object_store::{ObjectStore, StagedFile},
        presign::UrlSigner,
        probe::{MediaProbe, ProbeError},
        render::Templates,
        translation::{TranslationError, Translator},
    },
    state::AppState,
};
use async_trait::async_trait;
use bytes::Bytes;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::{
    collections::HashSet,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

pub const TEST_BASE_URL: &str = "http://localhost:3000";
pub const TEST_ADMIN_EMAIL: &str = "admin@example.com";
pub const TEST_ADMIN_PASSWORD: &str = "correct horse";

/// In-memory database with the real schema. One connection, because every
/// `:memory:` connection is a separate database.
pub async fn test_pool() -> Arc<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    crate::db::run_migrations(&pool).await.unwrap();
    Arc::new(pool)
}

/// Translator that answers `"{code}:{text}"` and fails for chosen languages.
#[derive(Default)]
pub struct FakeTranslator {
    pub failing: HashSet<Language>,
    pub calls: AtomicUsize,
}

impl FakeTranslator {
    pub fn failing(langs: impl IntoIterator<Item = Language>) -> Self {
        Self {
            failing: langs.into_iter().collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Translator for FakeTranslator {
    async fn translate(&self, text: &str, target: Language) -> Result<String, TranslationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&target) {
            return Err(TranslationError::Service {
                status: 503,
                message: format!("{} unavailable", target.code()),
            });
        }
        Ok(format!("{}:{}", target.code(), text))
    }
}

/// Probe returning a fixed duration, or failing when `None`.
pub struct FakeProbe(pub Option<i64>);

#[async_trait]
impl MediaProbe for FakeProbe {
    async fn duration_seconds(&self, _path: &Path) -> Result<i64, ProbeError> {
        self.0.ok_or(ProbeError::FfprobeNotFound)
    }
}

/// Full application state over an in-memory catalog and a temp storage dir.
pub fn test_state_with(
    pool: Arc<SqlitePool>,
    dir: &Path,
    translator: Arc<dyn Translator>,
    probe: Arc<dyn MediaProbe>,
) -> AppState {
    AppState {
        catalog: CatalogStore::new(pool.clone()),
        objects: ObjectStore::new(pool, dir),
        signer: UrlSigner::new("test-secret", TEST_BASE_URL, Duration::from_secs(600)),
        translator,
        probe,
        templates: Arc::new(Templates::new().unwrap()),
        admin: Arc::new(AdminAuth::new("admin", None, "test-secret", Duration::from_secs(600))),
        base_url: TEST_BASE_URL.to_string(),
    }
}

/// Default state with admin login switched on.
pub async fn admin_state() -> (AppState, tempfile::TempDir) {
    let (mut state, dir) = default_state().await;
    state.admin = Arc::new(AdminAuth::new(
        TEST_ADMIN_EMAIL,
        Some(TEST_ADMIN_PASSWORD),
        "test-secret",
        Duration::from_secs(600),
    ));
    (state, dir)
}

pub async fn test_state(
    translator: Arc<dyn Translator>,
    probe: Arc<dyn MediaProbe>,
) -> (AppState, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state_with(test_pool().await, dir.path(), translator, probe);
    (state, dir)
}

pub async fn default_state() -> (AppState, tempfile::TempDir) {
    test_state(
        Arc::new(FakeTranslator::default()),
        Arc::new(FakeProbe(Some(95))),
    )
    .await
}

/// Stage `bytes` as if uploaded under `file_name`.
pub async fn stage(state: &AppState, file_name: &str, bytes: &'static [u8]) -> StagedFile {
    state
        .objects
        .stage_stream(
            Some(file_name.to_string()),
            futures::stream::iter([Ok::<_, std::io::Error>(Bytes::from_static(bytes))]),
        )
        .await
        .unwrap()
}

pub async fn count_rows(state: &AppState, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(&*state.catalog.db)
        .await
        .unwrap()
}
