//! SQLite connection setup and schema migration.

use anyhow::{Context, Result};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::{path::Path, sync::Arc};

const INIT_MIGRATION: &str = include_str!("../migrations/0001_init.sql");

/// Open the SQLite pool, creating the database file and its parent
/// directory when they do not exist yet.
pub async fn connect(db_url: &str) -> Result<Arc<SqlitePool>> {
    tracing::debug!("Connecting using raw URL => {}", db_url);

    if let Some(db_path) = sqlite_file_path(db_url) {
        tracing::debug!("Interpreted SQLite path => {}", db_path);
        let db_path_obj = Path::new(db_path);
        if let Some(parent) = db_path_obj.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating database directory {:?}", parent))?;
                tracing::info!("Created missing directory {:?}", parent);
            }
        }
        // SQLx refuses to open a missing file unless asked to create it.
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(db_path)
            .with_context(|| format!("opening database file {}", db_path))?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .with_context(|| format!("connecting to {}", db_url))?;
    Ok(Arc::new(pool))
}

/// Local file behind a SQLite URL, without scheme or `?options`.
/// `None` for in-memory databases.
fn sqlite_file_path(db_url: &str) -> Option<&str> {
    let rest = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .trim_start_matches("file:");
    let (path, options) = rest.split_once('?').unwrap_or((rest, ""));
    let in_memory = path.is_empty()
        || path.starts_with(":memory:")
        || options.split('&').any(|opt| opt == "mode=memory");
    (!in_memory).then_some(path)
}

/// Apply the embedded schema. Statements are idempotent, so running this
/// against an already-migrated database is harmless.
pub async fn run_migrations(db: &SqlitePool) -> Result<()> {
    let statements = INIT_MIGRATION
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} migration statements...", statements.len());

    for stmt in statements {
        tracing::debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt)
            .execute(db)
            .await
            .with_context(|| format!("executing migration statement `{}`", stmt))?;
    }

    Ok(())
}
