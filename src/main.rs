use anyhow::{Context, Result};
use axum::Router;
use std::{fs, io::ErrorKind, path::Path, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod config;
mod db;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;
#[cfg(test)]
mod test_support;

use config::{AppConfig, Mode};
use services::{
    admin::{AdminAuth, DEFAULT_SESSION_TTL_SECS},
    catalog::CatalogStore, object_store::ObjectStore, poller::Poller, presign::UrlSigner,
    probe::FfprobeProbe, render::Templates, translation::HttpTranslator,
};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + run mode ---
    let (cfg, mode) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting video-catalog ({:?}) with config: {:?}", mode, cfg);

    // --- Ensure storage directory exists ---
    if !Path::new(&cfg.storage_dir).exists() {
        fs::create_dir_all(&cfg.storage_dir)
            .with_context(|| format!("creating storage directory {}", cfg.storage_dir))?;
        tracing::info!("Created storage directory at {}", cfg.storage_dir);
    }

    // --- Initialize SQLite connection ---
    let db = db::connect(&cfg.database_url).await?;

    // --- Handle migration mode ---
    if mode == Mode::Migrate {
        db::run_migrations(&db).await?;
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Initialize core services ---
    let catalog = CatalogStore::new(db.clone());
    let objects = ObjectStore::new(db.clone(), cfg.storage_dir.clone());
    let translator = Arc::new(
        HttpTranslator::new(cfg.translate_endpoint.clone(), cfg.translate_api_key.clone())
            .context("building translation client")?,
    );
    let probe = Arc::new(FfprobeProbe);

    if mode == Mode::Poll {
        let poller = Poller::new(catalog, objects, translator, probe, cfg.poll_batch_size);
        tracing::info!(
            "Poller running every {:?}, batch size {}",
            cfg.poll_interval,
            cfg.poll_batch_size
        );
        poller.run(cfg.poll_interval).await;
        return Ok(());
    }

    let secret = match cfg.signing_secret.clone() {
        Some(secret) => secret,
        None => {
            tracing::warn!(
                "VIDEO_CATALOG_SIGNING_SECRET is not set; object links will stop working on restart"
            );
            format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
        }
    };

    if cfg.admin_password.is_none() {
        tracing::warn!(
            "VIDEO_CATALOG_ADMIN_PASSWORD is not set; the upload pages are open to everyone"
        );
    }
    let admin = AdminAuth::new(
        cfg.admin_email.clone(),
        cfg.admin_password.as_deref(),
        format!("admin-session:{secret}"),
        Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
    );

    let state = AppState {
        catalog,
        objects,
        signer: UrlSigner::new(secret, cfg.base_url.clone(), cfg.presign_ttl),
        translator,
        probe,
        templates: Arc::new(Templates::new().context("compiling templates")?),
        admin: Arc::new(admin),
        base_url: cfg.base_url.clone(),
    };

    // --- Build router ---
    let app: Router = routes::routes::routes(cfg.max_upload_bytes).with_state(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
