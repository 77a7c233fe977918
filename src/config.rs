use crate::services::presign::DEFAULT_PRESIGN_TTL_SECS;
use anyhow::{Context, Result};
use clap::Parser;
use std::{env, str::FromStr, time::Duration};

const ENV_PREFIX: &str = "VIDEO_CATALOG_";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    /// Public origin used in watch links, QR codes and presigned URLs.
    pub base_url: String,
    pub signing_secret: Option<String>,
    pub presign_ttl: Duration,
    pub translate_endpoint: String,
    pub translate_api_key: Option<String>,
    pub max_upload_bytes: usize,
    pub poll_interval: Duration,
    pub poll_batch_size: i64,
    pub admin_email: String,
    /// Admin login is disabled while this is unset.
    pub admin_password: Option<String>,
}

/// Which process to run after configuration is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Serve,
    Migrate,
    Poll,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Video upload and multilingual catalog")]
pub struct Args {
    /// Host to bind to (overrides VIDEO_CATALOG_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides VIDEO_CATALOG_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where objects are stored (overrides VIDEO_CATALOG_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides VIDEO_CATALOG_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Public base URL (overrides VIDEO_CATALOG_BASE_URL)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Secret for presigned object links (overrides VIDEO_CATALOG_SIGNING_SECRET)
    #[arg(long)]
    pub signing_secret: Option<String>,

    /// Lifetime of presigned links in seconds, at most 7 days
    #[arg(long)]
    pub presign_ttl_secs: Option<u64>,

    /// Translation API origin (overrides VIDEO_CATALOG_TRANSLATE_ENDPOINT)
    #[arg(long)]
    pub translate_endpoint: Option<String>,

    /// Translation API key (overrides VIDEO_CATALOG_TRANSLATE_API_KEY)
    #[arg(long)]
    pub translate_api_key: Option<String>,

    /// Largest accepted upload body in bytes
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Seconds between poller cycles
    #[arg(long)]
    pub poll_interval_secs: Option<u64>,

    /// Records handled per poller pass
    #[arg(long)]
    pub poll_batch_size: Option<i64>,

    /// Admin login email (overrides VIDEO_CATALOG_ADMIN_EMAIL)
    #[arg(long)]
    pub admin_email: Option<String>,

    /// Admin login password (overrides VIDEO_CATALOG_ADMIN_PASSWORD)
    #[arg(long)]
    pub admin_password: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,

    /// Run the background poller instead of the HTTP server
    #[arg(long, conflicts_with = "migrate")]
    pub poll: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and run mode.
    pub fn from_env_and_args() -> Result<(Self, Mode)> {
        // Parse CLI once
        let args = Args::parse();
        Self::merge(args, |name| env::var(name))
    }

    /// CLI flags win over environment variables, which win over defaults.
    fn merge<F>(args: Args, var: F) -> Result<(Self, Mode)>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let lookup = |name: &str| -> Result<Option<String>> {
            let key = format!("{ENV_PREFIX}{name}");
            match var(&key) {
                Ok(value) => Ok(Some(value)),
                Err(env::VarError::NotPresent) => Ok(None),
                Err(err) => Err(err).with_context(|| format!("reading {}", key)),
            }
        };
        let parsed = |name: &str, default: &str| -> Result<String> {
            Ok(lookup(name)?.unwrap_or_else(|| default.to_string()))
        };

        let cfg = Self {
            host: pick(args.host, || parsed("HOST", "0.0.0.0"))?,
            port: pick(args.port, || number(&lookup, "PORT", 3000))?,
            storage_dir: pick(args.storage_dir, || parsed("STORAGE_DIR", "./data/objects"))?,
            database_url: pick(args.database_url, || {
                parsed("DATABASE_URL", "sqlite://./data/meta/catalog.db")
            })?,
            base_url: pick(args.base_url, || parsed("BASE_URL", "http://localhost:3000"))?
                .trim_end_matches('/')
                .to_string(),
            signing_secret: match args.signing_secret {
                Some(secret) => Some(secret),
                None => lookup("SIGNING_SECRET")?,
            }
            .filter(|s| !s.is_empty()),
            presign_ttl: Duration::from_secs(pick(args.presign_ttl_secs, || {
                number(&lookup, "PRESIGN_TTL_SECS", DEFAULT_PRESIGN_TTL_SECS)
            })?),
            translate_endpoint: pick(args.translate_endpoint, || {
                parsed("TRANSLATE_ENDPOINT", "https://translation.googleapis.com")
            })?,
            translate_api_key: match args.translate_api_key {
                Some(key) => Some(key),
                None => lookup("TRANSLATE_API_KEY")?,
            }
            .filter(|s| !s.is_empty()),
            max_upload_bytes: pick(args.max_upload_bytes, || {
                number(&lookup, "MAX_UPLOAD_BYTES", 500 * 1024 * 1024)
            })?,
            poll_interval: Duration::from_secs(
                pick(args.poll_interval_secs, || {
                    number(&lookup, "POLL_INTERVAL_SECS", 60)
                })?
                .max(1),
            ),
            poll_batch_size: pick(args.poll_batch_size, || {
                number(&lookup, "POLL_BATCH_SIZE", 50)
            })?
            .max(1),
            admin_email: pick(args.admin_email, || parsed("ADMIN_EMAIL", "admin"))?
                .trim()
                .to_string(),
            admin_password: match args.admin_password {
                Some(password) => Some(password),
                None => lookup("ADMIN_PASSWORD")?,
            }
            .filter(|s| !s.is_empty()),
        };

        let mode = if args.migrate {
            Mode::Migrate
        } else if args.poll {
            Mode::Poll
        } else {
            Mode::Serve
        };
        Ok((cfg, mode))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// Secrets stay out of the startup log.
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("storage_dir", &self.storage_dir)
            .field("database_url", &self.database_url)
            .field("base_url", &self.base_url)
            .field("signing_secret", &self.signing_secret.as_ref().map(|_| "<set>"))
            .field("presign_ttl", &self.presign_ttl)
            .field("translate_endpoint", &self.translate_endpoint)
            .field("translate_api_key", &self.translate_api_key.as_ref().map(|_| "<set>"))
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("poll_interval", &self.poll_interval)
            .field("poll_batch_size", &self.poll_batch_size)
            .field("admin_email", &self.admin_email)
            .field("admin_password", &self.admin_password.as_ref().map(|_| "<set>"))
            .finish()
    }
}

fn pick<T>(cli: Option<T>, fallback: impl FnOnce() -> Result<T>) -> Result<T> {
    match cli {
        Some(value) => Ok(value),
        None => fallback(),
    }
}

fn number<T, L>(lookup: &L, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    L: Fn(&str) -> Result<Option<String>>,
{
    match lookup(name)? {
        Some(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("parsing {ENV_PREFIX}{} value `{}`", name, value)),
        None => Ok(default),
    }
}
