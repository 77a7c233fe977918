//! Presigned object URLs.
//!
//! A presigned URL is `{base_url}/objects/{key}?expires={unix}&signature={sig}`
//! where `sig` is the URL-safe base64 HMAC-SHA256 of `"{key}\n{expires}"`.
//! The object handler verifies the pair before streaming the payload, so a
//! link grants read access to exactly one object until it expires.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use std::time::Duration;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Default lifetime of a presigned URL (7 days).
pub const DEFAULT_PRESIGN_TTL_SECS: u64 = 604_800;

/// Longest lifetime a presigned URL may have.
pub const MAX_PRESIGN_TTL_SECS: u64 = 604_800;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature does not match")]
    Invalid,
    #[error("link expired")]
    Expired,
}

/// A time-limited link to one stored object.
#[derive(Debug, Clone, Serialize)]
pub struct PresignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies object links with a shared secret.
#[derive(Clone)]
pub struct UrlSigner {
    secret: Vec<u8>,
    base_url: String,
    ttl: Duration,
}

impl UrlSigner {
    /// `ttl` is clamped to [`MAX_PRESIGN_TTL_SECS`].
    pub fn new(secret: impl AsRef<[u8]>, base_url: impl Into<String>, ttl: Duration) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ttl: ttl.min(Duration::from_secs(MAX_PRESIGN_TTL_SECS)),
        }
    }

    /// Issue a link for `key` valid for the configured TTL from now.
    pub fn presign(&self, key: &str) -> PresignedUrl {
        self.presign_at(key, Utc::now())
    }

    fn presign_at(&self, key: &str, now: DateTime<Utc>) -> PresignedUrl {
        let expires = now.timestamp() + self.ttl.as_secs() as i64;
        let signature = self.signature(key, expires);
        let expires_at = Utc
            .timestamp_opt(expires, 0)
            .single()
            .unwrap_or(now);

        PresignedUrl {
            url: format!(
                "{}/objects/{}?expires={}&signature={}",
                self.base_url, key, expires, signature
            ),
            expires_at,
        }
    }

    /// Check a link's signature and expiry.
    pub fn verify(&self, key: &str, expires: i64, signature: &str) -> Result<(), SignatureError> {
        self.verify_at(key, expires, signature, Utc::now())
    }

    fn verify_at(
        &self,
        key: &str,
        expires: i64,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<(), SignatureError> {
        let provided = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| SignatureError::Invalid)?;
        self.mac(key, expires)
            .verify_slice(&provided)
            .map_err(|_| SignatureError::Invalid)?;

        if now.timestamp() >= expires {
            return Err(SignatureError::Expired);
        }
        Ok(())
    }

    fn signature(&self, key: &str, expires: i64) -> String {
        URL_SAFE_NO_PAD.encode(self.mac(key, expires).finalize().into_bytes())
    }

    fn mac(&self, key: &str, expires: i64) -> HmacSha256 {
        // HMAC accepts keys of any length.
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .unwrap_or_else(|_| unreachable!("hmac key length is unrestricted"));
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        mac
    }
}
