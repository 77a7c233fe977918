//! Admin sign-in.
//!
//! An admin signs in with the configured email and password and receives an
//! HS256 JWT. Browsers keep it in the [`SESSION_COOKIE`] cookie; API clients
//! send it as `Authorization: Bearer <token>`. When no admin password is
//! configured the admin surface is open.

use axum::http::{HeaderMap, header};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use thiserror::Error;

pub const SESSION_COOKIE: &str = "vc_admin";

/// Lifetime of an admin token (4 hours).
pub const DEFAULT_SESSION_TTL_SECS: u64 = 4 * 3600;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("admin login is not configured")]
    NotConfigured,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("admin authentication required")]
    MissingToken,
    #[error("invalid or expired token")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct AdminClaims {
    sub: String,
    iat: i64,
    exp: i64,
}

struct Credentials {
    email: String,
    password_digest: [u8; 32],
}

pub struct AdminAuth {
    credentials: Option<Credentials>,
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

fn digest(password: &str) -> [u8; 32] {
    Sha256::digest(password.as_bytes()).into()
}

impl AdminAuth {
    /// A blank or missing `password` leaves the admin surface open.
    pub fn new(
        email: impl Into<String>,
        password: Option<&str>,
        secret: impl AsRef<[u8]>,
        ttl: Duration,
    ) -> Self {
        let credentials = password
            .filter(|p| !p.is_empty())
            .map(|p| Credentials {
                email: email.into(),
                password_digest: digest(p),
            });
        Self {
            credentials,
            encoding: EncodingKey::from_secret(secret.as_ref()),
            decoding: DecodingKey::from_secret(secret.as_ref()),
            ttl,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.credentials.is_some()
    }

    pub fn session_ttl(&self) -> Duration {
        self.ttl
    }

    /// Check credentials and issue a token.
    pub fn login(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let creds = self.credentials.as_ref().ok_or(AuthError::NotConfigured)?;
        // Digests are compared so the comparison time does not depend on the password.
        if email.trim() != creds.email || digest(password) != creds.password_digest {
            return Err(AuthError::InvalidCredentials);
        }
        self.issue_at(&creds.email, Utc::now())
    }

    fn issue_at(&self, email: &str, now: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = AdminClaims {
            sub: email.to_string(),
            iat: now.timestamp(),
            exp: now.timestamp() + self.ttl.as_secs() as i64,
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    /// Validate a token's signature, expiry and subject.
    pub fn verify(&self, token: &str) -> Result<(), AuthError> {
        let creds = self.credentials.as_ref().ok_or(AuthError::NotConfigured)?;
        let mut validation = Validation::new(Algorithm::HS256);
        validation.sub = Some(creds.email.clone());
        decode::<AdminClaims>(token, &self.decoding, &validation)?;
        Ok(())
    }

    /// Accept a request carrying a valid bearer token or session cookie.
    /// Every request is accepted while admin login is not configured.
    pub fn authorize(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        if !self.is_enabled() {
            return Ok(());
        }
        let token = token_from(headers).ok_or(AuthError::MissingToken)?;
        self.verify(token)
    }
}

/// Bearer token first, then the session cookie.
fn token_from(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);
    if bearer.is_some() {
        return bearer;
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
}
