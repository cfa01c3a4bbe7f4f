// Signed, short-lived blob links
//
// A link is `<base>/<path>?se=<unix seconds>&sig=<hex hmac>` where the MAC
// covers `"<path>\n<se>"`. The refresh manager consumes what `sign` issues.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use url::Url;

use crate::config::SigningConfig;
use crate::refresh::UrlMetadata;

type HmacSha256 = Hmac<Sha256>;

/// Longest lifetime a single link may be issued for
pub const MAX_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SigningError {
    #[error("Missing query parameter '{0}'")]
    MissingParameter(&'static str),

    #[error("Signature does not match")]
    InvalidSignature,

    #[error("Link expired at {expired_at}")]
    Expired { expired_at: DateTime<Utc> },

    #[error("Invalid blob path: {0}")]
    InvalidPath(String),

    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("Link lifetime must be between 1s and {}s, got {0}s", MAX_TTL.as_secs())]
    InvalidTtl(u64),

    #[error("Signing secret is not configured")]
    EmptySecret,
}

/// A link that passed verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedLink {
    pub path: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct UrlSigner {
    key: HmacSha256,
    base_url: Url,
    ttl: Duration,
}

impl UrlSigner {
    pub fn new(secret: &str, base_url: &str, ttl: Duration) -> Result<Self, SigningError> {
        if secret.is_empty() {
            return Err(SigningError::EmptySecret);
        }
        if ttl.is_zero() || ttl > MAX_TTL {
            return Err(SigningError::InvalidTtl(ttl.as_secs()));
        }

        let mut base = Url::parse(base_url)
            .map_err(|e| SigningError::InvalidBaseUrl(format!("{}: {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(SigningError::InvalidBaseUrl(base_url.to_string()));
        }
        // Trailing slash so `join` appends instead of replacing the last segment
        let dir = format!("{}/", base.path().trim_end_matches('/'));
        base.set_path(&dir);
        base.set_query(None);
        base.set_fragment(None);

        let key = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SigningError::EmptySecret)?;

        Ok(Self {
            key,
            base_url: base,
            ttl,
        })
    }

    pub fn from_config(config: &SigningConfig) -> Result<Self, SigningError> {
        Self::new(&config.secret, &config.base_url, Duration::from_secs(config.ttl_secs))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Same signer, different link lifetime
    pub fn with_ttl(&self, ttl: Duration) -> Result<Self, SigningError> {
        if ttl.is_zero() || ttl > MAX_TTL {
            return Err(SigningError::InvalidTtl(ttl.as_secs()));
        }
        Ok(Self {
            ttl,
            ..self.clone()
        })
    }

    pub fn sign(&self, path: &str) -> Result<UrlMetadata, SigningError> {
        self.sign_at(path, Utc::now())
    }

    /// Issue a link valid for the configured TTL starting at `now`
    pub fn sign_at(&self, path: &str, now: DateTime<Utc>) -> Result<UrlMetadata, SigningError> {
        // ttl <= MAX_TTL, checked on construction
        let ttl = chrono::Duration::seconds(self.ttl.as_secs() as i64);
        let metadata = self.sign_until(path, now + ttl)?;
        Ok(metadata.with_expires_in(self.ttl.as_secs()))
    }

    /// Issue a link expiring at `expires_at`, truncated to whole seconds
    pub fn sign_until(&self, path: &str, expires_at: DateTime<Utc>) -> Result<UrlMetadata, SigningError> {
        let path = canonical_path(path)?;
        let se = expires_at.timestamp();
        let sig = hex::encode(self.mac(&path, se).finalize().into_bytes());

        let mut url = self
            .base_url
            .join(&path)
            .map_err(|_| SigningError::InvalidPath(path.clone()))?;
        url.query_pairs_mut()
            .append_pair("se", &se.to_string())
            .append_pair("sig", &sig);

        let expires_at = Utc.timestamp_opt(se, 0).single().unwrap_or(expires_at);
        tracing::debug!("Signed {} until {}", path, expires_at);
        Ok(UrlMetadata::expiring(url.to_string(), expires_at))
    }

    /// Check a full link issued by this signer
    pub fn verify(&self, link: &str, now: DateTime<Utc>) -> Result<VerifiedLink, SigningError> {
        let parsed = Url::parse(link).map_err(|_| SigningError::InvalidPath(link.to_string()))?;
        if parsed.origin() != self.base_url.origin() {
            return Err(SigningError::InvalidPath(link.to_string()));
        }
        let path = parsed
            .path()
            .strip_prefix(self.base_url.path())
            .ok_or_else(|| SigningError::InvalidPath(parsed.path().to_string()))?;

        let mut se = None;
        let mut sig = None;
        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "se" => se = Some(value.into_owned()),
                "sig" => sig = Some(value.into_owned()),
                _ => {}
            }
        }

        self.verify_parts(path, se.as_deref(), sig.as_deref(), now)
    }

    /// Check an already split link. The signature is checked before expiry so
    /// a forged link never reports as merely expired.
    pub fn verify_parts(
        &self,
        path: &str,
        se: Option<&str>,
        sig: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<VerifiedLink, SigningError> {
        let path = canonical_path(path)?;
        let se = se
            .filter(|s| !s.is_empty())
            .ok_or(SigningError::MissingParameter("se"))?;
        let sig = sig
            .filter(|s| !s.is_empty())
            .ok_or(SigningError::MissingParameter("sig"))?;

        let se: i64 = se.parse().map_err(|_| SigningError::InvalidSignature)?;
        let provided = hex::decode(sig).map_err(|_| SigningError::InvalidSignature)?;
        self.mac(&path, se)
            .verify_slice(&provided)
            .map_err(|_| SigningError::InvalidSignature)?;

        let expires_at = Utc
            .timestamp_opt(se, 0)
            .single()
            .ok_or(SigningError::InvalidSignature)?;
        if now >= expires_at {
            return Err(SigningError::Expired { expired_at: expires_at });
        }

        Ok(VerifiedLink { path, expires_at })
    }

    fn mac(&self, path: &str, se: i64) -> HmacSha256 {
        let mut mac = self.key.clone();
        mac.update(path.as_bytes());
        mac.update(b"\n");
        mac.update(se.to_string().as_bytes());
        mac
    }
}

impl fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UrlSigner")
            .field("base_url", &self.base_url.as_str())
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

fn canonical_path(path: &str) -> Result<String, SigningError> {
    let trimmed = path.trim_matches('/');
    let valid = !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/'))
        && trimmed
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");

    if valid {
        Ok(trimmed.to_string())
    } else {
        Err(SigningError::InvalidPath(path.to_string()))
    }
}
