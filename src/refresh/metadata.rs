use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Canonical description of a signed, possibly short-lived resource URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlMetadata {
    pub url: String,

    /// Absolute expiry. `None` means the URL never expires and nothing is scheduled.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_expiry"
    )]
    pub expires_at: Option<DateTime<Utc>>,

    /// Relative TTL in seconds as reported by the issuer. Informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

impl UrlMetadata {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            expires_at: None,
            expires_in: None,
        }
    }

    pub fn expiring(url: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            url: url.into(),
            expires_at: Some(expires_at),
            expires_in: None,
        }
    }

    pub fn with_expires_in(mut self, seconds: u64) -> Self {
        self.expires_in = Some(seconds);
        self
    }

    pub fn expires(&self) -> bool {
        self.expires_at.is_some()
    }
}

/// Anything a caller may hand over as "the URL": a bare string or full metadata.
/// Deserializes from either a JSON string or a JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UrlInput {
    Url(String),
    Metadata(UrlMetadata),
}

impl From<&str> for UrlInput {
    fn from(url: &str) -> Self {
        UrlInput::Url(url.to_string())
    }
}

impl From<String> for UrlInput {
    fn from(url: String) -> Self {
        UrlInput::Url(url)
    }
}

impl From<UrlMetadata> for UrlInput {
    fn from(metadata: UrlMetadata) -> Self {
        UrlInput::Metadata(metadata)
    }
}

impl From<UrlInput> for UrlMetadata {
    fn from(input: UrlInput) -> Self {
        match input {
            UrlInput::Url(url) => UrlMetadata::new(url),
            UrlInput::Metadata(metadata) => metadata,
        }
    }
}

/// Parses command-line style input: JSON (object or string) when it looks like
/// JSON, otherwise the text itself is taken as a bare URL.
impl FromStr for UrlInput {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.starts_with('{') || trimmed.starts_with('"') {
            serde_json::from_str(trimmed)
        } else {
            Ok(UrlInput::Url(trimmed.to_string()))
        }
    }
}

/// Coerce optional input into canonical metadata. Never fails.
pub fn normalize(input: Option<UrlInput>) -> Option<UrlMetadata> {
    input.map(UrlMetadata::from)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawExpiry {
    EpochMillis(i64),
    Text(String),
}

/// `expiresAt` arrives either as RFC 3339 text or as epoch milliseconds
fn deserialize_expiry<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawExpiry>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawExpiry::EpochMillis(ms)) => Utc
            .timestamp_millis_opt(ms)
            .single()
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("expiresAt out of range: {}", ms))),
        Some(RawExpiry::Text(text)) => DateTime::parse_from_rfc3339(&text)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| D::Error::custom(format!("invalid expiresAt '{}': {}", text, e))),
    }
}
