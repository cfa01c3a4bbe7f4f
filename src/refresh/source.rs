use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::refresh::executor::RefreshCallback;
use crate::refresh::metadata::UrlInput;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Refresh endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Refresh endpoint response has no usable url")]
    MissingUrl,

    #[error("Invalid refresh endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Refresh callback that asks an HTTP endpoint for a freshly signed URL.
///
/// Accepts a bare metadata object (`{url, expiresAt, expiresIn}`), a JSON
/// string, or the API envelope `{"success": true, "data": {...}}`.
#[derive(Debug, Clone)]
pub struct HttpUrlSource {
    client: reqwest::Client,
    endpoint: url::Url,
    bearer_token: Option<String>,
}

impl HttpUrlSource {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, SourceError> {
        let endpoint = url::Url::parse(endpoint)
            .map_err(|e| SourceError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::InvalidEndpoint(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            bearer_token: None,
        })
    }

    /// Send `Authorization: Bearer <token>` with every request
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn endpoint(&self) -> &url::Url {
        &self.endpoint
    }

    pub async fn fetch(&self) -> anyhow::Result<UrlInput> {
        let mut request = self.client.get(self.endpoint.clone());
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("requesting {}", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let body: Value = response
            .json()
            .await
            .with_context(|| format!("decoding response from {}", self.endpoint))?;
        Ok(extract_input(body)?)
    }
}

#[async_trait]
impl RefreshCallback for HttpUrlSource {
    async fn refresh(&self) -> anyhow::Result<UrlInput> {
        self.fetch().await
    }
}

/// Unwrap the `data` envelope if present and decode the URL payload
pub fn extract_input(body: Value) -> Result<UrlInput, SourceError> {
    let payload = match body {
        Value::Object(mut map) if map.contains_key("data") && !map.contains_key("url") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    };

    let input: UrlInput = serde_json::from_value(payload).map_err(|_| SourceError::MissingUrl)?;
    let empty = match &input {
        UrlInput::Url(url) => url.is_empty(),
        UrlInput::Metadata(metadata) => metadata.url.is_empty(),
    };
    if empty {
        return Err(SourceError::MissingUrl);
    }
    Ok(input)
}
