use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use chrono::Utc;
use serde::Deserialize;

use crate::handlers::response::{ApiResponse, ApiResult};
use crate::refresh::UrlMetadata;
use crate::signing::{UrlSigner, VerifiedLink};

#[derive(Debug, Deserialize)]
pub struct IssueParams {
    /// Override the configured lifetime, in seconds
    pub ttl: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct LinkParams {
    pub se: Option<String>,
    pub sig: Option<String>,
}

/// GET /api/blobs/url/*path - issue a freshly signed link
pub async fn issue_url(
    State(signer): State<Arc<UrlSigner>>,
    Path(path): Path<String>,
    Query(params): Query<IssueParams>,
) -> ApiResult<UrlMetadata> {
    let metadata = match params.ttl {
        Some(ttl) => signer.with_ttl(Duration::from_secs(ttl))?.sign(&path)?,
        None => signer.sign(&path)?,
    };

    tracing::info!(
        "Issued link for {} expiring {:?}",
        path,
        metadata.expires_at.map(|at| at.to_rfc3339())
    );
    Ok(ApiResponse::success(metadata).no_store())
}

/// GET /blobs/*path?se=&sig= - check a link issued by `issue_url`
pub async fn verify_link(
    State(signer): State<Arc<UrlSigner>>,
    Path(path): Path<String>,
    Query(params): Query<LinkParams>,
) -> ApiResult<VerifiedLink> {
    let verified = signer
        .verify_parts(&path, params.se.as_deref(), params.sig.as_deref(), Utc::now())
        .map_err(|e| {
            tracing::debug!("Rejected link for {}: {}", path, e);
            e
        })?;

    Ok(ApiResponse::success(verified))
}
