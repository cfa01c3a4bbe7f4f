// Blob link routes
//
// /api/blobs/url/*path issues links and /blobs/*path checks them. The signer
// is the only shared state.

pub mod blobs;
pub mod response;

use std::sync::Arc;

use axum::{routing::get, Router};

use crate::signing::UrlSigner;

pub use response::{ApiResponse, ApiResult};

pub fn blob_routes(signer: Arc<UrlSigner>) -> Router {
    Router::new()
        .route("/api/blobs/url/*path", get(blobs::issue_url))
        .route("/blobs/*path", get(blobs::verify_link))
        .with_state(signer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    fn signer() -> Arc<UrlSigner> {
        Arc::new(UrlSigner::new("router-test-secret", "http://blobs.test/blobs", Duration::from_secs(600)).unwrap())
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, Option<String>, Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let cache = response
            .headers()
            .get(header::CACHE_CONTROL)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, cache, serde_json::from_slice(&bytes).unwrap())
    }

    fn path_and_query(link: &str) -> String {
        let url = url::Url::parse(link).unwrap();
        format!("{}?{}", url.path(), url.query().unwrap())
    }

    #[tokio::test]
    async fn issues_uncacheable_links() {
        let (status, cache, body) = get_json(blob_routes(signer()), "/api/blobs/url/members/logo.png").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(cache.as_deref(), Some("no-store"));
        assert_eq!(body["success"], true);
        assert!(body["data"]["url"]
            .as_str()
            .unwrap()
            .starts_with("http://blobs.test/blobs/members/logo.png?se="));
        assert_eq!(body["data"]["expiresIn"], 600);
        assert!(body["data"]["expiresAt"].is_string());
    }

    #[tokio::test]
    async fn ttl_override_and_bounds() {
        let (status, _, body) = get_json(blob_routes(signer()), "/api/blobs/url/a.png?ttl=30").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["expiresIn"], 30);

        let (status, _, body) = get_json(blob_routes(signer()), "/api/blobs/url/a.png?ttl=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn rejects_bad_blob_paths() {
        let (status, _, body) = get_json(blob_routes(signer()), "/api/blobs/url/a%20b.png").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], true);
    }

    #[tokio::test]
    async fn verifies_issued_links() {
        let signer = signer();
        let link = signer.sign("docs/report.pdf").unwrap();

        let (status, _, body) = get_json(blob_routes(signer), &path_and_query(&link.url)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["path"], "docs/report.pdf");
        let expires_at: DateTime<Utc> = serde_json::from_value(body["data"]["expiresAt"].clone()).unwrap();
        assert_eq!(Some(expires_at), link.expires_at);
    }

    #[tokio::test]
    async fn verification_failures() {
        let signer = signer();
        let link = signer.sign("x.png").unwrap();
        let tampered = path_and_query(&link.url).replace("x.png", "y.png");
        let (status, _, body) = get_json(blob_routes(signer.clone()), &tampered).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "FORBIDDEN");

        let (status, _, body) = get_json(blob_routes(signer.clone()), "/blobs/x.png?se=123").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "MISSING_PARAMETER");
        assert_eq!(body["parameter"], "sig");

        let old = signer
            .sign_until("x.png", Utc.timestamp_opt(1_000_000, 0).unwrap())
            .unwrap();
        let (status, _, body) = get_json(blob_routes(signer), &path_and_query(&old.url)).await;
        assert_eq!(status, StatusCode::GONE);
        assert_eq!(body["code"], "LINK_EXPIRED");
    }
}
