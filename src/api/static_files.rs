//! Static file serving from the embedded asset bundle
//!
//! `/static/*` is long-lived and immutable (asset URLs carry a content
//! version). The PWA entry points live at the site root and are revalidated
//! on every load.

use axum::{
    body::Body,
    extract::Path,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use crate::api::middleware::{cache_control_no_cache, cache_control_static, check_if_none_match, AppState};
use crate::theme::assets::{self, Asset};

/// One year
const STATIC_MAX_AGE: u32 = 31_536_000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/static/{*path}", get(serve_static))
        .route("/manifest.webmanifest", get(manifest))
        .route("/sw.js", get(service_worker))
        .route("/robots.txt", get(robots))
}

/// GET /static/{*path}
async fn serve_static(Path(path): Path<String>, headers: HeaderMap) -> Response {
    let decoded = urlencoding::decode(&path).map(|p| p.into_owned()).unwrap_or(path);
    if decoded.split('/').any(|segment| segment == "..") {
        return StatusCode::NOT_FOUND.into_response();
    }

    match assets::get(&decoded) {
        Some(asset) => asset_response(asset, &headers, &cache_control_static(STATIC_MAX_AGE, true)),
        None => {
            tracing::debug!(path = %decoded, "static asset not found");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

async fn manifest(headers: HeaderMap) -> Response {
    root_asset("manifest.webmanifest", &headers, "public, max-age=3600")
}

/// The worker must be revalidated on every load so that updates roll out,
/// and it controls the whole origin even though it is served from the root.
async fn service_worker(headers: HeaderMap) -> Response {
    let mut response = root_asset("sw.js", &headers, cache_control_no_cache());
    response
        .headers_mut()
        .insert("service-worker-allowed", HeaderValue::from_static("/"));
    response
}

async fn robots(headers: HeaderMap) -> Response {
    root_asset("robots.txt", &headers, "public, max-age=86400")
}

fn root_asset(path: &str, headers: &HeaderMap, cache_control: &str) -> Response {
    match assets::get(path) {
        Some(asset) => asset_response(asset, headers, cache_control),
        None => {
            tracing::error!(path, "embedded asset missing from build");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

fn asset_response(asset: Asset, request_headers: &HeaderMap, cache_control: &str) -> Response {
    if let Some(not_modified) = check_if_none_match(request_headers, &asset.etag) {
        return not_modified;
    }

    let mut response = Body::from(asset.data.into_owned()).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(asset.content_type));
    if let Ok(value) = HeaderValue::from_str(cache_control) {
        headers.insert(header::CACHE_CONTROL, value);
    }
    if let Ok(value) = HeaderValue::from_str(&asset.etag) {
        headers.insert(header::ETAG, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_asset_headers() {
        let response = serve_static(Path("css/site.css".to_string()), HeaderMap::new()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/css; charset=utf-8");
        assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=31536000, immutable");
        assert!(headers[header::ETAG].to_str().unwrap().starts_with('"'));
    }

    #[tokio::test]
    async fn test_if_none_match_returns_304() {
        let etag = assets::get("css/site.css").unwrap().etag;
        let mut headers = HeaderMap::new();
        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_str(&etag).unwrap());

        let response = serve_static(Path("css/site.css".to_string()), headers).await;
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    }

    #[tokio::test]
    async fn test_traversal_and_missing() {
        let response = serve_static(Path("../Cargo.toml".to_string()), HeaderMap::new()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = serve_static(Path("nope.css".to_string()), HeaderMap::new()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_service_worker_scope() {
        let response = service_worker(HeaderMap::new()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["service-worker-allowed"], "/");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache, no-store, must-revalidate");
    }
}
