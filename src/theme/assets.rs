//! Embedded static assets
//!
//! CSS, JS, icons and the PWA files are compiled into the binary. Each asset
//! carries a strong ETag (SHA-256 of its bytes) which also serves as the
//! cache-busting version in asset URLs.

use rust_embed::RustEmbed;
use sha2::{Digest, Sha256};
use std::borrow::Cow;

use crate::services::form_token::to_hex;

#[derive(RustEmbed)]
#[folder = "assets/"]
#[exclude = "*.map"]
struct StaticAssets;

/// Length of the version suffix appended to asset URLs
const VERSION_LEN: usize = 12;

#[derive(Debug, Clone)]
pub struct Asset {
    pub data: Cow<'static, [u8]>,
    /// Quoted strong ETag
    pub etag: String,
    pub content_type: &'static str,
}

/// Look up an embedded asset by its path relative to `assets/`
pub fn get(path: &str) -> Option<Asset> {
    let path = path.trim_start_matches('/');
    let file = StaticAssets::get(path)?;
    let etag = format!("\"{}\"", to_hex(&file.metadata.sha256_hash()));
    Some(Asset {
        data: file.data,
        etag,
        content_type: content_type(path),
    })
}

pub fn exists(path: &str) -> bool {
    StaticAssets::get(path.trim_start_matches('/')).is_some()
}

/// Iterate over every embedded asset path
pub fn paths() -> impl Iterator<Item = Cow<'static, str>> {
    StaticAssets::iter()
}

/// Short content hash used as the `?v=` query parameter
pub fn version(path: &str) -> Option<String> {
    let file = StaticAssets::get(path.trim_start_matches('/'))?;
    let mut hex = to_hex(&file.metadata.sha256_hash());
    hex.truncate(VERSION_LEN);
    Some(hex)
}

/// Public URL of an asset, honouring an optional CDN base URL
pub fn url(cdn_base: Option<&str>, path: &str) -> String {
    let path = path.trim_start_matches('/');
    let base = cdn_base.map(|b| b.trim_end_matches('/')).unwrap_or("");
    match version(path) {
        Some(v) => format!("{base}/static/{path}?v={v}"),
        None => format!("{base}/static/{path}"),
    }
}

/// Strong ETag for arbitrary bytes
pub fn etag_for(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    format!("\"{}\"", to_hex(&digest))
}

pub fn content_type(path: &str) -> &'static str {
    match path.rsplit('.').next().unwrap_or("") {
        "html" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" => "application/javascript; charset=utf-8",
        "json" => "application/json",
        "webmanifest" => "application/manifest+json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "webp" => "image/webp",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_stylesheet() {
        let css = get("css/site.css").expect("stylesheet is embedded");
        assert_eq!(css.content_type, "text/css; charset=utf-8");
        assert_eq!(css.etag, etag_for(&css.data));
        assert!(css.etag.starts_with('"') && css.etag.ends_with('"'));
    }

    #[test]
    fn test_leading_slash_is_ignored() {
        assert!(exists("/js/effects.js"));
        assert!(!exists("js/missing.js"));
        assert!(paths().any(|p| p == "sw.js"));
    }

    #[test]
    fn test_url_with_and_without_cdn() {
        let local = url(None, "css/site.css");
        assert!(local.starts_with("/static/css/site.css?v="));
        assert_eq!(local.len(), "/static/css/site.css?v=".len() + VERSION_LEN);

        let cdn = url(Some("https://cdn.example.com/"), "/css/site.css");
        assert!(cdn.starts_with("https://cdn.example.com/static/css/site.css?v="));

        assert_eq!(url(None, "nope.css"), "/static/nope.css");
    }

    fn js_method(source: &str, name: &str) -> String {
        let start = source
            .find(&format!("{name} = function"))
            .unwrap_or_else(|| panic!("{name} missing"));
        let len = source[start..].find("\n  };").unwrap();
        source[start..start + len].to_string()
    }

    #[test]
    fn test_effects_teardown_matches_controllers() {
        let js = get("js/effects.js").unwrap();
        let js = std::str::from_utf8(&js.data).unwrap();

        let parallax_disable = js_method(js, "Parallax.prototype.disable");
        assert!(parallax_disable.contains("cancelAnimationFrame(this.frame)"));
        assert!(js_method(js, "Parallax.prototype.apply").contains("if (!this.enabled) return;"));

        // Ripples are tracked so teardown removes them before their timeout
        assert!(js_method(js, "Cursor.prototype.onDown").contains("ripples.push"));
        assert!(js_method(js, "Cursor.prototype.disable").contains("this.clearRipples()"));
        let destroy = js_method(js, "Cursor.prototype.destroy");
        assert!(destroy.contains("this.clearRipples()"));
        assert!(destroy.contains("body.classList.remove(CLICKING_CLASS)"));
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type("manifest.webmanifest"), "application/manifest+json");
        assert_eq!(content_type("icons/icon.svg"), "image/svg+xml");
        assert_eq!(content_type("LICENSE"), "application/octet-stream");
    }
}
