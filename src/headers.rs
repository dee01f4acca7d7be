//! Response header policy applied to every route.
//!
//! The static part (CSP, Permissions-Policy, HSTS and the cross-origin
//! isolation headers) is built once from configuration. Cache headers depend
//! on the request path: crawler files may be cached publicly, everything else
//! must not be stored.

use crate::config::Headers;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use http::{
    header::{
        CACHE_CONTROL, CONTENT_SECURITY_POLICY, EXPIRES, PRAGMA, REFERRER_POLICY, SERVER,
        STRICT_TRANSPORT_SECURITY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
    },
    HeaderMap, HeaderName, HeaderValue,
};
use std::sync::Arc;

pub const PERMISSIONS_POLICY: &str =
    "camera=(), microphone=(), geolocation=(), fullscreen=(self), payment=()";

const PUBLIC_CACHE_SUFFIXES: [&str; 2] = ["robots.txt", "sitemap.xml"];
const PUBLIC_CACHE: &str = "public, max-age=3600, immutable";
const NO_STORE: &str = "no-store, no-cache, must-revalidate, private";

pub fn content_security_policy(cfg: &Headers) -> String {
    let mut directives = vec![
        "default-src 'none'".to_string(),
        "script-src 'self'".to_string(),
        "style-src 'self'".to_string(),
        "img-src 'self' data:".to_string(),
        "connect-src 'self'".to_string(),
        "font-src 'self'".to_string(),
        "object-src 'none'".to_string(),
        "frame-ancestors 'none'".to_string(),
        format!("form-action {}", cfg.form_action),
        format!("base-uri {}", cfg.base_uri),
        "worker-src 'self'".to_string(),
        "manifest-src 'self'".to_string(),
        "frame-src 'none'".to_string(),
    ];
    if let Some(uri) = &cfg.report_uri {
        directives.push(format!("report-uri {uri}"));
    }
    directives.join("; ")
}

pub fn strict_transport_security(cfg: &Headers) -> String {
    let mut value = format!("max-age={}", cfg.hsts_max_age);
    if cfg.hsts_include_subdomains {
        value.push_str("; includeSubDomains");
    }
    if cfg.hsts_preload {
        value.push_str("; preload");
    }
    value
}

/// Headers added to every response, independent of the request.
pub fn build_policy(cfg: &Headers) -> anyhow::Result<Arc<HeaderMap>> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_SECURITY_POLICY, HeaderValue::from_str(&content_security_policy(cfg))?);
    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static(PERMISSIONS_POLICY),
    );
    if cfg.hsts_max_age > 0 {
        headers.insert(STRICT_TRANSPORT_SECURITY, HeaderValue::from_str(&strict_transport_security(cfg))?);
    }
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(REFERRER_POLICY, HeaderValue::from_static("no-referrer"));
    headers.insert(
        HeaderName::from_static("cross-origin-opener-policy"),
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        HeaderName::from_static("cross-origin-embedder-policy"),
        HeaderValue::from_static("require-corp"),
    );
    headers.insert(
        HeaderName::from_static("cross-origin-resource-policy"),
        HeaderValue::from_static("same-origin"),
    );
    Ok(Arc::new(headers))
}

pub fn apply_cache_policy(path: &str, headers: &mut HeaderMap) {
    if PUBLIC_CACHE_SUFFIXES.iter().any(|s| path.ends_with(s)) {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static(PUBLIC_CACHE));
        headers.remove(PRAGMA);
        headers.remove(EXPIRES);
    } else {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static(NO_STORE));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert(EXPIRES, HeaderValue::from_static("0"));
    }
}

pub async fn apply(State(policy): State<Arc<HeaderMap>>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    for (name, value) in policy.iter() {
        headers.insert(name.clone(), value.clone());
    }
    apply_cache_policy(&path, headers);
    headers.remove(SERVER);
    headers.remove("x-powered-by");
    response
}
