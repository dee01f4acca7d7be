use crate::{config::Limits, errors::AppError};
use axum::{
    extract::{ConnectInfo, Request},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{DefaultDirectRateLimiter, DefaultKeyedRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::{net::SocketAddr, num::NonZeroU32, sync::Arc, time::Duration};

pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub fn require_bearer(headers: &HeaderMap) -> Result<&str, AppError> {
    extract_bearer(headers).ok_or(AppError::Unauthorized)
}

/// Value of one cookie from the `Cookie` request headers.
pub fn cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
        .filter(|v| !v.is_empty())
}

/// Requests without `Sec-Fetch-Site` pass (non-browser clients); browser
/// requests must be same-origin or same-site.
pub fn check_fetch_metadata(headers: &HeaderMap) -> Result<(), AppError> {
    match headers.get("sec-fetch-site").map(|v| v.to_str().unwrap_or("")) {
        None | Some("same-origin") | Some("same-site") => Ok(()),
        Some(_) => Err(AppError::FetchMetadataBlocked),
    }
}

pub async fn fetch_metadata(request: Request, next: Next) -> Response {
    if let Err(e) = check_fetch_metadata(request.headers()) {
        tracing::warn!(
            method = %request.method(),
            path = %request.uri().path(),
            site = ?request.headers().get("sec-fetch-site"),
            "blocked by fetch metadata policy"
        );
        return e.into_response();
    }
    next.run(request).await
}

/// Per-client limiters for the bearer API and for login attempts, plus a
/// process-wide ceiling. Clients are keyed by peer address.
#[derive(Clone)]
pub struct RateLimiters {
    api: Arc<DefaultKeyedRateLimiter<String>>,
    global: Arc<DefaultDirectRateLimiter>,
    login: Arc<DefaultKeyedRateLimiter<String>>,
}

impl RateLimiters {
    pub fn new(limits: &Limits) -> Self {
        let global = Quota::per_second(non_zero(limits.global_requests_per_second));
        Self {
            api: Arc::new(RateLimiter::keyed(windowed(limits.api_requests, limits.api_window_secs))),
            global: Arc::new(RateLimiter::direct(global)),
            login: Arc::new(RateLimiter::keyed(windowed(limits.login_attempts, limits.login_window_secs))),
        }
    }

    /// Checked before the bearer token is looked up, so guessing tokens
    /// spends the same budget as using a valid one.
    pub fn check_api(&self, client: &str) -> Result<(), AppError> {
        self.global.check().map_err(|_| AppError::RateLimited)?;
        self.api.check_key(&client.to_string()).map_err(|_| AppError::RateLimited)
    }

    pub fn check_login(&self, client: &str) -> Result<(), AppError> {
        self.global.check().map_err(|_| AppError::RateLimited)?;
        self.login.check_key(&client.to_string()).map_err(|_| AppError::RateLimited)
    }

    /// Drop keys whose budget has fully replenished. Returns how many keys
    /// are still tracked.
    pub fn prune(&self) -> usize {
        self.api.retain_recent();
        self.api.shrink_to_fit();
        self.login.retain_recent();
        self.login.shrink_to_fit();
        self.tracked()
    }

    pub fn tracked(&self) -> usize {
        self.api.len() + self.login.len()
    }
}

/// Rate-limit key for a request: the peer IP, or `"unknown"` when the
/// server runs without connect info.
pub fn client_key(connect: Option<ConnectInfo<SocketAddr>>) -> String {
    connect
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn non_zero(n: u32) -> NonZeroU32 {
    NonZeroU32::new(n).unwrap_or(nonzero!(1u32))
}

/// `attempts` per `window`, all of which may be spent at once.
fn windowed(attempts: u32, window: Duration) -> Quota {
    let attempts = non_zero(attempts);
    let period = window / attempts.get();
    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(attempts))
        .allow_burst(attempts)
}
