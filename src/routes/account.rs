//! Cookie-session login: `/api/login`, `/api/me`, `/api/logout`.

use crate::{
    credentials,
    errors::{AppError, AppResult},
    logging::Audit,
    routes::respond,
    security,
    server::AppState,
    session::COOKIE_NAME,
};
use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequest, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::Deserialize;
use serde_json::json;
use std::{net::SocketAddr, time::Duration};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login body as JSON or as an urlencoded form. Any body that does not parse
/// is reported as bad credentials.
pub struct LoginForm(pub LoginRequest);

#[async_trait]
impl<S> FromRequest<S> for LoginForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
        let body = if is_form {
            Form::<LoginRequest>::from_request(req, state)
                .await
                .map(|Form(body)| body)
                .map_err(|_| AppError::InvalidCredentials)?
        } else {
            Json::<LoginRequest>::from_request(req, state)
                .await
                .map(|Json(body)| body)
                .map_err(|_| AppError::InvalidCredentials)?
        };
        Ok(Self(body))
    }
}

fn cookie_header(token: &str, max_age: Duration, secure: bool) -> AppResult<HeaderValue> {
    let secure = if secure { "; Secure" } else { "" };
    let cookie = format!(
        "{COOKIE_NAME}={token}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax{secure}",
        max_age.as_secs()
    );
    HeaderValue::from_str(&cookie).map_err(|e| AppError::Internal(e.to_string()))
}

pub async fn login(
    State(state): State<AppState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    form: Result<LoginForm, AppError>,
) -> Response {
    let audit = Audit::begin("login");
    let client = security::client_key(connect);
    let result = async move {
        state.rls.check_login(&client)?;
        let LoginForm(req) = form?;
        let account = state.store.account_by_username(&req.username).await;
        let hash = account.as_ref().map(|a| a.password_hash.clone());
        let password = req.password;
        let valid = tokio::task::spawn_blocking(move || match hash {
            Some(hash) => credentials::verify_password(&password, &hash),
            None => credentials::verify_unknown_user(&password),
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
        let account = account.filter(|_| valid).ok_or(AppError::InvalidCredentials)?;
        let token = state.sessions.create(account.id);
        let cookie = cookie_header(&token, state.sessions.ttl(), state.cfg.session.cookie_secure)?;
        Ok::<_, AppError>(([(header::SET_COOKIE, cookie)], Json(json!({"success": true}))))
    }
    .await;
    respond(audit, result)
}

pub async fn me(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let audit = Audit::begin("me");
    let user_id = security::cookie(&headers, COOKIE_NAME).and_then(|t| state.sessions.lookup(t));
    let account = match user_id {
        Some(id) => state.store.account(id).await,
        None => None,
    };
    match account {
        Some(account) => {
            audit.allow();
            Json(json!({"authenticated": true, "username": account.username})).into_response()
        }
        None => {
            audit.deny(AppError::Unauthorized.code());
            (StatusCode::UNAUTHORIZED, Json(json!({"authenticated": false}))).into_response()
        }
    }
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let audit = Audit::begin("logout");
    if let Some(token) = security::cookie(&headers, COOKIE_NAME) {
        state.sessions.revoke(token);
    }
    let result = cookie_header("", Duration::ZERO, state.cfg.session.cookie_secure)
        .map(|cleared| ([(header::SET_COOKIE, cleared)], Json(json!({"success": true}))));
    respond(audit, result)
}
