use crate::{
    authz::{authorize, Decision},
    errors::{AppError, AppResult},
    logging::Audit,
    routes::respond,
    security,
    server::AppState,
    store::{Order, Principal},
};
use axum::{
    extract::{ConnectInfo, Path, State},
    http::HeaderMap,
    response::Response,
    Json,
};
use serde_json::json;
use std::net::SocketAddr;

/// Principal behind the request's bearer token. The client's API budget is
/// spent first, whether or not the token turns out to be valid.
async fn bearer_principal(state: &AppState, client: &str, headers: &HeaderMap) -> AppResult<Principal> {
    state.rls.check_api(client)?;
    let token = security::require_bearer(headers)?;
    state
        .store
        .principal_by_token(token)
        .await
        .ok_or(AppError::Unauthorized)
}

pub async fn index(
    State(state): State<AppState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Response {
    let audit = Audit::begin("index");
    let client = security::client_key(connect);
    let result = bearer_principal(&state, &client, &headers)
        .await
        .map(|p| Json(json!({"message": "Secure Orders API", "currentUser": p.name})));
    respond(audit, result)
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Response {
    let audit = Audit::begin("orders");
    let client = security::client_key(connect);
    let result: AppResult<Json<Order>> = async {
        let principal = bearer_principal(&state, &client, &headers).await?;
        let order = match id.parse::<u64>() {
            Ok(id) => state.store.order(id).await,
            Err(_) => None,
        }
        .ok_or(AppError::NotFound)?;
        match authorize(&principal, &order) {
            Decision::Allowed => Ok(Json(order)),
            Decision::Denied(reason) => {
                tracing::info!(
                    principal = principal.id,
                    order = order.id,
                    reason = reason.code(),
                    "order access denied"
                );
                Err(AppError::Forbidden)
            }
        }
    }
    .await;
    respond(audit, result)
}
