use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::error::AppError;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

/// Counts every limiter decision made by the layers below it.
pub async fn log_rate_limit_events(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let response = next.run(req).await;

    let ratelimit_after = response
        .headers()
        .get("x-ratelimit-after")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    state.rate_limit_service.log_decision(response.status(), ratelimit_after);
    response
}

/// Rejects message sends past the client's rolling-window allowance before
/// they reach a handler. Unauthenticated requests fail in the `AuthUser`
/// extractor and never use up the allowance.
pub async fn throttle_sends(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(peer) = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|ConnectInfo(addr)| addr.ip()) else {
        return AppError::InternalMsg("Missing peer address".into()).into_response();
    };

    let client = state.rate_limit_service.extractor.identify_client_ip(req.headers(), peer);

    if let Err(e) = state.rate_limit_service.send_throttle.check(client) {
        tracing::debug!(%client, "Send rejected by throttle");
        return e.into_response();
    }

    next.run(req).await
}
