use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tandem_types::AuthenticatedUser;

use crate::AppState;

/// Wrapper for the authenticated user stored in request extensions.
#[derive(Clone, Debug)]
pub struct AuthContext(pub AuthenticatedUser);

/// Middleware to authenticate requests via `Authorization: Bearer`.
///
/// The token is resolved against the external identity provider on every
/// request; verification failure of any kind maps to `401 Unauthorized`.
pub async fn auth_middleware(mut req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|val| val.to_str().ok())
        .and_then(|val| val.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_string();

    let state = req
        .extensions()
        .get::<Arc<AppState>>()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?
        .clone();

    let user = state
        .identity
        .verify(&token)
        .await
        .ok_or(StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(AuthContext(user));

    Ok(next.run(req).await)
}
