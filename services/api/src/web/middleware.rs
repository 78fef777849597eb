//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.
//!
//! The identity provider is an external collaborator: requests arrive with
//! headers set by the auth proxy in front of this service. The middleware
//! validates their shape and exposes the identity to handlers.

use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

/// The already-authenticated identity attached to each request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
    pub name: Option<String>,
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Middleware that extracts the authenticated user from request headers.
///
/// If `x-user-id` is present and a valid UUID, inserts an [`AuthUser`] into
/// request extensions for handlers to use. Otherwise returns 401.
pub async fn require_auth(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let user_id = req
        .headers()
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let user = AuthUser {
        id: user_id,
        email: header_string(req.headers(), "x-user-email"),
        name: header_string(req.headers(), "x-user-name"),
    };

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
