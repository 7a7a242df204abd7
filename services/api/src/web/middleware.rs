//! services/api/src/web/middleware.rs
//!
//! Identity middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use detailing_core::domain::Identity;
use detailing_core::policy::Actor;
use std::sync::Arc;
use tracing::error;

use crate::error::ApiError;
use crate::web::state::AppState;

pub const SUBJECT_HEADER: &str = "x-auth-subject";
pub const EMAIL_HEADER: &str = "x-auth-email";
pub const NAME_HEADER: &str = "x-auth-name";
pub const PHONE_HEADER: &str = "x-auth-phone";

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Reads the verified identity forwarded by the identity provider.
pub fn identity_from_headers(headers: &HeaderMap) -> Option<Identity> {
    Some(Identity {
        subject: header(headers, SUBJECT_HEADER)?,
        email: header(headers, EMAIL_HEADER),
        name: header(headers, NAME_HEADER),
        phone: header(headers, PHONE_HEADER),
    })
}

/// Middleware that maps the caller's identity to an `Actor`.
///
/// If present, the actor is inserted into request extensions for handlers to use.
/// If the identity header is missing, returns 401 Unauthorized.
pub async fn require_identity(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    // 1. Extract the identity headers
    let Some(identity) = identity_from_headers(req.headers()) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    // 2. Resolve (or provision) the internal user
    let user = match state.users.resolve(&identity).await {
        Ok(user) => user,
        Err(e) => {
            error!("Failed to resolve caller: {:?}", e);
            return ApiError::from(e).into_response();
        }
    };

    // 3. Insert the actor into request extensions
    req.extensions_mut().insert(Actor::from(&user));

    // 4. Continue to the handler
    next.run(req).await
}
