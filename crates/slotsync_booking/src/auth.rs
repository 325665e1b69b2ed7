use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use constant_time_eq::constant_time_eq;
use slotsync_common::logging::SECURITY_TARGET;
use std::sync::Arc;
use tracing::{debug, error, warn};

pub const ADMIN_AUTH_HEADER: &str = "X-Admin-Secret";

/// Shared secret guarding the administrative booking endpoints.
#[derive(Clone)]
pub struct AdminAuthState {
    pub shared_secret: Option<String>,
}

/// Rejects requests whose `X-Admin-Secret` header does not match the configured secret.
pub async fn admin_auth_middleware(
    State(auth_state): State<Arc<AdminAuthState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let expected = match auth_state.shared_secret.as_deref().filter(|s| !s.is_empty()) {
        Some(secret) => secret,
        None => {
            error!("Admin shared secret not configured; refusing {}", req.uri().path());
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server configuration error for admin auth.".to_string(),
            )
                .into_response();
        }
    };

    let provided = req
        .headers()
        .get(ADMIN_AUTH_HEADER)
        .and_then(|value| value.to_str().ok());

    match provided {
        Some(provided) if constant_time_eq(provided.as_bytes(), expected.as_bytes()) => {
            debug!("Admin request to {} authenticated", req.uri().path());
            next.run(req).await
        }
        Some(_) => {
            warn!(target: SECURITY_TARGET, "Invalid admin secret for {}", req.uri().path());
            (
                StatusCode::UNAUTHORIZED,
                "Unauthorized: Invalid credentials.".to_string(),
            )
                .into_response()
        }
        None => {
            warn!(
                target: SECURITY_TARGET,
                "Missing {} header for {}",
                ADMIN_AUTH_HEADER,
                req.uri().path()
            );
            (
                StatusCode::UNAUTHORIZED,
                format!("Unauthorized: Missing {} header.", ADMIN_AUTH_HEADER),
            )
                .into_response()
        }
    }
}
