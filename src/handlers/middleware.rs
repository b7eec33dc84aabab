//! Middleware for authentication and security headers

use crate::error::HostelError;
use crate::handlers::auth::validate_session;
use crate::handlers::AppState;
use crate::models::Caller;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

/// Resolve the session cookie into a `Caller`, available via `Extension<Caller>`
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, HostelError> {
    let user = validate_session(&state.pool, request.headers())
        .await?
        .ok_or(HostelError::Unauthorized("Not authenticated"))?;

    let caller = Caller::from_account(&user).ok_or_else(|| {
        tracing::error!("Account {} has no usable role binding", user.username);
        HostelError::Unauthorized("Account is not linked to a student")
    })?;

    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

/// Security headers middleware
pub async fn security_headers(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store"),
    );

    if state.is_production {
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=63072000; includeSubDomains"),
        );
    }

    response
}
