//! Authentication handlers

use crate::config::AdminCredentials;
use crate::error::{HostelError, HostelResult};
use crate::models::*;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use std::net::{IpAddr, SocketAddr};

use super::{reply, ApiJson, AppState};

/// Session cookie name
pub const SESSION_COOKIE: &str = "hostel_session";

/// Rate limit: max attempts per IP per hour
const MAX_LOGIN_ATTEMPTS: i64 = 10;

const INVALID_CREDENTIALS: &str = "Invalid username or password";

// =============================================================================
// Login Endpoint
// =============================================================================

pub async fn login(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    ApiJson(input): ApiJson<LoginRequest>,
) -> HostelResult<impl IntoResponse> {
    let peer_ip = peer.map(|ConnectInfo(addr)| addr.ip());
    let client_ip = get_client_ip(&headers, peer_ip, &state.trusted_proxies);

    if !check_rate_limit(&state.pool, &client_ip, "login").await? {
        tracing::warn!("Login rate limit hit for {}", client_ip);
        return Err(HostelError::RateLimited);
    }
    record_attempt(&state.pool, &client_ip, "login").await;

    // Don't reveal whether the username exists
    let user = sqlx::query_as::<_, UserAccount>(
        "SELECT * FROM users WHERE username = $1 AND is_active = true",
    )
    .bind(input.username.trim())
    .fetch_optional(&state.pool)
    .await?
    .ok_or(HostelError::Unauthorized(INVALID_CREDENTIALS))?;

    if !verify_password(&input.password, &user.password_hash)? {
        return Err(HostelError::Unauthorized(INVALID_CREDENTIALS));
    }
    if Caller::from_account(&user).is_none() {
        tracing::error!("Student account {} has no student record", user.username);
        return Err(HostelError::Unauthorized(INVALID_CREDENTIALS));
    }

    let token = generate_session_token();
    let expires_at = Utc::now() + Duration::hours(state.session_expiry_hours as i64);
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.chars().take(500).collect::<String>());

    sqlx::query(
        r#"
        INSERT INTO user_sessions (user_id, token_hash, expires_at, ip_address, user_agent)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(user.id)
    .bind(hash_token(&token))
    .bind(expires_at)
    .bind(&client_ip)
    .bind(&user_agent)
    .execute(&state.pool)
    .await?;

    let _ = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
        .bind(user.id)
        .execute(&state.pool)
        .await;

    tracing::info!("{:?} {} logged in from {}", user.role, user.username, client_ip);

    let cookie = session_cookie(
        &token,
        state.session_expiry_hours * 3600,
        state.is_production,
    );
    let (status, body) = reply(
        StatusCode::OK,
        UserAccountResponse::from(user),
        "Logged in successfully",
    );
    Ok((status, [(header::SET_COOKIE, cookie)], body))
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = extract_session_token(&headers) {
        let _ = sqlx::query("DELETE FROM user_sessions WHERE token_hash = $1")
            .bind(hash_token(&token))
            .execute(&state.pool)
            .await;
    }

    let (status, body) = reply(StatusCode::OK, (), "Logged out");
    (
        status,
        [(header::SET_COOKIE, session_cookie("", 0, state.is_production))],
        body,
    )
}

/// Get the logged-in account
pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> HostelResult<impl IntoResponse> {
    let user = validate_session(&state.pool, &headers)
        .await?
        .ok_or(HostelError::Unauthorized("Not authenticated"))?;

    Ok(reply(
        StatusCode::OK,
        UserAccountResponse::from(user),
        "Current user",
    ))
}

// =============================================================================
// Session Validation
// =============================================================================

/// Active account behind the session cookie, if any
pub async fn validate_session(
    pool: &PgPool,
    headers: &HeaderMap,
) -> HostelResult<Option<UserAccount>> {
    let Some(token) = extract_session_token(headers) else {
        return Ok(None);
    };

    let user = sqlx::query_as::<_, UserAccount>(
        r#"
        SELECT u.* FROM user_sessions s
        JOIN users u ON u.id = s.user_id
        WHERE s.token_hash = $1 AND s.expires_at > NOW() AND u.is_active = true
        "#,
    )
    .bind(hash_token(&token))
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

// =============================================================================
// Password Utilities
// =============================================================================

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, stored_hash: &str) -> HostelResult<bool> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| {
        HostelError::Internal(format!("invalid password hash in database: {}", e))
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Create the configured admin account unless an admin already exists
pub async fn bootstrap_admin(pool: &PgPool, credentials: &AdminCredentials) -> HostelResult<()> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE role = 'admin')")
            .fetch_one(pool)
            .await?;
    if exists {
        tracing::debug!("Admin account present, skipping bootstrap");
        return Ok(());
    }

    let password_hash = hash_password(&credentials.password)
        .map_err(|e| HostelError::Internal(format!("failed to hash admin password: {}", e)))?;

    sqlx::query("INSERT INTO users (username, password_hash, role) VALUES ($1, $2, $3)")
        .bind(&credentials.username)
        .bind(password_hash)
        .bind(UserRole::Admin)
        .execute(pool)
        .await?;

    tracing::info!("Created admin account {}", credentials.username);
    Ok(())
}

// =============================================================================
// Helper Functions
// =============================================================================

pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;

    for cookie in cookie_header.split(';') {
        let cookie = cookie.trim();
        if let Some(value) = cookie.strip_prefix(&format!("{}=", SESSION_COOKIE)) {
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }

    None
}

fn session_cookie(token: &str, max_age_secs: u64, secure: bool) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}{}",
        SESSION_COOKIE,
        token,
        max_age_secs,
        if secure { "; Secure" } else { "" }
    )
}

fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Client address for rate limiting. Forwarding headers are honoured only
/// when the direct peer matches a trusted proxy prefix.
pub fn get_client_ip(
    headers: &HeaderMap,
    peer: Option<IpAddr>,
    trusted_proxies: &[String],
) -> String {
    let Some(peer) = peer else {
        return "unknown".to_string();
    };
    let peer = peer.to_string();

    if trusted_proxies.iter().any(|p| peer.starts_with(p.as_str())) {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
            .map(str::trim)
            .filter(|ip| !ip.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    peer
}

async fn check_rate_limit(pool: &PgPool, ip: &str, endpoint: &str) -> HostelResult<bool> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM rate_limit_attempts
        WHERE ip_address = $1 AND endpoint = $2
        AND attempted_at > NOW() - INTERVAL '1 hour'
        "#,
    )
    .bind(ip)
    .bind(endpoint)
    .fetch_one(pool)
    .await?;

    Ok(count < MAX_LOGIN_ATTEMPTS)
}

async fn record_attempt(pool: &PgPool, ip: &str, endpoint: &str) {
    if let Err(e) = sqlx::query(
        "INSERT INTO rate_limit_attempts (ip_address, endpoint) VALUES ($1, $2)",
    )
    .bind(ip)
    .bind(endpoint)
    .execute(pool)
    .await
    {
        tracing::warn!("Failed to record login attempt: {}", e);
    }
}
