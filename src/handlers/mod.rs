//! HTTP request handlers

pub mod allocations;
pub mod auth;
pub mod complaints;
pub mod extract;
pub mod hostels;
pub mod middleware;
pub mod students;

pub use allocations::*;
pub use auth::*;
pub use complaints::*;
pub use extract::{ApiJson, ApiPath, ApiQuery};
pub use hostels::*;
pub use students::*;

use crate::models::ApiResponse;
use crate::service::HostelService;
use axum::{http::StatusCode, Json};
use sqlx::PgPool;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub service: HostelService,
    pub is_production: bool,
    /// Trusted proxy IP prefixes for X-Forwarded-For validation
    pub trusted_proxies: Vec<String>,
    pub session_expiry_hours: u64,
}

/// Successful handler output: status code plus the response envelope
pub type Reply<T> = (StatusCode, Json<ApiResponse<T>>);

pub fn reply<T>(status: StatusCode, data: T, message: &str) -> Reply<T> {
    (
        status,
        Json(ApiResponse::success(status.as_u16(), data, message)),
    )
}
