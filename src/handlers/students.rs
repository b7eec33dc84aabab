//! Student registration

use crate::error::{HostelError, HostelResult};
use crate::handlers::auth::hash_password;
use crate::models::*;
use axum::{extract::State, http::StatusCode, Extension};

use super::{reply, ApiJson, AppState, Reply};

/// Create a student together with its login account (admin only)
pub async fn register_student(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiJson(input): ApiJson<RegisterStudent>,
) -> HostelResult<Reply<Student>> {
    if !caller.is_admin() {
        return Err(HostelError::Forbidden);
    }

    let password_hash = hash_password(&input.password)
        .map_err(|e| HostelError::Internal(format!("failed to hash password: {}", e)))?;
    let student = state
        .service
        .register_student(&caller, input, password_hash)
        .await?;

    Ok(reply(
        StatusCode::CREATED,
        student,
        "Student registered successfully",
    ))
}
