//! Service error taxonomy and its mapping onto the response envelope

use crate::models::ApiResponse;
use crate::validation::ValidationError;
use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostelError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Malformed body, path or query string
    #[error("{0}")]
    BadRequest(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Room is full")]
    RoomFull,

    #[error("Student already has a hostel allocation for {academic_year}")]
    DuplicateAllocation { academic_year: String },

    #[error("Bed {bed} does not exist in a room with {capacity} beds")]
    InvalidBed { bed: i32, capacity: i32 },

    #[error("Bed {0} is already occupied")]
    BedTaken(i32),

    #[error("Room {0} already exists in this hostel")]
    DuplicateRoom(String),

    #[error("Hostel still has rooms and cannot be deleted")]
    HostelInUse,

    #[error("{0}")]
    Unavailable(String),

    #[error("A student or account with these details already exists")]
    DuplicateStudent,

    #[error("You are not allowed to access this record")]
    Forbidden,

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("Too many login attempts. Please try again later.")]
    RateLimited,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse error classes exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Authentication,
    Authorization,
    RateLimited,
    Internal,
}

impl HostelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HostelError::Validation(_)
            | HostelError::BadRequest(_)
            | HostelError::InvalidBed { .. } => ErrorKind::Validation,
            HostelError::NotFound(_) => ErrorKind::NotFound,
            HostelError::RoomFull
            | HostelError::DuplicateAllocation { .. }
            | HostelError::BedTaken(_)
            | HostelError::DuplicateRoom(_)
            | HostelError::HostelInUse
            | HostelError::Unavailable(_)
            | HostelError::DuplicateStudent => ErrorKind::Conflict,
            HostelError::Unauthorized(_) => ErrorKind::Authentication,
            HostelError::Forbidden => ErrorKind::Authorization,
            HostelError::RateLimited => ErrorKind::RateLimited,
            HostelError::Database(_) | HostelError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand back to the caller
    pub fn public_message(&self) -> String {
        match self {
            HostelError::Database(_) => "Database error".to_string(),
            HostelError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for HostelError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {}", self);
        }

        (
            status,
            Json(ApiResponse::<()>::error(status.as_u16(), self.public_message())),
        )
            .into_response()
    }
}

impl From<JsonRejection> for HostelError {
    fn from(rejection: JsonRejection) -> Self {
        HostelError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for HostelError {
    fn from(rejection: PathRejection) -> Self {
        HostelError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for HostelError {
    fn from(rejection: QueryRejection) -> Self {
        HostelError::BadRequest(rejection.body_text())
    }
}

pub type HostelResult<T> = Result<T, HostelError>;
