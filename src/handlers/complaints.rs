//! Complaint handlers

use crate::error::HostelResult;
use crate::models::*;
use axum::{extract::State, http::StatusCode, Extension};
use uuid::Uuid;

use super::{reply, ApiJson, ApiPath, AppState, Reply};

pub async fn list_complaints(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> HostelResult<Reply<Vec<ComplaintView>>> {
    let complaints = state.service.list_complaints(&caller).await?;
    Ok(reply(
        StatusCode::OK,
        complaints,
        "Complaints fetched successfully",
    ))
}

pub async fn submit_complaint(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiJson(input): ApiJson<CreateComplaint>,
) -> HostelResult<Reply<Complaint>> {
    let complaint = state.service.submit_complaint(&caller, input).await?;
    Ok(reply(
        StatusCode::CREATED,
        complaint,
        "Complaint submitted successfully",
    ))
}

pub async fn update_complaint_status(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<UpdateComplaintStatus>,
) -> HostelResult<Reply<Complaint>> {
    let complaint = state
        .service
        .update_complaint_status(&caller, id, input)
        .await?;
    Ok(reply(StatusCode::OK, complaint, "Complaint updated successfully"))
}
