//! Allocation handlers

use crate::error::HostelResult;
use crate::models::*;
use axum::{extract::State, http::StatusCode, Extension};
use uuid::Uuid;

use super::{reply, ApiJson, ApiPath, ApiQuery, AppState, Reply};

/// Admins see every allocation, students only their own
pub async fn list_allocations(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> HostelResult<Reply<Vec<AllocationView>>> {
    let allocations = state.service.list_allocations(&caller).await?;
    Ok(reply(
        StatusCode::OK,
        allocations,
        "Allocations fetched successfully",
    ))
}

pub async fn get_allocation(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiPath(id): ApiPath<Uuid>,
) -> HostelResult<Reply<AllocationView>> {
    let allocation = state.service.get_allocation(&caller, id).await?;
    Ok(reply(StatusCode::OK, allocation, "Allocation fetched successfully"))
}

pub async fn allocate_room(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiJson(input): ApiJson<CreateAllocation>,
) -> HostelResult<Reply<Allocation>> {
    let allocation = state.service.allocate_room(&caller, input).await?;
    Ok(reply(
        StatusCode::CREATED,
        allocation,
        "Room allocated successfully",
    ))
}

pub async fn update_allocation_status(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<UpdateAllocationStatus>,
) -> HostelResult<Reply<Allocation>> {
    let allocation = state
        .service
        .update_allocation_status(&caller, id, input.status)
        .await?;
    Ok(reply(
        StatusCode::OK,
        allocation,
        "Allocation status updated successfully",
    ))
}

/// `POST /hostel/reconcile?repair=true`
pub async fn reconcile_occupancy(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiQuery(query): ApiQuery<ReconcileQuery>,
) -> HostelResult<Reply<OccupancyReport>> {
    let report = state
        .service
        .reconcile_occupancy(&caller, query.repair)
        .await?;

    let message = match (report.is_consistent(), report.repaired) {
        (true, _) => "Occupancy counters are consistent",
        (false, true) => "Occupancy counters repaired",
        (false, false) => "Occupancy drift detected",
    };
    Ok(reply(StatusCode::OK, report, message))
}
