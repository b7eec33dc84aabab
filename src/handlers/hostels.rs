//! Hostel and room registry handlers

use crate::error::HostelResult;
use crate::models::*;
use axum::{extract::State, http::StatusCode, Extension};
use uuid::Uuid;

use super::{reply, ApiJson, ApiPath, ApiQuery, AppState, Reply};

// =============================================================================
// Hostels
// =============================================================================

pub async fn list_hostels(State(state): State<AppState>) -> HostelResult<Reply<Vec<Hostel>>> {
    let hostels = state.service.list_hostels().await?;
    Ok(reply(StatusCode::OK, hostels, "Hostels fetched successfully"))
}

pub async fn create_hostel(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiJson(input): ApiJson<CreateHostel>,
) -> HostelResult<Reply<Hostel>> {
    let hostel = state.service.create_hostel(&caller, input).await?;
    Ok(reply(StatusCode::CREATED, hostel, "Hostel created successfully"))
}

pub async fn update_hostel(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<UpdateHostel>,
) -> HostelResult<Reply<Hostel>> {
    let hostel = state.service.update_hostel(&caller, id, patch).await?;
    Ok(reply(StatusCode::OK, hostel, "Hostel updated successfully"))
}

pub async fn delete_hostel(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiPath(id): ApiPath<Uuid>,
) -> HostelResult<Reply<()>> {
    state.service.delete_hostel(&caller, id).await?;
    Ok(reply(StatusCode::OK, (), "Hostel deleted successfully"))
}

// =============================================================================
// Rooms
// =============================================================================

/// `GET /hostel/rooms?hostel_id=&status=`
pub async fn list_rooms(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<RoomFilter>,
) -> HostelResult<Reply<Vec<Room>>> {
    let rooms = state.service.list_rooms(filter).await?;
    Ok(reply(StatusCode::OK, rooms, "Rooms fetched successfully"))
}

pub async fn list_hostel_rooms(
    State(state): State<AppState>,
    ApiPath(hostel_id): ApiPath<Uuid>,
) -> HostelResult<Reply<Vec<Room>>> {
    let rooms = state.service.list_rooms_by_hostel(hostel_id).await?;
    Ok(reply(StatusCode::OK, rooms, "Rooms fetched successfully"))
}

pub async fn create_room(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiJson(input): ApiJson<CreateRoom>,
) -> HostelResult<Reply<Room>> {
    let room = state.service.create_room(&caller, input).await?;
    Ok(reply(StatusCode::CREATED, room, "Room created successfully"))
}
