//! Router assembly

use crate::error::HostelError;
use crate::handlers::{self, middleware, AppState};
use crate::models::ApiResponse;
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Json, Router,
};

async fn health() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success(200, "ok", "Service is running"))
}

async fn route_not_found() -> HostelError {
    HostelError::NotFound("Route")
}

/// Routes that need a signed-in caller; `build_router` adds the session check
fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/students", post(handlers::register_student))
        .route(
            "/hostel/hostels",
            get(handlers::list_hostels).post(handlers::create_hostel),
        )
        .route(
            "/hostel/hostels/:id",
            put(handlers::update_hostel).delete(handlers::delete_hostel),
        )
        .route("/hostel/hostels/:id/rooms", get(handlers::list_hostel_rooms))
        .route(
            "/hostel/rooms",
            get(handlers::list_rooms).post(handlers::create_room),
        )
        .route(
            "/hostel/allocations",
            get(handlers::list_allocations).post(handlers::allocate_room),
        )
        .route("/hostel/allocations/:id", get(handlers::get_allocation))
        .route(
            "/hostel/allocations/:id/status",
            put(handlers::update_allocation_status),
        )
        .route("/hostel/reconcile", post(handlers::reconcile_occupancy))
        .route(
            "/hostel/complaints",
            get(handlers::list_complaints).post(handlers::submit_complaint),
        )
        .route(
            "/hostel/complaints/:id",
            put(handlers::update_complaint_status),
        )
}

/// All `/api` routes with authentication and security headers applied
pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/me", get(handlers::me));

    let protected = protected_routes()
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .nest("/api", public.merge(protected))
        .fallback(route_not_found)
        .layer(from_fn_with_state(state.clone(), middleware::security_headers))
        .with_state(state)
}
