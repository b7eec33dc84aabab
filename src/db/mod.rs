//! Persistence for hostels, rooms, students, allocations and complaints

#[cfg(test)]
mod memory;
mod pool;
mod postgres;

#[cfg(test)]
pub use memory::MemoryStore;
pub use pool::{create_pool, run_migrations};
pub use postgres::PgStore;

use crate::error::HostelResult;
use crate::models::*;
use async_trait::async_trait;
use uuid::Uuid;

/// Student record plus the optional login account created with it
#[derive(Debug, Clone)]
pub struct NewStudent {
    pub first_name: String,
    pub last_name: String,
    pub enrollment_no: String,
    pub account: Option<NewAccount>,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub password_hash: String,
}

/// Storage backend for the hostel service.
///
/// Operations that touch occupancy counters (`insert_room`, `allocate`,
/// `set_allocation_status`, `reconcile`) must apply all of their writes as
/// one unit: either every record changes or none does, and concurrent calls
/// behave as if run one after another.
#[async_trait]
pub trait HostelStore: Send + Sync + 'static {
    async fn insert_hostel(&self, input: CreateHostel) -> HostelResult<Hostel>;

    /// Hostels, newest first
    async fn list_hostels(&self) -> HostelResult<Vec<Hostel>>;

    async fn update_hostel(&self, id: Uuid, patch: UpdateHostel) -> HostelResult<Option<Hostel>>;

    /// Returns `false` when the hostel does not exist. Fails with
    /// `HostelInUse` while rooms still reference it.
    async fn delete_hostel(&self, id: Uuid) -> HostelResult<bool>;

    /// Insert a room and bump the parent hostel's `total_rooms`
    async fn insert_room(&self, input: CreateRoom, room_type: RoomType) -> HostelResult<Room>;

    async fn list_rooms(&self, filter: RoomFilter) -> HostelResult<Vec<Room>>;

    async fn insert_student(&self, input: NewStudent) -> HostelResult<Student>;

    /// Allocations resolved with display fields, newest first, optionally
    /// narrowed to one student
    async fn list_allocations(&self, student_id: Option<Uuid>)
        -> HostelResult<Vec<AllocationView>>;

    async fn get_allocation(&self, id: Uuid) -> HostelResult<Option<AllocationView>>;

    /// The student's allocated or checked-in allocation, most recent first
    async fn active_allocation(&self, student_id: Uuid) -> HostelResult<Option<Allocation>>;

    /// Validate and write a new allocation together with the room and hostel
    /// counters
    async fn allocate(&self, input: CreateAllocation) -> HostelResult<Allocation>;

    /// Move an allocation to a new status, releasing its bed when it leaves
    /// the active set
    async fn set_allocation_status(
        &self,
        id: Uuid,
        status: AllocationStatus,
    ) -> HostelResult<Allocation>;

    async fn insert_complaint(&self, input: NewComplaint) -> HostelResult<Complaint>;

    async fn list_complaints(&self, student_id: Option<Uuid>) -> HostelResult<Vec<ComplaintView>>;

    async fn update_complaint(
        &self,
        id: Uuid,
        update: UpdateComplaintStatus,
    ) -> HostelResult<Option<Complaint>>;

    /// Recompute occupancy counters from active allocations, writing the
    /// corrected values when `repair` is set
    async fn reconcile(&self, repair: bool) -> HostelResult<OccupancyReport>;
}
