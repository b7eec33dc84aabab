//! Hostel service: authorization, validation and logging around the store

pub mod occupancy;


use crate::db::{HostelStore, NewAccount, NewStudent};
use crate::error::{HostelError, HostelResult};
use crate::models::*;
use crate::validation::{
    validate_create_allocation, validate_create_complaint, validate_create_hostel,
    validate_create_room, validate_register_student, validate_update_hostel, ValidationError,
};
use chrono::{DateTime, Utc};
use occupancy::room_status_for;
use std::sync::Arc;
use uuid::Uuid;

/// `resolved_date` after a complaint moves to `status`. Every `resolved`
/// update stamps the time, including one on an already resolved complaint;
/// every other status clears it.
pub fn resolved_date_for(status: ComplaintStatus, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match status {
        ComplaintStatus::Resolved => Some(now),
        _ => None,
    }
}

fn require_admin(caller: &Caller) -> HostelResult<()> {
    if caller.is_admin() {
        Ok(())
    } else {
        Err(HostelError::Forbidden)
    }
}

#[derive(Clone)]
pub struct HostelService {
    store: Arc<dyn HostelStore>,
}

impl HostelService {
    pub fn new(store: Arc<dyn HostelStore>) -> Self {
        Self { store }
    }

    // =========================================================================
    // Hostel registry
    // =========================================================================

    pub async fn create_hostel(&self, caller: &Caller, input: CreateHostel) -> HostelResult<Hostel> {
        require_admin(caller)?;
        validate_create_hostel(&input)?;

        let hostel = self.store.insert_hostel(input).await?;
        tracing::info!("Created hostel {} ({})", hostel.name, hostel.id);
        Ok(hostel)
    }

    pub async fn list_hostels(&self) -> HostelResult<Vec<Hostel>> {
        self.store.list_hostels().await
    }

    pub async fn update_hostel(
        &self,
        caller: &Caller,
        id: Uuid,
        patch: UpdateHostel,
    ) -> HostelResult<Hostel> {
        require_admin(caller)?;
        validate_update_hostel(&patch)?;

        let hostel = self
            .store
            .update_hostel(id, patch)
            .await?
            .ok_or(HostelError::NotFound("Hostel"))?;
        tracing::info!("Updated hostel {}", id);
        Ok(hostel)
    }

    pub async fn delete_hostel(&self, caller: &Caller, id: Uuid) -> HostelResult<()> {
        require_admin(caller)?;

        if !self.store.delete_hostel(id).await? {
            return Err(HostelError::NotFound("Hostel"));
        }
        tracing::info!("Deleted hostel {}", id);
        Ok(())
    }

    // =========================================================================
    // Room registry
    // =========================================================================

    pub async fn create_room(&self, caller: &Caller, mut input: CreateRoom) -> HostelResult<Room> {
        require_admin(caller)?;
        let room_type = validate_create_room(&input)?;

        // A new room has no occupants, so only the admin-managed statuses survive
        let requested = input.status.unwrap_or(RoomStatus::Available);
        input.status = Some(room_status_for(requested, 0, input.capacity));

        let room = self.store.insert_room(input, room_type).await?;
        tracing::info!(
            "Created room {} in hostel {} ({} beds)",
            room.room_number,
            room.hostel_id,
            room.capacity
        );
        Ok(room)
    }

    pub async fn list_rooms(&self, filter: RoomFilter) -> HostelResult<Vec<Room>> {
        self.store.list_rooms(filter).await
    }

    pub async fn list_rooms_by_hostel(&self, hostel_id: Uuid) -> HostelResult<Vec<Room>> {
        self.store
            .list_rooms(RoomFilter {
                hostel_id: Some(hostel_id),
                status: None,
            })
            .await
    }

    // =========================================================================
    // Students
    // =========================================================================

    pub async fn register_student(
        &self,
        caller: &Caller,
        input: RegisterStudent,
        password_hash: String,
    ) -> HostelResult<Student> {
        require_admin(caller)?;
        validate_register_student(&input)?;

        let student = self
            .store
            .insert_student(NewStudent {
                first_name: input.first_name,
                last_name: input.last_name,
                enrollment_no: input.enrollment_no,
                account: Some(NewAccount {
                    username: input.username,
                    password_hash,
                }),
            })
            .await?;
        tracing::info!("Registered student {} ({})", student.enrollment_no, student.id);
        Ok(student)
    }

    // =========================================================================
    // Allocation manager
    // =========================================================================

    pub async fn list_allocations(&self, caller: &Caller) -> HostelResult<Vec<AllocationView>> {
        self.store.list_allocations(caller.student_scope()).await
    }

    pub async fn get_allocation(&self, caller: &Caller, id: Uuid) -> HostelResult<AllocationView> {
        let view = self
            .store
            .get_allocation(id)
            .await?
            .ok_or(HostelError::NotFound("Allocation"))?;

        match caller.student_scope() {
            Some(student_id) if student_id != view.allocation.student_id => {
                Err(HostelError::Forbidden)
            }
            _ => Ok(view),
        }
    }

    pub async fn allocate_room(
        &self,
        caller: &Caller,
        input: CreateAllocation,
    ) -> HostelResult<Allocation> {
        if let Some(student_id) = caller.student_scope() {
            if student_id != input.student_id {
                return Err(HostelError::Forbidden);
            }
        }
        validate_create_allocation(&input)?;

        let allocation = self.store.allocate(input).await.map_err(|e| {
            tracing::info!("Allocation rejected: {}", e);
            e
        })?;
        tracing::info!(
            "Allocated student {} to room {} bed {} for {}",
            allocation.student_id,
            allocation.room_id,
            allocation.bed_number,
            allocation.academic_year
        );
        Ok(allocation)
    }

    pub async fn update_allocation_status(
        &self,
        caller: &Caller,
        id: Uuid,
        status: AllocationStatus,
    ) -> HostelResult<Allocation> {
        require_admin(caller)?;

        let allocation = self.store.set_allocation_status(id, status).await?;
        tracing::info!("Allocation {} is now {:?}", id, allocation.status);
        Ok(allocation)
    }

    pub async fn reconcile_occupancy(
        &self,
        caller: &Caller,
        repair: bool,
    ) -> HostelResult<OccupancyReport> {
        require_admin(caller)?;
        self.reconcile(repair).await
    }

    /// Reconcile without a caller, for the background task
    pub async fn reconcile(&self, repair: bool) -> HostelResult<OccupancyReport> {
        let report = self.store.reconcile(repair).await?;

        for drift in &report.room_drift {
            tracing::warn!(
                "Room {} records {} occupied beds, active allocations say {}",
                drift.room_number,
                drift.recorded_beds,
                drift.actual_beds
            );
        }
        for drift in &report.hostel_drift {
            tracing::warn!(
                "Hostel {} records {} beds / {} full rooms, active allocations say {} / {}",
                drift.name,
                drift.recorded_capacity,
                drift.recorded_rooms,
                drift.actual_capacity,
                drift.actual_rooms
            );
        }
        if report.repaired {
            tracing::info!(
                "Repaired occupancy counters ({} rooms, {} hostels)",
                report.room_drift.len(),
                report.hostel_drift.len()
            );
        }

        Ok(report)
    }

    // =========================================================================
    // Complaint tracker
    // =========================================================================

    pub async fn submit_complaint(
        &self,
        caller: &Caller,
        input: CreateComplaint,
    ) -> HostelResult<Complaint> {
        let Caller::Student { student_id, .. } = *caller else {
            return Err(HostelError::Forbidden);
        };
        validate_create_complaint(&input)?;

        let allocation = self
            .store
            .active_allocation(student_id)
            .await?
            .ok_or(ValidationError::NotAllocated)?;

        let complaint = self
            .store
            .insert_complaint(NewComplaint {
                student_id,
                hostel_id: allocation.hostel_id,
                room_id: Some(allocation.room_id),
                title: input.title,
                description: input.description,
                category: input.category,
                priority: input.priority,
            })
            .await?;
        tracing::info!(
            "Student {} filed {:?} complaint {}",
            student_id,
            complaint.category,
            complaint.id
        );
        Ok(complaint)
    }

    pub async fn list_complaints(&self, caller: &Caller) -> HostelResult<Vec<ComplaintView>> {
        self.store.list_complaints(caller.student_scope()).await
    }

    pub async fn update_complaint_status(
        &self,
        caller: &Caller,
        id: Uuid,
        update: UpdateComplaintStatus,
    ) -> HostelResult<Complaint> {
        require_admin(caller)?;

        let complaint = self
            .store
            .update_complaint(id, update)
            .await?
            .ok_or(HostelError::NotFound("Complaint"))?;
        tracing::info!("Complaint {} is now {:?}", id, complaint.status);
        Ok(complaint)
    }
}
