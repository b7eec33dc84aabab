//! In-process store used by the test suite
//!
//! A single mutex guards every table, so each operation observes and leaves
//! a consistent snapshot.

use super::{HostelStore, NewStudent};
use crate::error::{HostelError, HostelResult};
use crate::models::*;
use crate::service::occupancy::{
    audit_occupancy, plan_allocation, plan_transition, room_status_for, transition_dates, vacate,
    AllocationFacts, RoomChange, TransitionEffect,
};
use crate::service::resolved_date_for;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    hostels: Vec<Hostel>,
    rooms: Vec<Room>,
    students: Vec<Student>,
    usernames: HashSet<String>,
    allocations: Vec<Allocation>,
    complaints: Vec<Complaint>,
}

impl Tables {
    fn hostel_mut(&mut self, id: Uuid) -> Option<&mut Hostel> {
        self.hostels.iter_mut().find(|h| h.id == id)
    }

    fn room_mut(&mut self, id: Uuid) -> Option<&mut Room> {
        self.rooms.iter_mut().find(|r| r.id == id)
    }

    fn apply_room_change(&mut self, room_id: Uuid, change: RoomChange) {
        let now = Utc::now();
        let Some(room) = self.room_mut(room_id) else {
            return;
        };
        room.occupied_beds = change.occupied_beds;
        room.status = change.status;
        room.updated_at = now;

        let hostel_id = room.hostel_id;
        if let Some(hostel) = self.hostel_mut(hostel_id) {
            hostel.occupied_capacity = (hostel.occupied_capacity + change.hostel_capacity_delta).max(0);
            hostel.occupied_rooms = (hostel.occupied_rooms + change.hostel_rooms_delta).max(0);
            hostel.updated_at = now;
        }
    }

    fn allocation_view(&self, allocation: &Allocation) -> Option<AllocationView> {
        let student = self.students.iter().find(|s| s.id == allocation.student_id)?;
        let hostel = self.hostels.iter().find(|h| h.id == allocation.hostel_id)?;
        let room = self.rooms.iter().find(|r| r.id == allocation.room_id)?;

        Some(AllocationView {
            allocation: allocation.clone(),
            student_name: student.full_name(),
            enrollment_no: student.enrollment_no.clone(),
            hostel_name: hostel.name.clone(),
            room_number: room.room_number.clone(),
        })
    }

    fn complaint_view(&self, complaint: &Complaint) -> Option<ComplaintView> {
        let student = self.students.iter().find(|s| s.id == complaint.student_id)?;
        let hostel = self.hostels.iter().find(|h| h.id == complaint.hostel_id)?;
        let room_number = complaint
            .room_id
            .and_then(|id| self.rooms.iter().find(|r| r.id == id))
            .map(|r| r.room_number.clone());

        Some(ComplaintView {
            complaint: complaint.clone(),
            student_name: student.full_name(),
            hostel_name: hostel.name.clone(),
            room_number,
        })
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a room's recorded occupancy, bypassing the allocation rules.
    /// Lets tests simulate counters that drifted after a partial failure.
    pub async fn force_room_occupancy(&self, room_id: Uuid, occupied_beds: i32) {
        let mut tables = self.tables.lock().await;
        if let Some(room) = tables.room_mut(room_id) {
            room.occupied_beds = occupied_beds;
        }
    }
}

#[async_trait]
impl HostelStore for MemoryStore {
    async fn insert_hostel(&self, input: CreateHostel) -> HostelResult<Hostel> {
        let now = Utc::now();
        let hostel = Hostel {
            id: Uuid::new_v4(),
            name: input.name.trim().to_string(),
            hostel_type: input.hostel_type,
            total_rooms: input.total_rooms,
            total_capacity: input.total_capacity,
            occupied_rooms: 0,
            occupied_capacity: 0,
            warden: input.warden,
            facilities: input.facilities,
            address: input.address,
            status: input.status.unwrap_or(HostelStatus::Active),
            created_at: now,
            updated_at: now,
        };

        self.tables.lock().await.hostels.push(hostel.clone());
        Ok(hostel)
    }

    async fn list_hostels(&self) -> HostelResult<Vec<Hostel>> {
        let tables = self.tables.lock().await;
        Ok(tables.hostels.iter().rev().cloned().collect())
    }

    async fn update_hostel(&self, id: Uuid, patch: UpdateHostel) -> HostelResult<Option<Hostel>> {
        let mut tables = self.tables.lock().await;
        let Some(hostel) = tables.hostel_mut(id) else {
            return Ok(None);
        };

        if let Some(name) = patch.name {
            hostel.name = name.trim().to_string();
        }
        if let Some(hostel_type) = patch.hostel_type {
            hostel.hostel_type = hostel_type;
        }
        if let Some(total_rooms) = patch.total_rooms {
            hostel.total_rooms = total_rooms;
        }
        if let Some(total_capacity) = patch.total_capacity {
            hostel.total_capacity = total_capacity;
        }
        if let Some(warden) = patch.warden {
            hostel.warden = warden;
        }
        if let Some(facilities) = patch.facilities {
            hostel.facilities = facilities;
        }
        if let Some(address) = patch.address {
            hostel.address = address;
        }
        if let Some(status) = patch.status {
            hostel.status = status;
        }
        hostel.updated_at = Utc::now();

        Ok(Some(hostel.clone()))
    }

    async fn delete_hostel(&self, id: Uuid) -> HostelResult<bool> {
        let mut tables = self.tables.lock().await;
        if !tables.hostels.iter().any(|h| h.id == id) {
            return Ok(false);
        }
        if tables.rooms.iter().any(|r| r.hostel_id == id) {
            return Err(HostelError::HostelInUse);
        }
        tables.hostels.retain(|h| h.id != id);
        Ok(true)
    }

    async fn insert_room(&self, input: CreateRoom, room_type: RoomType) -> HostelResult<Room> {
        let mut tables = self.tables.lock().await;
        let room_number = input.room_number.trim().to_string();

        if !tables.hostels.iter().any(|h| h.id == input.hostel_id) {
            return Err(HostelError::NotFound("Hostel"));
        }
        if tables
            .rooms
            .iter()
            .any(|r| r.hostel_id == input.hostel_id && r.room_number == room_number)
        {
            return Err(HostelError::DuplicateRoom(room_number));
        }

        let now = Utc::now();
        let room = Room {
            id: Uuid::new_v4(),
            room_number,
            hostel_id: input.hostel_id,
            floor: input.floor,
            capacity: input.capacity,
            occupied_beds: 0,
            room_type,
            facilities: input.facilities,
            rent: input.rent,
            status: input.status.unwrap_or(RoomStatus::Available),
            created_at: now,
            updated_at: now,
        };
        tables.rooms.push(room.clone());

        if let Some(hostel) = tables.hostel_mut(input.hostel_id) {
            hostel.total_rooms += 1;
            hostel.updated_at = now;
        }

        Ok(room)
    }

    async fn list_rooms(&self, filter: RoomFilter) -> HostelResult<Vec<Room>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .rooms
            .iter()
            .rev()
            .filter(|r| filter.hostel_id.map_or(true, |id| r.hostel_id == id))
            .filter(|r| filter.status.map_or(true, |status| r.status == status))
            .cloned()
            .collect())
    }

    async fn insert_student(&self, input: NewStudent) -> HostelResult<Student> {
        let mut tables = self.tables.lock().await;
        let enrollment_no = input.enrollment_no.trim().to_string();

        if tables.students.iter().any(|s| s.enrollment_no == enrollment_no) {
            return Err(HostelError::DuplicateStudent);
        }
        if let Some(ref account) = input.account {
            if !tables.usernames.insert(account.username.trim().to_string()) {
                return Err(HostelError::DuplicateStudent);
            }
        }

        let student = Student {
            id: Uuid::new_v4(),
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            enrollment_no,
            created_at: Utc::now(),
        };
        tables.students.push(student.clone());
        Ok(student)
    }

    async fn list_allocations(
        &self,
        student_id: Option<Uuid>,
    ) -> HostelResult<Vec<AllocationView>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .allocations
            .iter()
            .rev()
            .filter(|a| student_id.map_or(true, |id| a.student_id == id))
            .filter_map(|a| tables.allocation_view(a))
            .collect())
    }

    async fn get_allocation(&self, id: Uuid) -> HostelResult<Option<AllocationView>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .allocations
            .iter()
            .find(|a| a.id == id)
            .and_then(|a| tables.allocation_view(a)))
    }

    async fn active_allocation(&self, student_id: Uuid) -> HostelResult<Option<Allocation>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .allocations
            .iter()
            .rev()
            .find(|a| a.student_id == student_id && a.status.is_active())
            .cloned())
    }

    async fn allocate(&self, input: CreateAllocation) -> HostelResult<Allocation> {
        let mut tables = self.tables.lock().await;

        let student_already_allocated = tables.allocations.iter().any(|a| {
            a.student_id == input.student_id
                && a.academic_year == input.academic_year
                && a.status != AllocationStatus::Cancelled
        });
        let taken_beds: Vec<i32> = tables
            .allocations
            .iter()
            .filter(|a| a.room_id == input.room_id && a.status.is_active())
            .map(|a| a.bed_number)
            .collect();

        let plan = plan_allocation(
            &input,
            AllocationFacts {
                student: tables.students.iter().find(|s| s.id == input.student_id),
                hostel: tables.hostels.iter().find(|h| h.id == input.hostel_id),
                room: tables.rooms.iter().find(|r| r.id == input.room_id),
                student_already_allocated,
                taken_beds: &taken_beds,
            },
        )?;

        let now = Utc::now();
        let allocation = Allocation {
            id: Uuid::new_v4(),
            student_id: input.student_id,
            hostel_id: input.hostel_id,
            room_id: input.room_id,
            bed_number: plan.bed_number,
            allocation_date: now,
            check_in_date: None,
            check_out_date: None,
            academic_year: input.academic_year,
            status: AllocationStatus::Allocated,
            rent: plan.rent,
            security_deposit: plan.security_deposit,
            remarks: input.remarks,
            created_at: now,
            updated_at: now,
        };

        tables.allocations.push(allocation.clone());
        tables.apply_room_change(input.room_id, plan.room_change);

        Ok(allocation)
    }

    async fn set_allocation_status(
        &self,
        id: Uuid,
        status: AllocationStatus,
    ) -> HostelResult<Allocation> {
        let mut tables = self.tables.lock().await;

        let current = tables
            .allocations
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or(HostelError::NotFound("Allocation"))?;

        let effect = plan_transition(current.status, status)?;
        if effect == TransitionEffect::Unchanged {
            return Ok(current);
        }

        if effect == TransitionEffect::Release {
            let change = tables
                .rooms
                .iter()
                .find(|r| r.id == current.room_id)
                .map(vacate)
                .ok_or(HostelError::NotFound("Room"))?;
            tables.apply_room_change(current.room_id, change);
        }

        let now = Utc::now();
        let (check_in_date, check_out_date) = transition_dates(&current, status, now);
        let allocation = tables
            .allocations
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(HostelError::NotFound("Allocation"))?;
        allocation.status = status;
        allocation.check_in_date = check_in_date;
        allocation.check_out_date = check_out_date;
        allocation.updated_at = now;

        Ok(allocation.clone())
    }

    async fn insert_complaint(&self, input: NewComplaint) -> HostelResult<Complaint> {
        let now = Utc::now();
        let complaint = Complaint {
            id: Uuid::new_v4(),
            student_id: input.student_id,
            hostel_id: input.hostel_id,
            room_id: input.room_id,
            title: input.title.trim().to_string(),
            description: input.description,
            category: input.category,
            priority: input.priority,
            status: ComplaintStatus::Pending,
            assigned_to: None,
            resolved_date: None,
            admin_remarks: None,
            created_at: now,
            updated_at: now,
        };

        self.tables.lock().await.complaints.push(complaint.clone());
        Ok(complaint)
    }

    async fn list_complaints(&self, student_id: Option<Uuid>) -> HostelResult<Vec<ComplaintView>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .complaints
            .iter()
            .rev()
            .filter(|c| student_id.map_or(true, |id| c.student_id == id))
            .filter_map(|c| tables.complaint_view(c))
            .collect())
    }

    async fn update_complaint(
        &self,
        id: Uuid,
        update: UpdateComplaintStatus,
    ) -> HostelResult<Option<Complaint>> {
        let mut tables = self.tables.lock().await;
        let Some(complaint) = tables.complaints.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };

        let now = Utc::now();
        complaint.resolved_date = resolved_date_for(update.status, now);
        complaint.status = update.status;
        if update.admin_remarks.is_some() {
            complaint.admin_remarks = update.admin_remarks;
        }
        if update.assigned_to.is_some() {
            complaint.assigned_to = update.assigned_to;
        }
        complaint.updated_at = now;

        Ok(Some(complaint.clone()))
    }

    async fn reconcile(&self, repair: bool) -> HostelResult<OccupancyReport> {
        let mut tables = self.tables.lock().await;

        let mut active_beds: HashMap<Uuid, i32> = HashMap::new();
        for allocation in tables.allocations.iter().filter(|a| a.status.is_active()) {
            *active_beds.entry(allocation.room_id).or_default() += 1;
        }

        let mut report = audit_occupancy(&tables.hostels, &tables.rooms, &active_beds);
        if !repair || report.is_consistent() {
            return Ok(report);
        }

        for drift in &report.room_drift {
            if let Some(room) = tables.room_mut(drift.room_id) {
                room.occupied_beds = drift.actual_beds;
                room.status = room_status_for(room.status, drift.actual_beds, room.capacity);
            }
        }
        for drift in &report.hostel_drift {
            if let Some(hostel) = tables.hostel_mut(drift.hostel_id) {
                hostel.occupied_capacity = drift.actual_capacity;
                hostel.occupied_rooms = drift.actual_rooms;
            }
        }

        report.repaired = true;
        Ok(report)
    }
}
