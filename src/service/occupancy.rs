//! Occupancy rules shared by every store
//!
//! Stores gather the rows an operation touches while holding their locks,
//! call into these functions and write back exactly what they return.

use crate::error::{HostelError, HostelResult};
use crate::models::*;
use crate::validation::ValidationError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// New counter values for a room, and how the hostel aggregates move with it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomChange {
    pub occupied_beds: i32,
    pub status: RoomStatus,
    pub hostel_capacity_delta: i32,
    pub hostel_rooms_delta: i32,
}

/// Everything needed to write a new allocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationPlan {
    pub bed_number: i32,
    pub rent: i64,
    pub security_deposit: i64,
    pub room_change: RoomChange,
}

/// Rows read under lock for an allocation request
pub struct AllocationFacts<'a> {
    pub student: Option<&'a Student>,
    pub hostel: Option<&'a Hostel>,
    pub room: Option<&'a Room>,
    /// Student already holds a non-cancelled allocation for the academic year
    pub student_already_allocated: bool,
    /// Beds held by active allocations in the room
    pub taken_beds: &'a [i32],
}

/// What a status change does to occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionEffect {
    /// Same status requested again
    Unchanged,
    /// Status changes, the bed stays held (or stays free)
    Keep,
    /// The allocation leaves the active set and frees its bed
    Release,
}

/// Status a room should show for a given occupancy. Rooms an admin put in
/// maintenance or reserved keep that status.
pub fn room_status_for(current: RoomStatus, occupied_beds: i32, capacity: i32) -> RoomStatus {
    match current {
        RoomStatus::Maintenance | RoomStatus::Reserved => current,
        RoomStatus::Available | RoomStatus::Occupied => {
            if occupied_beds >= capacity {
                RoomStatus::Occupied
            } else {
                RoomStatus::Available
            }
        }
    }
}

/// Choose a bed. A requested bed must exist and be free; otherwise the lowest
/// free index wins so beds freed by cancellations are reused first.
pub fn pick_bed(capacity: i32, taken: &[i32], requested: Option<i32>) -> HostelResult<i32> {
    match requested {
        Some(bed) if bed < 1 || bed > capacity => Err(HostelError::InvalidBed { bed, capacity }),
        Some(bed) if taken.contains(&bed) => Err(HostelError::BedTaken(bed)),
        Some(bed) => Ok(bed),
        None => (1..=capacity)
            .find(|bed| !taken.contains(bed))
            .ok_or(HostelError::RoomFull),
    }
}

/// Counters after one more bed in `room` is taken
pub fn occupy(room: &Room) -> HostelResult<RoomChange> {
    if room.occupied_beds >= room.capacity {
        return Err(HostelError::RoomFull);
    }
    let occupied_beds = room.occupied_beds + 1;
    let became_full = occupied_beds == room.capacity;

    Ok(RoomChange {
        occupied_beds,
        status: room_status_for(room.status, occupied_beds, room.capacity),
        hostel_capacity_delta: 1,
        hostel_rooms_delta: i32::from(became_full),
    })
}

/// Counters after one bed in `room` is freed. Never goes below zero, so a
/// room whose counter already drifted low does not drag the hostel negative.
pub fn vacate(room: &Room) -> RoomChange {
    let was_full = room.occupied_beds >= room.capacity;
    let occupied_beds = (room.occupied_beds - 1).max(0);
    let now_full = occupied_beds >= room.capacity;

    RoomChange {
        occupied_beds,
        status: room_status_for(room.status, occupied_beds, room.capacity),
        hostel_capacity_delta: occupied_beds - room.occupied_beds,
        hostel_rooms_delta: if was_full && !now_full { -1 } else { 0 },
    }
}

/// Validate an allocation request against the locked rows
pub fn plan_allocation(
    input: &CreateAllocation,
    facts: AllocationFacts<'_>,
) -> HostelResult<AllocationPlan> {
    if facts.student.is_none() {
        return Err(HostelError::NotFound("Student"));
    }
    let hostel = facts.hostel.ok_or(HostelError::NotFound("Hostel"))?;
    let room = facts.room.ok_or(HostelError::NotFound("Room"))?;

    if room.hostel_id != hostel.id {
        return Err(ValidationError::RoomNotInHostel.into());
    }
    if hostel.status != HostelStatus::Active {
        return Err(HostelError::Unavailable(format!(
            "Hostel {} is not accepting allocations",
            hostel.name
        )));
    }
    if matches!(room.status, RoomStatus::Maintenance | RoomStatus::Reserved) {
        return Err(HostelError::Unavailable(format!(
            "Room {} is not available for allocation",
            room.room_number
        )));
    }
    if facts.student_already_allocated {
        return Err(HostelError::DuplicateAllocation {
            academic_year: input.academic_year.clone(),
        });
    }

    let room_change = occupy(room)?;
    let bed_number = pick_bed(room.capacity, facts.taken_beds, input.bed_number)?;

    Ok(AllocationPlan {
        bed_number,
        rent: input.rent.unwrap_or(room.rent),
        security_deposit: input.security_deposit.unwrap_or(0),
        room_change,
    })
}

/// Decide what moving an allocation from `from` to `to` means
pub fn plan_transition(
    from: AllocationStatus,
    to: AllocationStatus,
) -> Result<TransitionEffect, ValidationError> {
    use AllocationStatus::*;

    match (from, to) {
        (a, b) if a == b => Ok(TransitionEffect::Unchanged),
        (Allocated, CheckedIn) => Ok(TransitionEffect::Keep),
        (CheckedIn, CheckedOut) => Ok(TransitionEffect::Release),
        (Allocated | CheckedIn, Cancelled) => Ok(TransitionEffect::Release),
        (CheckedOut, Cancelled) => Ok(TransitionEffect::Keep),
        (from, to) => Err(ValidationError::InvalidTransition {
            from: status_label(from).to_string(),
            to: status_label(to).to_string(),
        }),
    }
}

/// Check-in and check-out stamps after moving `current` to `status`
pub fn transition_dates(
    current: &Allocation,
    status: AllocationStatus,
    now: DateTime<Utc>,
) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    let check_in_date = match status {
        AllocationStatus::CheckedIn => Some(now),
        _ => current.check_in_date,
    };
    let check_out_date = match status {
        AllocationStatus::CheckedOut => Some(now),
        _ => current.check_out_date,
    };
    (check_in_date, check_out_date)
}

fn status_label(status: AllocationStatus) -> &'static str {
    match status {
        AllocationStatus::Allocated => "allocated",
        AllocationStatus::CheckedIn => "checked-in",
        AllocationStatus::CheckedOut => "checked-out",
        AllocationStatus::Cancelled => "cancelled",
    }
}

/// Compare recorded counters against the active allocations.
///
/// `active_beds` maps room id to the number of active allocations in it.
pub fn audit_occupancy(
    hostels: &[Hostel],
    rooms: &[Room],
    active_beds: &HashMap<Uuid, i32>,
) -> OccupancyReport {
    let mut report = OccupancyReport {
        rooms_checked: rooms.len(),
        hostels_checked: hostels.len(),
        ..Default::default()
    };

    let mut capacity_by_hostel: HashMap<Uuid, i32> = HashMap::new();
    let mut full_rooms_by_hostel: HashMap<Uuid, i32> = HashMap::new();

    for room in rooms {
        let actual = active_beds.get(&room.id).copied().unwrap_or(0);
        *capacity_by_hostel.entry(room.hostel_id).or_default() += actual;
        if actual >= room.capacity {
            *full_rooms_by_hostel.entry(room.hostel_id).or_default() += 1;
        }
        if actual != room.occupied_beds {
            report.room_drift.push(RoomDrift {
                room_id: room.id,
                room_number: room.room_number.clone(),
                recorded_beds: room.occupied_beds,
                actual_beds: actual,
            });
        }
    }

    for hostel in hostels {
        let actual_capacity = capacity_by_hostel.get(&hostel.id).copied().unwrap_or(0);
        let actual_rooms = full_rooms_by_hostel.get(&hostel.id).copied().unwrap_or(0);
        if actual_capacity != hostel.occupied_capacity || actual_rooms != hostel.occupied_rooms {
            report.hostel_drift.push(HostelDrift {
                hostel_id: hostel.id,
                name: hostel.name.clone(),
                recorded_capacity: hostel.occupied_capacity,
                actual_capacity,
                recorded_rooms: hostel.occupied_rooms,
                actual_rooms,
            });
        }
    }

    report
}
