//! Input validation module

use crate::models::{
    CreateAllocation, CreateComplaint, CreateHostel, CreateRoom, RegisterStudent, RoomType,
    UpdateHostel, Warden,
};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' is too long (max {max} characters)")]
    TooLong { field: String, max: usize },

    #[error("Field '{field}' must not be negative")]
    Negative { field: String },

    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Room capacity must be between 1 and 4 (got {capacity})")]
    CapacityOutOfRange { capacity: i32 },

    #[error("Room type {room_type:?} does not match capacity {capacity}")]
    RoomTypeMismatch { room_type: RoomType, capacity: i32 },

    #[error("Invalid academic year '{0}' (expected e.g. 2024-25)")]
    InvalidAcademicYear(String),

    #[error("Room does not belong to the selected hostel")]
    RoomNotInHostel,

    #[error("Cannot change allocation status from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Student must be allocated to a hostel room before submitting a complaint")]
    NotAllocated,

    #[error("Password must be at least {min} characters")]
    WeakPassword { min: usize },
}

fn required(field: &str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    if value.len() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

fn non_negative(field: &str, value: i64) -> Result<(), ValidationError> {
    if value < 0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn validate_warden(warden: &Warden) -> Result<(), ValidationError> {
    if let Some(ref email) = warden.email {
        if !email.is_empty() && !is_valid_email(email) {
            return Err(ValidationError::InvalidEmail);
        }
    }
    if let Some(ref phone) = warden.phone {
        if phone.len() > 32 {
            return Err(ValidationError::TooLong {
                field: "warden.phone".to_string(),
                max: 32,
            });
        }
    }
    Ok(())
}

/// Validate a hostel creation request
pub fn validate_create_hostel(input: &CreateHostel) -> Result<(), ValidationError> {
    required("name", &input.name, 255)?;
    required("address", &input.address, 1000)?;
    non_negative("total_rooms", input.total_rooms.into())?;
    non_negative("total_capacity", input.total_capacity.into())?;
    validate_warden(&input.warden)
}

/// Validate a hostel metadata patch
pub fn validate_update_hostel(input: &UpdateHostel) -> Result<(), ValidationError> {
    if let Some(ref name) = input.name {
        required("name", name, 255)?;
    }
    if let Some(ref address) = input.address {
        required("address", address, 1000)?;
    }
    if let Some(total_rooms) = input.total_rooms {
        non_negative("total_rooms", total_rooms.into())?;
    }
    if let Some(total_capacity) = input.total_capacity {
        non_negative("total_capacity", total_capacity.into())?;
    }
    if let Some(ref warden) = input.warden {
        validate_warden(warden)?;
    }
    Ok(())
}

/// Validate a room creation request and resolve its room type
pub fn validate_create_room(input: &CreateRoom) -> Result<RoomType, ValidationError> {
    required("room_number", &input.room_number, 32)?;
    non_negative("rent", input.rent)?;

    let derived = RoomType::for_capacity(input.capacity).ok_or(
        ValidationError::CapacityOutOfRange {
            capacity: input.capacity,
        },
    )?;

    match input.room_type {
        Some(room_type) if room_type != derived => Err(ValidationError::RoomTypeMismatch {
            room_type,
            capacity: input.capacity,
        }),
        _ => Ok(derived),
    }
}

/// Validate an allocation request
pub fn validate_create_allocation(input: &CreateAllocation) -> Result<(), ValidationError> {
    validate_academic_year(&input.academic_year)?;
    if let Some(rent) = input.rent {
        non_negative("rent", rent)?;
    }
    if let Some(deposit) = input.security_deposit {
        non_negative("security_deposit", deposit)?;
    }
    if let Some(ref remarks) = input.remarks {
        if remarks.len() > 2000 {
            return Err(ValidationError::TooLong {
                field: "remarks".to_string(),
                max: 2000,
            });
        }
    }
    Ok(())
}

/// Academic years look like `2024-25`: a four digit start year followed by
/// the last two digits of the next year.
pub fn validate_academic_year(year: &str) -> Result<(), ValidationError> {
    let invalid = || ValidationError::InvalidAcademicYear(year.to_string());

    let (start, end) = year.split_once('-').ok_or_else(invalid)?;
    let digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
    if start.len() != 4 || end.len() != 2 || !digits(start) || !digits(end) {
        return Err(invalid());
    }
    let start: u32 = start.parse().map_err(|_| invalid())?;
    let end: u32 = end.parse().map_err(|_| invalid())?;

    if (start + 1) % 100 != end {
        return Err(invalid());
    }
    Ok(())
}

/// Validate a complaint submission
pub fn validate_create_complaint(input: &CreateComplaint) -> Result<(), ValidationError> {
    required("title", &input.title, 200)?;
    required("description", &input.description, 5000)
}

/// Validate a student registration
pub fn validate_register_student(input: &RegisterStudent) -> Result<(), ValidationError> {
    required("first_name", &input.first_name, 100)?;
    required("last_name", &input.last_name, 100)?;
    required("enrollment_no", &input.enrollment_no, 50)?;
    required("username", &input.username, 100)?;
    if input.password.len() < 8 {
        return Err(ValidationError::WeakPassword { min: 8 });
    }
    Ok(())
}

/// Simple email validation
fn is_valid_email(email: &str) -> bool {
    // Basic check: contains @ and at least one .
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return false;
    }
    let (local, domain) = (parts[0], parts[1]);

    !local.is_empty() && !domain.is_empty() && domain.contains('.') && domain.len() > 2
}
