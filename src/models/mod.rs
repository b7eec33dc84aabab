//! Data models for the application

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "hostel_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum HostelType {
    Boys,
    Girls,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "hostel_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum HostelStatus {
    Active,
    Inactive,
    Maintenance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "room_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RoomType {
    Single,
    Double,
    Triple,
    Quad,
}

impl RoomType {
    /// Room type conventionally matching a bed count
    pub fn for_capacity(capacity: i32) -> Option<Self> {
        match capacity {
            1 => Some(RoomType::Single),
            2 => Some(RoomType::Double),
            3 => Some(RoomType::Triple),
            4 => Some(RoomType::Quad),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "room_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Available,
    Occupied,
    Maintenance,
    Reserved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "allocation_status", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum AllocationStatus {
    Allocated,
    CheckedIn,
    CheckedOut,
    Cancelled,
}

impl AllocationStatus {
    /// Whether an allocation in this status holds its bed
    pub fn is_active(self) -> bool {
        matches!(self, AllocationStatus::Allocated | AllocationStatus::CheckedIn)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "complaint_category", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ComplaintCategory {
    Maintenance,
    Cleanliness,
    Security,
    Food,
    Electricity,
    Water,
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "complaint_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ComplaintPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "complaint_status", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ComplaintStatus {
    Pending,
    InProgress,
    Resolved,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Student,
}

// =============================================================================
// Hostel
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Warden {
    #[sqlx(rename = "warden_name")]
    pub name: Option<String>,
    #[sqlx(rename = "warden_phone")]
    pub phone: Option<String>,
    #[sqlx(rename = "warden_email")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Hostel {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub hostel_type: HostelType,
    pub total_rooms: i32,
    pub total_capacity: i32,
    pub occupied_rooms: i32,
    pub occupied_capacity: i32,
    #[sqlx(flatten)]
    pub warden: Warden,
    pub facilities: Vec<String>,
    pub address: String,
    pub status: HostelStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateHostel {
    pub name: String,
    #[serde(rename = "type")]
    pub hostel_type: HostelType,
    #[serde(default)]
    pub total_rooms: i32,
    #[serde(default)]
    pub total_capacity: i32,
    #[serde(default)]
    pub warden: Warden,
    #[serde(default)]
    pub facilities: Vec<String>,
    pub address: String,
    pub status: Option<HostelStatus>,
}

/// Metadata patch for a hostel. Occupancy counters cannot be patched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateHostel {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub hostel_type: Option<HostelType>,
    pub total_rooms: Option<i32>,
    pub total_capacity: Option<i32>,
    pub warden: Option<Warden>,
    pub facilities: Option<Vec<String>>,
    pub address: Option<String>,
    pub status: Option<HostelStatus>,
}

// =============================================================================
// Room
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Room {
    pub id: Uuid,
    pub room_number: String,
    pub hostel_id: Uuid,
    pub floor: i32,
    pub capacity: i32,
    pub occupied_beds: i32,
    pub room_type: RoomType,
    pub facilities: Vec<String>,
    pub rent: i64,
    pub status: RoomStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoom {
    pub room_number: String,
    pub hostel_id: Uuid,
    #[serde(default)]
    pub floor: i32,
    pub capacity: i32,
    /// Derived from capacity when omitted
    pub room_type: Option<RoomType>,
    #[serde(default)]
    pub facilities: Vec<String>,
    pub rent: i64,
    pub status: Option<RoomStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoomFilter {
    pub hostel_id: Option<Uuid>,
    pub status: Option<RoomStatus>,
}

// =============================================================================
// Student
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub enrollment_no: String,
    pub created_at: DateTime<Utc>,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterStudent {
    pub first_name: String,
    pub last_name: String,
    pub enrollment_no: String,
    pub username: String,
    pub password: String,
}

// =============================================================================
// Allocation
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Allocation {
    pub id: Uuid,
    pub student_id: Uuid,
    pub hostel_id: Uuid,
    pub room_id: Uuid,
    pub bed_number: i32,
    pub allocation_date: DateTime<Utc>,
    pub check_in_date: Option<DateTime<Utc>>,
    pub check_out_date: Option<DateTime<Utc>>,
    pub academic_year: String,
    pub status: AllocationStatus,
    pub rent: i64,
    pub security_deposit: i64,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Allocation resolved with display fields of the student, hostel and room
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AllocationView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub allocation: Allocation,
    pub student_name: String,
    pub enrollment_no: String,
    pub hostel_name: String,
    pub room_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAllocation {
    pub student_id: Uuid,
    pub hostel_id: Uuid,
    pub room_id: Uuid,
    pub academic_year: String,
    pub bed_number: Option<i32>,
    pub rent: Option<i64>,
    pub security_deposit: Option<i64>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateAllocationStatus {
    pub status: AllocationStatus,
}

// =============================================================================
// Complaint
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Complaint {
    pub id: Uuid,
    pub student_id: Uuid,
    pub hostel_id: Uuid,
    pub room_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub category: ComplaintCategory,
    pub priority: ComplaintPriority,
    pub status: ComplaintStatus,
    pub assigned_to: Option<String>,
    pub resolved_date: Option<DateTime<Utc>>,
    pub admin_remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ComplaintView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub complaint: Complaint,
    pub student_name: String,
    pub hostel_name: String,
    pub room_number: Option<String>,
}

/// Complaint body as sent by a student. Hostel and room are never accepted
/// from the client; they come from the student's active allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateComplaint {
    pub title: String,
    pub description: String,
    pub category: ComplaintCategory,
    #[serde(default)]
    pub priority: ComplaintPriority,
}

/// Fully resolved complaint ready to persist
#[derive(Debug, Clone)]
pub struct NewComplaint {
    pub student_id: Uuid,
    pub hostel_id: Uuid,
    pub room_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub category: ComplaintCategory,
    pub priority: ComplaintPriority,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateComplaintStatus {
    pub status: ComplaintStatus,
    pub admin_remarks: Option<String>,
    pub assigned_to: Option<String>,
}

// =============================================================================
// Occupancy reconciliation
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomDrift {
    pub room_id: Uuid,
    pub room_number: String,
    pub recorded_beds: i32,
    pub actual_beds: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostelDrift {
    pub hostel_id: Uuid,
    pub name: String,
    pub recorded_capacity: i32,
    pub actual_capacity: i32,
    pub recorded_rooms: i32,
    pub actual_rooms: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OccupancyReport {
    pub rooms_checked: usize,
    pub hostels_checked: usize,
    pub room_drift: Vec<RoomDrift>,
    pub hostel_drift: Vec<HostelDrift>,
    pub repaired: bool,
}

impl OccupancyReport {
    pub fn is_consistent(&self) -> bool {
        self.room_drift.is_empty() && self.hostel_drift.is_empty()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReconcileQuery {
    #[serde(default)]
    pub repair: bool,
}

// =============================================================================
// Users and sessions
// =============================================================================

#[derive(Debug, Clone, FromRow)]
#[allow(dead_code)]
pub struct UserAccount {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub role: UserRole,
    pub student_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserAccountResponse {
    pub id: Uuid,
    pub username: String,
    pub role: UserRole,
    pub student_id: Option<Uuid>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<UserAccount> for UserAccountResponse {
    fn from(user: UserAccount) -> Self {
        Self {
            id: user.id,
            username: user.username,
            role: user.role,
            student_id: user.student_id,
            last_login_at: user.last_login_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Authenticated identity behind a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    Admin { user_id: Uuid },
    Student { user_id: Uuid, student_id: Uuid },
}

impl Caller {
    pub fn from_account(user: &UserAccount) -> Option<Self> {
        match (user.role, user.student_id) {
            (UserRole::Admin, _) => Some(Caller::Admin { user_id: user.id }),
            (UserRole::Student, Some(student_id)) => Some(Caller::Student {
                user_id: user.id,
                student_id,
            }),
            (UserRole::Student, None) => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Caller::Admin { .. })
    }

    /// Student id the caller is restricted to, `None` for admins
    pub fn student_scope(&self) -> Option<Uuid> {
        match self {
            Caller::Admin { .. } => None,
            Caller::Student { student_id, .. } => Some(*student_id),
        }
    }
}

// =============================================================================
// API Responses
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub success: bool,
    pub data: Option<T>,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(status_code: u16, data: T, message: impl Into<String>) -> Self {
        Self {
            status_code,
            success: true,
            data: Some(data),
            message: message.into(),
        }
    }

    pub fn error(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            success: false,
            data: None,
            message: message.into(),
        }
    }
}
