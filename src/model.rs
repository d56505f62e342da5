// src/model.rs

use chrono::{NaiveDate, NaiveDateTime};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde::{Deserialize, Serialize};

// --- Identifier Aliases ---

pub type EmployeeId = String;
pub type RecordId = String;
pub type JobId = String;
pub type AssignmentId = String;
pub type RequestId = String;

/// Generates a record id: millisecond timestamp plus a short random suffix,
/// so ids stay sortable while never colliding within the same millisecond.
pub fn new_record_id(now: NaiveDateTime) -> String {
    let suffix: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!("{}-{}", now.and_utc().timestamp_millis(), suffix)
}

// --- Employees and Roles ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Employee,
    Hr,
    Executive,
}

/// Capabilities resolved once per actor instead of re-deriving
/// `role == HR || role == EXECUTIVE` at every call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub can_approve: bool,
    pub can_view_all: bool,
}

impl Role {
    pub fn capabilities(&self) -> Capabilities {
        match self {
            Role::Employee => Capabilities {
                can_approve: false,
                can_view_all: false,
            },
            Role::Hr | Role::Executive => Capabilities {
                can_approve: true,
                can_view_all: true,
            },
        }
    }

    /// Non-management headcount excludes HR and Executive roles.
    pub fn is_management(&self) -> bool {
        matches!(self, Role::Hr | Role::Executive)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: EmployeeId,
    pub email: String,
    pub name_th: String,
    pub name_en: String,
    pub nickname_th: String,
    pub nickname_en: String,
    pub role: Role,
    pub position: String,
}

// --- Credentials and Daily Sessions ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub email: String,
    pub secret: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Office {
    Bangkok,
    Chonburi,
}

/// One per (employee, date); a later login on the same date overwrites the
/// office, it never appends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySession {
    pub employee_id: EmployeeId,
    pub date: NaiveDate,
    pub office: Office,
}

// --- Time Records ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordType {
    CheckIn,
    CheckOut,
}

/// Attendance classification stamped on a time record. `None` is reserved
/// for CHECK_OUT events; CHECK_IN is always NORMAL or LATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceMark {
    Normal,
    Late,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRecord {
    pub id: RecordId,
    pub email: String,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub status: AttendanceMark,
    pub timestamp: NaiveDateTime,
    pub location: String,
    pub coords: Option<Coordinates>,
}

// --- Jobs ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    NotStarted,
    InProgress,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub employee_id: EmployeeId,
    pub date: NaiveDate,
    pub customer_name: String,
    pub activity: String,
    pub status: JobStatus,
}

// --- Assignments ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    Pending,
    Accepted,
    Rejected,
}

/// What the assigner fills in; the assignment wraps this with identity and
/// lifecycle status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDescriptor {
    pub customer_name: String,
    pub activity: String,
    pub date: NaiveDate,
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: AssignmentId,
    pub employee_id: EmployeeId,
    pub customer_name: String,
    pub activity: String,
    pub date: NaiveDate,
    pub time: String,
    pub status: AssignmentStatus,
}

// --- Leave and Overtime Requests ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRequest {
    pub id: RequestId,
    pub employee_id: EmployeeId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
    pub status: RequestStatus,
}

impl LeaveRequest {
    /// Inclusive on both boundary dates.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtRequest {
    pub id: RequestId,
    pub employee_id: EmployeeId,
    pub date: NaiveDate,
    pub reason: Option<String>,
    pub status: RequestStatus,
}
