// src/store.rs
//
// Single source-of-truth record store. Keyed collections behind per-collection
// locks; every operation acquires at most one lock and mutates under it, so a
// single record is never observed half-written. Cross-collection reads (the
// aggregation layer) may see a torn snapshot across employees, which the
// service model accepts.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

use crate::model::*;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Employee not found: {employee_id}")]
    EmployeeNotFound { employee_id: String },

    #[error("Assignment not found: {assignment_id}")]
    AssignmentNotFound { assignment_id: String },

    #[error("Request not found: {request_id}")]
    RequestNotFound { request_id: String },

    #[error("Job not found: {job_id}")]
    JobNotFound { job_id: String },
}

#[derive(Default)]
pub struct RecordStore {
    employees: Mutex<HashMap<EmployeeId, Employee>>,
    // Ledger keyed by email: append-only, queried in timestamp-descending order.
    time_records: Mutex<HashMap<String, Vec<TimeRecord>>>,
    jobs: Mutex<HashMap<JobId, Job>>,
    assignments: Mutex<HashMap<AssignmentId, Assignment>>,
    leave_requests: Mutex<HashMap<RequestId, LeaveRequest>>,
    ot_requests: Mutex<HashMap<RequestId, OtRequest>>,
    daily_sessions: Mutex<HashMap<(EmployeeId, NaiveDate), DailySession>>,
    credentials: Mutex<HashMap<String, Credential>>,
    remembered: Mutex<Option<Credential>>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Employees ---

    pub fn upsert_employee(&self, employee: Employee) {
        let mut guard = self.employees.lock().unwrap();
        guard.insert(employee.id.clone(), employee);
    }

    pub fn employee(&self, employee_id: &str) -> Result<Employee, StoreError> {
        let guard = self.employees.lock().unwrap();
        guard
            .get(employee_id)
            .cloned()
            .ok_or_else(|| StoreError::EmployeeNotFound {
                employee_id: employee_id.to_string(),
            })
    }

    pub fn employee_by_email(&self, email: &str) -> Option<Employee> {
        let guard = self.employees.lock().unwrap();
        guard.values().find(|e| e.email == email).cloned()
    }

    pub fn all_employees(&self) -> Vec<Employee> {
        let guard = self.employees.lock().unwrap();
        guard.values().cloned().collect()
    }

    // --- Time Record Ledger ---

    pub fn append_time_record(&self, record: TimeRecord) {
        let mut guard = self.time_records.lock().unwrap();
        guard.entry(record.email.clone()).or_default().push(record);
    }

    /// Full history, newest first. Ordered by an explicit timestamp sort
    /// rather than insertion position, so an out-of-order insert can never
    /// change what "latest" means.
    pub fn time_history(&self, email: &str) -> Vec<TimeRecord> {
        let guard = self.time_records.lock().unwrap();
        let mut records = guard.get(email).cloned().unwrap_or_default();
        drop(guard);
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records
    }

    /// The newest record only; `None` for an employee with no history yet.
    pub fn latest_record(&self, email: &str) -> Option<TimeRecord> {
        let guard = self.time_records.lock().unwrap();
        guard
            .get(email)
            .and_then(|records| records.iter().max_by_key(|r| r.timestamp))
            .cloned()
    }

    // --- Jobs ---

    pub fn put_job(&self, job: Job) {
        let mut guard = self.jobs.lock().unwrap();
        guard.insert(job.id.clone(), job);
    }

    pub fn job(&self, job_id: &str) -> Result<Job, StoreError> {
        let guard = self.jobs.lock().unwrap();
        guard
            .get(job_id)
            .cloned()
            .ok_or_else(|| StoreError::JobNotFound {
                job_id: job_id.to_string(),
            })
    }

    pub fn all_jobs(&self) -> Vec<Job> {
        let guard = self.jobs.lock().unwrap();
        guard.values().cloned().collect()
    }

    pub fn jobs_for(&self, employee_id: &str) -> Vec<Job> {
        let guard = self.jobs.lock().unwrap();
        guard
            .values()
            .filter(|j| j.employee_id == employee_id)
            .cloned()
            .collect()
    }

    // --- Assignments ---

    pub fn put_assignment(&self, assignment: Assignment) {
        let mut guard = self.assignments.lock().unwrap();
        guard.insert(assignment.id.clone(), assignment);
    }

    pub fn assignment(&self, assignment_id: &str) -> Result<Assignment, StoreError> {
        let guard = self.assignments.lock().unwrap();
        guard
            .get(assignment_id)
            .cloned()
            .ok_or_else(|| StoreError::AssignmentNotFound {
                assignment_id: assignment_id.to_string(),
            })
    }

    pub fn assignments_for(&self, employee_id: &str) -> Vec<Assignment> {
        let guard = self.assignments.lock().unwrap();
        guard
            .values()
            .filter(|a| a.employee_id == employee_id)
            .cloned()
            .collect()
    }

    // --- Leave / Overtime Requests ---

    pub fn put_leave_request(&self, request: LeaveRequest) {
        let mut guard = self.leave_requests.lock().unwrap();
        guard.insert(request.id.clone(), request);
    }

    pub fn leave_request(&self, request_id: &str) -> Result<LeaveRequest, StoreError> {
        let guard = self.leave_requests.lock().unwrap();
        guard
            .get(request_id)
            .cloned()
            .ok_or_else(|| StoreError::RequestNotFound {
                request_id: request_id.to_string(),
            })
    }

    pub fn all_leave_requests(&self) -> Vec<LeaveRequest> {
        let guard = self.leave_requests.lock().unwrap();
        guard.values().cloned().collect()
    }

    pub fn put_ot_request(&self, request: OtRequest) {
        let mut guard = self.ot_requests.lock().unwrap();
        guard.insert(request.id.clone(), request);
    }

    pub fn ot_request(&self, request_id: &str) -> Result<OtRequest, StoreError> {
        let guard = self.ot_requests.lock().unwrap();
        guard
            .get(request_id)
            .cloned()
            .ok_or_else(|| StoreError::RequestNotFound {
                request_id: request_id.to_string(),
            })
    }

    pub fn all_ot_requests(&self) -> Vec<OtRequest> {
        let guard = self.ot_requests.lock().unwrap();
        guard.values().cloned().collect()
    }

    // --- Daily Sessions ---

    /// Upsert: a later login on the same date overwrites the office.
    pub fn put_daily_session(&self, session: DailySession) {
        let mut guard = self.daily_sessions.lock().unwrap();
        guard.insert((session.employee_id.clone(), session.date), session);
    }

    pub fn daily_session(&self, employee_id: &str, date: NaiveDate) -> Option<DailySession> {
        let guard = self.daily_sessions.lock().unwrap();
        guard.get(&(employee_id.to_string(), date)).cloned()
    }

    // --- Credentials ---

    pub fn put_credential(&self, credential: Credential) {
        let mut guard = self.credentials.lock().unwrap();
        guard.insert(credential.email.clone(), credential);
    }

    pub fn credential(&self, email: &str) -> Option<Credential> {
        let guard = self.credentials.lock().unwrap();
        guard.get(email).cloned()
    }

    pub fn set_remembered(&self, credential: Option<Credential>) {
        let mut guard = self.remembered.lock().unwrap();
        *guard = credential;
    }

    pub fn remembered(&self) -> Option<Credential> {
        self.remembered.lock().unwrap().clone()
    }
}
