// src/workflow.rs
//
// Assignment acceptance and leave/overtime approval. All status transitions
// are monotonic: PENDING -> {ACCEPTED | APPROVED, REJECTED}, never
// reversible, and a non-PENDING record rejects any further transition.

use chrono::NaiveDate;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::clock::Clock;
use crate::model::*;
use crate::store::{RecordStore, StoreError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Transition not allowed: record is not pending")]
    InvalidTransition,

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct WorkflowEngine {
    store: Arc<RecordStore>,
    clock: Arc<dyn Clock>,
}

impl WorkflowEngine {
    pub fn new(store: Arc<RecordStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    // --- Assignments ---

    pub fn assign(
        &self,
        employee_id: &str,
        descriptor: TaskDescriptor,
    ) -> Result<Assignment, WorkflowError> {
        self.store.employee(employee_id)?;
        let assignment = Assignment {
            id: new_record_id(self.clock.now()),
            employee_id: employee_id.to_string(),
            customer_name: descriptor.customer_name,
            activity: descriptor.activity,
            date: descriptor.date,
            time: descriptor.time,
            status: AssignmentStatus::Pending,
        };
        self.store.put_assignment(assignment.clone());
        info!(
            "Assignment {} created for employee {}",
            assignment.id, employee_id
        );
        Ok(assignment)
    }

    /// Accept or reject a pending assignment. The referenced Job is never
    /// touched here; linking the outcome to job creation is the assigner's
    /// responsibility.
    pub fn respond(
        &self,
        assignment_id: &str,
        response: AssignmentStatus,
    ) -> Result<Assignment, WorkflowError> {
        if response == AssignmentStatus::Pending {
            return Err(WorkflowError::InvalidTransition);
        }
        let mut assignment = self.store.assignment(assignment_id)?;
        if assignment.status != AssignmentStatus::Pending {
            return Err(WorkflowError::InvalidTransition);
        }
        assignment.status = response;
        self.store.put_assignment(assignment.clone());
        info!("Assignment {} -> {:?}", assignment_id, response);
        Ok(assignment)
    }

    pub fn pending_for(&self, employee_id: &str) -> Vec<Assignment> {
        self.store
            .assignments_for(employee_id)
            .into_iter()
            .filter(|a| a.status == AssignmentStatus::Pending)
            .collect()
    }

    // --- Jobs ---

    pub fn create_job(
        &self,
        employee_id: &str,
        date: NaiveDate,
        customer_name: &str,
        activity: &str,
    ) -> Result<Job, WorkflowError> {
        self.store.employee(employee_id)?;
        let job = Job {
            id: new_record_id(self.clock.now()),
            employee_id: employee_id.to_string(),
            date,
            customer_name: customer_name.to_string(),
            activity: activity.to_string(),
            status: JobStatus::NotStarted,
        };
        self.store.put_job(job.clone());
        Ok(job)
    }

    pub fn set_job_status(&self, job_id: &str, status: JobStatus) -> Result<Job, WorkflowError> {
        let mut job = self.store.job(job_id)?;
        job.status = status;
        self.store.put_job(job.clone());
        info!("Job {} -> {:?}", job_id, status);
        Ok(job)
    }

    // --- Leave Requests ---

    pub fn submit_leave(
        &self,
        employee_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        reason: Option<String>,
    ) -> Result<LeaveRequest, WorkflowError> {
        self.store.employee(employee_id)?;
        let request = LeaveRequest {
            id: new_record_id(self.clock.now()),
            employee_id: employee_id.to_string(),
            start_date,
            end_date,
            reason,
            status: RequestStatus::Pending,
        };
        self.store.put_leave_request(request.clone());
        Ok(request)
    }

    pub fn decide_leave(
        &self,
        request_id: &str,
        decision: RequestStatus,
    ) -> Result<LeaveRequest, WorkflowError> {
        if decision == RequestStatus::Pending {
            return Err(WorkflowError::InvalidTransition);
        }
        let mut request = self.store.leave_request(request_id)?;
        if request.status != RequestStatus::Pending {
            return Err(WorkflowError::InvalidTransition);
        }
        request.status = decision;
        self.store.put_leave_request(request.clone());
        info!("Leave request {} -> {:?}", request_id, decision);
        Ok(request)
    }

    pub fn all_leave_requests(&self) -> Vec<LeaveRequest> {
        self.store.all_leave_requests()
    }

    /// True iff an APPROVED leave request's range contains the date,
    /// inclusive on both ends.
    pub fn is_on_approved_leave(&self, employee_id: &str, date: NaiveDate) -> bool {
        self.store
            .all_leave_requests()
            .iter()
            .any(|r| {
                r.employee_id == employee_id
                    && r.status == RequestStatus::Approved
                    && r.covers(date)
            })
    }

    // --- Overtime Requests ---

    pub fn submit_ot(
        &self,
        employee_id: &str,
        date: NaiveDate,
        reason: Option<String>,
    ) -> Result<OtRequest, WorkflowError> {
        self.store.employee(employee_id)?;
        let request = OtRequest {
            id: new_record_id(self.clock.now()),
            employee_id: employee_id.to_string(),
            date,
            reason,
            status: RequestStatus::Pending,
        };
        self.store.put_ot_request(request.clone());
        Ok(request)
    }

    pub fn decide_ot(
        &self,
        request_id: &str,
        decision: RequestStatus,
    ) -> Result<OtRequest, WorkflowError> {
        if decision == RequestStatus::Pending {
            return Err(WorkflowError::InvalidTransition);
        }
        let mut request = self.store.ot_request(request_id)?;
        if request.status != RequestStatus::Pending {
            return Err(WorkflowError::InvalidTransition);
        }
        request.status = decision;
        self.store.put_ot_request(request.clone());
        info!("OT request {} -> {:?}", request_id, decision);
        Ok(request)
    }

    pub fn all_ot_requests(&self) -> Vec<OtRequest> {
        self.store.all_ot_requests()
    }

    pub fn pending_ot_count(&self) -> usize {
        self.store
            .all_ot_requests()
            .iter()
            .filter(|r| r.status == RequestStatus::Pending)
            .count()
    }
}
