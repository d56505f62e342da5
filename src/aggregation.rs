// src/aggregation.rs
//
// Read-side statistics over the record store, recomputed on demand. No
// caching: every call re-derives from current store state. These reads scan
// across employees without locking the whole store, so they may observe a
// torn snapshot across employees but never a torn single record.

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use std::sync::Arc;

use crate::clock::Clock;
use crate::model::*;
use crate::store::RecordStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub checked_in: usize,
    pub headcount: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCompletion {
    pub done: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyJobStats {
    pub total: usize,
    pub done: usize,
    pub in_progress: usize,
    pub not_started: usize,
    pub percent_done: u32,
}

/// One row of the management roster: an employee, their first check-in of
/// today if any, and the office they logged in from (None = offline).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub employee: Employee,
    pub record: Option<TimeRecord>,
    pub office: Option<Office>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceHistoryGroup {
    pub employee: Employee,
    pub records: Vec<TimeRecord>,
}

/// Sunday-through-Saturday window containing the given date.
pub fn week_window(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = date - Duration::days(date.weekday().num_days_from_sunday() as i64);
    (start, start + Duration::days(6))
}

pub struct AggregationService {
    store: Arc<RecordStore>,
    clock: Arc<dyn Clock>,
}

impl AggregationService {
    pub fn new(store: Arc<RecordStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    fn today(&self) -> NaiveDate {
        self.clock.now().date()
    }

    /// Currently-checked-in count against non-management headcount. An
    /// employee counts only while their newest record is a CHECK_IN from
    /// today; checking out removes them again.
    pub fn today_attendance(&self) -> AttendanceSummary {
        let today = self.today();
        let staff: Vec<Employee> = self
            .store
            .all_employees()
            .into_iter()
            .filter(|e| !e.role.is_management())
            .collect();

        let checked_in = staff
            .iter()
            .filter(|e| {
                self.store
                    .latest_record(&e.email)
                    .is_some_and(|r| {
                        r.record_type == RecordType::CheckIn && r.timestamp.date() == today
                    })
            })
            .count();

        AttendanceSummary {
            checked_in,
            headcount: staff.len(),
        }
    }

    /// Today's job completion, scoped to the requester unless they can view
    /// all.
    pub fn today_job_completion(&self, requester: &Employee) -> JobCompletion {
        let today = self.today();
        let caps = requester.role.capabilities();
        let todays: Vec<Job> = self
            .store
            .all_jobs()
            .into_iter()
            .filter(|j| j.date == today && (caps.can_view_all || j.employee_id == requester.id))
            .collect();

        JobCompletion {
            done: todays.iter().filter(|j| j.status == JobStatus::Done).count(),
            total: todays.len(),
        }
    }

    pub fn approved_leave_count_today(&self) -> usize {
        let today = self.today();
        self.store
            .all_leave_requests()
            .iter()
            .filter(|r| r.status == RequestStatus::Approved && r.covers(today))
            .count()
    }

    pub fn pending_ot_count(&self) -> usize {
        self.store
            .all_ot_requests()
            .iter()
            .filter(|r| r.status == RequestStatus::Pending)
            .count()
    }

    /// Job stats over the Sunday-Saturday week containing now. Percent done
    /// is rounded to the nearest integer, 0 when there are no jobs.
    pub fn weekly_job_stats(&self, employee_id: &str) -> WeeklyJobStats {
        let (start, end) = week_window(self.today());
        let jobs: Vec<Job> = self
            .store
            .jobs_for(employee_id)
            .into_iter()
            .filter(|j| start <= j.date && j.date <= end)
            .collect();

        let total = jobs.len();
        let done = jobs.iter().filter(|j| j.status == JobStatus::Done).count();
        let in_progress = jobs
            .iter()
            .filter(|j| j.status == JobStatus::InProgress)
            .count();
        let not_started = jobs
            .iter()
            .filter(|j| j.status == JobStatus::NotStarted)
            .count();
        let percent_done = if total > 0 {
            ((done as f64 / total as f64) * 100.0).round() as u32
        } else {
            0
        };

        WeeklyJobStats {
            total,
            done,
            in_progress,
            not_started,
            percent_done,
        }
    }

    /// Busy iff any of today's jobs for the employee is not DONE.
    pub fn is_busy_today(&self, employee_id: &str) -> bool {
        let today = self.today();
        self.store
            .jobs_for(employee_id)
            .iter()
            .any(|j| j.date == today && j.status != JobStatus::Done)
    }

    /// Management roster for today: everyone except the requester, with their
    /// latest check-in of the day and login office.
    pub fn today_roster(&self, requester_id: &str) -> Vec<RosterEntry> {
        let today = self.today();
        self.store
            .all_employees()
            .into_iter()
            .filter(|e| e.id != requester_id)
            .map(|employee| {
                let record = self.latest_check_in_on(&employee.email, today);
                let office = self
                    .store
                    .daily_session(&employee.id, today)
                    .map(|s| s.office);
                RosterEntry {
                    employee,
                    record,
                    office,
                }
            })
            .collect()
    }

    /// Attendance over the trailing 30 days, grouped per employee, newest
    /// first, employees with no records omitted.
    pub fn attendance_history(&self, requester_id: &str) -> Vec<AttendanceHistoryGroup> {
        let since = self.clock.now() - Duration::days(30);
        self.store
            .all_employees()
            .into_iter()
            .filter(|e| e.id != requester_id)
            .filter_map(|employee| {
                let records: Vec<TimeRecord> = self
                    .store
                    .time_history(&employee.email)
                    .into_iter()
                    .filter(|r| r.timestamp >= since)
                    .collect();
                if records.is_empty() {
                    None
                } else {
                    Some(AttendanceHistoryGroup { employee, records })
                }
            })
            .collect()
    }

    /// Newest CHECK_IN of the given date.
    fn latest_check_in_on(&self, email: &str, date: NaiveDate) -> Option<TimeRecord> {
        self.store
            .time_history(email)
            .into_iter()
            .filter(|r| r.record_type == RecordType::CheckIn && r.timestamp.date() == date)
            .max_by_key(|r| r.timestamp)
    }
}
