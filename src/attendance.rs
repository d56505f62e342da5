// src/attendance.rs
//
// Check-in/out status derivation. The per-employee state machine is
// NOT_CHECKED_IN --check-in--> CHECKED_IN --check-out--> NOT_CHECKED_IN,
// judged from the newest ledger record only. LATE classification uses a
// fixed 09:00:00 cutoff: strictly after is late, at or before is normal.

use chrono::NaiveTime;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::clock::Clock;
use crate::geolocation::{GeoResolver, ResolvedLocation, ResolverSession};
use crate::model::*;
use crate::store::{RecordStore, StoreError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttendanceError {
    #[error("Employee already has an open check-in")]
    AlreadyCheckedIn,

    #[error("No open check-in to close")]
    NotCheckedIn,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Derived attendance state for an employee, read from the newest record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceState {
    NotCheckedIn,
    CheckedIn {
        status: AttendanceMark,
        since: chrono::NaiveDateTime,
    },
}

fn check_in_cutoff() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).expect("static cutoff time")
}

pub struct AttendanceEngine {
    store: Arc<RecordStore>,
    resolver: Arc<GeoResolver>,
    clock: Arc<dyn Clock>,
}

impl AttendanceEngine {
    pub fn new(store: Arc<RecordStore>, resolver: Arc<GeoResolver>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            resolver,
            clock,
        }
    }

    /// Appends a CHECK_IN record. Status is derived here, never
    /// client-supplied. Rejects a second consecutive check-in without an
    /// intervening check-out. Location resolution failures degrade to a
    /// coordinate string or the manual-entry marker; they never block the
    /// attendance event itself.
    pub async fn record_check_in(
        &self,
        session: &ResolverSession,
        employee_id: &str,
        coords: Option<Coordinates>,
        manual_location: Option<String>,
    ) -> Result<TimeRecord, AttendanceError> {
        let employee = self.store.employee(employee_id)?;

        if let Some(latest) = self.store.latest_record(&employee.email) {
            if latest.record_type == RecordType::CheckIn {
                return Err(AttendanceError::AlreadyCheckedIn);
            }
        }

        let now = self.clock.now();
        let status = if now.time() > check_in_cutoff() {
            AttendanceMark::Late
        } else {
            AttendanceMark::Normal
        };

        let record = self
            .persist_record(session, &employee, RecordType::CheckIn, status, coords, manual_location)
            .await;
        info!(
            "Check-in recorded for {} at {} ({:?})",
            employee.email, record.timestamp, record.status
        );
        Ok(record)
    }

    /// Appends a CHECK_OUT record; status is always NONE. Fails when no open
    /// check-in exists.
    pub async fn record_check_out(
        &self,
        session: &ResolverSession,
        employee_id: &str,
        coords: Option<Coordinates>,
        manual_location: Option<String>,
    ) -> Result<TimeRecord, AttendanceError> {
        let employee = self.store.employee(employee_id)?;

        match self.store.latest_record(&employee.email) {
            Some(latest) if latest.record_type == RecordType::CheckIn => {}
            _ => return Err(AttendanceError::NotCheckedIn),
        }

        let record = self
            .persist_record(
                session,
                &employee,
                RecordType::CheckOut,
                AttendanceMark::None,
                coords,
                manual_location,
            )
            .await;
        info!(
            "Check-out recorded for {} at {}",
            employee.email, record.timestamp
        );
        Ok(record)
    }

    /// Derived from the newest record only; the ledger is not re-scanned
    /// beyond the head.
    pub fn current_status(&self, employee_id: &str) -> Result<AttendanceState, AttendanceError> {
        let employee = self.store.employee(employee_id)?;
        Ok(match self.store.latest_record(&employee.email) {
            Some(latest) if latest.record_type == RecordType::CheckIn => {
                AttendanceState::CheckedIn {
                    status: latest.status,
                    since: latest.timestamp,
                }
            }
            _ => AttendanceState::NotCheckedIn,
        })
    }

    /// Full ledger, newest first.
    pub fn history(&self, employee_id: &str) -> Result<Vec<TimeRecord>, AttendanceError> {
        let employee = self.store.employee(employee_id)?;
        Ok(self.store.time_history(&employee.email))
    }

    async fn persist_record(
        &self,
        session: &ResolverSession,
        employee: &Employee,
        record_type: RecordType,
        status: AttendanceMark,
        coords: Option<Coordinates>,
        manual_location: Option<String>,
    ) -> TimeRecord {
        // Manual override always wins for this check action; the next check
        // action starts a fresh resolution.
        let (location, record_coords) = match manual_location.filter(|l| !l.trim().is_empty()) {
            Some(label) => (label, coords),
            None => {
                let resolved = self.resolve_location(session, coords).await;
                (resolved.label, Some(resolved.coords))
            }
        };

        let now = self.clock.now();
        let record = TimeRecord {
            id: new_record_id(now),
            email: employee.email.clone(),
            record_type,
            status,
            timestamp: now,
            location,
            coords: record_coords,
        };
        self.store.append_time_record(record.clone());
        record
    }

    async fn resolve_location(
        &self,
        session: &ResolverSession,
        coords: Option<Coordinates>,
    ) -> ResolvedLocation {
        match coords {
            Some(c) => self
                .resolver
                .resolve(session, c)
                .await
                .unwrap_or_else(|| ResolvedLocation::coordinates_fallback(c)),
            None => self.resolver.acquire_and_resolve(session).await,
        }
    }
}
