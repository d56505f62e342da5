// src/aggregation_tests.rs

#[cfg(test)]
mod tests {
    use crate::aggregation::*;
    use crate::clock::TestClock;
    use crate::model::*;
    use crate::store::RecordStore;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::sync::Arc;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid test date")
    }

    fn datetime(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").expect("valid test datetime")
    }

    fn test_employee(id: &str, role: Role) -> Employee {
        Employee {
            id: id.to_string(),
            email: format!("{}@sgdata.co.th", id),
            name_th: "พนักงาน ทดสอบ".to_string(),
            name_en: "Test Employee".to_string(),
            nickname_th: "ทด".to_string(),
            nickname_en: "Test".to_string(),
            role,
            position: "Field Technician".to_string(),
        }
    }

    fn job(id: &str, employee_id: &str, on: &str, status: JobStatus) -> Job {
        Job {
            id: id.to_string(),
            employee_id: employee_id.to_string(),
            date: date(on),
            customer_name: "Siam Cement".to_string(),
            activity: "Install POS terminal".to_string(),
            status,
        }
    }

    fn check_in(email: &str, at: &str) -> TimeRecord {
        TimeRecord {
            id: format!("rec-{}", at),
            email: email.to_string(),
            record_type: RecordType::CheckIn,
            status: AttendanceMark::Normal,
            timestamp: datetime(at),
            location: "Bangkok Office".to_string(),
            coords: None,
        }
    }

    fn check_out(email: &str, at: &str) -> TimeRecord {
        TimeRecord {
            id: format!("rec-{}", at),
            email: email.to_string(),
            record_type: RecordType::CheckOut,
            status: AttendanceMark::None,
            timestamp: datetime(at),
            location: "Bangkok Office".to_string(),
            coords: None,
        }
    }

    // 2025-06-04 is a Wednesday; its week runs 2025-06-01 (Sun) through
    // 2025-06-07 (Sat).
    fn setup() -> (AggregationService, Arc<RecordStore>) {
        let store = Arc::new(RecordStore::new());
        let clock = TestClock::new("2025-06-04 10:00:00");
        let service = AggregationService::new(store.clone(), Arc::new(clock));
        (service, store)
    }

    #[test]
    fn test_week_window_is_sunday_through_saturday() {
        let (start, end) = week_window(date("2025-06-04"));
        assert_eq!(start, date("2025-06-01"));
        assert_eq!(end, date("2025-06-07"));

        // A Sunday anchors its own week.
        let (start, end) = week_window(date("2025-06-01"));
        assert_eq!(start, date("2025-06-01"));
        assert_eq!(end, date("2025-06-07"));
    }

    #[test]
    fn test_weekly_job_stats_counts_and_percentage() {
        let (service, store) = setup();
        store.upsert_employee(test_employee("emp-1", Role::Employee));
        store.put_job(job("j1", "emp-1", "2025-06-02", JobStatus::Done));
        store.put_job(job("j2", "emp-1", "2025-06-03", JobStatus::Done));
        store.put_job(job("j3", "emp-1", "2025-06-04", JobStatus::InProgress));
        store.put_job(job("j4", "emp-1", "2025-06-06", JobStatus::NotStarted));
        // Outside the Sunday-Saturday window, must be ignored.
        store.put_job(job("j5", "emp-1", "2025-06-08", JobStatus::Done));

        let stats = service.weekly_job_stats("emp-1");

        assert_eq!(stats.total, 4);
        assert_eq!(stats.done, 2);
        assert_eq!(stats.in_progress, 1);
        assert_eq!(stats.not_started, 1);
        assert_eq!(stats.percent_done, 50);
    }

    #[test]
    fn test_weekly_job_stats_empty_week_is_zero_percent() {
        let (service, store) = setup();
        store.upsert_employee(test_employee("emp-1", Role::Employee));

        let stats = service.weekly_job_stats("emp-1");

        assert_eq!(stats.total, 0);
        assert_eq!(stats.percent_done, 0, "No jobs must read as 0%, not NaN");
    }

    #[test]
    fn test_today_attendance_excludes_management_from_headcount() {
        let (service, store) = setup();
        store.upsert_employee(test_employee("emp-1", Role::Employee));
        store.upsert_employee(test_employee("emp-2", Role::Employee));
        store.upsert_employee(test_employee("hr-1", Role::Hr));
        store.upsert_employee(test_employee("exec-1", Role::Executive));
        store.append_time_record(check_in("emp-1@sgdata.co.th", "2025-06-04 08:30:00"));
        // Management check-ins do not move the counter.
        store.append_time_record(check_in("hr-1@sgdata.co.th", "2025-06-04 08:00:00"));
        // Yesterday's check-in does not count today.
        store.append_time_record(check_in("emp-2@sgdata.co.th", "2025-06-03 08:30:00"));

        let summary = service.today_attendance();

        assert_eq!(summary.headcount, 2);
        assert_eq!(summary.checked_in, 1);
    }

    #[test]
    fn test_today_attendance_drops_employee_after_check_out() {
        let (service, store) = setup();
        store.upsert_employee(test_employee("emp-1", Role::Employee));
        store.append_time_record(check_in("emp-1@sgdata.co.th", "2025-06-04 08:30:00"));

        assert_eq!(service.today_attendance().checked_in, 1);

        store.append_time_record(check_out("emp-1@sgdata.co.th", "2025-06-04 17:30:00"));
        assert_eq!(
            service.today_attendance().checked_in,
            0,
            "A checked-out employee is no longer present"
        );
    }

    #[test]
    fn test_job_completion_is_scoped_by_capability() {
        let (service, store) = setup();
        let worker = test_employee("emp-1", Role::Employee);
        let hr = test_employee("hr-1", Role::Hr);
        store.upsert_employee(worker.clone());
        store.upsert_employee(test_employee("emp-2", Role::Employee));
        store.upsert_employee(hr.clone());
        store.put_job(job("j1", "emp-1", "2025-06-04", JobStatus::Done));
        store.put_job(job("j2", "emp-2", "2025-06-04", JobStatus::NotStarted));
        store.put_job(job("j3", "emp-2", "2025-06-04", JobStatus::Done));

        let own = service.today_job_completion(&worker);
        assert_eq!((own.done, own.total), (1, 1), "A worker sees only their own jobs");

        let all = service.today_job_completion(&hr);
        assert_eq!((all.done, all.total), (2, 3), "HR sees every job of the day");
    }

    #[test]
    fn test_approved_leave_count_today_respects_bounds() {
        let (service, store) = setup();
        let mut covering = LeaveRequest {
            id: "lr-1".to_string(),
            employee_id: "emp-1".to_string(),
            start_date: date("2025-06-04"),
            end_date: date("2025-06-06"),
            reason: None,
            status: RequestStatus::Approved,
        };
        store.put_leave_request(covering.clone());
        // Approved but already over.
        covering.id = "lr-2".to_string();
        covering.start_date = date("2025-06-01");
        covering.end_date = date("2025-06-03");
        store.put_leave_request(covering.clone());
        // Covers today but still pending.
        covering.id = "lr-3".to_string();
        covering.start_date = date("2025-06-04");
        covering.end_date = date("2025-06-04");
        covering.status = RequestStatus::Pending;
        store.put_leave_request(covering);

        assert_eq!(service.approved_leave_count_today(), 1);
    }

    #[test]
    fn test_busy_today_means_any_unfinished_job() {
        let (service, store) = setup();
        store.upsert_employee(test_employee("emp-1", Role::Employee));
        store.put_job(job("j1", "emp-1", "2025-06-04", JobStatus::Done));

        assert!(!service.is_busy_today("emp-1"), "All jobs done means available");

        store.put_job(job("j2", "emp-1", "2025-06-04", JobStatus::InProgress));
        assert!(service.is_busy_today("emp-1"));
    }

    #[test]
    fn test_roster_marks_offline_and_excludes_requester() {
        let (service, store) = setup();
        store.upsert_employee(test_employee("hr-1", Role::Hr));
        store.upsert_employee(test_employee("emp-1", Role::Employee));
        store.upsert_employee(test_employee("emp-2", Role::Employee));
        store.put_daily_session(DailySession {
            employee_id: "emp-1".to_string(),
            date: date("2025-06-04"),
            office: Office::Chonburi,
        });
        store.append_time_record(check_in("emp-1@sgdata.co.th", "2025-06-04 08:30:00"));

        let roster = service.today_roster("hr-1");

        assert_eq!(roster.len(), 2, "The requester must not appear in their own roster");
        let online = roster.iter().find(|r| r.employee.id == "emp-1").unwrap();
        assert_eq!(online.office, Some(Office::Chonburi));
        assert!(online.record.is_some());
        let offline = roster.iter().find(|r| r.employee.id == "emp-2").unwrap();
        assert_eq!(offline.office, None, "No session today reads as offline");
        assert!(offline.record.is_none());
    }

    #[test]
    fn test_roster_reports_latest_check_in_of_the_day() {
        let (service, store) = setup();
        store.upsert_employee(test_employee("hr-1", Role::Hr));
        store.upsert_employee(test_employee("emp-1", Role::Employee));
        store.append_time_record(check_in("emp-1@sgdata.co.th", "2025-06-04 08:12:00"));
        store.append_time_record(check_in("emp-1@sgdata.co.th", "2025-06-04 13:00:00"));

        let roster = service.today_roster("hr-1");
        let entry = roster.iter().find(|r| r.employee.id == "emp-1").unwrap();

        assert_eq!(
            entry.record.as_ref().unwrap().timestamp,
            datetime("2025-06-04 13:00:00"),
            "The newest check-in of the day is the one reported"
        );
    }

    #[test]
    fn test_attendance_history_covers_thirty_days() {
        let (service, store) = setup();
        store.upsert_employee(test_employee("hr-1", Role::Hr));
        store.upsert_employee(test_employee("emp-1", Role::Employee));
        store.upsert_employee(test_employee("emp-2", Role::Employee));
        store.append_time_record(check_in("emp-1@sgdata.co.th", "2025-06-01 08:30:00"));
        store.append_time_record(check_in("emp-1@sgdata.co.th", "2025-04-01 08:30:00"));

        let history = service.attendance_history("hr-1");

        assert_eq!(history.len(), 1, "Employees without recent records are omitted");
        assert_eq!(history[0].employee.id, "emp-1");
        assert_eq!(
            history[0].records.len(),
            1,
            "Records older than thirty days are excluded"
        );
    }
}
