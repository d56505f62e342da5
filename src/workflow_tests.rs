// src/workflow_tests.rs

#[cfg(test)]
mod tests {
    use crate::clock::TestClock;
    use crate::model::*;
    use crate::store::{RecordStore, StoreError};
    use crate::workflow::*;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid test date")
    }

    fn test_employee(id: &str) -> Employee {
        Employee {
            id: id.to_string(),
            email: format!("{}@sgdata.co.th", id),
            name_th: "พนักงาน ทดสอบ".to_string(),
            name_en: "Test Employee".to_string(),
            nickname_th: "ทด".to_string(),
            nickname_en: "Test".to_string(),
            role: Role::Employee,
            position: "Field Technician".to_string(),
        }
    }

    fn test_descriptor() -> TaskDescriptor {
        TaskDescriptor {
            customer_name: "Siam Cement".to_string(),
            activity: "Install POS terminal".to_string(),
            date: date("2025-06-05"),
            time: "09:00 - 12:00".to_string(),
        }
    }

    fn setup() -> (WorkflowEngine, Arc<RecordStore>) {
        let store = Arc::new(RecordStore::new());
        store.upsert_employee(test_employee("emp-1"));
        store.upsert_employee(test_employee("emp-2"));
        let clock = TestClock::new("2025-06-02 10:00:00");
        let engine = WorkflowEngine::new(store.clone(), Arc::new(clock));
        (engine, store)
    }

    #[test]
    fn test_assign_creates_pending_assignment() {
        let (engine, _) = setup();

        let assignment = engine.assign("emp-1", test_descriptor()).unwrap();

        assert_eq!(assignment.status, AssignmentStatus::Pending);
        assert_eq!(assignment.employee_id, "emp-1");
        assert_eq!(engine.pending_for("emp-1").len(), 1);
    }

    #[test]
    fn test_assign_to_unknown_employee_fails() {
        let (engine, _) = setup();

        let result = engine.assign("ghost", test_descriptor());

        assert_eq!(
            result,
            Err(WorkflowError::Store(StoreError::EmployeeNotFound {
                employee_id: "ghost".to_string()
            }))
        );
    }

    #[test]
    fn test_respond_accept_clears_pending() {
        let (engine, _) = setup();
        let assignment = engine.assign("emp-1", test_descriptor()).unwrap();

        let responded = engine
            .respond(&assignment.id, AssignmentStatus::Accepted)
            .unwrap();

        assert_eq!(responded.status, AssignmentStatus::Accepted);
        assert!(
            engine.pending_for("emp-1").is_empty(),
            "An answered assignment must leave the pending list"
        );
    }

    #[test]
    fn test_respond_is_single_shot() {
        let (engine, _) = setup();
        let assignment = engine.assign("emp-1", test_descriptor()).unwrap();
        engine
            .respond(&assignment.id, AssignmentStatus::Rejected)
            .unwrap();

        let second = engine.respond(&assignment.id, AssignmentStatus::Accepted);

        assert_eq!(
            second,
            Err(WorkflowError::InvalidTransition),
            "A decided assignment must reject any further transition"
        );
    }

    #[test]
    fn test_respond_with_pending_is_rejected() {
        let (engine, _) = setup();
        let assignment = engine.assign("emp-1", test_descriptor()).unwrap();

        let result = engine.respond(&assignment.id, AssignmentStatus::Pending);

        assert_eq!(result, Err(WorkflowError::InvalidTransition));
    }

    #[test]
    fn test_pending_for_is_scoped_to_the_employee() {
        let (engine, _) = setup();
        engine.assign("emp-1", test_descriptor()).unwrap();
        engine.assign("emp-2", test_descriptor()).unwrap();

        let pending = engine.pending_for("emp-1");

        assert_eq!(pending.len(), 1);
        assert!(pending.iter().all(|a| a.employee_id == "emp-1"));
    }

    #[test]
    fn test_respond_does_not_touch_jobs() {
        let (engine, store) = setup();
        let job = engine
            .create_job("emp-1", date("2025-06-05"), "Siam Cement", "Install POS terminal")
            .unwrap();
        let assignment = engine.assign("emp-1", test_descriptor()).unwrap();

        engine
            .respond(&assignment.id, AssignmentStatus::Accepted)
            .unwrap();

        assert_eq!(
            store.job(&job.id).unwrap().status,
            JobStatus::NotStarted,
            "Answering an assignment must not mutate any job"
        );
    }

    #[test]
    fn test_job_status_progression() {
        let (engine, _) = setup();
        let job = engine
            .create_job("emp-1", date("2025-06-05"), "Siam Cement", "Install POS terminal")
            .unwrap();

        let updated = engine.set_job_status(&job.id, JobStatus::InProgress).unwrap();
        assert_eq!(updated.status, JobStatus::InProgress);

        let updated = engine.set_job_status(&job.id, JobStatus::Done).unwrap();
        assert_eq!(updated.status, JobStatus::Done);
    }

    #[test]
    fn test_leave_decision_is_single_shot() {
        let (engine, _) = setup();
        let request = engine
            .submit_leave("emp-1", date("2025-06-10"), date("2025-06-12"), None)
            .unwrap();
        assert_eq!(request.status, RequestStatus::Pending);

        engine
            .decide_leave(&request.id, RequestStatus::Approved)
            .unwrap();
        let second = engine.decide_leave(&request.id, RequestStatus::Rejected);

        assert_eq!(second, Err(WorkflowError::InvalidTransition));
    }

    #[test]
    fn test_decide_with_pending_is_rejected() {
        let (engine, _) = setup();
        let request = engine
            .submit_leave("emp-1", date("2025-06-10"), date("2025-06-12"), None)
            .unwrap();

        let result = engine.decide_leave(&request.id, RequestStatus::Pending);

        assert_eq!(result, Err(WorkflowError::InvalidTransition));
    }

    #[test]
    fn test_approved_leave_containment_is_inclusive() {
        let (engine, _) = setup();
        let request = engine
            .submit_leave("emp-1", date("2025-06-10"), date("2025-06-12"), Some("Family".to_string()))
            .unwrap();
        engine
            .decide_leave(&request.id, RequestStatus::Approved)
            .unwrap();

        assert!(
            engine.is_on_approved_leave("emp-1", date("2025-06-10")),
            "First day of the range counts"
        );
        assert!(
            engine.is_on_approved_leave("emp-1", date("2025-06-12")),
            "Last day of the range counts"
        );
        assert!(!engine.is_on_approved_leave("emp-1", date("2025-06-09")));
        assert!(!engine.is_on_approved_leave("emp-1", date("2025-06-13")));
    }

    #[test]
    fn test_pending_leave_does_not_count_as_on_leave() {
        let (engine, _) = setup();
        engine
            .submit_leave("emp-1", date("2025-06-10"), date("2025-06-12"), None)
            .unwrap();

        assert!(!engine.is_on_approved_leave("emp-1", date("2025-06-11")));
    }

    #[test]
    fn test_ot_requests_follow_the_same_lifecycle() {
        let (engine, _) = setup();
        let request = engine
            .submit_ot("emp-1", date("2025-06-07"), Some("Month-end closing".to_string()))
            .unwrap();
        assert_eq!(engine.pending_ot_count(), 1);

        engine.decide_ot(&request.id, RequestStatus::Rejected).unwrap();

        assert_eq!(engine.pending_ot_count(), 0);
        let second = engine.decide_ot(&request.id, RequestStatus::Approved);
        assert_eq!(second, Err(WorkflowError::InvalidTransition));
    }

    #[test]
    fn test_unknown_request_id_is_a_store_error() {
        let (engine, _) = setup();

        let result = engine.decide_ot("no-such-id", RequestStatus::Approved);

        assert_eq!(
            result,
            Err(WorkflowError::Store(StoreError::RequestNotFound {
                request_id: "no-such-id".to_string()
            }))
        );
    }
}
