// src/main.rs
use anyhow::{Context, Result};
use axum::http::StatusCode;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use axum_server::tls_rustls::RustlsConfig;
use chrono::NaiveDate;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, env, net::SocketAddr, sync::Arc, sync::Mutex};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod aggregation;
mod attendance;
mod auth;
mod clock;
mod geolocation;
mod model;
mod store;
mod workflow;

#[cfg(test)]
mod aggregation_tests;
#[cfg(test)]
mod workflow_tests;

use aggregation::AggregationService;
use attendance::{AttendanceEngine, AttendanceError};
use auth::{AuthError, AuthService};
use clock::{Clock, SystemClock};
use geolocation::{GeoError, GeoResolver, GoogleGeocoder, NominatimClient, ResolverSession};
use model::*;
use store::{RecordStore, StoreError};
use workflow::{WorkflowEngine, WorkflowError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),
    #[error("Requester lacks the required capability")]
    Forbidden,
    #[error(transparent)]
    Geo(#[from] GeoError),
    #[error(transparent)]
    Attendance(#[from] AttendanceError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        error!("Request failed: {:?}", self);
        let (status_code, error_message) = match &self {
            AppError::MissingEnvVar(_) | AppError::TlsConfig(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server configuration error.".to_string(),
            ),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                "You are not allowed to perform this action.".to_string(),
            ),
            AppError::Geo(_) => (
                StatusCode::BAD_GATEWAY,
                "Location resolution failed.".to_string(),
            ),
            AppError::Attendance(e) => match e {
                AttendanceError::AlreadyCheckedIn | AttendanceError::NotCheckedIn => {
                    (StatusCode::CONFLICT, e.to_string())
                }
                AttendanceError::Store(s) => (StatusCode::NOT_FOUND, s.to_string()),
            },
            AppError::Workflow(e) => match e {
                WorkflowError::InvalidTransition => (StatusCode::CONFLICT, e.to_string()),
                WorkflowError::Store(s) => (StatusCode::NOT_FOUND, s.to_string()),
            },
            AppError::Auth(e) => match e {
                AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, e.to_string()),
                AuthError::Store(s) => (StatusCode::NOT_FOUND, s.to_string()),
            },
            AppError::Store(e) => (StatusCode::NOT_FOUND, e.to_string()),
        };
        (status_code, Json(serde_json::json!({ "error": error_message }))).into_response()
    }
}

#[derive(Debug, Clone)]
struct AppConfig {
    cert_path: Option<String>,
    key_path: Option<String>,
    geocode_api_key: Option<String>,
    geocode_language: String,
}

#[derive(Parser, Debug)]
#[command(name = "sgdata-core", about = "Workforce attendance and coordination service")]
struct Cli {
    /// Address to bind the HTTP server to.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind the HTTP server to.
    #[arg(long, default_value_t = 3000)]
    port: u16,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RecordStore>,
    pub auth: Arc<AuthService>,
    pub attendance: Arc<AttendanceEngine>,
    pub workflow: Arc<WorkflowEngine>,
    pub aggregation: Arc<AggregationService>,
    // One resolver session per employee, replaced with a fresh one at login so
    // a tripped breaker never outlives the working period that tripped it.
    resolver_sessions: Arc<Mutex<HashMap<EmployeeId, Arc<ResolverSession>>>>,
}

impl AppState {
    fn resolver_session(&self, employee_id: &str) -> Arc<ResolverSession> {
        let mut guard = self.resolver_sessions.lock().unwrap();
        guard
            .entry(employee_id.to_string())
            .or_insert_with(|| Arc::new(ResolverSession::new()))
            .clone()
    }

    fn reset_resolver_session(&self, employee_id: &str) {
        let mut guard = self.resolver_sessions.lock().unwrap();
        guard.insert(employee_id.to_string(), Arc::new(ResolverSession::new()));
    }

    /// Loads the requester and fails with Forbidden unless they hold the
    /// approval capability.
    fn require_approver(&self, requester_id: &str) -> Result<Employee, AppError> {
        let requester = self.store.employee(requester_id)?;
        if !requester.role.capabilities().can_approve {
            return Err(AppError::Forbidden);
        }
        Ok(requester)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    info!("Tracing subscriber initialized.");

    let cli = Cli::parse();
    let app_config = load_app_config()?;
    info!("App configuration loaded.");

    let store = Arc::new(RecordStore::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let secondary = Arc::new(NominatimClient::new(&app_config.geocode_language)?);
    let primary = match &app_config.geocode_api_key {
        Some(key) => Some(Arc::new(GoogleGeocoder::new(key)?) as Arc<dyn geolocation::GeocodeProvider>),
        None => {
            info!("No geocode API key configured; primary geocoder disabled.");
            None
        }
    };
    let resolver = Arc::new(GeoResolver::new(None, primary, secondary));

    let state = AppState {
        auth: Arc::new(AuthService::new(store.clone(), clock.clone())),
        attendance: Arc::new(AttendanceEngine::new(
            store.clone(),
            resolver.clone(),
            clock.clone(),
        )),
        workflow: Arc::new(WorkflowEngine::new(store.clone(), clock.clone())),
        aggregation: Arc::new(AggregationService::new(store.clone(), clock.clone())),
        store,
        resolver_sessions: Arc::new(Mutex::new(HashMap::new())),
    };
    info!("Application state initialized.");

    let auth_routes = Router::new()
        .route("/login", post(handle_login))
        .route("/password", put(handle_update_password))
        .route("/remembered", get(handle_remembered));
    let attendance_routes = Router::new()
        .route("/{employee_id}/check-in", post(handle_check_in))
        .route("/{employee_id}/check-out", post(handle_check_out))
        .route("/{employee_id}/status", get(handle_attendance_status))
        .route("/{employee_id}/history", get(handle_attendance_history));
    let assignment_routes = Router::new()
        .route("/", post(handle_assign))
        .route("/{assignment_id}/response", post(handle_respond))
        .route("/pending/{employee_id}", get(handle_pending_assignments));
    let job_routes = Router::new()
        .route("/", post(handle_create_job))
        .route("/{job_id}/status", put(handle_set_job_status));
    let leave_routes = Router::new()
        .route("/", post(handle_submit_leave).get(handle_all_leave))
        .route("/{request_id}/decision", post(handle_decide_leave));
    let ot_routes = Router::new()
        .route("/", post(handle_submit_ot).get(handle_all_ot))
        .route("/{request_id}/decision", post(handle_decide_ot));
    let stats_routes = Router::new()
        .route("/attendance", get(handle_today_attendance))
        .route("/completion/{requester_id}", get(handle_today_completion))
        .route("/weekly/{employee_id}", get(handle_weekly_stats))
        .route("/busy/{employee_id}", get(handle_busy))
        .route("/roster/{requester_id}", get(handle_roster))
        .route("/history/{requester_id}", get(handle_roster_history));

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/attendance", attendance_routes)
        .nest("/assignments", assignment_routes)
        .nest("/jobs", job_routes)
        .nest("/leave", leave_routes)
        .nest("/ot", ot_routes)
        .nest("/stats", stats_routes)
        .route("/employees", post(handle_register_employee));
    let app = Router::new()
        .nest("/api", api_routes)
        .route("/status", get(handle_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port)
        .parse()
        .context("Invalid bind address")?;

    match load_tls_config(&app_config).await? {
        Some(tls_config) => {
            info!("Starting server on https://{}", addr);
            axum_server::bind_rustls(addr, tls_config)
                .serve(app.into_make_service())
                .await
                .context("HTTPS server failed")?;
        }
        None => {
            info!("No TLS certificate configured; starting server on http://{}", addr);
            axum_server::bind(addr)
                .serve(app.into_make_service())
                .await
                .context("HTTP server failed")?;
        }
    }

    Ok(())
}

fn load_app_config() -> Result<AppConfig, AppError> {
    let cert_path = env::var("CERT_PATH").ok();
    let key_path = env::var("KEY_PATH").ok();
    // Refuse a half-configured TLS setup instead of silently serving HTTP.
    if cert_path.is_some() && key_path.is_none() {
        return Err(AppError::MissingEnvVar("KEY_PATH".to_string()));
    }
    if key_path.is_some() && cert_path.is_none() {
        return Err(AppError::MissingEnvVar("CERT_PATH".to_string()));
    }
    Ok(AppConfig {
        cert_path,
        key_path,
        geocode_api_key: env::var("GEOCODE_API_KEY").ok(),
        geocode_language: env::var("GEOCODE_LANGUAGE").unwrap_or_else(|_| "th,en".to_string()),
    })
}

async fn load_tls_config(config: &AppConfig) -> Result<Option<RustlsConfig>, AppError> {
    match (&config.cert_path, &config.key_path) {
        (Some(cert), Some(key)) => RustlsConfig::from_pem_file(cert, key)
            .await
            .map(Some)
            .map_err(|e| AppError::TlsConfig(format!("Failed to load TLS cert/key: {}", e))),
        _ => Ok(None),
    }
}

// --- Wire Types ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    email: String,
    secret: String,
    office: Office,
    #[serde(default)]
    remember: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    employee: Employee,
    capabilities: Capabilities,
    session: DailySession,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordUpdateRequest {
    email: String,
    new_secret: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordUpdateResponse {
    updated: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterEmployeeRequest {
    employee: Employee,
    secret: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckRequest {
    coords: Option<Coordinates>,
    manual_location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignRequest {
    requester_id: String,
    employee_id: String,
    #[serde(flatten)]
    descriptor: TaskDescriptor,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RespondRequest {
    response: AssignmentStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateJobRequest {
    requester_id: String,
    employee_id: String,
    date: NaiveDate,
    customer_name: String,
    activity: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatusRequest {
    status: JobStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeaveSubmission {
    employee_id: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OtSubmission {
    employee_id: String,
    date: NaiveDate,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecisionRequest {
    requester_id: String,
    decision: RequestStatus,
}

// --- Handlers ---

async fn handle_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let employee = state.auth.authenticate(&req.email, &req.secret)?;
    let session = state.auth.open_daily_session(&employee.id, req.office)?;
    if req.remember {
        state.auth.save_credentials(Credential {
            email: req.email,
            secret: req.secret,
        });
    } else {
        state.auth.forget_credentials();
    }
    // A fresh login starts a fresh working period.
    state.reset_resolver_session(&employee.id);
    let capabilities = employee.role.capabilities();
    Ok(Json(LoginResponse {
        employee,
        capabilities,
        session,
    }))
}

async fn handle_update_password(
    State(state): State<AppState>,
    Json(req): Json<PasswordUpdateRequest>,
) -> Json<PasswordUpdateResponse> {
    let updated = state.auth.update_password(&req.email, &req.new_secret);
    Json(PasswordUpdateResponse { updated })
}

async fn handle_remembered(State(state): State<AppState>) -> Json<Option<Credential>> {
    Json(state.auth.saved_credentials())
}

async fn handle_register_employee(
    State(state): State<AppState>,
    Json(req): Json<RegisterEmployeeRequest>,
) -> Json<Employee> {
    state.store.put_credential(Credential {
        email: req.employee.email.clone(),
        secret: req.secret,
    });
    state.store.upsert_employee(req.employee.clone());
    Json(req.employee)
}

async fn handle_check_in(
    State(state): State<AppState>,
    Path(employee_id): Path<String>,
    Json(req): Json<CheckRequest>,
) -> Result<Json<TimeRecord>, AppError> {
    let session = state.resolver_session(&employee_id);
    let record = state
        .attendance
        .record_check_in(&session, &employee_id, req.coords, req.manual_location)
        .await?;
    Ok(Json(record))
}

async fn handle_check_out(
    State(state): State<AppState>,
    Path(employee_id): Path<String>,
    Json(req): Json<CheckRequest>,
) -> Result<Json<TimeRecord>, AppError> {
    let session = state.resolver_session(&employee_id);
    let record = state
        .attendance
        .record_check_out(&session, &employee_id, req.coords, req.manual_location)
        .await?;
    Ok(Json(record))
}

async fn handle_attendance_status(
    State(state): State<AppState>,
    Path(employee_id): Path<String>,
) -> Result<Json<attendance::AttendanceState>, AppError> {
    Ok(Json(state.attendance.current_status(&employee_id)?))
}

async fn handle_attendance_history(
    State(state): State<AppState>,
    Path(employee_id): Path<String>,
) -> Result<Json<Vec<TimeRecord>>, AppError> {
    Ok(Json(state.attendance.history(&employee_id)?))
}

async fn handle_assign(
    State(state): State<AppState>,
    Json(req): Json<AssignRequest>,
) -> Result<Json<Assignment>, AppError> {
    state.require_approver(&req.requester_id)?;
    Ok(Json(state.workflow.assign(&req.employee_id, req.descriptor)?))
}

async fn handle_respond(
    State(state): State<AppState>,
    Path(assignment_id): Path<String>,
    Json(req): Json<RespondRequest>,
) -> Result<Json<Assignment>, AppError> {
    Ok(Json(state.workflow.respond(&assignment_id, req.response)?))
}

async fn handle_pending_assignments(
    State(state): State<AppState>,
    Path(employee_id): Path<String>,
) -> Json<Vec<Assignment>> {
    Json(state.workflow.pending_for(&employee_id))
}

async fn handle_create_job(
    State(state): State<AppState>,
    Json(req): Json<CreateJobRequest>,
) -> Result<Json<Job>, AppError> {
    state.require_approver(&req.requester_id)?;
    Ok(Json(state.workflow.create_job(
        &req.employee_id,
        req.date,
        &req.customer_name,
        &req.activity,
    )?))
}

async fn handle_set_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Json(req): Json<JobStatusRequest>,
) -> Result<Json<Job>, AppError> {
    Ok(Json(state.workflow.set_job_status(&job_id, req.status)?))
}

async fn handle_submit_leave(
    State(state): State<AppState>,
    Json(req): Json<LeaveSubmission>,
) -> Result<Json<LeaveRequest>, AppError> {
    Ok(Json(state.workflow.submit_leave(
        &req.employee_id,
        req.start_date,
        req.end_date,
        req.reason,
    )?))
}

async fn handle_all_leave(State(state): State<AppState>) -> Json<Vec<LeaveRequest>> {
    Json(state.workflow.all_leave_requests())
}

async fn handle_decide_leave(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<LeaveRequest>, AppError> {
    state.require_approver(&req.requester_id)?;
    Ok(Json(state.workflow.decide_leave(&request_id, req.decision)?))
}

async fn handle_submit_ot(
    State(state): State<AppState>,
    Json(req): Json<OtSubmission>,
) -> Result<Json<OtRequest>, AppError> {
    Ok(Json(
        state.workflow.submit_ot(&req.employee_id, req.date, req.reason)?,
    ))
}

async fn handle_all_ot(State(state): State<AppState>) -> Json<Vec<OtRequest>> {
    Json(state.workflow.all_ot_requests())
}

async fn handle_decide_ot(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<OtRequest>, AppError> {
    state.require_approver(&req.requester_id)?;
    Ok(Json(state.workflow.decide_ot(&request_id, req.decision)?))
}

async fn handle_today_attendance(
    State(state): State<AppState>,
) -> Json<aggregation::AttendanceSummary> {
    Json(state.aggregation.today_attendance())
}

async fn handle_today_completion(
    State(state): State<AppState>,
    Path(requester_id): Path<String>,
) -> Result<Json<aggregation::JobCompletion>, AppError> {
    let requester = state.store.employee(&requester_id)?;
    Ok(Json(state.aggregation.today_job_completion(&requester)))
}

async fn handle_weekly_stats(
    State(state): State<AppState>,
    Path(employee_id): Path<String>,
) -> Json<aggregation::WeeklyJobStats> {
    Json(state.aggregation.weekly_job_stats(&employee_id))
}

async fn handle_busy(
    State(state): State<AppState>,
    Path(employee_id): Path<String>,
) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "busy": state.aggregation.is_busy_today(&employee_id) }))
}

async fn handle_roster(
    State(state): State<AppState>,
    Path(requester_id): Path<String>,
) -> Result<Json<Vec<aggregation::RosterEntry>>, AppError> {
    let requester = state.store.employee(&requester_id)?;
    if !requester.role.capabilities().can_view_all {
        return Err(AppError::Forbidden);
    }
    Ok(Json(state.aggregation.today_roster(&requester_id)))
}

async fn handle_roster_history(
    State(state): State<AppState>,
    Path(requester_id): Path<String>,
) -> Result<Json<Vec<aggregation::AttendanceHistoryGroup>>, AppError> {
    let requester = state.store.employee(&requester_id)?;
    if !requester.role.capabilities().can_view_all {
        return Err(AppError::Forbidden);
    }
    Ok(Json(state.aggregation.attendance_history(&requester_id)))
}

async fn handle_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let summary = state.aggregation.today_attendance();
    Json(serde_json::json!({
        "employees": state.store.all_employees().len(),
        "checkedInToday": summary.checked_in,
        "pendingOtRequests": state.aggregation.pending_ot_count(),
        "approvedLeaveToday": state.aggregation.approved_leave_count_today(),
    }))
}
