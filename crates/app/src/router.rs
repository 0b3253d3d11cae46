use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use staffdesk_core::types::{EmployeeDraft, EmployeeRecord};

use crate::problem::{from_service_error, ProblemResponse};
use crate::service::EmployeeService;
use crate::telemetry;

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    service: EmployeeService,
}

impl AppState {
    pub fn new(metrics: PrometheusHandle, service: EmployeeService) -> Self {
        Self { metrics, service }
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn service(&self) -> &EmployeeService {
        &self.service
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/employees", get(list_employees).post(create_employee))
        .route(
            "/employees/:id",
            get(get_employee).put(update_employee).delete(delete_employee),
        )
        .route("/employees/validate-email", post(validate_email))
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = telemetry::render_metrics(state.metrics());
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
        .body(Body::from(body))
        .unwrap()
}

/// Incoming payload for both create and full-replace update.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmployeeRequest {
    first_name: String,
    last_name: String,
    email: String,
    department: String,
    salary: f64,
}

impl EmployeeRequest {
    fn into_draft(self) -> EmployeeDraft {
        EmployeeDraft {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            department: self.department,
            salary: self.salary,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmployeeResponse {
    id: Uuid,
    first_name: String,
    last_name: String,
    email: String,
    department: String,
    salary: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl From<EmployeeRecord> for EmployeeResponse {
    fn from(record: EmployeeRecord) -> Self {
        Self {
            id: record.id,
            first_name: record.first_name,
            last_name: record.last_name,
            email: record.email,
            department: record.department,
            salary: record.salary,
            created_at: record.created_at,
            updated_at: record.updated_at,
            version: record.version,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ValidateEmailRequest {
    email: String,
}

#[derive(Debug, Serialize)]
struct ValidateEmailResponse {
    email: String,
    deliverable: bool,
}

async fn create_employee(
    State(state): State<AppState>,
    Json(request): Json<EmployeeRequest>,
) -> Result<(StatusCode, Json<EmployeeResponse>), ProblemResponse> {
    let record = state
        .service()
        .create(request.into_draft())
        .await
        .map_err(from_service_error)?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

async fn list_employees(
    State(state): State<AppState>,
) -> Result<Json<Vec<EmployeeResponse>>, ProblemResponse> {
    let records = state
        .service()
        .list_all()
        .await
        .map_err(from_service_error)?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

async fn get_employee(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EmployeeResponse>, ProblemResponse> {
    let record = state
        .service()
        .get_by_id(id)
        .await
        .map_err(from_service_error)?;
    Ok(Json(record.into()))
}

async fn update_employee(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<EmployeeRequest>,
) -> Result<Json<EmployeeResponse>, ProblemResponse> {
    let record = state
        .service()
        .update(id, request.into_draft())
        .await
        .map_err(from_service_error)?;
    Ok(Json(record.into()))
}

async fn delete_employee(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ProblemResponse> {
    state
        .service()
        .delete(id)
        .await
        .map_err(from_service_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn validate_email(
    State(state): State<AppState>,
    Json(request): Json<ValidateEmailRequest>,
) -> Result<Json<ValidateEmailResponse>, ProblemResponse> {
    let deliverable = state
        .service()
        .verify_email(&request.email)
        .await
        .map_err(from_service_error)?;
    Ok(Json(ValidateEmailResponse {
        email: request.email,
        deliverable,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use staffdesk_core::department::DepartmentPolicy;
    use staffdesk_storage::Database;

    use crate::notify::NotificationDispatcher;
    use crate::service::testing::{RecordingTransport, StubOutcome, StubVerifier};

    struct TestApp {
        router: Router,
        transport: Arc<RecordingTransport>,
    }

    async fn setup(outcome: StubOutcome) -> TestApp {
        let metrics = telemetry::init_metrics().expect("metrics init");

        // Named per-test in-memory database: the lifecycle test asserts an
        // empty listing at the end and must not see other tests' rows.
        let url = format!("sqlite:file:{}?mode=memory&cache=shared", Uuid::new_v4());
        let database = Database::connect(&url).await.expect("connect");
        database.run_migrations().await.expect("migrations");

        let transport = Arc::new(RecordingTransport::default());
        let notifier =
            NotificationDispatcher::new(transport.clone(), "admin@example.com".to_string());
        let service = EmployeeService::new(
            database,
            Arc::new(StubVerifier::new(outcome)),
            DepartmentPolicy::default(),
            notifier,
        );

        TestApp {
            router: app_router(AppState::new(metrics, service)),
            transport,
        }
    }

    fn employee_body() -> Value {
        json!({
            "firstName": "Mo",
            "lastName": "Ragab",
            "email": "mo@example.com",
            "department": "Engineering",
            "salary": 5000.0
        })
    }

    async fn send(router: Router, method: &str, uri: &str, body: Option<Value>) -> Response {
        let request = match body {
            Some(value) => Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(value.to_string()))
                .unwrap(),
            None => Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        };
        router.oneshot(request).await.expect("handler should respond")
    }

    async fn read_json(response: Response) -> Value {
        let collected = response
            .into_body()
            .collect()
            .await
            .expect("body should read");
        serde_json::from_slice(&collected.to_bytes()).expect("valid json body")
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        let app = setup(StubOutcome::Deliverable).await;
        let response = send(app.router, "GET", "/healthz", None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_exports_build_info() {
        let app = setup(StubOutcome::Deliverable).await;
        let response = send(app.router, "GET", "/metrics", None).await;

        assert_eq!(response.status(), StatusCode::OK);
        let collected = response
            .into_body()
            .collect()
            .await
            .expect("body should read");
        let body = String::from_utf8(collected.to_bytes().to_vec()).expect("utf-8");
        assert!(body.contains("app_build_info"));
        assert!(body.contains("app_uptime_seconds"));
    }

    #[tokio::test]
    async fn create_returns_created_record_and_notifies_once() {
        let app = setup(StubOutcome::Deliverable).await;

        let response = send(
            app.router.clone(),
            "POST",
            "/employees",
            Some(employee_body()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = read_json(response).await;
        assert_eq!(body["firstName"], "Mo");
        assert_eq!(body["department"], "Engineering");
        assert_eq!(body["salary"], 5000.0);
        assert_eq!(body["version"], 1);
        assert!(body["id"].as_str().is_some());

        // The welcome notification lands in the background, exactly once.
        for _ in 0..100 {
            if app.transport.messages().len() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let messages = app.transport.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].recipient, "mo@example.com");
    }

    #[tokio::test]
    async fn create_with_unknown_department_is_a_problem_response() {
        let app = setup(StubOutcome::Deliverable).await;

        let mut body = employee_body();
        body["department"] = json!("Legal");
        let response = send(app.router, "POST", "/employees", Some(body)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
            Some("application/problem+json")
        );
        let problem = read_json(response).await;
        assert_eq!(problem["type"], "validation_error");
        assert!(problem["detail"]
            .as_str()
            .expect("detail present")
            .contains("department"));
    }

    #[tokio::test]
    async fn create_with_undeliverable_email_is_rejected() {
        let app = setup(StubOutcome::Undeliverable).await;

        let response = send(app.router, "POST", "/employees", Some(employee_body())).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let problem = read_json(response).await;
        assert_eq!(problem["type"], "validation_error");
    }

    #[tokio::test]
    async fn get_unknown_id_is_not_found() {
        let app = setup(StubOutcome::Deliverable).await;

        let uri = format!("/employees/{}", Uuid::new_v4());
        let response = send(app.router, "GET", &uri, None).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let problem = read_json(response).await;
        assert_eq!(problem["type"], "employee_not_found");
    }

    #[tokio::test]
    async fn update_and_delete_round_out_the_lifecycle() {
        let app = setup(StubOutcome::Deliverable).await;

        let created = read_json(
            send(
                app.router.clone(),
                "POST",
                "/employees",
                Some(employee_body()),
            )
            .await,
        )
        .await;
        let id = created["id"].as_str().expect("id present").to_string();
        let uri = format!("/employees/{id}");

        let mut change = employee_body();
        change["salary"] = json!(6000.0);
        let response = send(app.router.clone(), "PUT", &uri, Some(change)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let updated = read_json(response).await;
        assert_eq!(updated["salary"], 6000.0);
        assert_eq!(updated["version"], 2);

        let response = send(app.router.clone(), "DELETE", &uri, None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = send(app.router.clone(), "GET", &uri, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let listed = read_json(send(app.router, "GET", "/employees", None).await).await;
        assert_eq!(listed, json!([]));
    }

    #[tokio::test]
    async fn validate_email_reports_the_checker_verdict() {
        let app = setup(StubOutcome::Undeliverable).await;

        let response = send(
            app.router,
            "POST",
            "/employees/validate-email",
            Some(json!({ "email": "mo@example.com" })),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["email"], "mo@example.com");
        assert_eq!(body["deliverable"], false);
    }
}
