use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

use crate::service::EmployeeServiceError;

/// RFC 7807 problem body returned for every error response.
#[derive(Debug, Serialize)]
struct ProblemDetails {
    #[serde(rename = "type")]
    problem_type: &'static str,
    title: &'static str,
    detail: String,
}

pub struct ProblemResponse {
    status: StatusCode,
    body: ProblemDetails,
}

impl ProblemResponse {
    pub fn new<S: Into<String>>(status: StatusCode, problem_type: &'static str, detail: S) -> Self {
        Self {
            status,
            body: ProblemDetails {
                problem_type,
                title: status.canonical_reason().unwrap_or("error"),
                detail: detail.into(),
            },
        }
    }

    #[cfg(test)]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[cfg(test)]
    pub fn problem_type(&self) -> &'static str {
        self.body.problem_type
    }
}

impl IntoResponse for ProblemResponse {
    fn into_response(self) -> Response {
        let mut response = Json(self.body).into_response();
        *response.status_mut() = self.status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}

/// Maps orchestrator errors to problem responses.
///
/// Validation and lookup failures surface with a distinct kind; everything
/// unexpected collapses into a generic 500 whose detail leaks no internals.
pub fn from_service_error(err: EmployeeServiceError) -> ProblemResponse {
    match err {
        EmployeeServiceError::InvalidInput { .. } => {
            warn!(stage = "employee", error = %err, "request rejected by validation");
            ProblemResponse::new(StatusCode::BAD_REQUEST, "validation_error", err.to_string())
        }
        EmployeeServiceError::NotFound(id) => ProblemResponse::new(
            StatusCode::NOT_FOUND,
            "employee_not_found",
            format!("employee not found with id: {id}"),
        ),
        EmployeeServiceError::Conflict(id) => ProblemResponse::new(
            StatusCode::CONFLICT,
            "version_conflict",
            format!("employee {id} was modified concurrently; re-read and retry"),
        ),
        EmployeeServiceError::Deliverability(source) => {
            error!(stage = "employee", error = %source, "deliverability service unavailable");
            ProblemResponse::new(
                StatusCode::BAD_GATEWAY,
                "external_service_error",
                "email deliverability service is unavailable",
            )
        }
        EmployeeServiceError::Storage(source) => {
            error!(stage = "employee", error = %source, "storage failure");
            ProblemResponse::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "an unexpected error occurred",
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn invalid_input_maps_to_bad_request() {
        let response = from_service_error(EmployeeServiceError::InvalidInput {
            field: "email",
            reason: "email address is not deliverable".to_string(),
        });
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.problem_type(), "validation_error");
    }

    #[test]
    fn not_found_maps_to_404() {
        let response = from_service_error(EmployeeServiceError::NotFound(Uuid::new_v4()));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.problem_type(), "employee_not_found");
    }

    #[test]
    fn conflict_maps_to_409() {
        let response = from_service_error(EmployeeServiceError::Conflict(Uuid::new_v4()));
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(response.problem_type(), "version_conflict");
    }

    #[test]
    fn storage_failure_hides_detail() {
        let response = from_service_error(EmployeeServiceError::Storage(
            staffdesk_storage::EmployeeError::Corrupt("bad-id".to_string()),
        ));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.body.detail, "an unexpected error occurred");
    }
}
