use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// An employee record as persisted by the store.
///
/// `id` is assigned exactly once on creation and never changes. `version`
/// starts at 1 and increments by exactly 1 per successful write; updates must
/// present the version they read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeRecord {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub department: String,
    pub salary: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl EmployeeRecord {
    /// Returns the display name used in outbound messages.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Incoming employee fields, shared by the create and update paths.
///
/// Updates carry full-replace semantics: every field here overwrites the
/// stored value, nothing is merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeDraft {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub department: String,
    pub salary: f64,
}

impl EmployeeDraft {
    /// Checks field-level constraints, reporting the first offending field.
    ///
    /// Deliverability and allow-list membership are checked separately by the
    /// orchestrator; this only covers constraints local to the draft.
    pub fn validate_fields(&self) -> Result<(), InvalidField> {
        if self.first_name.trim().is_empty() {
            return Err(InvalidField::new("firstName", "first name is required"));
        }
        if self.last_name.trim().is_empty() {
            return Err(InvalidField::new("lastName", "last name is required"));
        }
        if !is_syntactic_email(&self.email) {
            return Err(InvalidField::new("email", "email address is malformed"));
        }
        if self.department.trim().is_empty() {
            return Err(InvalidField::new("department", "department is required"));
        }
        if self.salary <= 0.0 {
            return Err(InvalidField::new("salary", "salary must be positive"));
        }
        Ok(())
    }
}

/// A field that failed validation before any write happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid {field}: {reason}")]
pub struct InvalidField {
    pub field: &'static str,
    pub reason: &'static str,
}

impl InvalidField {
    pub fn new(field: &'static str, reason: &'static str) -> Self {
        Self { field, reason }
    }
}

/// Syntactic address check: one `@` with a non-empty local part and a
/// non-empty domain, no whitespace. Deliverability is a separate concern.
fn is_syntactic_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !value.chars().any(char::is_whitespace)
}
