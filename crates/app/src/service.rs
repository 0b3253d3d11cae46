use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use staffdesk_core::department::DepartmentPolicy;
use staffdesk_core::types::{EmployeeDraft, EmployeeRecord};
use staffdesk_email::deliverability::{DeliverabilityError, EmailVerifier};
use staffdesk_storage::{Database, EmployeeChanges, EmployeeError, NewEmployee};

use crate::notify::NotificationDispatcher;

/// Orchestrates the employee pipeline: synchronous validation, the
/// transactional write, and the fire-and-forget notification trigger.
///
/// Validation failures and store failures leave no partial write; the
/// notification outcome never blocks or reverses a returned result.
#[derive(Clone)]
pub struct EmployeeService {
    database: Database,
    verifier: Arc<dyn EmailVerifier>,
    departments: DepartmentPolicy,
    notifier: NotificationDispatcher,
    clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

impl EmployeeService {
    pub fn new(
        database: Database,
        verifier: Arc<dyn EmailVerifier>,
        departments: DepartmentPolicy,
        notifier: NotificationDispatcher,
    ) -> Self {
        Self {
            database,
            verifier,
            departments,
            notifier,
            clock: Arc::new(Utc::now),
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Validates the draft (email first, then department, short-circuiting),
    /// persists a new record with `version = 1` and triggers the welcome
    /// notification without awaiting its outcome.
    pub async fn create(
        &self,
        draft: EmployeeDraft,
    ) -> Result<EmployeeRecord, EmployeeServiceError> {
        counter!("employee_operations_total", "op" => "create").increment(1);
        info!(stage = "employee", email = %draft.email, "creating a new employee");

        draft.validate_fields()?;
        self.ensure_email_deliverable(&draft.email).await?;
        self.ensure_department_allowed(&draft.department)?;

        let record = self
            .database
            .employees()
            .insert(&NewEmployee {
                id: Uuid::new_v4(),
                first_name: &draft.first_name,
                last_name: &draft.last_name,
                email: &draft.email,
                department: &draft.department,
                salary: draft.salary,
                created_at: self.now(),
            })
            .await
            .map_err(EmployeeServiceError::Storage)?;

        info!(stage = "employee", id = %record.id, "employee created");
        self.notifier.dispatch(record.clone());

        Ok(record)
    }

    /// Loads a record, failing with `NotFound` when the id is absent.
    pub async fn get_by_id(&self, id: Uuid) -> Result<EmployeeRecord, EmployeeServiceError> {
        counter!("employee_operations_total", "op" => "get").increment(1);
        debug!(stage = "employee", %id, "fetching employee");
        self.database
            .employees()
            .fetch_by_id(id)
            .await
            .map_err(EmployeeServiceError::Storage)?
            .ok_or(EmployeeServiceError::NotFound(id))
    }

    /// Full-replaces the mutable fields of a record.
    ///
    /// The email is re-validated only when it differs from the stored value,
    /// and likewise for the department; the store's version guard is the
    /// authoritative safeguard against racing writers.
    pub async fn update(
        &self,
        id: Uuid,
        draft: EmployeeDraft,
    ) -> Result<EmployeeRecord, EmployeeServiceError> {
        counter!("employee_operations_total", "op" => "update").increment(1);
        info!(stage = "employee", %id, "updating employee");

        draft.validate_fields()?;

        let current = self
            .database
            .employees()
            .fetch_by_id(id)
            .await
            .map_err(EmployeeServiceError::Storage)?
            .ok_or(EmployeeServiceError::NotFound(id))?;

        if draft.email != current.email {
            self.ensure_email_deliverable(&draft.email).await?;
        }
        if draft.department != current.department {
            self.ensure_department_allowed(&draft.department)?;
        }

        let updated = self
            .database
            .employees()
            .update(
                id,
                &EmployeeChanges {
                    first_name: &draft.first_name,
                    last_name: &draft.last_name,
                    email: &draft.email,
                    department: &draft.department,
                    salary: draft.salary,
                },
                current.version,
                self.now(),
            )
            .await
            .map_err(|err| store_error(id, err))?;

        info!(stage = "employee", %id, version = updated.version, "employee updated");
        Ok(updated)
    }

    /// Removes a record, failing with `NotFound` when the id is absent.
    pub async fn delete(&self, id: Uuid) -> Result<(), EmployeeServiceError> {
        counter!("employee_operations_total", "op" => "delete").increment(1);
        info!(stage = "employee", %id, "deleting employee");
        self.database
            .employees()
            .delete(id)
            .await
            .map_err(|err| store_error(id, err))?;
        info!(stage = "employee", %id, "employee deleted");
        Ok(())
    }

    /// Lists every record in store-defined order.
    pub async fn list_all(&self) -> Result<Vec<EmployeeRecord>, EmployeeServiceError> {
        counter!("employee_operations_total", "op" => "list").increment(1);
        debug!(stage = "employee", "fetching all employees");
        let records = self
            .database
            .employees()
            .list_all()
            .await
            .map_err(EmployeeServiceError::Storage)?;
        debug!(stage = "employee", count = records.len(), "employees fetched");
        Ok(records)
    }

    /// Runs the deliverability check directly, without touching the store.
    pub async fn verify_email(&self, email: &str) -> Result<bool, EmployeeServiceError> {
        counter!("employee_operations_total", "op" => "verify_email").increment(1);
        Ok(self.verifier.check(email).await?)
    }

    async fn ensure_email_deliverable(&self, email: &str) -> Result<(), EmployeeServiceError> {
        debug!(stage = "employee", %email, "validating email deliverability");
        let deliverable = self.verifier.check(email).await?;
        if !deliverable {
            warn!(stage = "employee", %email, "invalid email address provided");
            return Err(EmployeeServiceError::InvalidInput {
                field: "email",
                reason: "email address is not deliverable".to_string(),
            });
        }
        debug!(stage = "employee", %email, "email validated successfully");
        Ok(())
    }

    fn ensure_department_allowed(&self, department: &str) -> Result<(), EmployeeServiceError> {
        debug!(stage = "employee", %department, "validating department");
        if !self.departments.is_allowed(department) {
            warn!(stage = "employee", %department, "invalid department provided");
            return Err(EmployeeServiceError::InvalidInput {
                field: "department",
                reason: "department is not in the allow-list".to_string(),
            });
        }
        debug!(stage = "employee", %department, "department validated successfully");
        Ok(())
    }
}

fn store_error(id: Uuid, err: EmployeeError) -> EmployeeServiceError {
    match err {
        EmployeeError::NotFound => EmployeeServiceError::NotFound(id),
        EmployeeError::VersionConflict => EmployeeServiceError::Conflict(id),
        other => EmployeeServiceError::Storage(other),
    }
}

/// Errors surfaced by the employee orchestrator.
#[derive(Debug, Error)]
pub enum EmployeeServiceError {
    #[error("invalid {field}: {reason}")]
    InvalidInput {
        field: &'static str,
        reason: String,
    },
    #[error("employee not found with id: {0}")]
    NotFound(Uuid),
    #[error("employee {0} was modified concurrently")]
    Conflict(Uuid),
    #[error("deliverability check failed: {0}")]
    Deliverability(#[from] DeliverabilityError),
    #[error("storage error: {0}")]
    Storage(EmployeeError),
}

impl From<staffdesk_core::types::InvalidField> for EmployeeServiceError {
    fn from(err: staffdesk_core::types::InvalidField) -> Self {
        Self::InvalidInput {
            field: err.field,
            reason: err.reason.to_string(),
        }
    }
}
