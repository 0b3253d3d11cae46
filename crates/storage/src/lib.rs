use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use sqlx::{migrate::MigrateError, sqlite::SqlitePoolOptions, Row, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

use staffdesk_core::types::EmployeeRecord;

/// Top-level database handle that owns the SQLite connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Establishes a new SQLite connection pool for the provided connection string.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(StorageError::Connect)?;

        apply_pragmas(&pool).await?;

        Ok(Self { pool })
    }

    /// Applies migrations located under `migrations/`.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;
        Ok(())
    }

    /// Returns a handle to operate on employee records.
    pub fn employees(&self) -> EmployeeRepository {
        EmployeeRepository {
            pool: self.pool.clone(),
        }
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn apply_pragmas(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::query("PRAGMA journal_mode = WAL;")
        .fetch_one(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA synchronous = NORMAL;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA busy_timeout = 5000;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    Ok(())
}

/// General storage level errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to sqlite: {0}")]
    Connect(sqlx::Error),
    #[error("failed to apply pragma: {0}")]
    Pragma(sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(MigrateError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository for the `employees` table.
///
/// Writes enforce optimistic concurrency: every update carries the version
/// the caller read, and a stale version is rejected without touching the row.
#[derive(Clone)]
pub struct EmployeeRepository {
    pool: SqlitePool,
}

impl EmployeeRepository {
    /// Inserts a new employee record with `version = 1`.
    ///
    /// Timestamps are truncated to millisecond precision so the returned
    /// record compares equal to what a later fetch reads back.
    pub async fn insert(&self, employee: &NewEmployee<'_>) -> Result<EmployeeRecord, EmployeeError> {
        let created = truncate_to_millis(employee.created_at);
        let created_at = to_rfc3339(created);
        sqlx::query(
            "INSERT INTO employees \
             (id, first_name, last_name, email, department, salary, created_at, updated_at, version) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1)",
        )
        .bind(employee.id.to_string())
        .bind(employee.first_name)
        .bind(employee.last_name)
        .bind(employee.email)
        .bind(employee.department)
        .bind(employee.salary)
        .bind(&created_at)
        .bind(&created_at)
        .execute(&self.pool)
        .await?;

        Ok(EmployeeRecord {
            id: employee.id,
            first_name: employee.first_name.to_string(),
            last_name: employee.last_name.to_string(),
            email: employee.email.to_string(),
            department: employee.department.to_string(),
            salary: employee.salary,
            created_at: created,
            updated_at: created,
            version: 1,
        })
    }

    /// Loads a single record by id.
    pub async fn fetch_by_id(&self, id: Uuid) -> Result<Option<EmployeeRecord>, EmployeeError> {
        let row = sqlx::query_as::<_, EmployeeRow>(
            "SELECT id, first_name, last_name, email, department, salary, \
                    created_at, updated_at, version \
             FROM employees WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(EmployeeRow::into_domain).transpose()
    }

    /// Full-replaces the mutable fields of a record, guarded by `expected_version`.
    ///
    /// The guarded write and the existence probe that distinguishes
    /// [`EmployeeError::NotFound`] from [`EmployeeError::VersionConflict`]
    /// run inside one transaction.
    pub async fn update(
        &self,
        id: Uuid,
        changes: &EmployeeChanges<'_>,
        expected_version: i64,
        updated_at: DateTime<Utc>,
    ) -> Result<EmployeeRecord, EmployeeError> {
        let updated_at = truncate_to_millis(updated_at);
        let id_text = id.to_string();
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "UPDATE employees \
             SET first_name = ?, last_name = ?, email = ?, department = ?, salary = ?, \
                 updated_at = ?, version = version + 1 \
             WHERE id = ? AND version = ? \
             RETURNING created_at, version",
        )
        .bind(changes.first_name)
        .bind(changes.last_name)
        .bind(changes.email)
        .bind(changes.department)
        .bind(changes.salary)
        .bind(to_rfc3339(updated_at))
        .bind(&id_text)
        .bind(expected_version)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            let exists = sqlx::query("SELECT 1 FROM employees WHERE id = ?")
                .bind(&id_text)
                .fetch_optional(&mut *tx)
                .await?
                .is_some();
            return Err(if exists {
                EmployeeError::VersionConflict
            } else {
                EmployeeError::NotFound
            });
        };

        let created_at: DateTime<Utc> = row.get("created_at");
        let version: i64 = row.get("version");
        tx.commit().await?;

        Ok(EmployeeRecord {
            id,
            first_name: changes.first_name.to_string(),
            last_name: changes.last_name.to_string(),
            email: changes.email.to_string(),
            department: changes.department.to_string(),
            salary: changes.salary,
            created_at,
            updated_at,
            version,
        })
    }

    /// Removes a record, failing when the id is absent.
    pub async fn delete(&self, id: Uuid) -> Result<(), EmployeeError> {
        let result = sqlx::query("DELETE FROM employees WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(EmployeeError::NotFound);
        }
        Ok(())
    }

    /// Lists every record in store-defined order.
    pub async fn list_all(&self) -> Result<Vec<EmployeeRecord>, EmployeeError> {
        let rows = sqlx::query_as::<_, EmployeeRow>(
            "SELECT id, first_name, last_name, email, department, salary, \
                    created_at, updated_at, version \
             FROM employees",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(EmployeeRow::into_domain).collect()
    }
}

/// Fields required to insert a new employee.
pub struct NewEmployee<'a> {
    pub id: Uuid,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub department: &'a str,
    pub salary: f64,
    pub created_at: DateTime<Utc>,
}

/// Replacement values for an update; every field overwrites the stored one.
pub struct EmployeeChanges<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub department: &'a str,
    pub salary: f64,
}

/// Errors that can occur while operating on employee records.
#[derive(Debug, Error)]
pub enum EmployeeError {
    #[error("employee not found")]
    NotFound,
    #[error("stored version does not match the version supplied by the caller")]
    VersionConflict,
    #[error("stored employee row is corrupt: {0}")]
    Corrupt(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, sqlx::FromRow)]
struct EmployeeRow {
    id: String,
    first_name: String,
    last_name: String,
    email: String,
    department: String,
    salary: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl EmployeeRow {
    fn into_domain(self) -> Result<EmployeeRecord, EmployeeError> {
        let id = Uuid::parse_str(&self.id).map_err(|_| EmployeeError::Corrupt(self.id.clone()))?;
        Ok(EmployeeRecord {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            department: self.department,
            salary: self.salary,
            created_at: self.created_at,
            updated_at: self.updated_at,
            version: self.version,
        })
    }
}

fn to_rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn truncate_to_millis(value: DateTime<Utc>) -> DateTime<Utc> {
    let nanos = value.nanosecond() - value.nanosecond() % 1_000_000;
    value.with_nanosecond(nanos).unwrap_or(value)
}
