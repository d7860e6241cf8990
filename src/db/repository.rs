//! Employee repository.

use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::models::Employee;

/// Keyed CRUD over the `employees` table.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get an employee by ID. `vehicles` is left empty.
    pub async fn get(&self, id: i64) -> Result<Option<Employee>, AppError> {
        let row = sqlx::query("SELECT id, first_name, last_name, email FROM employees WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(employee_from_row))
    }

    /// Insert an employee.
    ///
    /// An id of 0 assigns the next id (highest existing + 1). A non-zero id
    /// replaces any record already stored under it.
    pub async fn create(&self, employee: &Employee) -> Result<Employee, AppError> {
        let id = (employee.id != 0).then_some(employee.id);

        let row = sqlx::query(
            r#"
            INSERT INTO employees (id, first_name, last_name, email) VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                email = excluded.email
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(&employee.first_name)
        .bind(&employee.last_name)
        .bind(&employee.email)
        .fetch_one(&self.pool)
        .await?;

        let id: i64 = row.get("id");
        tracing::info!(employee_id = id, "Employee created");

        Ok(Employee {
            id,
            vehicles: Vec::new(),
            ..employee.clone()
        })
    }

    /// Replace the employee stored under `id`. The path id wins over `employee.id`.
    ///
    /// Returns `false` when no such employee exists.
    pub async fn update(&self, id: i64, employee: &Employee) -> Result<bool, AppError> {
        let result =
            sqlx::query("UPDATE employees SET first_name = ?, last_name = ?, email = ? WHERE id = ?")
                .bind(&employee.first_name)
                .bind(&employee.last_name)
                .bind(&employee.email)
                .bind(id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete an employee. Returns `false` when no such employee exists.
    pub async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM employees WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn employee_from_row(row: &sqlx::sqlite::SqliteRow) -> Employee {
    Employee {
        id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        email: row.get("email"),
        vehicles: Vec::new(),
    }
}
