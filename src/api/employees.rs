//! Employee API endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::{success, ApiResponse, ApiResult};
use crate::errors::AppError;
use crate::models::{Employee, Vehicle};
use crate::vehicles::{VehicleCache, VehicleCacheError};
use crate::AppState;

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Employee {} not found", id))
}

fn validate(employee: &Employee) -> Result<(), AppError> {
    if employee.first_name.trim().is_empty() || employee.last_name.trim().is_empty() {
        return Err(AppError::Validation(
            "First and last name are required".to_string(),
        ));
    }
    Ok(())
}

/// GET /api/employees/{id} - Employee with the vehicles currently known for them.
pub async fn get_employee(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Employee> {
    let mut employee = state.repo.get(id).await?.ok_or_else(|| not_found(id))?;
    employee.vehicles = state.vehicles.vehicles_for_employee(id).await;
    success(employee)
}

/// POST /api/employees - Create an employee. An id of 0 assigns the next free id.
pub async fn create_employee(
    State(state): State<AppState>,
    Json(employee): Json<Employee>,
) -> ApiResult<Employee> {
    validate(&employee)?;

    let created = state.repo.create(&employee).await?;
    Ok(ApiResponse::new(created).with_status(StatusCode::CREATED))
}

/// PUT /api/employees/{id} - Full replace. The path id wins over the body.
pub async fn update_employee(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(mut employee): Json<Employee>,
) -> ApiResult<Employee> {
    validate(&employee)?;
    employee.id = id;

    if !state.repo.update(id, &employee).await? {
        return Err(not_found(id));
    }
    employee.vehicles = Vec::new();
    success(employee)
}

/// DELETE /api/employees/{id} - Delete an employee and drop their cached vehicle list.
pub async fn delete_employee(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    // Cache cleanup is best effort and never blocks the delete.
    match state.vehicles.delete_vehicles_for_employee(id).await {
        Ok(()) => {}
        Err(VehicleCacheError::Unsupported(_)) => {
            tracing::debug!(employee_id = id, "No vehicle cache to clean up in passthrough mode");
        }
        Err(e) => {
            tracing::warn!(employee_id = id, error = %e, "Failed to clear cached vehicles");
        }
    }

    if !state.repo.delete(id).await? {
        return Err(not_found(id));
    }
    success(())
}

/// GET /api/employees/{id}/vehicles - Vehicles for an employee; empty when unknown.
pub async fn get_employee_vehicles(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Vec<Vehicle>> {
    success(state.vehicles.vehicles_for_employee(id).await)
}

/// PUT /api/employees/{id}/vehicles - Replace the cached vehicle list.
pub async fn put_employee_vehicles(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(vehicles): Json<Vec<Vehicle>>,
) -> ApiResult<Vec<Vehicle>> {
    state.vehicles.set_vehicles_for_employee(id, &vehicles).await?;
    success(vehicles)
}
