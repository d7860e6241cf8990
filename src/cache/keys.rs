//! Cache key layout. These names are shared with existing cache contents and must not change.

/// Global index set of every synced vehicle id.
pub const ALL_CARS: &str = "cars:all";

/// Time-boxed snapshot of the full vehicle collection.
pub const SNAPSHOT: &str = "cars:snapshot";

/// Per-employee vehicle list consumed by the read path.
pub fn employee_vehicles(employee_id: i64) -> String {
    format!("employee:{}:vehicles", employee_id)
}

/// Single vehicle record written by the sync job.
pub fn car(vehicle_id: i64) -> String {
    format!("car:{}", vehicle_id)
}

/// Per-employee index set of vehicle ids written by the sync job.
pub fn employee_cars(employee_id: i64) -> String {
    format!("employee:{}:cars", employee_id)
}
