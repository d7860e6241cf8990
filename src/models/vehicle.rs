//! Vehicle and trip models as served by the upstream fleet API.
//!
//! The JSON shape is also the cache encoding, so field names follow the
//! upstream wire format (`employeeid`) rather than Rust conventions.

use serde::{Deserialize, Serialize};

/// A fleet vehicle. `employee_id == 0` means the vehicle is unassigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    #[serde(default)]
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel: Option<String>,
    #[serde(default)]
    pub doors: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transmission: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trips: Option<Vec<Trip>>,
    #[serde(
        rename = "employeeid",
        alias = "employeeId",
        alias = "EmployeeId",
        default
    )]
    pub employee_id: i64,
}

impl Vehicle {
    /// Owning employee, or `None` when the vehicle is unassigned.
    pub fn owner(&self) -> Option<i64> {
        (self.employee_id != 0).then_some(self.employee_id)
    }
}

/// A single trip recorded against a vehicle. `start`/`end` are opaque upstream markers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Trip {
    pub id: i64,
    pub start: i64,
    pub end: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_upstream_payload() {
        let json = r#"{
            "size": "m", "fuel": "hybrid", "doors": 5, "transmission": "manual",
            "employeeid": 7, "id": 3,
            "trips": [{"id": 1, "start": 10, "end": 20, "description": "airport"}]
        }"#;

        let vehicle: Vehicle = serde_json::from_str(json).unwrap();
        assert_eq!(vehicle.id, 3);
        assert_eq!(vehicle.owner(), Some(7));
        assert_eq!(vehicle.trips.as_ref().unwrap()[0].description.as_deref(), Some("airport"));
    }

    #[test]
    fn test_accepts_camel_case_owner_and_missing_fields() {
        let vehicle: Vehicle = serde_json::from_str(r#"{"id": 9, "employeeId": 4}"#).unwrap();
        assert_eq!(vehicle.employee_id, 4);
        assert_eq!(vehicle.doors, 0);
        assert!(vehicle.size.is_none());
        assert!(vehicle.trips.is_none());
    }

    #[test]
    fn test_missing_numeric_fields_default_to_zero() {
        let vehicles: Vec<Vehicle> = serde_json::from_str(
            r#"[{"employeeid": 2, "trips": [{"id": 4, "start": 10}]}, {"id": 6}]"#,
        )
        .unwrap();

        assert_eq!(vehicles[0].id, 0);
        let trip = &vehicles[0].trips.as_ref().unwrap()[0];
        assert_eq!((trip.id, trip.start, trip.end), (4, 10, 0));
        assert_eq!(vehicles[1].id, 6);
    }

    #[test]
    fn test_unassigned_vehicle_has_no_owner() {
        let vehicle: Vehicle = serde_json::from_str(r#"{"id": 1, "employeeid": 0}"#).unwrap();
        assert_eq!(vehicle.owner(), None);
    }

    #[test]
    fn test_encodes_owner_as_employeeid() {
        let vehicle = Vehicle {
            id: 2,
            size: None,
            fuel: Some("electric".to_string()),
            doors: 3,
            transmission: None,
            trips: Some(vec![]),
            employee_id: 5,
        };

        let value = serde_json::to_value(&vehicle).unwrap();
        assert_eq!(value["employeeid"], 5);
        assert_eq!(value["trips"], serde_json::json!([]));
        assert!(value.get("size").is_none());
    }
}
