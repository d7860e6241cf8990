//! Employee model.

use serde::{Deserialize, Serialize};

use super::Vehicle;

/// An employee record. `vehicles` is a joined view filled at read time and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    #[serde(default)]
    pub id: i64,
    #[serde(alias = "firstName")]
    pub first_name: String,
    #[serde(alias = "lastName")]
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub vehicles: Vec<Vehicle>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vehicles_default_to_empty() {
        let employee: Employee = serde_json::from_str(
            r#"{"first_name": "Ada", "last_name": "Lovelace", "email": "ada@example.com"}"#,
        )
        .unwrap();

        assert_eq!(employee.id, 0);
        assert!(employee.vehicles.is_empty());
    }

    #[test]
    fn test_accepts_camel_case_names() {
        let employee: Employee = serde_json::from_str(
            r#"{"id": 4, "firstName": "Grace", "lastName": "Hopper", "email": "g@example.com"}"#,
        )
        .unwrap();

        assert_eq!(employee.first_name, "Grace");
        assert_eq!(employee.last_name, "Hopper");
    }
}
