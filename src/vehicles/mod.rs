//! Per-employee vehicle lookups for the HTTP layer.
//!
//! Two modes behind one contract:
//! - cache-backed: reads and writes `employee:{id}:vehicles` in the cache store;
//! - passthrough: asks the upstream fleet API on every read, no mutation.
//!
//! Reads never fail. Upstream and cache trouble degrades to an empty list.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::cache::{keys, CacheStore, StoreError};
use crate::models::Vehicle;
use crate::upstream::FleetApi;

/// Mutation attempted in passthrough mode; the upstream API is read-only to us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{0} is not supported when vehicles are read from the upstream API")]
pub struct UnsupportedOperation(pub &'static str);

/// Errors surfaced by vehicle cache mutations.
#[derive(Debug, Error)]
pub enum VehicleCacheError {
    #[error(transparent)]
    Unsupported(#[from] UnsupportedOperation),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to encode vehicles: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Which backing source serves vehicle lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    CacheBacked,
    Passthrough,
}

impl fmt::Display for CacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheMode::CacheBacked => f.write_str("cache-backed"),
            CacheMode::Passthrough => f.write_str("passthrough"),
        }
    }
}

/// Vehicle list contract consumed by the employee endpoints.
#[async_trait]
pub trait VehicleCache: Send + Sync {
    /// Vehicles for `employee_id`; empty when nothing is known or a dependency fails.
    async fn vehicles_for_employee(&self, employee_id: i64) -> Vec<Vehicle>;

    /// Full replace of the employee's list.
    async fn set_vehicles_for_employee(
        &self,
        employee_id: i64,
        vehicles: &[Vehicle],
    ) -> Result<(), VehicleCacheError>;

    /// Remove the employee's list. Idempotent.
    async fn delete_vehicles_for_employee(&self, employee_id: i64) -> Result<(), VehicleCacheError>;

    fn mode(&self) -> CacheMode;
}

enum Source {
    Cache(Arc<dyn CacheStore>),
    Upstream(Arc<FleetApi>),
}

/// [`VehicleCache`] over either the cache store or the upstream API.
pub struct VehicleCacheService {
    source: Source,
}

impl VehicleCacheService {
    pub fn cache_backed(store: Arc<dyn CacheStore>) -> Self {
        Self {
            source: Source::Cache(store),
        }
    }

    pub fn passthrough(api: Arc<FleetApi>) -> Self {
        Self {
            source: Source::Upstream(api),
        }
    }

    fn store(&self, operation: &'static str) -> Result<&Arc<dyn CacheStore>, UnsupportedOperation> {
        match &self.source {
            Source::Cache(store) => Ok(store),
            Source::Upstream(_) => Err(UnsupportedOperation(operation)),
        }
    }
}

#[async_trait]
impl VehicleCache for VehicleCacheService {
    async fn vehicles_for_employee(&self, employee_id: i64) -> Vec<Vehicle> {
        match &self.source {
            Source::Cache(store) => read_cached(store.as_ref(), employee_id).await,
            Source::Upstream(api) => match api.vehicles(Some(employee_id)).await {
                Ok(vehicles) => vehicles,
                Err(e) => {
                    error!(employee_id, error = %e, "Failed to fetch vehicles from upstream");
                    Vec::new()
                }
            },
        }
    }

    async fn set_vehicles_for_employee(
        &self,
        employee_id: i64,
        vehicles: &[Vehicle],
    ) -> Result<(), VehicleCacheError> {
        let store = self.store("setting vehicles")?;
        let json = serde_json::to_vec(vehicles)?;
        store
            .set(&keys::employee_vehicles(employee_id), json, None)
            .await?;

        debug!(employee_id, count = vehicles.len(), "Stored employee vehicles");
        Ok(())
    }

    async fn delete_vehicles_for_employee(&self, employee_id: i64) -> Result<(), VehicleCacheError> {
        let store = self.store("deleting vehicles")?;
        store.delete(&keys::employee_vehicles(employee_id)).await?;

        debug!(employee_id, "Deleted employee vehicles");
        Ok(())
    }

    fn mode(&self) -> CacheMode {
        match self.source {
            Source::Cache(_) => CacheMode::CacheBacked,
            Source::Upstream(_) => CacheMode::Passthrough,
        }
    }
}

async fn read_cached(store: &dyn CacheStore, employee_id: i64) -> Vec<Vehicle> {
    let key = keys::employee_vehicles(employee_id);
    let bytes = match store.get(&key).await {
        Ok(Some(bytes)) if !bytes.is_empty() => bytes,
        Ok(_) => return Vec::new(),
        Err(e) => {
            error!(%key, error = %e, "Failed to read employee vehicles from cache");
            return Vec::new();
        }
    };

    match serde_json::from_slice::<Option<Vec<Vehicle>>>(&bytes) {
        Ok(vehicles) => vehicles.unwrap_or_default(),
        Err(e) => {
            warn!(%key, error = %e, "Cached employee vehicles could not be decoded");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::cache::MemoryCacheStore;
    use crate::config::{parse_base_url, UpstreamConfig};

    fn vehicle(id: i64, employee_id: i64) -> Vehicle {
        Vehicle {
            id,
            size: Some("m".to_string()),
            fuel: Some("electric".to_string()),
            doors: 5,
            transmission: Some("auto".to_string()),
            trips: Some(vec![]),
            employee_id,
        }
    }

    fn cached() -> (Arc<MemoryCacheStore>, VehicleCacheService) {
        let store = Arc::new(MemoryCacheStore::new());
        let service = VehicleCacheService::cache_backed(store.clone());
        (store, service)
    }

    fn passthrough(server: &MockServer) -> VehicleCacheService {
        let api = FleetApi::new(&UpstreamConfig {
            base_url: parse_base_url(&server.uri()).unwrap(),
            api_user: None,
            api_key: None,
            timeout: Duration::from_secs(5),
        })
        .unwrap();
        VehicleCacheService::passthrough(Arc::new(api))
    }

    #[tokio::test]
    async fn test_missing_entry_is_empty() {
        let (_, service) = cached();
        for id in [0, 1, 42, -7] {
            assert!(service.vehicles_for_employee(id).await.is_empty());
        }
    }

    #[tokio::test]
    async fn test_set_then_get_round_trips() {
        let (_, service) = cached();
        let vehicles = vec![vehicle(1, 5), vehicle(2, 5)];

        service.set_vehicles_for_employee(5, &vehicles).await.unwrap();
        assert_eq!(service.vehicles_for_employee(5).await, vehicles);
    }

    #[tokio::test]
    async fn test_set_replaces_whole_list() {
        let (_, service) = cached();
        service
            .set_vehicles_for_employee(5, &[vehicle(1, 5), vehicle(2, 5)])
            .await
            .unwrap();
        service.set_vehicles_for_employee(5, &[vehicle(3, 5)]).await.unwrap();

        assert_eq!(service.vehicles_for_employee(5).await, vec![vehicle(3, 5)]);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (_, service) = cached();
        service.set_vehicles_for_employee(5, &[vehicle(1, 5)]).await.unwrap();

        service.delete_vehicles_for_employee(5).await.unwrap();
        service.delete_vehicles_for_employee(5).await.unwrap();
        assert!(service.vehicles_for_employee(5).await.is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_empty() {
        let (store, service) = cached();
        store
            .set("employee:9:vehicles", b"{not json".to_vec(), None)
            .await
            .unwrap();

        assert!(service.vehicles_for_employee(9).await.is_empty());
    }

    #[tokio::test]
    async fn test_store_error_on_read_is_empty() {
        let (store, service) = cached();
        store.set_add("employee:9:vehicles", "1").await.unwrap();

        assert!(service.vehicles_for_employee(9).await.is_empty());
    }

    #[tokio::test]
    async fn test_cache_writes_only_touch_employee_key() {
        let (store, service) = cached();
        service.set_vehicles_for_employee(5, &[vehicle(1, 5)]).await.unwrap();

        assert_eq!(store.keys().await, vec!["employee:5:vehicles"]);
    }

    #[tokio::test]
    async fn test_passthrough_one_auth_and_one_fetch_per_read() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "t"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/cars"))
            .and(query_param("employeeid", "5"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{"id": 1, "doors": 5, "employeeid": 5}])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let service = passthrough(&server);
        let vehicles = service.vehicles_for_employee(5).await;
        assert_eq!(vehicles.len(), 1);
        assert_eq!(service.mode(), CacheMode::Passthrough);
    }

    #[tokio::test]
    async fn test_passthrough_upstream_failures_are_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/token"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "t"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/cars"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let service = passthrough(&server);
        assert!(service.vehicles_for_employee(5).await.is_empty());
        assert!(service.vehicles_for_employee(5).await.is_empty());
    }

    #[tokio::test]
    async fn test_passthrough_rejects_mutation() {
        let server = MockServer::start().await;
        let service = passthrough(&server);

        assert!(matches!(
            service.set_vehicles_for_employee(5, &[vehicle(1, 5)]).await,
            Err(VehicleCacheError::Unsupported(_))
        ));
        assert!(matches!(
            service.delete_vehicles_for_employee(5).await,
            Err(VehicleCacheError::Unsupported(_))
        ));
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
