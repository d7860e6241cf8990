//! Vehicle cache synchronization.
//!
//! A [`SyncJob`] runs one cycle: token, full vehicle listing, then a single
//! batch that writes each `car:{id}`, the `cars:all` and `employee:{id}:cars`
//! index sets, and a TTL-bound `cars:snapshot`. The job is Idle or Running;
//! a tick while Running is a no-op. [`SyncScheduler`] fires ticks on a cron schedule.

mod scheduler;

pub use scheduler::SyncScheduler;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::cache::{keys, Batch, CacheStore};
use crate::models::Vehicle;
use crate::upstream::{FleetApi, UpstreamError};

/// Result of one [`SyncJob::tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Another cycle was already running
    Skipped,
    /// Token request failed; nothing written
    AuthFailed,
    /// Vehicle listing failed; nothing written
    FetchFailed,
    /// Fetched vehicles could not be serialized; nothing written
    EncodeFailed,
    /// Caching is disabled; vehicles were fetched but not written
    CacheDisabled { vehicles: usize },
    /// Batch flushed; `failed_ops` operations reported an error
    Completed { vehicles: usize, failed_ops: usize },
}

/// One sync cycle's collaborators and the Idle/Running flag.
pub struct SyncJob {
    upstream: Arc<FleetApi>,
    store: Option<Arc<dyn CacheStore>>,
    snapshot_ttl: Duration,
    running: AtomicBool,
}

/// Returns the job to Idle when dropped, including on cancellation or panic.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SyncJob {
    /// `store: None` disables caching: cycles still fetch but write nothing.
    pub fn new(
        upstream: Arc<FleetApi>,
        store: Option<Arc<dyn CacheStore>>,
        snapshot_ttl: Duration,
    ) -> Self {
        Self {
            upstream,
            store,
            snapshot_ttl,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run one cycle unless one is already in flight.
    pub async fn tick(&self) -> CycleOutcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("CarsSync already running, skipping tick");
            return CycleOutcome::Skipped;
        }
        let _guard = RunningGuard(&self.running);

        let cycle_id = Uuid::new_v4();
        self.run_cycle()
            .instrument(info_span!("cars_sync", %cycle_id))
            .await
    }

    async fn run_cycle(&self) -> CycleOutcome {
        let started = Instant::now();
        info!(at = %chrono::Utc::now().to_rfc3339(), "CarsSync started");

        let vehicles = match self.upstream.vehicles(None).await {
            Ok(vehicles) => vehicles,
            Err(UpstreamError::Auth(e)) => {
                error!(error = %e, "CarsSync aborted: token request failed");
                return CycleOutcome::AuthFailed;
            }
            Err(e) => {
                error!(error = %e, "CarsSync aborted: vehicle listing failed");
                return CycleOutcome::FetchFailed;
            }
        };
        info!(count = vehicles.len(), "Retrieved cars from API");

        let Some(store) = &self.store else {
            info!("Cache not used, skipping cache writes");
            return CycleOutcome::CacheDisabled {
                vehicles: vehicles.len(),
            };
        };

        let batch = match build_batch(&vehicles, self.snapshot_ttl) {
            Ok(batch) => batch,
            Err(e) => return encode_failed(&e),
        };

        let ops = batch.ops().to_vec();
        let results = store.execute(batch).await;

        let mut failed_ops = 0;
        for (op, result) in ops.iter().zip(&results) {
            if let Err(e) = result {
                failed_ops += 1;
                warn!(command = op.name(), key = op.key(), error = %e, "Cache write failed");
            }
        }

        info!(
            count = vehicles.len(),
            operations = ops.len(),
            failed_ops,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Pushed cars to cache"
        );

        CycleOutcome::Completed {
            vehicles: vehicles.len(),
            failed_ops,
        }
    }
}

fn encode_failed(err: &serde_json::Error) -> CycleOutcome {
    error!(error = %err, "CarsSync aborted: vehicles could not be encoded");
    CycleOutcome::EncodeFailed
}

/// Queue the writes for one cycle. Unassigned vehicles (`employee_id == 0`) get no per-employee index.
pub fn build_batch(vehicles: &[Vehicle], snapshot_ttl: Duration) -> Result<Batch, serde_json::Error> {
    let mut batch = Batch::new();

    for vehicle in vehicles {
        batch
            .set(keys::car(vehicle.id), serde_json::to_vec(vehicle)?)
            .set_add(keys::ALL_CARS, vehicle.id);

        if let Some(owner) = vehicle.owner() {
            batch.set_add(keys::employee_cars(owner), vehicle.id);
        }
    }

    batch.set_with_ttl(keys::SNAPSHOT, serde_json::to_vec(vehicles)?, snapshot_ttl);
    Ok(batch)
}
