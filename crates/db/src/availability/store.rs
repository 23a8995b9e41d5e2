use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use rentdesk_core::clock::Clock;
use rentdesk_core::domain::availability::{AvailabilitySnapshot, VehicleAvailability};
use rentdesk_core::domain::vehicle::VehicleId;

use super::{AvailabilityGrid, AvailabilityPersistence, AvailabilityStoreError};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub vehicles_materialized: usize,
    pub days_added: usize,
    pub persisted: bool,
}

pub struct AvailabilityStore {
    grid: RwLock<AvailabilityGrid>,
    persist_lock: Mutex<()>,
    /// Set while the last write failed, so the next mutation retries it.
    dirty: AtomicBool,
    persistence: Arc<dyn AvailabilityPersistence>,
    clock: Arc<dyn Clock>,
    horizon_days: u32,
}

impl AvailabilityStore {
    /// Loads the persisted grid. A load failure is logged and the store starts empty.
    pub async fn open(
        persistence: Arc<dyn AvailabilityPersistence>,
        clock: Arc<dyn Clock>,
        horizon_days: u32,
    ) -> Self {
        let grid = match persistence.load().await {
            Ok(grid) => {
                tracing::info!(
                    event_name = "availability.load.completed",
                    source = %persistence.describe(),
                    vehicles = grid.len(),
                    "availability loaded"
                );
                grid
            }
            Err(error) => {
                tracing::error!(
                    event_name = "availability.load.failed",
                    source = %persistence.describe(),
                    error = %error,
                    "availability could not be loaded; starting with an empty grid"
                );
                AvailabilityGrid::new()
            }
        };

        Self {
            grid: RwLock::new(grid),
            persist_lock: Mutex::new(()),
            dirty: AtomicBool::new(false),
            persistence,
            clock,
            horizon_days,
        }
    }

    pub fn horizon_days(&self) -> u32 {
        self.horizon_days
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Materializes unknown vehicles and extends every listed vehicle to the horizon. Writes
    /// only when at least one day was added or an earlier write failed. On a write failure the
    /// in-memory additions stay.
    pub async fn reconcile(
        &self,
        vehicle_ids: &[VehicleId],
    ) -> Result<ReconcileReport, AvailabilityStoreError> {
        let _persist_guard = self.persist_lock.lock().await;
        let today = self.clock.today();

        let mut report = ReconcileReport::default();
        let snapshot = {
            let mut grid = self.grid.write().await;
            for vehicle_id in vehicle_ids {
                let availability = grid.entry(vehicle_id.clone()).or_insert_with(|| {
                    report.vehicles_materialized += 1;
                    VehicleAvailability::new()
                });
                report.days_added += availability.ensure_horizon(today, self.horizon_days);
            }

            if report.days_added == 0 && !self.dirty.load(Ordering::SeqCst) {
                None
            } else {
                Some(grid.clone())
            }
        };

        let Some(snapshot) = snapshot else {
            tracing::debug!(
                event_name = "availability.reconcile.noop",
                vehicles = vehicle_ids.len(),
                "availability already covers the horizon"
            );
            return Ok(report);
        };

        self.persist(&snapshot, "reconcile").await?;
        report.persisted = true;
        tracing::info!(
            event_name = "availability.reconcile.persisted",
            vehicles_materialized = report.vehicles_materialized,
            days_added = report.days_added,
            "availability reconciled"
        );
        Ok(report)
    }

    /// `[today, today + days_ahead)`. Unknown vehicles read as free on every day.
    pub async fn availability(&self, vehicle_id: &VehicleId, days_ahead: u32) -> AvailabilitySnapshot {
        let today = self.clock.today();
        let grid = self.grid.read().await;
        match grid.get(vehicle_id) {
            Some(availability) => availability.window(today, days_ahead),
            None => {
                tracing::debug!(
                    event_name = "availability.unknown_vehicle",
                    vehicle_id = %vehicle_id,
                    "unknown vehicle reads as available"
                );
                AvailabilitySnapshot::all_free(today, days_ahead)
            }
        }
    }

    /// Marks the inclusive range and returns how many days changed. Unknown vehicles are
    /// materialized first. Writes only when something changed.
    pub async fn set_availability(
        &self,
        vehicle_id: &VehicleId,
        from: NaiveDate,
        to: NaiveDate,
        available: bool,
    ) -> Result<usize, AvailabilityStoreError> {
        if to < from {
            return Err(AvailabilityStoreError::InvalidRange { from, to });
        }

        let _persist_guard = self.persist_lock.lock().await;
        let today = self.clock.today();

        let (changed, snapshot) = {
            let mut grid = self.grid.write().await;
            let mut materialized = false;
            let availability = grid.entry(vehicle_id.clone()).or_insert_with(|| {
                materialized = true;
                VehicleAvailability::new()
            });
            let mut added = 0;
            if materialized {
                added = availability.ensure_horizon(today, self.horizon_days);
            }

            let changed = from
                .iter_days()
                .take_while(|date| *date <= to)
                .filter(|date| availability.set(*date, available))
                .count();

            if changed == 0 && added == 0 && !self.dirty.load(Ordering::SeqCst) {
                (0, None)
            } else {
                (changed, Some(grid.clone()))
            }
        };

        if let Some(snapshot) = snapshot {
            self.persist(&snapshot, "set_availability").await?;
        }

        tracing::info!(
            event_name = "availability.range.marked",
            vehicle_id = %vehicle_id,
            from = %from,
            to = %to,
            available,
            changed,
            "availability range marked"
        );
        Ok(changed)
    }

    pub async fn snapshot(&self, vehicle_id: &VehicleId) -> Option<VehicleAvailability> {
        self.grid.read().await.get(vehicle_id).cloned()
    }

    pub async fn vehicle_ids(&self) -> Vec<VehicleId> {
        self.grid.read().await.keys().cloned().collect()
    }

    async fn persist(
        &self,
        snapshot: &AvailabilityGrid,
        operation: &'static str,
    ) -> Result<(), AvailabilityStoreError> {
        let result = self.persistence.save(snapshot).await;
        self.dirty.store(result.is_err(), Ordering::SeqCst);
        result.map_err(|error| {
            tracing::error!(
                event_name = "availability.persist.failed",
                operation,
                target = %self.persistence.describe(),
                error = %error,
                "availability write failed; in-memory grid keeps the change"
            );
            error
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use rentdesk_core::clock::FixedClock;
    use rentdesk_core::domain::vehicle::VehicleId;

    use super::AvailabilityStore;
    use crate::availability::{AvailabilityStoreError, InMemoryAvailabilityPersistence};

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    fn car() -> VehicleId {
        VehicleId("car1".to_string())
    }

    async fn store(persistence: Arc<InMemoryAvailabilityPersistence>) -> AvailabilityStore {
        AvailabilityStore::open(persistence, Arc::new(FixedClock::new(date("2024-06-08"))), 100).await
    }

    #[tokio::test]
    async fn reconciled_vehicle_has_full_free_window() {
        let persistence = Arc::new(InMemoryAvailabilityPersistence::default());
        let store = store(persistence.clone()).await;

        let report = store.reconcile(&[car()]).await.expect("reconcile");
        assert_eq!(report.vehicles_materialized, 1);
        assert_eq!(report.days_added, 101);
        assert!(report.persisted);

        let window = store.availability(&car(), 100).await;
        let dates: Vec<NaiveDate> = window.dates().collect();
        assert_eq!(dates.len(), 100);
        assert_eq!(dates[0], date("2024-06-08"));
        assert!(dates.windows(2).all(|pair| pair[1] == pair[0].succ_opt().expect("next day")));
        assert!(window.days().all(|(_, available)| available));
    }

    #[tokio::test]
    async fn second_reconcile_does_not_write() {
        let persistence = Arc::new(InMemoryAvailabilityPersistence::default());
        let store = store(persistence.clone()).await;

        store.reconcile(&[car()]).await.expect("first reconcile");
        let report = store.reconcile(&[car()]).await.expect("second reconcile");

        assert_eq!(report.days_added, 0);
        assert!(!report.persisted);
        assert_eq!(persistence.save_count(), 1);
    }

    #[tokio::test]
    async fn unknown_vehicle_query_is_fail_open() {
        let store = store(Arc::new(InMemoryAvailabilityPersistence::default())).await;

        let window = store.availability(&VehicleId("ghost".to_string()), 10).await;

        assert_eq!(window.len(), 10);
        assert!(window.days().all(|(_, available)| available));
        assert!(store.snapshot(&VehicleId("ghost".to_string())).await.is_none());
    }

    #[tokio::test]
    async fn marking_writes_only_on_change() {
        let persistence = Arc::new(InMemoryAvailabilityPersistence::default());
        let store = store(persistence.clone()).await;
        store.reconcile(&[car()]).await.expect("reconcile");

        let changed =
            store.set_availability(&car(), date("2024-06-10"), date("2024-06-12"), false).await.expect("block");
        assert_eq!(changed, 3);
        assert_eq!(persistence.save_count(), 2);

        let changed =
            store.set_availability(&car(), date("2024-06-10"), date("2024-06-12"), false).await.expect("block");
        assert_eq!(changed, 0);
        assert_eq!(persistence.save_count(), 2);

        let window = store.availability(&car(), 5).await;
        assert_eq!(window.get(date("2024-06-09")), Some(true));
        assert_eq!(window.get(date("2024-06-10")), Some(false));
    }

    #[tokio::test]
    async fn reversed_range_is_rejected() {
        let store = store(Arc::new(InMemoryAvailabilityPersistence::default())).await;

        let result = store.set_availability(&car(), date("2024-06-12"), date("2024-06-10"), false).await;

        assert!(matches!(result, Err(AvailabilityStoreError::InvalidRange { .. })));
    }

    #[tokio::test]
    async fn failed_write_keeps_in_memory_additions() {
        let persistence = Arc::new(InMemoryAvailabilityPersistence::default());
        persistence.set_fail_saves(true);
        let store = store(persistence.clone()).await;

        assert!(store.reconcile(&[car()]).await.is_err());
        assert!(store.snapshot(&car()).await.is_some());

        persistence.set_fail_saves(false);
        let report = store.reconcile(&[car()]).await.expect("reconcile");
        assert_eq!(report.days_added, 0);
        assert!(report.persisted);
        assert_eq!(persistence.stored().await.len(), 1);

        let report = store.reconcile(&[car()]).await.expect("reconcile");
        assert!(!report.persisted);
    }
}
