use std::sync::Arc;

use chrono::NaiveDate;
use tempfile::TempDir;

use rentdesk_core::calendar::{render_month, DayStatus};
use rentdesk_core::clock::FixedClock;
use rentdesk_core::domain::vehicle::VehicleId;
use rentdesk_db::{AvailabilityPersistence, AvailabilityStore, JsonFileAvailability};

type AvailabilityTestResult<T = ()> = Result<T, String>;

macro_rules! require {
    ($cond:expr) => {
        if !$cond {
            return Err(format!("assertion failed: `{}`", stringify!($cond)));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

macro_rules! require_eq {
    ($left:expr, $right:expr) => {
        if $left != $right {
            return Err(format!(
                "assertion failed: `left == right` (`{:?}` != `{:?}`)",
                $left,
                $right
            ));
        }
    };
}

fn date(value: &str) -> AvailabilityTestResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|error| error.to_string())
}

fn vehicle(id: &str) -> VehicleId {
    VehicleId(id.to_string())
}

async fn open_store(path: &std::path::Path, today: NaiveDate) -> AvailabilityStore {
    AvailabilityStore::open(
        Arc::new(JsonFileAvailability::new(path)),
        Arc::new(FixedClock::new(today)),
        100,
    )
    .await
}

#[tokio::test]
async fn persisted_grid_reloads_identically() -> AvailabilityTestResult {
    let dir = TempDir::new().map_err(|error| error.to_string())?;
    let path = dir.path().join("data").join("availability.json");
    let today = date("2024-06-08")?;

    let store = open_store(&path, today).await;
    store.reconcile(&[vehicle("car1"), vehicle("moto1")]).await.map_err(|error| error.to_string())?;
    store
        .set_availability(&vehicle("car1"), date("2024-06-10")?, date("2024-06-10")?, false)
        .await
        .map_err(|error| error.to_string())?;

    let reloaded = open_store(&path, today).await;
    for id in [vehicle("car1"), vehicle("moto1")] {
        let before = store.snapshot(&id).await;
        let after = reloaded.snapshot(&id).await;
        require!(before.is_some(), "{id} should be present before reload");
        require_eq!(before, after);
    }

    let leftovers: Vec<String> = std::fs::read_dir(dir.path().join("data"))
        .map_err(|error| error.to_string())?
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp"))
        .collect();
    require!(leftovers.is_empty(), "temp files left behind: {leftovers:?}");
    Ok(())
}

#[tokio::test]
async fn reconcile_twice_leaves_file_untouched() -> AvailabilityTestResult {
    let dir = TempDir::new().map_err(|error| error.to_string())?;
    let path = dir.path().join("availability.json");
    let today = date("2024-06-08")?;

    let store = open_store(&path, today).await;
    let first = store.reconcile(&[vehicle("car1")]).await.map_err(|error| error.to_string())?;
    require!(first.persisted);
    let written = std::fs::read_to_string(&path).map_err(|error| error.to_string())?;

    std::fs::write(&path, "sentinel").map_err(|error| error.to_string())?;
    let second = store.reconcile(&[vehicle("car1")]).await.map_err(|error| error.to_string())?;
    require!(!second.persisted, "second reconcile should not write");
    require_eq!(std::fs::read_to_string(&path).map_err(|error| error.to_string())?, "sentinel");
    require!(written.contains("\"isAvailable\": true"));
    Ok(())
}

#[tokio::test]
async fn horizon_rolls_forward_without_dropping_past_days() -> AvailabilityTestResult {
    let dir = TempDir::new().map_err(|error| error.to_string())?;
    let path = dir.path().join("availability.json");

    let store = open_store(&path, date("2024-06-08")?).await;
    store.reconcile(&[vehicle("car1")]).await.map_err(|error| error.to_string())?;

    let later = open_store(&path, date("2024-06-18")?).await;
    let report = later.reconcile(&[vehicle("car1")]).await.map_err(|error| error.to_string())?;
    require_eq!(report.days_added, 10);

    let snapshot = later.snapshot(&vehicle("car1")).await.ok_or("car1 missing")?;
    require_eq!(snapshot.get(date("2024-06-08")?), Some(true));
    require_eq!(snapshot.len(), 111);
    Ok(())
}

#[tokio::test]
async fn malformed_file_degrades_to_empty_store() -> AvailabilityTestResult {
    let dir = TempDir::new().map_err(|error| error.to_string())?;
    let path = dir.path().join("availability.json");
    std::fs::write(&path, "{ not json").map_err(|error| error.to_string())?;

    require!(JsonFileAvailability::new(&path).load().await.is_err());

    let store = open_store(&path, date("2024-06-08")?).await;
    require!(store.vehicle_ids().await.is_empty());

    let report = store.reconcile(&[vehicle("car1")]).await.map_err(|error| error.to_string())?;
    require!(report.persisted);
    require!(JsonFileAvailability::new(&path).load().await.is_ok());
    Ok(())
}

#[tokio::test]
async fn empty_file_loads_as_empty_grid() -> AvailabilityTestResult {
    for contents in ["", "  \n"] {
        let dir = TempDir::new().map_err(|error| error.to_string())?;
        let path = dir.path().join("availability.json");
        std::fs::write(&path, contents).map_err(|error| error.to_string())?;

        let grid = JsonFileAvailability::new(&path).load().await.map_err(|error| error.to_string())?;
        require!(grid.is_empty(), "{contents:?} should load as an empty grid");

        let store = open_store(&path, date("2024-06-08")?).await;
        require!(store.vehicle_ids().await.is_empty());

        let report = store.reconcile(&[vehicle("car1")]).await.map_err(|error| error.to_string())?;
        require_eq!(report.vehicles_materialized, 1);
        require!(report.persisted);

        let reloaded = JsonFileAvailability::new(&path).load().await.map_err(|error| error.to_string())?;
        require!(reloaded.contains_key(&vehicle("car1")));
    }
    Ok(())
}

#[tokio::test]
async fn blocked_day_invalidates_later_end_dates() -> AvailabilityTestResult {
    let dir = TempDir::new().map_err(|error| error.to_string())?;
    let path = dir.path().join("availability.json");
    let today = date("2024-06-08")?;

    let store = open_store(&path, today).await;
    store.reconcile(&[vehicle("car1")]).await.map_err(|error| error.to_string())?;
    store
        .set_availability(&vehicle("car1"), date("2024-06-10")?, date("2024-06-10")?, false)
        .await
        .map_err(|error| error.to_string())?;

    let snapshot = store.availability(&vehicle("car1"), store.horizon_days()).await;
    let grid = render_month(2024, 6, &snapshot, Some(today), today).map_err(|error| error.to_string())?;

    require_eq!(grid.day(date("2024-06-09")?).map(|cell| cell.status), Some(DayStatus::ValidEnd));
    for day in 10..=30 {
        let current = NaiveDate::from_ymd_opt(2024, 6, day).ok_or("bad day")?;
        let status = grid.day(current).map(|cell| cell.status);
        require!(
            matches!(status, Some(DayStatus::InvalidEnd) | Some(DayStatus::Unavailable)),
            "{current} should not be a valid end, got {status:?}"
        );
    }
    Ok(())
}
