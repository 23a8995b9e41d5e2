use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use rentdesk_core::domain::availability::VehicleAvailability;
use rentdesk_core::domain::vehicle::VehicleId;

use super::{AvailabilityGrid, AvailabilityPersistence, AvailabilityStoreError};

const DATE_FORMAT: &str = "%Y-%m-%d";
const LEGACY_DATES_KEY: &str = "AvailableDates";

/// JSON availability file:
/// `{ "<vehicle>": { "YYYY-MM-DD": { "isAvailable": bool } } }`.
///
/// Writes go to a hidden temp file in the same directory which is synced and then renamed over
/// the target, so a crash leaves either the old or the new snapshot on disk.
#[derive(Clone, Debug)]
pub struct JsonFileAvailability {
    path: PathBuf,
}

#[derive(Debug, Serialize)]
struct DayEntry {
    #[serde(rename = "isAvailable")]
    is_available: bool,
}

#[derive(Debug, Deserialize)]
struct StoredDay {
    #[serde(rename = "isAvailable", alias = "IsAvailable")]
    is_available: bool,
}

impl JsonFileAvailability {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "availability".to_string());
        let tmp_name = format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4().simple());
        match self.path.parent() {
            Some(parent) => parent.join(tmp_name),
            None => PathBuf::from(tmp_name),
        }
    }
}

#[async_trait::async_trait]
impl AvailabilityPersistence for JsonFileAvailability {
    async fn load(&self) -> Result<AvailabilityGrid, AvailabilityStoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    event_name = "availability.file.missing",
                    path = %self.path.display(),
                    "availability file not found; starting empty"
                );
                return Ok(AvailabilityGrid::new());
            }
            Err(error) => return Err(AvailabilityStoreError::Io(error)),
        };

        if raw.trim().is_empty() {
            tracing::warn!(
                event_name = "availability.file.empty",
                path = %self.path.display(),
                "availability file is empty; starting empty"
            );
            return Ok(AvailabilityGrid::new());
        }

        decode_grid(&raw)
    }

    async fn save(&self, grid: &AvailabilityGrid) -> Result<(), AvailabilityStoreError> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let content = encode_grid(grid)?;
        let tmp_path = self.temp_path();

        let write_result = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(content.as_bytes()).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            match tokio::fs::rename(&tmp_path, &self.path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    tokio::fs::remove_file(&self.path).await?;
                    tokio::fs::rename(&tmp_path, &self.path).await?;
                }
                Err(e) => return Err(e),
            }
            Ok::<(), std::io::Error>(())
        }
        .await;

        if let Err(error) = write_result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(AvailabilityStoreError::Io(error));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

pub(crate) fn encode_grid(grid: &AvailabilityGrid) -> Result<String, AvailabilityStoreError> {
    let document: BTreeMap<&str, BTreeMap<String, DayEntry>> = grid
        .iter()
        .map(|(vehicle_id, availability)| {
            let days = availability
                .days()
                .map(|(date, is_available)| {
                    (date.format(DATE_FORMAT).to_string(), DayEntry { is_available })
                })
                .collect();
            (vehicle_id.as_str(), days)
        })
        .collect();

    serde_json::to_string_pretty(&document)
        .map_err(|error| AvailabilityStoreError::Serialization(error.to_string()))
}

/// Accepts the flat layout and the older `{ "AvailableDates": { .. } }` wrapper per vehicle.
pub(crate) fn decode_grid(raw: &str) -> Result<AvailabilityGrid, AvailabilityStoreError> {
    let document: BTreeMap<String, Value> = serde_json::from_str(raw)
        .map_err(|error| AvailabilityStoreError::Decode(error.to_string()))?;

    let mut grid = AvailabilityGrid::new();
    for (vehicle_id, value) in document {
        let dates = match value {
            Value::Object(mut entries) => match entries.remove(LEGACY_DATES_KEY) {
                Some(Value::Object(legacy)) => legacy,
                Some(_) => {
                    return Err(AvailabilityStoreError::Decode(format!(
                        "vehicle `{vehicle_id}` has a non-object `{LEGACY_DATES_KEY}` entry"
                    )));
                }
                None => entries,
            },
            _ => {
                return Err(AvailabilityStoreError::Decode(format!(
                    "vehicle `{vehicle_id}` is not an object"
                )));
            }
        };

        let mut days = Vec::with_capacity(dates.len());
        for (raw_date, day) in dates {
            let Some(date) = parse_date_key(&raw_date) else {
                tracing::warn!(
                    event_name = "availability.file.bad_date",
                    vehicle_id = %vehicle_id,
                    date = %raw_date,
                    "skipping unparsable date key"
                );
                continue;
            };
            let stored: StoredDay = serde_json::from_value(day).map_err(|error| {
                AvailabilityStoreError::Decode(format!(
                    "vehicle `{vehicle_id}` date `{raw_date}`: {error}"
                ))
            })?;
            days.push((date, stored.is_available));
        }

        grid.insert(VehicleId(vehicle_id), VehicleAvailability::from_days(days));
    }

    Ok(grid)
}

/// Date keys are `YYYY-MM-DD`; older files carried a midnight timestamp suffix.
fn parse_date_key(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.split('T').next().unwrap_or(raw);
    NaiveDate::parse_from_str(date_part.trim(), DATE_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use rentdesk_core::domain::availability::VehicleAvailability;
    use rentdesk_core::domain::vehicle::VehicleId;

    use super::{decode_grid, encode_grid};
    use crate::availability::AvailabilityGrid;

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    #[test]
    fn encodes_documented_layout() {
        let mut grid = AvailabilityGrid::new();
        grid.insert(
            VehicleId("car1".to_string()),
            VehicleAvailability::from_days([(date("2024-06-10"), false)]),
        );

        let encoded = encode_grid(&grid).expect("encode");
        let value: serde_json::Value = serde_json::from_str(&encoded).expect("json");

        assert_eq!(value["car1"]["2024-06-10"]["isAvailable"], serde_json::Value::Bool(false));
    }

    #[test]
    fn decodes_legacy_wrapped_layout() {
        let raw = r#"{
            "car1": { "AvailableDates": {
                "2024-06-10T00:00:00": { "IsAvailable": false },
                "2024-06-11T00:00:00": { "IsAvailable": true }
            } }
        }"#;

        let grid = decode_grid(raw).expect("decode");
        let car = grid.get(&VehicleId("car1".to_string())).expect("car1");

        assert_eq!(car.get(date("2024-06-10")), Some(false));
        assert_eq!(car.get(date("2024-06-11")), Some(true));
    }

    #[test]
    fn unparsable_date_keys_are_skipped() {
        let raw = r#"{ "car1": {
            "not-a-date": { "isAvailable": false },
            "2024-06-10": { "isAvailable": true }
        } }"#;

        let grid = decode_grid(raw).expect("decode");
        let car = grid.get(&VehicleId("car1".to_string())).expect("car1");

        assert_eq!(car.len(), 1);
    }

    #[test]
    fn malformed_document_is_a_decode_error() {
        assert!(decode_grid("[1, 2, 3]").is_err());
        assert!(decode_grid(r#"{ "car1": 5 }"#).is_err());
    }
}
