//! Durable per-vehicle availability grid.
//!
//! [`AvailabilityStore`] is the only writer. It keeps the grid in memory behind a read/write
//! lock and hands whole snapshots to an [`AvailabilityPersistence`] backend after each mutation
//! that changed something.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use thiserror::Error;

use rentdesk_core::domain::availability::VehicleAvailability;
use rentdesk_core::domain::vehicle::VehicleId;

pub mod file;
pub mod memory;
pub mod store;

pub use file::JsonFileAvailability;
pub use memory::InMemoryAvailabilityPersistence;
pub use store::{AvailabilityStore, ReconcileReport};

pub type AvailabilityGrid = BTreeMap<VehicleId, VehicleAvailability>;

#[derive(Debug, Error)]
pub enum AvailabilityStoreError {
    #[error("availability file io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("availability serialization error: {0}")]
    Serialization(String),
    #[error("availability decode error: {0}")]
    Decode(String),
    #[error("invalid availability range: {from} is after {to}")]
    InvalidRange { from: NaiveDate, to: NaiveDate },
}

#[async_trait::async_trait]
pub trait AvailabilityPersistence: Send + Sync {
    /// A backend with nothing stored yet returns an empty grid.
    async fn load(&self) -> Result<AvailabilityGrid, AvailabilityStoreError>;
    async fn save(&self, grid: &AvailabilityGrid) -> Result<(), AvailabilityStoreError>;
    fn describe(&self) -> String;
}
