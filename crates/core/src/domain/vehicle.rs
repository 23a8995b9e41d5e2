use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VehicleId(pub String);

impl VehicleId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleKind {
    Auto,
    Moto,
}

impl VehicleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Moto => "moto",
        }
    }
}

impl FromStr for VehicleKind {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" | "car" => Ok(Self::Auto),
            "moto" | "motorbike" => Ok(Self::Moto),
            other => Err(DomainError::InvariantViolation(format!(
                "unsupported vehicle kind `{other}` (expected auto|moto)"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub name: String,
    pub kind: VehicleKind,
    #[serde(default)]
    pub description: String,
    pub daily_price: Decimal,
    pub pawn_price: Decimal,
}

/// Price breakdown for one rental range.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalQuote {
    pub total_days: i64,
    pub billable_days: i64,
    pub total_price: Decimal,
    pub pawn_price: Decimal,
}

impl RentalQuote {
    pub fn grand_total(&self) -> Decimal {
        self.total_price + self.pawn_price
    }
}

impl Vehicle {
    /// Same-day returns are billed as one day.
    pub fn quote(&self, start: NaiveDate, end: NaiveDate) -> Result<RentalQuote, DomainError> {
        if end < start {
            return Err(DomainError::InvariantViolation(format!(
                "rental end {end} is before start {start}"
            )));
        }

        let total_days = (end - start).num_days();
        let billable_days = total_days.max(1);
        Ok(RentalQuote {
            total_days,
            billable_days,
            total_price: self.daily_price * Decimal::from(billable_days),
            pawn_price: self.pawn_price,
        })
    }
}

/// The rentable vehicles, in configuration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Fleet {
    vehicles: Vec<Vehicle>,
}

impl Fleet {
    pub fn new(vehicles: Vec<Vehicle>) -> Self {
        Self { vehicles }
    }

    pub fn get(&self, id: &VehicleId) -> Option<&Vehicle> {
        self.vehicles.iter().find(|vehicle| &vehicle.id == id)
    }

    pub fn by_kind(&self, kind: VehicleKind) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.iter().filter(move |vehicle| vehicle.kind == kind)
    }

    pub fn ids(&self) -> Vec<VehicleId> {
        self.vehicles.iter().map(|vehicle| vehicle.id.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.iter()
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }
}
