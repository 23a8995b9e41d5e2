pub mod availability;
pub mod calendar;
pub mod config;
pub mod mark;
pub mod reconcile;
pub mod smoke;

use std::sync::Arc;

use chrono::NaiveDate;
use rentdesk_core::clock::{Clock, FixedClock, SystemClock};
use rentdesk_core::config::{AppConfig, LoadOptions};
use rentdesk_core::domain::vehicle::VehicleId;
use rentdesk_db::{AvailabilityStore, JsonFileAvailability};
use serde::Serialize;
use serde_json::Value;

pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_STORAGE: u8 = 3;
pub const EXIT_INVALID_INPUT: u8 = 4;
pub const EXIT_SMOKE: u8 = 6;

/// Inputs shared by every command.
#[derive(Clone, Debug, Default)]
pub struct CommandContext {
    pub load: LoadOptions,
    pub today: Option<NaiveDate>,
}

impl CommandContext {
    pub fn clock(&self) -> Arc<dyn Clock> {
        match self.today {
            Some(today) => Arc::new(FixedClock::new(today)),
            None => Arc::new(SystemClock),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_data(command, message, None)
    }

    pub fn success_with_data(command: &str, message: impl Into<String>, data: Option<Value>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) fn load_config(command: &str, ctx: &CommandContext) -> Result<AppConfig, CommandResult> {
    AppConfig::load(ctx.load.clone()).map_err(|error| {
        CommandResult::failure(command, "config_validation", error.to_string(), EXIT_CONFIG)
    })
}

pub(crate) fn runtime(command: &str) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime",
            format!("failed to initialize async runtime: {error}"),
            EXIT_STORAGE,
        )
    })
}

pub(crate) async fn open_store(config: &AppConfig, ctx: &CommandContext) -> AvailabilityStore {
    AvailabilityStore::open(
        Arc::new(JsonFileAvailability::new(&config.storage.availability_path)),
        ctx.clock(),
        config.storage.horizon_days,
    )
    .await
}

/// A vehicle is addressable when it is configured or already has availability on file.
pub(crate) async fn known_vehicle(
    command: &str,
    config: &AppConfig,
    store: &AvailabilityStore,
    vehicle: &str,
) -> Result<VehicleId, CommandResult> {
    let id = VehicleId(vehicle.trim().to_string());
    let configured = config.fleet.vehicles.iter().any(|candidate| candidate.id == id);
    if configured || store.snapshot(&id).await.is_some() {
        return Ok(id);
    }
    Err(CommandResult::failure(
        command,
        "unknown_vehicle",
        format!("vehicle `{vehicle}` is neither configured nor present in the availability file"),
        EXIT_INVALID_INPUT,
    ))
}
