use chrono::NaiveDate;
use rentdesk_db::AvailabilityStoreError;
use serde_json::json;

use crate::commands::{
    known_vehicle, load_config, open_store, runtime, CommandContext, CommandResult, EXIT_INVALID_INPUT,
    EXIT_STORAGE,
};

/// `block` (available = false) and `release` (available = true) over an inclusive range.
pub fn run(
    ctx: &CommandContext,
    vehicle: &str,
    from: NaiveDate,
    to: NaiveDate,
    available: bool,
) -> CommandResult {
    let command = if available { "release" } else { "block" };
    if to < from {
        return CommandResult::failure(
            command,
            "invalid_input",
            format!("range end {to} is before start {from}"),
            EXIT_INVALID_INPUT,
        );
    }

    let config = match load_config(command, ctx) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime(command) {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        let store = open_store(&config, ctx).await;
        let vehicle_id = match known_vehicle(command, &config, &store, vehicle).await {
            Ok(vehicle_id) => vehicle_id,
            Err(failure) => return failure,
        };

        match store.set_availability(&vehicle_id, from, to, available).await {
            Ok(changed) => CommandResult::success_with_data(
                command,
                format!("{vehicle_id}: {changed} day(s) changed between {from} and {to}"),
                Some(json!({
                    "vehicle_id": vehicle_id.as_str(),
                    "from": from.to_string(),
                    "to": to.to_string(),
                    "available": available,
                    "changed": changed,
                })),
            ),
            Err(error @ AvailabilityStoreError::InvalidRange { .. }) => {
                CommandResult::failure(command, "invalid_input", error.to_string(), EXIT_INVALID_INPUT)
            }
            Err(error) => CommandResult::failure(command, "storage", error.to_string(), EXIT_STORAGE),
        }
    })
}
