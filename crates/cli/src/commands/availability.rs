use serde_json::{json, Map, Value};

use crate::commands::{
    known_vehicle, load_config, open_store, runtime, CommandContext, CommandResult, EXIT_INVALID_INPUT,
};

pub fn run(ctx: &CommandContext, vehicle: &str, days: u32) -> CommandResult {
    if days == 0 {
        return CommandResult::failure(
            "availability",
            "invalid_input",
            "--days must be at least 1",
            EXIT_INVALID_INPUT,
        );
    }

    let config = match load_config("availability", ctx) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("availability") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        let store = open_store(&config, ctx).await;
        let vehicle_id = match known_vehicle("availability", &config, &store, vehicle).await {
            Ok(vehicle_id) => vehicle_id,
            Err(failure) => return failure,
        };

        let snapshot = store.availability(&vehicle_id, days).await;
        let blocked = snapshot.days().filter(|(_, available)| !available).count();
        let window: Map<String, Value> = snapshot
            .days()
            .map(|(date, available)| (date.format("%Y-%m-%d").to_string(), Value::Bool(available)))
            .collect();

        CommandResult::success_with_data(
            "availability",
            format!("{vehicle_id}: {blocked} of {} day(s) unavailable from {}", snapshot.len(), store.today()),
            Some(json!({ "vehicle_id": vehicle_id.as_str(), "days": window })),
        )
    })
}
