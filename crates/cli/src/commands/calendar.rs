use chrono::{Datelike, NaiveDate};
use rentdesk_assistant::blocks::calendar_message;
use rentdesk_core::calendar::render_month;
use rentdesk_core::domain::vehicle::{Vehicle, VehicleKind};
use rust_decimal::Decimal;

use crate::commands::{
    known_vehicle, load_config, open_store, runtime, CommandContext, CommandResult, EXIT_INVALID_INPUT,
};

pub fn run(
    ctx: &CommandContext,
    vehicle: &str,
    year: Option<i32>,
    month: Option<u32>,
    start: Option<NaiveDate>,
) -> CommandResult {
    if month.is_some_and(|month| !(1..=12).contains(&month)) {
        return CommandResult::failure(
            "calendar",
            "invalid_input",
            "--month must be between 1 and 12",
            EXIT_INVALID_INPUT,
        );
    }

    let config = match load_config("calendar", ctx) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("calendar") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        let store = open_store(&config, ctx).await;
        let vehicle_id = match known_vehicle("calendar", &config, &store, vehicle).await {
            Ok(vehicle_id) => vehicle_id,
            Err(failure) => return failure,
        };

        let today = store.today();
        let anchor_month = start.unwrap_or(today);
        let year = year.unwrap_or(anchor_month.year());
        let month = month.unwrap_or(anchor_month.month());

        let snapshot = store.availability(&vehicle_id, store.horizon_days()).await;
        let grid = match render_month(year, month as i32, &snapshot, start, today) {
            Ok(grid) => grid,
            Err(error) => {
                return CommandResult::failure("calendar", "invalid_input", error.to_string(), EXIT_INVALID_INPUT)
            }
        };

        let vehicle = config
            .fleet()
            .get(&vehicle_id)
            .cloned()
            .unwrap_or_else(|| Vehicle {
                id: vehicle_id.clone(),
                name: vehicle_id.to_string(),
                kind: VehicleKind::Auto,
                description: String::new(),
                daily_price: Decimal::ZERO,
                pawn_price: Decimal::ZERO,
            });
        let message = calendar_message(&grid, &vehicle);

        let mut lines = vec![message.text.clone(), String::new()];
        lines.extend(message.keyboard.iter().map(|row| {
            row.iter().map(|button| format!("{:>6}", button.label)).collect::<Vec<_>>().join(" ")
        }));
        CommandResult::success("calendar", lines.join("\n"))
    })
}
