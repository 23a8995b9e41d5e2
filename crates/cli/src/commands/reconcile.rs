use serde_json::json;

use crate::commands::{load_config, open_store, runtime, CommandContext, CommandResult, EXIT_STORAGE};

pub fn run(ctx: &CommandContext) -> CommandResult {
    let config = match load_config("reconcile", ctx) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("reconcile") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let fleet = config.fleet();
    if fleet.is_empty() {
        return CommandResult::success("reconcile", "no vehicles configured; nothing to reconcile");
    }

    let result = runtime.block_on(async {
        let store = open_store(&config, ctx).await;
        store.reconcile(&fleet.ids()).await
    });

    match result {
        Ok(report) => CommandResult::success_with_data(
            "reconcile",
            format!(
                "reconciled {} vehicle(s) into `{}`: {} day(s) added",
                fleet.len(),
                config.storage.availability_path.display(),
                report.days_added
            ),
            Some(json!(report)),
        ),
        Err(error) => CommandResult::failure("reconcile", "storage", error.to_string(), EXIT_STORAGE),
    }
}
