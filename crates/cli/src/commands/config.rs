use std::env;
use std::fs;
use std::path::Path;

use rentdesk_core::config::resolve_config_path;
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::{load_config, CommandContext, CommandResult};

pub fn run(ctx: &CommandContext) -> CommandResult {
    let config = match load_config("config", ctx) {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let config_file_path = resolve_config_path(ctx.load.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: flag > env > file > default):".to_string()];

    let path_source = if ctx.load.overrides.availability_path.is_some() {
        "flag (--availability-path)".to_string()
    } else {
        source("storage.availability_path", &["RENTDESK_AVAILABILITY_PATH"])
    };
    lines.push(render_line(
        "storage.availability_path",
        &config.storage.availability_path.display().to_string(),
        path_source,
    ));
    lines.push(render_line(
        "storage.horizon_days",
        &config.storage.horizon_days.to_string(),
        source("storage.horizon_days", &["RENTDESK_HORIZON_DAYS"]),
    ));

    let admin_ids = if config.admin.ids.is_empty() {
        "<none>".to_string()
    } else {
        config.admin.ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",")
    };
    lines.push(render_line("admin.ids", &admin_ids, source("admin.ids", &["RENTDESK_ADMIN_IDS"])));

    let bot_token = config
        .transport
        .bot_token
        .as_ref()
        .map(|token| redact_token(token.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());
    lines.push(render_line(
        "transport.bot_token",
        &bot_token,
        source("transport.bot_token", &["RENTDESK_BOT_TOKEN"]),
    ));

    lines.push(render_line(
        "session.idle_ttl_secs",
        &config.session.idle_ttl_secs.to_string(),
        source("session.idle_ttl_secs", &["RENTDESK_SESSION_IDLE_TTL_SECS"]),
    ));

    let vehicles = if config.fleet.vehicles.is_empty() {
        "<none>".to_string()
    } else {
        config
            .fleet
            .vehicles
            .iter()
            .map(|vehicle| format!("{} ({})", vehicle.id, vehicle.kind.as_str()))
            .collect::<Vec<_>>()
            .join(", ")
    };
    lines.push(render_line("fleet.vehicles", &vehicles, source("fleet.vehicles", &[])));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", &["RENTDESK_LOGGING_LEVEL", "RENTDESK_LOG_LEVEL"]),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", &["RENTDESK_LOGGING_FORMAT", "RENTDESK_LOG_FORMAT"]),
    ));

    CommandResult::success("config", lines.join("\n"))
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the numeric bot id in front of the colon and hides the secret part.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((bot_id, _)) = trimmed.split_once(':') {
        return format!("{bot_id}:***");
    }

    "<redacted>".to_string()
}
