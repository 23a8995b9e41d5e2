use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::availability::DEFAULT_HORIZON_DAYS;
use crate::domain::user::{AdminDirectory, UserId};
use crate::domain::vehicle::{Fleet, Vehicle};

pub const ENV_PREFIX: &str = "RENTDESK_";
pub const DEFAULT_CONFIG_FILE: &str = "rentdesk.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub admin: AdminConfig,
    pub transport: TransportConfig,
    pub session: SessionConfig,
    pub fleet: FleetConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub availability_path: PathBuf,
    pub horizon_days: u32,
}

#[derive(Clone, Debug, Default)]
pub struct AdminConfig {
    pub ids: Vec<i64>,
}

#[derive(Clone, Debug)]
pub struct TransportConfig {
    pub bot_token: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Zero disables idle eviction.
    pub idle_ttl_secs: u64,
}

impl SessionConfig {
    /// Cutoff for idle eviction of per-user state; `None` when eviction is disabled.
    pub fn idle_ttl(&self) -> Option<chrono::Duration> {
        if self.idle_ttl_secs == 0 {
            return None;
        }
        i64::try_from(self.idle_ttl_secs).ok().and_then(chrono::Duration::try_seconds)
    }
}

#[derive(Clone, Debug, Default)]
pub struct FleetConfig {
    pub vehicles: Vec<Vehicle>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub availability_path: Option<PathBuf>,
    pub horizon_days: Option<u32>,
    pub admin_ids: Option<Vec<i64>>,
    pub bot_token: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                availability_path: PathBuf::from("data/availability.json"),
                horizon_days: DEFAULT_HORIZON_DAYS,
            },
            admin: AdminConfig::default(),
            transport: TransportConfig { bot_token: None },
            session: SessionConfig { idle_ttl_secs: 0 },
            fleet: FleetConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn fleet(&self) -> Fleet {
        Fleet::new(self.fleet.vehicles.clone())
    }

    pub fn admin_directory(&self) -> AdminDirectory {
        AdminDirectory::new(self.admin.ids.iter().copied().map(UserId))
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(storage) = patch.storage {
            if let Some(availability_path) = storage.availability_path {
                self.storage.availability_path = availability_path;
            }
            if let Some(horizon_days) = storage.horizon_days {
                self.storage.horizon_days = horizon_days;
            }
        }

        if let Some(admin) = patch.admin {
            if let Some(ids) = admin.ids {
                self.admin.ids = ids;
            }
        }

        if let Some(transport) = patch.transport {
            if let Some(bot_token_value) = transport.bot_token {
                self.transport.bot_token = Some(secret_value(bot_token_value));
            }
        }

        if let Some(session) = patch.session {
            if let Some(idle_ttl_secs) = session.idle_ttl_secs {
                self.session.idle_ttl_secs = idle_ttl_secs;
            }
        }

        if let Some(fleet) = patch.fleet {
            if let Some(vehicles) = fleet.vehicles {
                self.fleet.vehicles = vehicles;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("RENTDESK_AVAILABILITY_PATH") {
            self.storage.availability_path = PathBuf::from(value);
        }
        if let Some(value) = read_env("RENTDESK_HORIZON_DAYS") {
            self.storage.horizon_days = parse_u32("RENTDESK_HORIZON_DAYS", &value)?;
        }

        if let Some(value) = read_env("RENTDESK_ADMIN_IDS") {
            self.admin.ids = parse_id_list("RENTDESK_ADMIN_IDS", &value)?;
        }

        if let Some(value) = read_env("RENTDESK_BOT_TOKEN") {
            self.transport.bot_token = Some(secret_value(value));
        }

        if let Some(value) = read_env("RENTDESK_SESSION_IDLE_TTL_SECS") {
            self.session.idle_ttl_secs = parse_u64("RENTDESK_SESSION_IDLE_TTL_SECS", &value)?;
        }

        let log_level = read_env("RENTDESK_LOGGING_LEVEL").or_else(|| read_env("RENTDESK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("RENTDESK_LOGGING_FORMAT").or_else(|| read_env("RENTDESK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(availability_path) = overrides.availability_path {
            self.storage.availability_path = availability_path;
        }
        if let Some(horizon_days) = overrides.horizon_days {
            self.storage.horizon_days = horizon_days;
        }
        if let Some(admin_ids) = overrides.admin_ids {
            self.admin.ids = admin_ids;
        }
        if let Some(bot_token) = overrides.bot_token {
            self.transport.bot_token = Some(secret_value(bot_token));
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_storage(&self.storage)?;
        validate_transport(&self.transport)?;
        validate_fleet(&self.fleet)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// The config file `load` would read: the explicit path if it exists, else the first default
/// location that does.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_storage(storage: &StorageConfig) -> Result<(), ConfigError> {
    if storage.availability_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "storage.availability_path must not be empty".to_string(),
        ));
    }

    if storage.horizon_days == 0 || storage.horizon_days > 366 {
        return Err(ConfigError::Validation(
            "storage.horizon_days must be in range 1..=366".to_string(),
        ));
    }

    Ok(())
}

fn validate_transport(transport: &TransportConfig) -> Result<(), ConfigError> {
    let blank = transport
        .bot_token
        .as_ref()
        .map(|token| token.expose_secret().trim().is_empty())
        .unwrap_or(false);
    if blank {
        return Err(ConfigError::Validation(
            "transport.bot_token is set but empty; remove it or provide the token".to_string(),
        ));
    }

    Ok(())
}

fn validate_fleet(fleet: &FleetConfig) -> Result<(), ConfigError> {
    let mut seen = BTreeSet::new();
    for vehicle in &fleet.vehicles {
        let id = vehicle.id.as_str().trim();
        if id.is_empty() {
            return Err(ConfigError::Validation("fleet.vehicles[].id must not be empty".to_string()));
        }
        if id.contains(char::is_whitespace) {
            return Err(ConfigError::Validation(format!(
                "fleet vehicle id `{id}` must not contain whitespace"
            )));
        }
        if !seen.insert(id.to_string()) {
            return Err(ConfigError::Validation(format!("fleet vehicle id `{id}` is duplicated")));
        }
        if vehicle.daily_price < Decimal::ZERO || vehicle.pawn_price < Decimal::ZERO {
            return Err(ConfigError::Validation(format!(
                "fleet vehicle `{id}` must have non-negative prices"
            )));
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_id_list(key: &str, value: &str) -> Result<Vec<i64>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<i64>().map_err(|_| ConfigError::InvalidEnvOverride {
                key: key.to_string(),
                value: value.to_string(),
            })
        })
        .collect()
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    storage: Option<StoragePatch>,
    admin: Option<AdminPatch>,
    transport: Option<TransportPatch>,
    session: Option<SessionPatch>,
    fleet: Option<FleetPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct StoragePatch {
    availability_path: Option<PathBuf>,
    horizon_days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct AdminPatch {
    ids: Option<Vec<i64>>,
}

#[derive(Debug, Default, Deserialize)]
struct TransportPatch {
    bot_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionPatch {
    idle_ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FleetPatch {
    vehicles: Option<Vec<Vehicle>>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
