use crate::errors::{Error, Result};
use crate::store::TableName;
use chrono_tz::Tz;
use std::env;
use std::time::Duration;

pub const API_KEY_VAR: &str = "NATURE_REMO_API_KEY";
pub const DATABASE_URL_VAR: &str = "TURSO_DATABASE_URL";
pub const AUTH_TOKEN_VAR: &str = "TURSO_AUTH_TOKEN";

pub const DEFAULT_DEVICE_ENDPOINT: &str = "https://api.nature.global/1/devices";
pub const DEFAULT_TABLE_NAME: &str = "temperature_logs";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_DISPLAY_TIMEZONE: &str = "Asia/Tokyo";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60;
pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8080";

/// Device API access.
#[derive(Debug, Clone)]
pub struct RemoConfig {
    pub api_key: String,
    pub endpoint: String,
    pub request_timeout: Duration,
}

/// Time-series store access.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database_url: String,
    pub auth_token: String,
    pub table: TableName,
}

/// Everything one ingestion cycle needs. Built once at process entry.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub remo: RemoConfig,
    pub store: StoreConfig,
}

/// Settings for the query server.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub store: StoreConfig,
    pub display_tz: Tz,
    pub cache_ttl: Duration,
    pub http_addr: String,
}

impl RemoConfig {
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            api_key: require(lookup, API_KEY_VAR)?,
            endpoint: lookup("NATURE_REMO_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_DEVICE_ENDPOINT.to_string()),
            request_timeout: Duration::from_secs(parse_or(
                lookup,
                "REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
        })
    }
}

impl StoreConfig {
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let table = lookup("TEMPERATURE_TABLE").unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string());

        Ok(Self {
            database_url: require(lookup, DATABASE_URL_VAR)?,
            auth_token: require(lookup, AUTH_TOKEN_VAR)?,
            table: TableName::new(table)?,
        })
    }

    /// Database URL with any credentials stripped, for logging.
    pub fn redacted_url(&self) -> &str {
        self.database_url
            .split('@')
            .last()
            .unwrap_or("***")
            .split('?')
            .next()
            .unwrap_or("***")
    }
}

impl IngestConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&|key| env::var(key).ok())
    }

    /// All three secrets are checked before any I/O happens.
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            remo: RemoConfig::from_lookup(lookup)?,
            store: StoreConfig::from_lookup(lookup)?,
        })
    }
}

impl DashboardConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let tz_name =
            lookup("DISPLAY_TIMEZONE").unwrap_or_else(|| DEFAULT_DISPLAY_TIMEZONE.to_string());
        let display_tz = tz_name.parse::<Tz>().map_err(|e| {
            Error::Configuration(format!("invalid DISPLAY_TIMEZONE '{}': {}", tz_name, e))
        })?;

        Ok(Self {
            store: StoreConfig::from_lookup(lookup)?,
            display_tz,
            cache_ttl: Duration::from_secs(parse_or(
                lookup,
                "CACHE_TTL_SECS",
                DEFAULT_CACHE_TTL_SECS,
            )?),
            http_addr: lookup("HTTP_ADDR").unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string()),
        })
    }
}

fn require(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<String> {
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(Error::MissingConfig { key }),
    }
}

fn parse_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<u64> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Configuration(format!("{} must be an integer, got '{}'", key, raw))),
        None => Ok(default),
    }
}
