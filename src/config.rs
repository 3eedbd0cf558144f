//! Operator configuration
//!
//! All inputs arrive through the environment, mirroring how the operator is
//! deployed (container env vars set by its manifest).

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default storage location name when a Backup does not name one
const DEFAULT_BACKUP_STORAGE_LOCATION: &str = "default";

/// Default retention period: 30 days
const DEFAULT_BACKUP_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Default metrics port
const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default root directory for the filesystem backup store
const DEFAULT_BACKUP_STORE_ROOT: &str = "/data";

/// Log output format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(Error::config(format!(
                "invalid log format '{other}': must be one of: text, json"
            ))),
        }
    }
}

/// Defaults applied to every Backup at request-building time
#[derive(Clone, Debug)]
pub struct BackupDefaults {
    /// Storage location used when the spec leaves it empty
    pub backup_location: String,

    /// TTL used when the spec leaves it empty or zero
    pub backup_ttl: Duration,

    /// Snapshot location per provider, consulted when a provider is
    /// ambiguous
    pub snapshot_locations: HashMap<String, String>,
}

/// Complete operator configuration
#[derive(Clone, Debug)]
pub struct OperatorConfig {
    pub defaults: BackupDefaults,
    pub log_format: LogFormat,
    pub metrics_port: u16,
    pub backup_store_root: PathBuf,
}

impl OperatorConfig {
    /// Read configuration from the environment.
    ///
    /// Variables: `DEFAULT_BACKUP_STORAGE_LOCATION`, `DEFAULT_BACKUP_TTL`,
    /// `DEFAULT_VOLUME_SNAPSHOT_LOCATIONS`, `LOG_FORMAT`, `METRICS_PORT`,
    /// `BACKUP_STORE_ROOT`.
    pub fn from_env() -> Result<Self> {
        let backup_location = std::env::var("DEFAULT_BACKUP_STORAGE_LOCATION")
            .unwrap_or_else(|_| DEFAULT_BACKUP_STORAGE_LOCATION.to_string());
        if backup_location.is_empty() {
            return Err(Error::config(
                "DEFAULT_BACKUP_STORAGE_LOCATION must not be empty",
            ));
        }

        let backup_ttl = match std::env::var("DEFAULT_BACKUP_TTL") {
            Ok(raw) => parse_duration(&raw)?,
            Err(_) => DEFAULT_BACKUP_TTL,
        };
        if backup_ttl.is_zero() {
            return Err(Error::config("DEFAULT_BACKUP_TTL must be greater than zero"));
        }

        let snapshot_locations = match std::env::var("DEFAULT_VOLUME_SNAPSHOT_LOCATIONS") {
            Ok(raw) => parse_snapshot_locations(&raw)?,
            Err(_) => HashMap::new(),
        };

        let log_format = match std::env::var("LOG_FORMAT") {
            Ok(raw) => raw.parse()?,
            Err(_) => LogFormat::default(),
        };

        let metrics_port = match std::env::var("METRICS_PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| Error::config(format!("invalid METRICS_PORT '{raw}'")))?,
            Err(_) => DEFAULT_METRICS_PORT,
        };

        let backup_store_root = std::env::var("BACKUP_STORE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_BACKUP_STORE_ROOT));

        Ok(Self {
            defaults: BackupDefaults {
                backup_location,
                backup_ttl,
                snapshot_locations,
            },
            log_format,
            metrics_port,
            backup_store_root,
        })
    }
}

/// Parse a duration written as `<n>d`, `<n>h`, `<n>m`, or `<n>s`;
/// a bare integer is taken as seconds.
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    let (value, unit) = match raw.char_indices().last() {
        Some((idx, suffix)) if suffix.is_ascii_alphabetic() => (&raw[..idx], Some(suffix)),
        _ => (raw, None),
    };

    let value: u64 = value
        .parse()
        .map_err(|_| Error::config(format!("invalid duration '{raw}'")))?;

    let seconds = match unit {
        Some('d') => value * 24 * 60 * 60,
        Some('h') => value * 60 * 60,
        Some('m') => value * 60,
        Some('s') | None => value,
        Some(other) => {
            return Err(Error::config(format!(
                "invalid duration unit '{other}' in '{raw}': must be one of: d, h, m, s"
            )))
        }
    };

    Ok(Duration::from_secs(seconds))
}

/// Parse `provider:location` pairs separated by commas
fn parse_snapshot_locations(raw: &str) -> Result<HashMap<String, String>> {
    let mut locations = HashMap::new();
    for pair in raw.split(',').filter(|pair| !pair.trim().is_empty()) {
        let Some((provider, location)) = pair.trim().split_once(':') else {
            return Err(Error::config(format!(
                "invalid default volume snapshot location '{pair}': expected provider:location"
            )));
        };
        locations.insert(provider.to_string(), location.to_string());
    }
    Ok(locations)
}
