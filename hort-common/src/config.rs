//! Configuration loading and cutoff-time parsing
//!
//! Values resolve in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use chrono::NaiveTime;
use std::path::PathBuf;

/// Default daily-checkout cutoff when nothing is configured
pub const DEFAULT_DAILY_CUTOFF: &str = "15:00";

/// Environment variable overriding the daily-checkout cutoff
pub const DAILY_CUTOFF_ENV: &str = "HORT_DAILY_CUTOFF";

/// A wall-clock time of day ("HH:MM") after which room checkouts at the
/// student's home room escalate to a daily checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutoffTime(NaiveTime);

impl CutoffTime {
    /// Parse "HH:MM" with hours 0-23 and minutes 0-59.
    pub fn parse(s: &str) -> Result<Self> {
        let (h, m) = s.split_once(':').ok_or_else(|| {
            Error::Config(format!("invalid cutoff time '{}', expected HH:MM", s))
        })?;

        let hour: u32 = h.trim().parse().map_err(|_| {
            Error::Config(format!("invalid cutoff hour in '{}'", s))
        })?;
        let minute: u32 = m.trim().parse().map_err(|_| {
            Error::Config(format!("invalid cutoff minute in '{}'", s))
        })?;

        let time = NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| {
            Error::Config(format!("cutoff time out of range: '{}'", s))
        })?;
        Ok(Self(time))
    }

    /// The cutoff as a time of day
    pub fn time(&self) -> NaiveTime {
        self.0
    }
}

impl Default for CutoffTime {
    fn default() -> Self {
        // DEFAULT_DAILY_CUTOFF is a valid literal; fall back to midnight
        // rather than panic if it is ever edited into something invalid.
        Self::parse(DEFAULT_DAILY_CUTOFF).unwrap_or(Self(NaiveTime::MIN))
    }
}

/// Resolved gate service configuration
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub port: u16,
    pub database_path: PathBuf,
    pub daily_cutoff: CutoffTime,
    /// A device is reported online if it pinged within this window
    pub device_online_window_secs: u64,
}

/// Raw values a CLI layer may pass down; `None` falls through to
/// environment, config file, then defaults.
#[derive(Debug, Default)]
pub struct GateConfigOverrides {
    pub port: Option<u16>,
    pub database_path: Option<PathBuf>,
    pub daily_cutoff: Option<String>,
}

impl GateConfig {
    /// Resolve configuration following the priority order above.
    pub fn resolve(overrides: GateConfigOverrides) -> Result<Self> {
        let file = load_config_file().unwrap_or_default();

        let port = match overrides.port {
            Some(p) => p,
            None => match std::env::var("HORT_GATE_PORT") {
                Ok(v) => v
                    .parse()
                    .map_err(|_| Error::Config(format!("invalid HORT_GATE_PORT: {}", v)))?,
                Err(_) => file
                    .get("port")
                    .and_then(|v| v.as_integer())
                    .map(|p| p as u16)
                    .unwrap_or(5750),
            },
        };

        let database_path = match overrides.database_path {
            Some(p) => p,
            None => match std::env::var("HORT_DATABASE") {
                Ok(v) => PathBuf::from(v),
                Err(_) => file
                    .get("database")
                    .and_then(|v| v.as_str())
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("hort.db")),
            },
        };

        let cutoff_raw = match overrides.daily_cutoff {
            Some(s) => Some(s),
            None => match std::env::var(DAILY_CUTOFF_ENV) {
                Ok(v) => Some(v),
                Err(_) => file
                    .get("daily_cutoff")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
            },
        };
        let daily_cutoff = match cutoff_raw {
            Some(raw) => CutoffTime::parse(&raw)?,
            None => CutoffTime::default(),
        };

        let device_online_window_secs = file
            .get("device_online_window_secs")
            .and_then(|v| v.as_integer())
            .map(|v| v as u64)
            .unwrap_or(300);

        Ok(Self {
            port,
            database_path,
            daily_cutoff,
            device_online_window_secs,
        })
    }
}

/// Load the TOML config file if one exists (~/.config/hort/config.toml,
/// then /etc/hort/config.toml on Linux).
fn load_config_file() -> Option<toml::value::Table> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("hort").join("config.toml"));
    }
    if cfg!(target_os = "linux") {
        candidates.push(PathBuf::from("/etc/hort/config.toml"));
    }

    for path in candidates {
        if !path.exists() {
            continue;
        }
        match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str::<toml::value::Table>(&content) {
                Ok(table) => return Some(table),
                Err(e) => {
                    tracing::warn!("Ignoring malformed config file {:?}: {}", path, e);
                }
            },
            Err(e) => {
                tracing::warn!("Could not read config file {:?}: {}", path, e);
            }
        }
    }
    None
}
