use chrono_tz::Tz;
use std::path::PathBuf;

use crate::error::{AdminError, Result};

pub const TIME_ZONE_ENV: &str = "ADMINOPS_TIME_ZONE";

/// Process-wide display settings shared by the exporter.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Zone aware datetimes are converted to before formatting.
    pub time_zone: Tz,
}

impl Default for Settings {
    fn default() -> Self {
        Settings { time_zone: Tz::UTC }
    }
}

impl Settings {
    pub fn with_time_zone(name: &str) -> Result<Settings> {
        let time_zone = name
            .parse::<Tz>()
            .map_err(|_| AdminError::Configuration(format!("Unknown time zone: {}", name)))?;
        Ok(Settings { time_zone })
    }

    /// Read the display time zone from `ADMINOPS_TIME_ZONE`, falling back to UTC
    /// when the variable is unset.
    pub fn from_env() -> Result<Settings> {
        match std::env::var(TIME_ZONE_ENV) {
            Ok(name) if !name.trim().is_empty() => Settings::with_time_zone(name.trim()),
            _ => Ok(Settings::default()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub db_path: PathBuf,
}

impl StoreConfig {
    pub fn new(db_path: impl Into<PathBuf>) -> StoreConfig {
        StoreConfig {
            db_path: db_path.into(),
        }
    }

    pub fn ensure_dirs_exist(&self) -> std::io::Result<()> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}
