use std::fs;
use std::path::Path;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::error::Error;

pub const DISABLE_ENV: &str = "MEMVERSE_DISABLED";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Master switch for scheduling. When off nothing is ever due.
    pub memorization_enabled: bool,
    /// Calendar timezone in minutes east of UTC. `None` uses the host offset.
    pub utc_offset_minutes: Option<i32>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            memorization_enabled: true,
            utc_offset_minutes: None,
        }
    }
}

impl TrackerConfig {
    /// Reads a JSON settings file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, Error> {
        if !path.exists() {
            log::debug!("no settings at {}, using defaults", path.display());
            return Ok(TrackerConfig::default());
        }
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        let config: TrackerConfig = serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("invalid settings in {}: {e}", path.display())))?;
        config.offset()?;
        Ok(config)
    }

    /// Applies `MEMVERSE_DISABLED=1`.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var(DISABLE_ENV)
            && matches!(v.trim(), "1" | "true" | "yes")
        {
            self.memorization_enabled = false;
        }
        self
    }

    pub fn offset(&self) -> Result<Option<FixedOffset>, Error> {
        match self.utc_offset_minutes {
            None => Ok(None),
            Some(minutes) => FixedOffset::east_opt(minutes * 60)
                .map(Some)
                .ok_or_else(|| Error::Config(format!("utc offset out of range: {minutes} minutes"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrackerConfig::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config, TrackerConfig::default());
        assert!(config.memorization_enabled);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"utc_offset_minutes": -300}"#).unwrap();
        let config = TrackerConfig::load(&path).unwrap();
        assert!(config.memorization_enabled);
        assert_eq!(
            config.offset().unwrap(),
            FixedOffset::west_opt(5 * 3600)
        );
    }

    #[test]
    fn rejects_bad_offset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"utc_offset_minutes": 100000}"#).unwrap();
        assert!(matches!(TrackerConfig::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(TrackerConfig::load(&path).is_err());
    }
}
