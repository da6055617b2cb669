//! Configuration for the signal pipeline.

use crate::core::signals::AggregationSettings;
use crate::export::{ExportFormat, DEFAULT_SIGNAL_MULTIPLIER};
use crate::ingest::codes::SensorTable;
use crate::ingest::parse::OperatingHours;
use crate::ingest::reader::DEFAULT_FILE_SUFFIX;
use crate::visits::VisitIndex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

const APP_DIR: &str = "rfid-signals";

/// Main configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding `YYYY-MM-DD<file_suffix>` day files
    pub data_dir: PathBuf,

    /// Directory for signal files and batch reports
    pub output_dir: PathBuf,

    /// Day-file name after the ISO date
    pub file_suffix: String,

    /// JSON sensor-to-room override; built-in table when unset
    pub sensor_table: Option<PathBuf>,

    /// CSV of scheduled visits for patient enrichment
    pub visits_file: Option<PathBuf>,

    pub hours: OperatingHours,

    pub aggregation: AggregationSettings,

    pub export: ExportConfig,
}

impl Default for Config {
    fn default() -> Self {
        let base = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);

        Self {
            data_dir: base.join("raw"),
            output_dir: base.join("output"),
            file_suffix: DEFAULT_FILE_SUFFIX.to_string(),
            sensor_table: None,
            visits_file: None,
            hours: OperatingHours::default(),
            aggregation: AggregationSettings::default(),
            export: ExportConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, or defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.json")
    }

    /// Where per-day batch reports are written.
    pub fn reports_dir(&self) -> PathBuf {
        self.output_dir.join("reports")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.output_dir)?;
        std::fs::create_dir_all(self.reports_dir())?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let hours = &self.hours;
        if hours.open_hour >= hours.close_hour || hours.close_hour > 24 {
            return Err(ConfigError::Invalid(format!(
                "opening hours [{}, {}) are not a range within a day",
                hours.open_hour, hours.close_hour
            )));
        }
        if self.aggregation.max_pings == 0 {
            return Err(ConfigError::Invalid("max_pings must be positive".into()));
        }
        let scale = self.aggregation.signal_scale;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "signal_scale must be a positive number, got {scale}"
            )));
        }
        Ok(())
    }

    /// The configured sensor table, or the built-in one.
    pub fn load_sensor_table(&self) -> crate::error::Result<SensorTable> {
        match &self.sensor_table {
            Some(path) => SensorTable::load_json(path),
            None => Ok(SensorTable::default()),
        }
    }

    /// The configured visit index, if any.
    pub fn load_visits(&self) -> crate::error::Result<Option<VisitIndex>> {
        self.visits_file
            .as_deref()
            .map(VisitIndex::load_csv)
            .transpose()
    }
}

/// How signal records are written.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub format: ExportFormat,
    /// CSV cells hold `round(signal_multiplier * weight)`
    pub signal_multiplier: f64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: ExportFormat::CsvGz,
            signal_multiplier: DEFAULT_SIGNAL_MULTIPLIER,
        }
    }
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("Serialize error: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.file_suffix, "_APD.csv.gz");
        assert_eq!(config.hours.open_hour, 7);
        assert_eq!(config.hours.close_hour, 20);
        assert_eq!(config.aggregation.max_pings, 120);
        assert_eq!(config.export.format, ExportFormat::CsvGz);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"data_dir": "/srv/rfid", "export": {"format": "jsonl"}}"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/rfid"));
        assert_eq!(config.export.format, ExportFormat::Jsonl);
        assert_eq!(config.export.signal_multiplier, DEFAULT_SIGNAL_MULTIPLIER);
        assert_eq!(config.hours, OperatingHours::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = Config::default();
        config.aggregation.max_pings = 60;
        config.visits_file = Some(PathBuf::from("visits.csv"));
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_invalid_hours_rejected() {
        let mut config = Config::default();
        config.hours.open_hour = 20;
        config.hours.close_hour = 7;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
