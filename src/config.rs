/// Analysis configuration.
///
/// Loaded from a TOML file. Every field has a default matching the
/// reference lidar / met-mast deployment, so an empty file (or no file at
/// all) yields a usable configuration.
///
/// ```toml
/// reject_codes = ["R101", "R104"]
/// event_indicator = "INFO01"
/// join_mode = "inner"
///
/// [temperature_bins]
/// width = 1.0
/// start = -25.0
/// stop = 35.0
///
/// [logging]
/// level = "debug"
/// file = "lidmet.log"
/// ```

use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analysis::align::{AlignOptions, DuplicatePolicy, JoinMode};
use crate::analysis::binning::BinSpec;
use crate::analysis::correlation::IcingThresholds;
use crate::channels::ChannelKind;
use crate::ingest::lidar::LIDAR_TIMESTAMP_COLUMN;
use crate::ingest::mast::MastColumns;
use crate::logging::LogLevel;
use crate::model::AnalysisError;
use crate::qc::{REFERENCE_REJECT_CODES, RejectCodeSet};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "LIDMET_CONFIG";

// ---------------------------------------------------------------------------
// Configuration types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub file: Option<String>,
    pub console_timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            file: None,
            console_timestamps: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub reject_codes: Vec<String>,
    /// Indicator column carrying the ground-truth event (ice detected).
    pub event_indicator: String,
    /// Cell contents treated as "no reading".
    pub missing_sentinels: Vec<String>,
    pub temperature_bins: BinSpec,
    pub humidity_bins: BinSpec,
    pub join_mode: JoinMode,
    pub duplicate_policy: DuplicatePolicy,
    pub icing: IcingThresholds,
    pub low_availability_threshold_pct: f64,
    pub mast_columns: MastColumns,
    pub lidar_timestamp_column: String,
    /// Lidar quantities to ingest besides wind speed, which is always
    /// taken. Each is picked up only when the export has its column.
    pub lidar_kinds: Vec<ChannelKind>,
    pub logging: LoggingConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            reject_codes: REFERENCE_REJECT_CODES.iter().map(|c| c.to_string()).collect(),
            event_indicator: "INFO01".to_string(),
            missing_sentinels: ["NaN", "nan", "NA", ""].iter().map(|s| s.to_string()).collect(),
            temperature_bins: BinSpec {
                width: 1.0,
                start: -25.0,
                stop: 35.0,
            },
            humidity_bins: BinSpec {
                width: 1.0,
                start: 5.0,
                stop: 100.0,
            },
            join_mode: JoinMode::Inner,
            duplicate_policy: DuplicatePolicy::Reject,
            icing: IcingThresholds::default(),
            low_availability_threshold_pct: 20.0,
            mast_columns: MastColumns::default(),
            lidar_timestamp_column: LIDAR_TIMESTAMP_COLUMN.to_string(),
            lidar_kinds: vec![
                ChannelKind::DataAvailability,
                ChannelKind::WindSpeedDispersion,
                ChannelKind::Cnr,
                ChannelKind::VerticalWind,
                ChannelKind::Temperature,
                ChannelKind::InternalTemperature,
                ChannelKind::Humidity,
                ChannelKind::Pressure,
                ChannelKind::WiperCount,
                ChannelKind::BatteryVoltage,
            ],
            logging: LoggingConfig::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, AnalysisError> {
        let config: AnalysisConfig =
            toml::from_str(text).map_err(|e| AnalysisError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks bin specs, reject codes and the event column name.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        self.temperature_bins
            .validate()
            .map_err(|e| AnalysisError::Config(format!("temperature_bins: {}", e)))?;
        self.humidity_bins
            .validate()
            .map_err(|e| AnalysisError::Config(format!("humidity_bins: {}", e)))?;

        let codes = self.reject_code_set()?;
        if codes.is_empty() {
            return Err(AnalysisError::Config("reject_codes is empty".to_string()));
        }
        if self.event_indicator.trim().is_empty() {
            return Err(AnalysisError::Config("event_indicator is empty".to_string()));
        }
        if codes.codes().iter().any(|c| c == &self.event_indicator) {
            return Err(AnalysisError::Config(format!(
                "event indicator '{}' is also a reject code",
                self.event_indicator
            )));
        }
        if !self.low_availability_threshold_pct.is_finite() {
            return Err(AnalysisError::Config(
                "low_availability_threshold_pct must be finite".to_string(),
            ));
        }
        Ok(())
    }

    pub fn reject_code_set(&self) -> Result<RejectCodeSet, AnalysisError> {
        RejectCodeSet::new(self.reject_codes.iter().cloned())
    }

    pub fn align_options(&self) -> AlignOptions {
        AlignOptions {
            join: self.join_mode,
            duplicates: self.duplicate_policy,
        }
    }

    /// Every indicator column the mast ingest should capture.
    pub fn indicator_columns(&self) -> Vec<String> {
        let mut columns = self.reject_codes.clone();
        columns.push(self.event_indicator.clone());
        columns
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Reads and validates a configuration file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AnalysisConfig, AnalysisError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .map_err(|e| AnalysisError::Config(format!("{}: {}", path.display(), e)))?;
    AnalysisConfig::from_toml_str(&text)
}

/// Resolves the configuration: `LIDMET_CONFIG` (a `.env` file is honoured)
/// if set, else the defaults.
pub fn load_from_env() -> Result<AnalysisConfig, AnalysisError> {
    dotenv::dotenv().ok();
    match env::var(CONFIG_ENV_VAR) {
        Ok(path) if !path.trim().is_empty() => load_config(path.trim()),
        _ => Ok(AnalysisConfig::default()),
    }
}

/// Explicit path first, then the environment, then the defaults.
pub fn resolve(explicit: Option<&Path>) -> Result<AnalysisConfig, AnalysisError> {
    match explicit {
        Some(path) => load_config(path),
        None => load_from_env(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_match_reference_deployment() {
        let config = AnalysisConfig::default();
        assert_eq!(config.reject_codes.len(), 10);
        assert_eq!(config.event_indicator, "INFO01");
        assert_eq!(config.temperature_bins.bin_count(), 60);
        assert_eq!(config.humidity_bins.bin_count(), 95);
        assert_eq!(config.low_availability_threshold_pct, 20.0);
        assert_eq!(config.lidar_kinds.len(), 10);
        assert!(config.validate().is_ok(), "defaults must validate");
    }

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = AnalysisConfig::from_toml_str("").unwrap();
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn test_partial_document_overrides_only_named_fields() {
        let config = AnalysisConfig::from_toml_str(
            r#"
            reject_codes = ["R101", "R104"]
            join_mode = "left"
            duplicate_policy = "last_wins"

            [humidity_bins]
            width = 5.0
            start = 0.0
            stop = 100.0

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.reject_codes, vec!["R101", "R104"]);
        assert_eq!(config.join_mode, JoinMode::Left);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::LastWins);
        assert_eq!(config.humidity_bins.bin_count(), 20);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.event_indicator, "INFO01", "unnamed fields keep defaults");
    }

    #[test]
    fn test_lidar_kinds_can_be_narrowed() {
        let config = AnalysisConfig::from_toml_str(r#"lidar_kinds = ["wiper_count"]"#).unwrap();
        assert_eq!(config.lidar_kinds, vec![ChannelKind::WiperCount]);
    }

    #[test]
    fn test_oversized_bin_count_is_config_error() {
        let err = AnalysisConfig::from_toml_str(
            r#"
            [humidity_bins]
            width = 1e-12
            start = 0.0
            stop = 1e9
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::Config(ref m) if m.contains("humidity_bins")));
    }

    #[test]
    fn test_invalid_bins_are_config_errors() {
        let err = AnalysisConfig::from_toml_str(
            r#"
            [temperature_bins]
            width = 0.0
            start = -25.0
            stop = 35.0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::Config(ref m) if m.contains("temperature_bins")));
    }

    #[test]
    fn test_reject_code_list_is_checked() {
        assert!(AnalysisConfig::from_toml_str("reject_codes = []").is_err());
        assert!(AnalysisConfig::from_toml_str(r#"reject_codes = ["R101", "R101"]"#).is_err());
        assert!(
            AnalysisConfig::from_toml_str(r#"reject_codes = ["INFO01"]"#).is_err(),
            "the event column cannot double as a reject code"
        );
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        assert!(matches!(
            AnalysisConfig::from_toml_str("reject_codes = [").unwrap_err(),
            AnalysisError::Config(_)
        ));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "event_indicator = \"ICE\"").unwrap();
        writeln!(file, "low_availability_threshold_pct = 10.0").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.event_indicator, "ICE");
        assert_eq!(config.low_availability_threshold_pct, 10.0);
        assert_eq!(config.indicator_columns().last().map(String::as_str), Some("ICE"));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve(Some(dir.path().join("absent.toml").as_path())).unwrap_err();
        assert!(matches!(err, AnalysisError::Config(_)));
    }
}
