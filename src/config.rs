/// Engine configuration.
///
/// Thresholds, day windows and calculation settings are read from a TOML
/// file once at start-up. Every field has a default, so an empty file (or no
/// file) yields the standard network rules; a file only needs the values a
/// deployment wants to change. The same file may extend the sensor catalog
/// with `[[sensor]]` and `[[sensor_override]]` tables (see `catalog`).

use crate::catalog::{SensorGroupConfig, SensorOverrideConfig};
use crate::model::{AvailabilityBand, ConfigError};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Availability thresholds, in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Below this a station is critical. Exactly at it is healthy.
    pub critical: f64,
    /// Above this a value is anomalous.
    pub anomaly: f64,
    /// Band boundary between degraded and severe.
    pub degraded_floor: f64,
    /// At or below this a long-running incident counts as paralyzed.
    pub paralysis_floor: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            critical: 80.0,
            anomaly: 100.0,
            degraded_floor: 30.0,
            paralysis_floor: 0.5,
        }
    }
}

impl Thresholds {
    pub fn is_critical(&self, availability: f64) -> bool {
        availability < self.critical
    }

    pub fn is_anomalous(&self, availability: f64) -> bool {
        availability > self.anomaly
    }

    /// Places an availability value in its band. Undefined and exactly-zero
    /// values are both "not received".
    pub fn band_for(&self, availability: Option<f64>) -> AvailabilityBand {
        match availability {
            None => AvailabilityBand::NotReceived,
            Some(a) if a > self.anomaly => AvailabilityBand::Anomalous,
            Some(a) if a >= self.critical => AvailabilityBand::Normal,
            Some(a) if a >= self.degraded_floor => AvailabilityBand::Degraded,
            Some(a) if a > 0.0 => AvailabilityBand::Severe,
            Some(_) => AvailabilityBand::NotReceived,
        }
    }
}

/// Day windows of the incident lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DayWindows {
    /// A NEW incident older than this becomes RECURRENT.
    pub promote_days: i64,
    /// Open incidents up to this age are HIGH priority.
    pub high_priority_max_days: i64,
    /// RESOLVED stations stay under monitoring for this many days.
    pub monitor_days: i64,
    /// A RECURRENT incident older than this, at the paralysis floor, is PARALYZED.
    pub paralysis_days: i64,
    /// A PARALYZED incident older than this is a closure candidate.
    pub closure_days: i64,
}

impl Default for DayWindows {
    fn default() -> Self {
        DayWindows {
            promote_days: 5,
            high_priority_max_days: 30,
            monitor_days: 5,
            paralysis_days: 90,
            closure_days: 730,
        }
    }
}

/// Settings of the availability calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalculationSettings {
    /// Length of the reporting period in days.
    pub period_days: u32,
    /// Operational variables that are not network availability.
    pub housekeeping_variables: Vec<String>,
    /// Drop the first correct sample of each variable (`correct - 1` when
    /// `correct > 1`). Some exports open the window at 00:00, which counts
    /// one sample belonging to the previous period.
    pub discount_leading_sample: bool,
    /// chrono format of dates in snapshot files.
    pub date_format: String,
}

impl Default for CalculationSettings {
    fn default() -> Self {
        CalculationSettings {
            period_days: 7,
            housekeeping_variables: vec!["N_BATERIA".to_string(), "N_TEMP_INT_TRANS".to_string()],
            discount_leading_sample: false,
            date_format: "%d/%m/%Y".to_string(),
        }
    }
}

impl CalculationSettings {
    pub fn is_housekeeping(&self, variable: &str) -> bool {
        let variable = variable.trim();
        self.housekeeping_variables
            .iter()
            .any(|h| h.trim().eq_ignore_ascii_case(variable))
    }
}

// ---------------------------------------------------------------------------
// Engine configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub thresholds: Thresholds,
    pub windows: DayWindows,
    pub calculation: CalculationSettings,
    #[serde(rename = "sensor")]
    pub sensors: Vec<SensorGroupConfig>,
    #[serde(rename = "sensor_override")]
    pub sensor_overrides: Vec<SensorOverrideConfig>,
}

impl EngineConfig {
    /// Parses and validates configuration text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the consistency rules between thresholds and windows.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thresholds;
        let w = &self.windows;

        if !(t.critical > 0.0 && t.critical < 100.0) {
            return Err(ConfigError::Invalid(format!(
                "critical threshold must be between 0 and 100, got {}",
                t.critical
            )));
        }
        if t.critical >= t.anomaly {
            return Err(ConfigError::Invalid(format!(
                "anomaly threshold ({}) must be above the critical threshold ({})",
                t.anomaly, t.critical
            )));
        }
        if !(t.paralysis_floor >= 0.0 && t.paralysis_floor < t.critical) {
            return Err(ConfigError::Invalid(format!(
                "paralysis floor must be in [0, critical), got {}",
                t.paralysis_floor
            )));
        }
        if !(t.degraded_floor >= 0.0 && t.degraded_floor <= t.critical) {
            return Err(ConfigError::Invalid(format!(
                "degraded floor must be in [0, critical], got {}",
                t.degraded_floor
            )));
        }

        let windows = [
            ("promote_days", w.promote_days),
            ("high_priority_max_days", w.high_priority_max_days),
            ("monitor_days", w.monitor_days),
            ("paralysis_days", w.paralysis_days),
            ("closure_days", w.closure_days),
        ];
        for (name, days) in windows {
            if days <= 0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be positive, got {}",
                    name, days
                )));
            }
        }
        if w.promote_days > w.high_priority_max_days {
            return Err(ConfigError::Invalid(
                "promote_days cannot exceed high_priority_max_days".to_string(),
            ));
        }
        if w.paralysis_days >= w.closure_days {
            return Err(ConfigError::Invalid(
                "paralysis_days must be below closure_days".to_string(),
            ));
        }

        if self.calculation.period_days == 0 {
            return Err(ConfigError::Invalid("period_days must be positive".to_string()));
        }
        if self.calculation.date_format.trim().is_empty() {
            return Err(ConfigError::Invalid("date_format cannot be empty".to_string()));
        }

        Ok(())
    }
}

/// Loads the engine configuration from a TOML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
    EngineConfig::from_toml_str(&text)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_file_yields_network_defaults() {
        let config = EngineConfig::from_toml_str("").expect("empty config should be valid");
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.thresholds.critical, 80.0);
        assert_eq!(config.thresholds.anomaly, 100.0);
        assert_eq!(config.windows.promote_days, 5);
        assert_eq!(config.windows.paralysis_days, 90);
        assert_eq!(config.windows.closure_days, 730);
        assert_eq!(config.calculation.period_days, 7);
    }

    #[test]
    fn test_partial_sections_keep_remaining_defaults() {
        let text = r#"
            [thresholds]
            critical = 75.0

            [calculation]
            period_days = 14
        "#;
        let config = EngineConfig::from_toml_str(text).expect("should parse");
        assert_eq!(config.thresholds.critical, 75.0);
        assert_eq!(config.thresholds.anomaly, 100.0);
        assert_eq!(config.calculation.period_days, 14);
        assert_eq!(config.calculation.housekeeping_variables.len(), 2);
    }

    #[test]
    fn test_sensor_tables_are_read() {
        let text = r#"
            [[sensor]]
            name = "s_visibility"
            observed = ["N_VISIB"]

            [[sensor_override]]
            zone = "5"
            station = "ALPHA"
            variable = "N_NIVELAGUA"
            sensor = "s_caudal"
        "#;
        let config = EngineConfig::from_toml_str(text).expect("should parse");
        assert_eq!(config.sensors.len(), 1);
        assert_eq!(config.sensors[0].name, "s_visibility");
        assert_eq!(config.sensor_overrides.len(), 1);
        assert_eq!(config.sensor_overrides[0].sensor, "s_caudal");
    }

    // --- Validation -----------------------------------------------------------

    #[test]
    fn test_critical_above_anomaly_is_rejected() {
        let text = "[thresholds]\ncritical = 99.0\nanomaly = 95.0\n";
        let err = EngineConfig::from_toml_str(text).expect_err("should be invalid");
        assert!(matches!(err, ConfigError::Invalid(_)), "got {:?}", err);
    }

    #[test]
    fn test_critical_must_be_a_percentage() {
        let text = "[thresholds]\ncritical = 0.0\n";
        assert!(matches!(
            EngineConfig::from_toml_str(text),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_non_positive_window_is_rejected() {
        let text = "[windows]\nmonitor_days = 0\n";
        let err = EngineConfig::from_toml_str(text).expect_err("should be invalid");
        assert!(err.to_string().contains("monitor_days"), "got {}", err);
    }

    #[test]
    fn test_paralysis_window_must_precede_closure() {
        let text = "[windows]\nparalysis_days = 800\n";
        assert!(EngineConfig::from_toml_str(text).is_err());
    }

    #[test]
    fn test_malformed_toml_is_a_parse_error() {
        let err = EngineConfig::from_toml_str("[thresholds\ncritical = 1").expect_err("bad toml");
        assert!(matches!(err, ConfigError::Parse(_)), "got {:?}", err);
    }

    // --- Threshold helpers ----------------------------------------------------

    #[test]
    fn test_threshold_boundary_is_healthy() {
        let t = Thresholds::default();
        assert!(!t.is_critical(80.0), "exactly 80% is not critical");
        assert!(t.is_critical(79.999), "79.999% is critical");
    }

    #[test]
    fn test_bands_follow_thresholds() {
        let t = Thresholds::default();
        assert_eq!(t.band_for(None), AvailabilityBand::NotReceived);
        assert_eq!(t.band_for(Some(0.0)), AvailabilityBand::NotReceived);
        assert_eq!(t.band_for(Some(12.0)), AvailabilityBand::Severe);
        assert_eq!(t.band_for(Some(30.0)), AvailabilityBand::Degraded);
        assert_eq!(t.band_for(Some(80.0)), AvailabilityBand::Normal);
        assert_eq!(t.band_for(Some(100.0)), AvailabilityBand::Normal);
        assert_eq!(t.band_for(Some(100.5)), AvailabilityBand::Anomalous);
    }

    #[test]
    fn test_housekeeping_match_ignores_case() {
        let c = CalculationSettings::default();
        assert!(c.is_housekeeping("n_bateria"));
        assert!(c.is_housekeeping(" N_TEMP_INT_TRANS "));
        assert!(!c.is_housekeeping("N_AIRTEMP"));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[windows]\nmonitor_days = 7").expect("write");
        let config = load_config(file.path()).expect("should load");
        assert_eq!(config.windows.monitor_days, 7);
    }

    #[test]
    fn test_load_config_missing_file_is_io_error() {
        let err = load_config("/nonexistent/netavail.toml").expect_err("missing file");
        assert!(matches!(err, ConfigError::Io(_)), "got {:?}", err);
    }
}
