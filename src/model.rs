/// Core data types for the network availability service.
///
/// This module defines the shared domain model imported by all other modules:
/// station identity, the three metric levels, the persisted incident record,
/// the enums the engine classifies into, the quality flags attached to every
/// output row, and the error types of the boundary adapters.
/// It contains no logic beyond label parsing and formatting.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

// ---------------------------------------------------------------------------
// Station identity
// ---------------------------------------------------------------------------

/// Zonal administrative unit identifier ("DZ" in the source exports).
///
/// Zones are usually numbered, so ordering is numeric when both sides parse
/// as integers ("2" < "10") and lexical otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(pub String);

impl ZoneId {
    pub fn new(raw: &str) -> Self {
        ZoneId(raw.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Ord for ZoneId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0.parse::<u64>(), other.0.parse::<u64>()) {
            (Ok(a), Ok(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for ZoneId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A station is identified by its zone plus its name; names are only unique
/// within a zone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StationKey {
    pub zone: ZoneId,
    pub station: String,
}

impl StationKey {
    pub fn new(zone: &str, station: &str) -> Self {
        StationKey {
            zone: ZoneId::new(zone),
            station: station.trim().to_string(),
        }
    }
}

impl fmt::Display for StationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.zone, self.station)
    }
}

// ---------------------------------------------------------------------------
// Sampling frequency
// ---------------------------------------------------------------------------

/// True sampling cadence of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FrequencyClass {
    /// One sample every 10 minutes.
    SubHourly,
    Hourly,
    Daily,
}

impl FrequencyClass {
    pub fn samples_per_day(self) -> u64 {
        match self {
            FrequencyClass::SubHourly => 144,
            FrequencyClass::Hourly => 24,
            FrequencyClass::Daily => 1,
        }
    }

    /// Parses the labels used by the source exports and the frequency
    /// reference table. Matching is case-insensitive.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "minuto" | "sub-hourly" | "subhourly" | "sub_hourly" | "10min" | "10m" => {
                Some(FrequencyClass::SubHourly)
            }
            "horario" | "hora" | "hourly" | "1h" => Some(FrequencyClass::Hourly),
            "diario" | "daily" | "1d" => Some(FrequencyClass::Daily),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FrequencyClass::SubHourly => "sub-hourly",
            FrequencyClass::Hourly => "hourly",
            FrequencyClass::Daily => "daily",
        }
    }
}

impl fmt::Display for FrequencyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ---------------------------------------------------------------------------
// Availability bands
// ---------------------------------------------------------------------------

/// Coarse availability category reported next to every percentage.
///
/// Bands in ascending order of health:
///   not received < severe < degraded < normal, with anomalous (> 100%)
///   reported separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AvailabilityBand {
    /// Undefined availability or exactly 0%.
    NotReceived,
    /// Above 0% but below the degraded floor.
    Severe,
    /// At or above the degraded floor, below the critical threshold.
    Degraded,
    /// At or above the critical threshold, up to the anomaly threshold.
    Normal,
    /// Above the anomaly threshold.
    Anomalous,
}

impl AvailabilityBand {
    pub fn label(self) -> &'static str {
        match self {
            AvailabilityBand::NotReceived => "not received in period",
            AvailabilityBand::Severe => "availability problems (severe)",
            AvailabilityBand::Degraded => "availability problems (degraded)",
            AvailabilityBand::Normal => "normal",
            AvailabilityBand::Anomalous => "above 100%",
        }
    }
}

impl fmt::Display for AvailabilityBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ---------------------------------------------------------------------------
// Quality flags
// ---------------------------------------------------------------------------

/// Recoverable conditions attached to output rows. None of these abort a
/// run; they are surfaced so operators can see which numbers are degraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QualityFlag {
    /// No frequency reference entry; the source-reported expected count was used.
    FrequencyFallback,
    /// Expected count was zero (or missing), so availability is undefined.
    UndefinedAvailability,
    /// Availability above the anomaly threshold. Reported, never clamped.
    AnomalousAvailability,
    /// Station had no record in the previous snapshot.
    MissingPreviousRecord,
    /// The stored incident record contradicted measured values and was corrected.
    StateCorrected,
    /// Station present in the previous snapshot but absent from this period.
    NotReported,
    /// Variable has no sensor-type mapping.
    UnclassifiedVariable,
    /// The stored state label was not recognised; treated as no incident.
    UnrecognizedState,
    /// The stored incident date could not be parsed or lies after the reference date.
    InvalidIncidentDate,
}

impl QualityFlag {
    pub fn code(self) -> &'static str {
        match self {
            QualityFlag::FrequencyFallback => "frequency-fallback",
            QualityFlag::UndefinedAvailability => "undefined-availability",
            QualityFlag::AnomalousAvailability => "anomalous-availability",
            QualityFlag::MissingPreviousRecord => "missing-previous-record",
            QualityFlag::StateCorrected => "state-corrected",
            QualityFlag::NotReported => "not-reported",
            QualityFlag::UnclassifiedVariable => "unclassified-variable",
            QualityFlag::UnrecognizedState => "unrecognized-state",
            QualityFlag::InvalidIncidentDate => "invalid-incident-date",
        }
    }
}

impl fmt::Display for QualityFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Ordered set so serialized output is stable between runs.
pub type QualityFlags = BTreeSet<QualityFlag>;

// ---------------------------------------------------------------------------
// Incident state and priority
// ---------------------------------------------------------------------------

/// Per-station incident lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IncidentState {
    None,
    New,
    Recurrent,
    Resolved,
    Paralyzed,
}

impl IncidentState {
    /// Parses a stored label. Accepts the English names and the labels
    /// operators use in the source workbooks, in any casing. An empty label
    /// means no incident. Returns `None` for anything else.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_lowercase();
        match normalized.as_str() {
            "" | "none" | "sin incidencia" | "sin incidencias" => Some(IncidentState::None),
            "new" | "nueva" | "nuevo" => Some(IncidentState::New),
            "recurrent" | "recurrente" => Some(IncidentState::Recurrent),
            "resolved" | "solucionado" | "solucionada" => Some(IncidentState::Resolved),
            "paralyzed" | "paralysed" | "paralizada" | "paralizado" => {
                Some(IncidentState::Paralyzed)
            }
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            IncidentState::None => "NONE",
            IncidentState::New => "NEW",
            IncidentState::Recurrent => "RECURRENT",
            IncidentState::Resolved => "RESOLVED",
            IncidentState::Paralyzed => "PARALYZED",
        }
    }

    /// States that require an incident start date.
    pub fn is_open(self) -> bool {
        matches!(
            self,
            IncidentState::New | IncidentState::Recurrent | IncidentState::Paralyzed
        )
    }
}

impl fmt::Display for IncidentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Attention priority, in descending order of urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PriorityTier {
    High,
    Medium,
    /// Displayed as "paralyzed": the station is effectively abandoned.
    Low,
    Informational,
}

impl PriorityTier {
    pub fn label(self) -> &'static str {
        match self {
            PriorityTier::High => "HIGH",
            PriorityTier::Medium => "MEDIUM",
            PriorityTier::Low => "LOW",
            PriorityTier::Informational => "INFORMATIONAL",
        }
    }
}

impl fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ---------------------------------------------------------------------------
// Input rows
// ---------------------------------------------------------------------------

/// One row of the current-period metric set, as validated at the boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct RawVariableRow {
    pub key: StationKey,
    /// Equipment label as exported, if the source carries one.
    pub sensor: Option<String>,
    pub variable: String,
    pub frequency_label: Option<String>,
    pub correct_count: u64,
    pub error_count: u64,
    /// Expected count as reported by the source.
    pub reported_expected: Option<u64>,
}

// ---------------------------------------------------------------------------
// Metric types
// ---------------------------------------------------------------------------

/// One variable of one station for one reporting period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableMetric {
    pub key: StationKey,
    pub sensor: String,
    pub variable: String,
    /// Resolved cadence, or the source's own label when unresolved.
    pub frequency: Option<FrequencyClass>,
    pub correct_count: u64,
    pub error_count: u64,
    /// Expected count actually used for the percentage.
    pub expected_count: u64,
    /// Expected count as reported by the source, kept for audit.
    pub reported_expected_count: Option<u64>,
    /// `None` when the expected count is zero.
    pub availability: Option<f64>,
    pub band: AvailabilityBand,
    pub received: u64,
    pub lost: i64,
    pub loss_pct: f64,
    pub error_pct: f64,
    pub flags: QualityFlags,
}

/// Mean availability of the variables of one sensor type at one station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentMetric {
    pub key: StationKey,
    pub sensor: String,
    pub availability: Option<f64>,
    pub band: AvailabilityBand,
    /// Variables with a defined availability that entered the mean.
    pub variables_included: usize,
    pub variables_total: usize,
    pub flags: QualityFlags,
}

/// Mean availability of all included variables of one station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationMetric {
    pub key: StationKey,
    pub availability: Option<f64>,
    pub band: AvailabilityBand,
    pub variables_included: usize,
    pub variables_total: usize,
    pub flags: QualityFlags,
}

// ---------------------------------------------------------------------------
// Incident record
// ---------------------------------------------------------------------------

/// Incident state persisted per station between reporting periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentRecord {
    pub key: StationKey,
    pub state: IncidentState,
    pub incident_start: Option<NaiveDate>,
    /// Date the incident entered RESOLVED; starts the monitoring window.
    pub resolved_on: Option<NaiveDate>,
    /// Operator text, carried verbatim. The engine never writes it.
    pub comment: Option<String>,
    pub last_availability: Option<f64>,
}

impl IncidentRecord {
    /// A station seen for the first time.
    pub fn fresh(key: StationKey) -> Self {
        IncidentRecord {
            key,
            state: IncidentState::None,
            incident_start: None,
            resolved_on: None,
            comment: None,
            last_availability: None,
        }
    }
}

/// A previous-snapshot row after boundary validation, with the flags raised
/// while reading it (unknown state label, unparseable date).
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotEntry {
    pub record: IncidentRecord,
    pub flags: QualityFlags,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised while reading the engine configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    Io(String),
    /// The file is not valid TOML or does not match the expected shape.
    Parse(String),
    /// The values parsed but violate a consistency rule.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "Config I/O error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Config parse error: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Structural failures of a whole input table.
#[derive(Debug)]
pub enum IngestError {
    Io(String),
    Csv(String),
    /// A column required by the table is absent from the header.
    MissingColumn { table: &'static str, column: &'static str },
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::Io(msg) => write!(f, "I/O error: {}", msg),
            IngestError::Csv(msg) => write!(f, "CSV error: {}", msg),
            IngestError::MissingColumn { table, column } => {
                write!(f, "Table '{}' is missing required column '{}'", table, column)
            }
        }
    }
}

impl std::error::Error for IngestError {}

impl From<std::io::Error> for IngestError {
    fn from(e: std::io::Error) -> Self {
        IngestError::Io(e.to_string())
    }
}

impl From<csv::Error> for IngestError {
    fn from(e: csv::Error) -> Self {
        IngestError::Csv(e.to_string())
    }
}

/// A single input row that could not be turned into a typed record.
/// Only missing zone or station identity rejects a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowRejection {
    pub table: String,
    /// 1-based line number in the source file, header included.
    pub line: u64,
    pub reason: String,
}

impl fmt::Display for RowRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} line {}: {}", self.table, self.line, self.reason)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_ids_order_numerically() {
        let mut zones = vec![ZoneId::new("10"), ZoneId::new("2"), ZoneId::new("1")];
        zones.sort();
        let ordered: Vec<_> = zones.iter().map(|z| z.as_str()).collect();
        assert_eq!(ordered, vec!["1", "2", "10"]);
    }

    #[test]
    fn test_numeric_zones_sort_before_named_zones() {
        assert!(ZoneId::new("13") < ZoneId::new("LIMA"));
    }

    #[test]
    fn test_station_key_trims_whitespace() {
        let key = StationKey::new(" 5 ", "  ALPHA ");
        assert_eq!(key.zone.as_str(), "5");
        assert_eq!(key.station, "ALPHA");
        assert_eq!(key.to_string(), "5/ALPHA");
    }

    #[test]
    fn test_frequency_labels_are_case_insensitive() {
        assert_eq!(FrequencyClass::from_label("MINUTO"), Some(FrequencyClass::SubHourly));
        assert_eq!(FrequencyClass::from_label("Horario"), Some(FrequencyClass::Hourly));
        assert_eq!(FrequencyClass::from_label(" daily "), Some(FrequencyClass::Daily));
        assert_eq!(FrequencyClass::from_label("weekly"), None);
    }

    #[test]
    fn test_samples_per_day() {
        assert_eq!(FrequencyClass::SubHourly.samples_per_day(), 144);
        assert_eq!(FrequencyClass::Hourly.samples_per_day(), 24);
        assert_eq!(FrequencyClass::Daily.samples_per_day(), 1);
    }

    #[test]
    fn test_state_labels_accept_operator_vocabulary() {
        assert_eq!(IncidentState::from_label("Nueva"), Some(IncidentState::New));
        assert_eq!(IncidentState::from_label("RECURRENTE"), Some(IncidentState::Recurrent));
        assert_eq!(IncidentState::from_label("Solucionado"), Some(IncidentState::Resolved));
        assert_eq!(IncidentState::from_label("paralizada"), Some(IncidentState::Paralyzed));
        assert_eq!(IncidentState::from_label("Sin incidencia"), Some(IncidentState::None));
        assert_eq!(IncidentState::from_label(""), Some(IncidentState::None));
        assert_eq!(IncidentState::from_label("en revision"), None);
    }

    #[test]
    fn test_state_labels_round_trip_through_english_names() {
        for state in [
            IncidentState::None,
            IncidentState::New,
            IncidentState::Recurrent,
            IncidentState::Resolved,
            IncidentState::Paralyzed,
        ] {
            assert_eq!(IncidentState::from_label(state.label()), Some(state));
        }
    }

    #[test]
    fn test_only_open_states_require_a_start_date() {
        assert!(IncidentState::New.is_open());
        assert!(IncidentState::Recurrent.is_open());
        assert!(IncidentState::Paralyzed.is_open());
        assert!(!IncidentState::Resolved.is_open());
        assert!(!IncidentState::None.is_open());
    }

    #[test]
    fn test_priority_tiers_order_by_urgency() {
        assert!(PriorityTier::High < PriorityTier::Medium);
        assert!(PriorityTier::Medium < PriorityTier::Low);
        assert!(PriorityTier::Low < PriorityTier::Informational);
    }
}
