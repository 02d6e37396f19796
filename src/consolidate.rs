/// Consolidation of one reporting period.
///
/// Joins the calculator's station metrics with the previous incident
/// snapshot, advances every station's incident record, classifies it, and
/// produces:
/// - one consolidated row per station (the union of both inputs),
/// - network and per-zone indicators, derived from the rows alone,
/// - the next incident snapshot, one record per row.
///
/// The whole step is `f(previous snapshot, metrics, reference date)`:
/// stations are independent and every output list is in key order, so a
/// replay with the same inputs produces identical output.

use crate::availability::{
    AvailabilityCalculator, AvailabilityReport, FrequencyEntry, FrequencyResolver,
};
use crate::catalog::SensorCatalog;
use crate::config::EngineConfig;
use crate::incident::priority::{classify, PriorityInput, PriorityTrigger};
use crate::incident::tracker::{self, elapsed_days};
use crate::logging::{self, Stage};
use crate::model::{
    AvailabilityBand, EquipmentMetric, IncidentRecord, IncidentState, PriorityTier, QualityFlag,
    QualityFlags, RawVariableRow, SnapshotEntry, StationKey, StationMetric, VariableMetric, ZoneId,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Which inputs a consolidated station came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RowSource {
    Both,
    CurrentOnly,
    /// In the previous snapshot but missing from this period's metrics.
    PreviousOnly,
}

/// One station, one period, everything downstream reporting needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsolidatedRow {
    pub key: StationKey,
    pub source: RowSource,
    pub availability: Option<f64>,
    pub previous_availability: Option<f64>,
    /// Percentage points against the previous period.
    pub variation: Option<f64>,
    pub band: AvailabilityBand,
    /// Defined and below the critical threshold.
    pub critical: bool,
    pub variables_included: usize,
    pub variables_total: usize,
    pub previous_state: IncidentState,
    pub state: IncidentState,
    pub incident_start: Option<NaiveDate>,
    pub resolved_on: Option<NaiveDate>,
    pub elapsed_days: Option<i64>,
    pub tier: PriorityTier,
    pub trigger: PriorityTrigger,
    pub reason: String,
    pub closure_candidate: bool,
    pub comment: Option<String>,
    pub flags: QualityFlags,
}

/// Indicators of one zone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneIndicators {
    pub zone: ZoneId,
    pub stations: usize,
    /// Mean of defined availabilities, each capped at the anomaly threshold.
    pub mean_availability: Option<f64>,
    pub pct_at_or_above_threshold: Option<f64>,
    pub critical: usize,
    pub no_data: usize,
    pub states: BTreeMap<IncidentState, usize>,
    pub tiers: BTreeMap<PriorityTier, usize>,
}

/// Network-wide indicators, pure aggregation over the consolidated rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Indicators {
    pub total_stations: usize,
    pub critical_stations: usize,
    pub anomalies: usize,
    pub undefined: usize,
    /// Stations at exactly 0%.
    pub no_data: usize,
    pub pct_at_or_above_threshold: Option<f64>,
    pub network_mean_availability: Option<f64>,
    pub tiers: BTreeMap<PriorityTier, usize>,
    pub states: BTreeMap<IncidentState, usize>,
    /// Zones with at least one critical station.
    pub affected_zones: Vec<ZoneId>,
    pub closure_candidates: usize,
    /// Ordered by zone identifier.
    pub zones: Vec<ZoneIndicators>,
}

/// Everything one period produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Consolidation {
    pub reference_date: NaiveDate,
    pub period_days: u32,
    pub rows: Vec<ConsolidatedRow>,
    pub indicators: Indicators,
    pub equipment: Vec<EquipmentMetric>,
    pub variables: Vec<VariableMetric>,
    /// Input of the next run; written separately from the report.
    #[serde(skip)]
    pub snapshot: Vec<IncidentRecord>,
}

// ---------------------------------------------------------------------------
// Period run
// ---------------------------------------------------------------------------

/// Runs one whole period: frequency resolution, availability, incident
/// tracking, classification and consolidation.
pub fn run_period(
    metrics: &[RawVariableRow],
    frequencies: Vec<FrequencyEntry>,
    previous: &[SnapshotEntry],
    reference_date: NaiveDate,
    config: &EngineConfig,
) -> Consolidation {
    let catalog = SensorCatalog::from_config(config);
    let resolver = FrequencyResolver::new(frequencies);
    logging::debug(
        Stage::System,
        None,
        &format!(
            "{} catalogued variables, {} frequency entries",
            catalog.len(),
            resolver.len()
        ),
    );
    let report = AvailabilityCalculator::new(config, &resolver, &catalog).compute(metrics);
    ConsolidationAssembler::new(config).assemble(report, previous, reference_date)
}

// ---------------------------------------------------------------------------
// Assembler
// ---------------------------------------------------------------------------

pub struct ConsolidationAssembler<'a> {
    config: &'a EngineConfig,
}

impl<'a> ConsolidationAssembler<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        ConsolidationAssembler { config }
    }

    pub fn assemble(
        &self,
        report: AvailabilityReport,
        previous: &[SnapshotEntry],
        reference_date: NaiveDate,
    ) -> Consolidation {
        let mut previous_by_key: BTreeMap<&StationKey, &SnapshotEntry> = BTreeMap::new();
        for entry in previous {
            if previous_by_key.insert(&entry.record.key, entry).is_some() {
                logging::warn(
                    Stage::Assembler,
                    Some(&entry.record.key.to_string()),
                    "duplicate station in previous snapshot; keeping the last row",
                );
            }
        }
        let current_by_key: BTreeMap<&StationKey, &StationMetric> =
            report.stations.iter().map(|m| (&m.key, m)).collect();

        let keys: BTreeSet<&StationKey> = current_by_key
            .keys()
            .chain(previous_by_key.keys())
            .copied()
            .collect();

        let mut rows = Vec::with_capacity(keys.len());
        let mut snapshot = Vec::with_capacity(keys.len());
        for key in keys {
            let current = current_by_key.get(key).copied();
            let prior = previous_by_key.get(key).copied();
            let (row, record) = self.consolidate_station(key, current, prior, reference_date);
            rows.push(row);
            snapshot.push(record);
        }

        let indicators = Indicators::from_rows(&rows, self.config);
        logging::log_run_summary(&indicators);

        Consolidation {
            reference_date,
            period_days: self.config.calculation.period_days,
            rows,
            indicators,
            equipment: report.equipment,
            variables: report.variables,
            snapshot,
        }
    }

    fn consolidate_station(
        &self,
        key: &StationKey,
        current: Option<&StationMetric>,
        prior: Option<&SnapshotEntry>,
        reference_date: NaiveDate,
    ) -> (ConsolidatedRow, IncidentRecord) {
        let station = key.to_string();
        let mut flags = QualityFlags::new();
        if let Some(entry) = prior {
            flags.extend(entry.flags.iter().copied());
        }
        let previous_availability = prior.and_then(|e| e.record.last_availability);
        let previous_state = prior.map_or(IncidentState::None, |e| e.record.state);

        let (source, availability, included, total, record, elapsed, since_resolution) =
            match current {
                Some(metric) => {
                    flags.extend(metric.flags.iter().copied());
                    let stored = match prior {
                        Some(entry) => entry.record.clone(),
                        None => {
                            flags.insert(QualityFlag::MissingPreviousRecord);
                            IncidentRecord::fresh(key.clone())
                        }
                    };
                    let outcome =
                        tracker::advance(&stored, metric.availability, reference_date, self.config);
                    for correction in &outcome.corrections {
                        logging::log_correction(&station, correction);
                    }
                    if outcome.record.state != outcome.previous_state {
                        logging::debug(
                            Stage::Tracker,
                            Some(&station),
                            &format!("{} -> {}", outcome.previous_state, outcome.record.state),
                        );
                    }
                    flags.extend(outcome.flags.iter().copied());
                    let source = if prior.is_some() {
                        RowSource::Both
                    } else {
                        RowSource::CurrentOnly
                    };
                    (
                        source,
                        metric.availability,
                        metric.variables_included,
                        metric.variables_total,
                        outcome.record,
                        outcome.elapsed_days,
                        outcome.days_since_resolution,
                    )
                }
                None => {
                    // Only reachable for keys taken from the snapshot.
                    let stored = prior
                        .map(|e| e.record.clone())
                        .unwrap_or_else(|| IncidentRecord::fresh(key.clone()));
                    let reconciled = tracker::reconcile(&stored, reference_date, self.config);
                    for correction in &reconciled.corrections {
                        logging::log_correction(&station, correction);
                    }
                    flags.extend(reconciled.flags.iter().copied());
                    flags.insert(QualityFlag::NotReported);
                    let record = reconciled.record;
                    let elapsed = record
                        .incident_start
                        .map(|start| elapsed_days(start, reference_date));
                    let since = match record.state {
                        IncidentState::Resolved => record
                            .resolved_on
                            .map(|resolved| elapsed_days(resolved, reference_date)),
                        _ => None,
                    };
                    (RowSource::PreviousOnly, None, 0, 0, record, elapsed, since)
                }
            };

        let classification = classify(
            &PriorityInput {
                state: record.state,
                elapsed_days: elapsed,
                availability,
                days_since_resolution: since_resolution,
            },
            self.config,
        );
        if classification.closure_candidate {
            logging::info(Stage::Classifier, Some(&station), &classification.reason);
        }
        logging::log_flags(Stage::Assembler, &station, &flags);

        let thresholds = &self.config.thresholds;
        let row = ConsolidatedRow {
            key: key.clone(),
            source,
            availability,
            previous_availability,
            variation: match (availability, previous_availability) {
                (Some(now), Some(before)) => Some(now - before),
                _ => None,
            },
            band: thresholds.band_for(availability),
            critical: availability.is_some_and(|a| thresholds.is_critical(a)),
            variables_included: included,
            variables_total: total,
            previous_state,
            state: record.state,
            incident_start: record.incident_start,
            resolved_on: record.resolved_on,
            elapsed_days: elapsed,
            tier: classification.tier,
            trigger: classification.trigger,
            reason: classification.reason,
            closure_candidate: classification.closure_candidate,
            comment: record.comment.clone(),
            flags,
        };
        (row, record)
    }
}

// ---------------------------------------------------------------------------
// Indicators
// ---------------------------------------------------------------------------

fn tier_counts() -> BTreeMap<PriorityTier, usize> {
    [
        PriorityTier::High,
        PriorityTier::Medium,
        PriorityTier::Low,
        PriorityTier::Informational,
    ]
    .into_iter()
    .map(|tier| (tier, 0))
    .collect()
}

fn state_counts() -> BTreeMap<IncidentState, usize> {
    [
        IncidentState::None,
        IncidentState::New,
        IncidentState::Recurrent,
        IncidentState::Resolved,
        IncidentState::Paralyzed,
    ]
    .into_iter()
    .map(|state| (state, 0))
    .collect()
}

/// Mean of defined values, each capped at `cap`.
fn capped_mean(rows: &[&ConsolidatedRow], cap: f64) -> Option<f64> {
    let defined: Vec<f64> = rows.iter().filter_map(|r| r.availability).collect();
    if defined.is_empty() {
        return None;
    }
    Some(defined.iter().map(|a| a.min(cap)).sum::<f64>() / defined.len() as f64)
}

fn pct_at_or_above(rows: &[&ConsolidatedRow], config: &EngineConfig) -> Option<f64> {
    if rows.is_empty() {
        return None;
    }
    let healthy = rows
        .iter()
        .filter(|r| r.availability.is_some_and(|a| !config.thresholds.is_critical(a)))
        .count();
    Some(healthy as f64 / rows.len() as f64 * 100.0)
}

impl ZoneIndicators {
    fn from_rows(zone: ZoneId, rows: &[&ConsolidatedRow], config: &EngineConfig) -> Self {
        let mut states = state_counts();
        let mut tiers = tier_counts();
        for row in rows {
            *states.entry(row.state).or_default() += 1;
            *tiers.entry(row.tier).or_default() += 1;
        }
        ZoneIndicators {
            zone,
            stations: rows.len(),
            mean_availability: capped_mean(rows, config.thresholds.anomaly),
            pct_at_or_above_threshold: pct_at_or_above(rows, config),
            critical: rows.iter().filter(|r| r.critical).count(),
            no_data: rows.iter().filter(|r| r.availability == Some(0.0)).count(),
            states,
            tiers,
        }
    }
}

impl Indicators {
    pub fn from_rows(rows: &[ConsolidatedRow], config: &EngineConfig) -> Self {
        let all: Vec<&ConsolidatedRow> = rows.iter().collect();
        let mut states = state_counts();
        let mut tiers = tier_counts();
        let mut by_zone: BTreeMap<&ZoneId, Vec<&ConsolidatedRow>> = BTreeMap::new();
        for row in rows {
            *states.entry(row.state).or_default() += 1;
            *tiers.entry(row.tier).or_default() += 1;
            by_zone.entry(&row.key.zone).or_default().push(row);
        }

        let affected_zones: Vec<ZoneId> = by_zone
            .iter()
            .filter(|(_, zone_rows)| zone_rows.iter().any(|r| r.critical))
            .map(|(zone, _)| (*zone).clone())
            .collect();
        let zones = by_zone
            .into_iter()
            .map(|(zone, zone_rows)| ZoneIndicators::from_rows(zone.clone(), &zone_rows, config))
            .collect();

        Indicators {
            total_stations: rows.len(),
            critical_stations: rows.iter().filter(|r| r.critical).count(),
            anomalies: rows
                .iter()
                .filter(|r| r.availability.is_some_and(|a| config.thresholds.is_anomalous(a)))
                .count(),
            undefined: rows.iter().filter(|r| r.availability.is_none()).count(),
            no_data: rows.iter().filter(|r| r.availability == Some(0.0)).count(),
            pct_at_or_above_threshold: pct_at_or_above(&all, config),
            network_mean_availability: capped_mean(&all, config.thresholds.anomaly),
            tiers,
            states,
            affected_zones,
            closure_candidates: rows.iter().filter(|r| r.closure_candidate).count(),
            zones,
        }
    }
}

// ---------------------------------------------------------------------------
// Report helpers
// ---------------------------------------------------------------------------

impl Consolidation {
    /// The `n` stations with the lowest defined availability.
    pub fn top_critical(&self, n: usize) -> Vec<&ConsolidatedRow> {
        let mut defined: Vec<&ConsolidatedRow> =
            self.rows.iter().filter(|r| r.availability.is_some()).collect();
        defined.sort_by(|a, b| {
            let (a_value, b_value) = (a.availability.unwrap_or(0.0), b.availability.unwrap_or(0.0));
            a_value.total_cmp(&b_value).then_with(|| a.key.cmp(&b.key))
        });
        defined.truncate(n);
        defined
    }

    pub fn rows_with_tier(&self, tier: PriorityTier) -> Vec<&ConsolidatedRow> {
        self.rows.iter().filter(|r| r.tier == tier).collect()
    }

    /// Critical stations an operator has commented on.
    pub fn incidents_with_comments(&self) -> Vec<&ConsolidatedRow> {
        self.rows
            .iter()
            .filter(|r| r.critical)
            .filter(|r| r.comment.as_deref().is_some_and(|c| !c.trim().is_empty()))
            .collect()
    }

    /// Zones from worst to best mean availability; zones without a defined
    /// mean come last.
    pub fn zones_by_availability(&self) -> Vec<&ZoneIndicators> {
        let mut zones: Vec<&ZoneIndicators> = self.indicators.zones.iter().collect();
        zones.sort_by(|a, b| match (a.mean_availability, b.mean_availability) {
            (Some(x), Some(y)) => x.total_cmp(&y).then_with(|| a.zone.cmp(&b.zone)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.zone.cmp(&b.zone),
        });
        zones
    }

    pub fn row(&self, key: &StationKey) -> Option<&ConsolidatedRow> {
        self.rows.iter().find(|r| &r.key == key)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn reference() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 6).unwrap()
    }

    fn station(zone: &str, name: &str, availability: Option<f64>) -> StationMetric {
        let config = EngineConfig::default();
        let mut flags = QualityFlags::new();
        if availability.is_none() {
            flags.insert(QualityFlag::UndefinedAvailability);
        }
        StationMetric {
            key: StationKey::new(zone, name),
            availability,
            band: config.thresholds.band_for(availability),
            variables_included: usize::from(availability.is_some()),
            variables_total: 1,
            flags,
        }
    }

    fn report(stations: Vec<StationMetric>) -> AvailabilityReport {
        AvailabilityReport {
            stations,
            ..AvailabilityReport::default()
        }
    }

    fn snapshot(
        zone: &str,
        name: &str,
        state: IncidentState,
        start_days_ago: Option<i64>,
    ) -> SnapshotEntry {
        SnapshotEntry {
            record: IncidentRecord {
                state,
                incident_start: start_days_ago.map(|d| reference() - Duration::days(d)),
                ..IncidentRecord::fresh(StationKey::new(zone, name))
            },
            flags: QualityFlags::new(),
        }
    }

    #[test]
    fn test_union_of_current_and_previous_stations() {
        let config = EngineConfig::default();
        let out = ConsolidationAssembler::new(&config).assemble(
            report(vec![station("1", "ALPHA", Some(90.0)), station("1", "BRAVO", Some(95.0))]),
            &[
                snapshot("1", "BRAVO", IncidentState::None, None),
                snapshot("2", "CHARLIE", IncidentState::Recurrent, Some(20)),
            ],
            reference(),
        );
        let sources: Vec<_> = out.rows.iter().map(|r| (r.key.station.as_str(), r.source)).collect();
        assert_eq!(
            sources,
            vec![
                ("ALPHA", RowSource::CurrentOnly),
                ("BRAVO", RowSource::Both),
                ("CHARLIE", RowSource::PreviousOnly),
            ]
        );
        assert_eq!(out.snapshot.len(), 3, "one snapshot record per row");

        let alpha = &out.rows[0];
        assert!(alpha.flags.contains(&QualityFlag::MissingPreviousRecord));

        let charlie = &out.rows[2];
        assert!(charlie.flags.contains(&QualityFlag::NotReported));
        assert_eq!(charlie.state, IncidentState::Recurrent, "unreported station keeps its record");
        assert_eq!(charlie.availability, None);
        assert_eq!(out.snapshot[2].state, IncidentState::Recurrent);
    }

    #[test]
    fn test_unreported_station_record_is_reconciled() {
        let config = EngineConfig::default();
        let out = ConsolidationAssembler::new(&config).assemble(
            AvailabilityReport::default(),
            &[
                snapshot("1", "DATEDNONE", IncidentState::None, Some(12)),
                snapshot("1", "YOUNGPARA", IncidentState::Paralyzed, Some(3)),
            ],
            reference(),
        );

        let dated_none = out.row(&StationKey::new("1", "DATEDNONE")).expect("DATEDNONE row");
        assert_eq!(dated_none.state, IncidentState::None);
        assert_eq!(dated_none.incident_start, None, "NONE carries no start date");
        assert!(dated_none.flags.contains(&QualityFlag::StateCorrected));
        assert!(dated_none.flags.contains(&QualityFlag::NotReported));

        let young = out.row(&StationKey::new("1", "YOUNGPARA")).expect("YOUNGPARA row");
        assert_eq!(young.state, IncidentState::New, "3 days is inside the promotion window");
        assert_eq!(young.elapsed_days, Some(3));
        assert_eq!(young.tier, PriorityTier::Informational, "undefined availability");
        assert!(young.flags.contains(&QualityFlag::StateCorrected));

        for record in &out.snapshot {
            match record.state {
                IncidentState::None => assert_eq!(record.incident_start, None, "{}", record.key),
                state if state.is_open() => {
                    assert!(record.incident_start.is_some(), "{} lost its start", record.key)
                }
                _ => {}
            }
        }
    }

    #[test]
    fn test_variation_against_previous_availability() {
        let config = EngineConfig::default();
        let mut prior = snapshot("1", "ALPHA", IncidentState::None, None);
        prior.record.last_availability = Some(70.0);
        let out = ConsolidationAssembler::new(&config).assemble(
            report(vec![station("1", "ALPHA", Some(85.5))]),
            &[prior],
            reference(),
        );
        let row = &out.rows[0];
        assert_eq!(row.previous_availability, Some(70.0));
        assert!((row.variation.unwrap() - 15.5).abs() < 1e-9);
    }

    #[test]
    fn test_anomaly_is_counted_but_not_critical() {
        let config = EngineConfig::default();
        let out = ConsolidationAssembler::new(&config).assemble(
            report(vec![
                station("1", "ALPHA", Some(105.0)),
                station("1", "BRAVO", Some(40.0)),
            ]),
            &[],
            reference(),
        );
        let alpha = &out.rows[0];
        assert_eq!(alpha.tier, PriorityTier::Informational);
        assert!(!alpha.critical);
        assert_eq!(out.indicators.total_stations, 2);
        assert_eq!(out.indicators.critical_stations, 1);
        assert_eq!(out.indicators.anomalies, 1);
    }

    #[test]
    fn test_network_mean_caps_anomalies() {
        let config = EngineConfig::default();
        let out = ConsolidationAssembler::new(&config).assemble(
            report(vec![
                station("1", "ALPHA", Some(200.0)),
                station("1", "BRAVO", Some(50.0)),
                station("2", "CHARLIE", None),
            ]),
            &[],
            reference(),
        );
        assert_eq!(out.indicators.network_mean_availability, Some(75.0));
        assert_eq!(out.indicators.undefined, 1);
        let pct = out.indicators.pct_at_or_above_threshold.unwrap();
        assert!((pct - 100.0 / 3.0).abs() < 1e-9, "got {}", pct);
    }

    #[test]
    fn test_zone_indicators_and_affected_zones() {
        let config = EngineConfig::default();
        let out = ConsolidationAssembler::new(&config).assemble(
            report(vec![
                station("10", "ALPHA", Some(10.0)),
                station("2", "BRAVO", Some(90.0)),
                station("2", "CHARLIE", Some(0.0)),
                station("3", "DELTA", Some(95.0)),
            ]),
            &[],
            reference(),
        );
        let ind = &out.indicators;
        let zones: Vec<_> = ind.zones.iter().map(|z| z.zone.as_str()).collect();
        assert_eq!(zones, vec!["2", "3", "10"]);
        let affected: Vec<_> = ind.affected_zones.iter().map(|z| z.as_str()).collect();
        assert_eq!(affected, vec!["2", "10"]);
        assert_eq!(ind.no_data, 1);
        assert_eq!(ind.zones[0].critical, 1);
        assert_eq!(ind.zones[0].mean_availability, Some(45.0));
        assert_eq!(ind.tiers[&PriorityTier::High], 2);
        assert_eq!(ind.states[&IncidentState::New], 2);
        assert_eq!(ind.states[&IncidentState::Paralyzed], 0);

        let worst_first: Vec<_> = out.zones_by_availability().iter().map(|z| z.zone.as_str()).collect();
        assert_eq!(worst_first, vec!["10", "2", "3"]);
    }

    #[test]
    fn test_report_helpers() {
        let config = EngineConfig::default();
        let mut commented = snapshot("1", "BRAVO", IncidentState::New, Some(1));
        commented.record.comment = Some("logger replaced".to_string());
        let mut healthy_commented = snapshot("1", "DELTA", IncidentState::None, None);
        healthy_commented.record.comment = Some("visited".to_string());

        let out = ConsolidationAssembler::new(&config).assemble(
            report(vec![
                station("1", "ALPHA", Some(30.0)),
                station("1", "BRAVO", Some(20.0)),
                station("1", "CHARLIE", None),
                station("1", "DELTA", Some(99.0)),
            ]),
            &[commented, healthy_commented],
            reference(),
        );

        let top: Vec<_> = out.top_critical(2).iter().map(|r| r.key.station.as_str()).collect();
        assert_eq!(top, vec!["BRAVO", "ALPHA"]);
        assert_eq!(out.rows_with_tier(PriorityTier::High).len(), 2);
        let with_comments = out.incidents_with_comments();
        assert_eq!(with_comments.len(), 1);
        assert_eq!(with_comments[0].key.station, "BRAVO");
        assert_eq!(with_comments[0].comment.as_deref(), Some("logger replaced"));
    }

    #[test]
    fn test_snapshot_flags_reach_the_row() {
        let config = EngineConfig::default();
        let mut prior = snapshot("1", "ALPHA", IncidentState::None, None);
        prior.flags.insert(QualityFlag::UnrecognizedState);
        let out = ConsolidationAssembler::new(&config).assemble(
            report(vec![station("1", "ALPHA", Some(95.0))]),
            &[prior],
            reference(),
        );
        assert!(out.rows[0].flags.contains(&QualityFlag::UnrecognizedState));
    }

    #[test]
    fn test_assemble_is_idempotent() {
        let config = EngineConfig::default();
        let build = || {
            ConsolidationAssembler::new(&config).assemble(
                report(vec![station("1", "ALPHA", Some(12.0)), station("2", "BRAVO", Some(88.0))]),
                &[snapshot("1", "ALPHA", IncidentState::New, Some(9))],
                reference(),
            )
        };
        let first = serde_json::to_string(&build()).unwrap();
        let second = serde_json::to_string(&build()).unwrap();
        assert_eq!(first, second);
    }
}
