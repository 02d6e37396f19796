/// Incident state tracking.
///
/// Advances one station's incident record by one reporting period:
///
/// ```text
///   NONE ──critical──▶ NEW ──elapsed > promote──▶ RECURRENT ──dormant──▶ PARALYZED
///                       │                             │                       │
///                       └─────────── healthy ─────────┴───────────────────────┘
///                                                     ▼
///                         RESOLVED ──monitor window over──▶ NONE
///                             └──critical again──▶ NEW (fresh start date)
/// ```
///
/// The stored record is first reconciled against itself and the reference
/// date, and every transition is then driven by the measured availability
/// and elapsed time. A stored label never wins over a measurement.
///
/// # Clock injection
/// The reference date is always an argument; nothing here reads the wall
/// clock, so replaying a period yields the same record.

use crate::config::EngineConfig;
use crate::incident::paralysis;
use crate::model::{IncidentRecord, IncidentState, QualityFlag, QualityFlags};
use chrono::NaiveDate;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of advancing one station by one period.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerOutcome {
    pub record: IncidentRecord,
    /// State as stored in the previous snapshot, before reconciliation.
    pub previous_state: IncidentState,
    /// Days since the incident started, never negative. `None` without a start date.
    pub elapsed_days: Option<i64>,
    /// Days since the record entered RESOLVED, when it is RESOLVED.
    pub days_since_resolution: Option<i64>,
    pub flags: QualityFlags,
    /// Human-readable description of each correction applied to the stored record.
    pub corrections: Vec<String>,
}

/// Days between the incident start and the reference date, clamped at zero.
pub fn elapsed_days(start: NaiveDate, reference_date: NaiveDate) -> i64 {
    (reference_date - start).num_days().max(0)
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// A stored record after consistency repairs.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub record: IncidentRecord,
    pub flags: QualityFlags,
    pub corrections: Vec<String>,
}

/// Repairs a stored record that contradicts itself or the reference date.
///
/// - an open state without a start date starts today
/// - a start date after the reference date is moved to the reference date
/// - NONE carrying a start date loses it
/// - PARALYZED younger than the paralysis window falls back to
///   RECURRENT (or NEW inside the promotion window)
/// - RESOLVED without a resolution date starts its monitoring window today
pub fn reconcile(
    stored: &IncidentRecord,
    reference_date: NaiveDate,
    config: &EngineConfig,
) -> Reconciled {
    let windows = &config.windows;
    let mut record = stored.clone();
    let mut flags = QualityFlags::new();
    let mut corrections = Vec::new();

    if let Some(start) = record.incident_start {
        if start > reference_date {
            flags.insert(QualityFlag::InvalidIncidentDate);
            corrections.push(format!(
                "incident start {} is after reference date {}; using reference date",
                start, reference_date
            ));
            record.incident_start = Some(reference_date);
        }
    }

    match record.state {
        IncidentState::None => {
            if record.incident_start.is_some() || record.resolved_on.is_some() {
                flags.insert(QualityFlag::StateCorrected);
                corrections.push("NONE record carried incident dates; cleared".to_string());
                record.incident_start = None;
                record.resolved_on = None;
            }
        }
        state if state.is_open() => {
            if record.incident_start.is_none() {
                flags.insert(QualityFlag::StateCorrected);
                corrections.push(format!(
                    "{} record had no start date; starting at {}",
                    state, reference_date
                ));
                record.incident_start = Some(reference_date);
            }
            record.resolved_on = None;

            let elapsed = record
                .incident_start
                .map_or(0, |start| elapsed_days(start, reference_date));
            if state == IncidentState::Paralyzed && elapsed <= windows.paralysis_days {
                let demoted = if elapsed > windows.promote_days {
                    IncidentState::Recurrent
                } else {
                    IncidentState::New
                };
                flags.insert(QualityFlag::StateCorrected);
                corrections.push(format!(
                    "PARALYZED after only {} days; demoted to {}",
                    elapsed, demoted
                ));
                record.state = demoted;
            }
        }
        IncidentState::Resolved => {
            if record.resolved_on.is_none() {
                flags.insert(QualityFlag::StateCorrected);
                corrections.push(format!(
                    "RESOLVED record had no resolution date; monitoring from {}",
                    reference_date
                ));
                record.resolved_on = Some(reference_date);
            }
        }
        _ => {}
    }

    if let Some(resolved_on) = record.resolved_on {
        if resolved_on > reference_date {
            flags.insert(QualityFlag::InvalidIncidentDate);
            corrections.push(format!(
                "resolution date {} is after reference date {}; using reference date",
                resolved_on, reference_date
            ));
            record.resolved_on = Some(reference_date);
        }
    }

    Reconciled {
        record,
        flags,
        corrections,
    }
}

// ---------------------------------------------------------------------------
// Transition
// ---------------------------------------------------------------------------

/// Advances a stored record by one period given the station's freshly
/// computed availability.
///
/// Undefined availability (`None`) never drives a transition: the
/// reconciled record is carried forward and the outcome is flagged.
pub fn advance(
    stored: &IncidentRecord,
    availability: Option<f64>,
    reference_date: NaiveDate,
    config: &EngineConfig,
) -> TrackerOutcome {
    let Reconciled {
        mut record,
        mut flags,
        corrections,
    } = reconcile(stored, reference_date, config);

    match availability {
        None => {
            flags.insert(QualityFlag::UndefinedAvailability);
        }
        Some(availability) => {
            transition(&mut record, availability, reference_date, config);
            record.last_availability = Some(availability);
        }
    }

    let elapsed = record
        .incident_start
        .map(|start| elapsed_days(start, reference_date));
    let days_since_resolution = match record.state {
        IncidentState::Resolved => record
            .resolved_on
            .map(|resolved| elapsed_days(resolved, reference_date)),
        _ => None,
    };

    TrackerOutcome {
        record,
        previous_state: stored.state,
        elapsed_days: elapsed,
        days_since_resolution,
        flags,
        corrections,
    }
}

fn transition(
    record: &mut IncidentRecord,
    availability: f64,
    reference_date: NaiveDate,
    config: &EngineConfig,
) {
    let windows = &config.windows;
    let critical = config.thresholds.is_critical(availability);

    match record.state {
        IncidentState::None => {
            if critical {
                open_incident(record, reference_date);
            }
        }
        IncidentState::New | IncidentState::Recurrent | IncidentState::Paralyzed => {
            if !critical {
                record.state = IncidentState::Resolved;
                record.resolved_on = Some(reference_date);
                return;
            }
            let elapsed = record
                .incident_start
                .map_or(0, |start| elapsed_days(start, reference_date));
            if record.state == IncidentState::New && elapsed > windows.promote_days {
                record.state = IncidentState::Recurrent;
            }
            if record.state == IncidentState::Recurrent
                && paralysis::should_paralyze(elapsed, availability, config)
            {
                record.state = IncidentState::Paralyzed;
            }
        }
        IncidentState::Resolved => {
            if critical {
                open_incident(record, reference_date);
                return;
            }
            let since = record
                .resolved_on
                .map_or(0, |resolved| elapsed_days(resolved, reference_date));
            if since > windows.monitor_days {
                record.state = IncidentState::None;
                record.incident_start = None;
                record.resolved_on = None;
            }
        }
    }
}

fn open_incident(record: &mut IncidentRecord, reference_date: NaiveDate) {
    record.state = IncidentState::New;
    record.incident_start = Some(reference_date);
    record.resolved_on = None;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StationKey;
    use chrono::Duration;

    /// Fixed reference date used across tests: 2025-11-06.
    fn reference() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 6).unwrap()
    }

    fn days_ago(days: i64) -> NaiveDate {
        reference() - Duration::days(days)
    }

    fn record(state: IncidentState, start: Option<NaiveDate>) -> IncidentRecord {
        IncidentRecord {
            state,
            incident_start: start,
            ..IncidentRecord::fresh(StationKey::new("1", "ALPHA"))
        }
    }

    // --- Opening and promotion ------------------------------------------------

    #[test]
    fn test_critical_station_opens_new_incident() {
        let config = EngineConfig::default();
        let out = advance(&record(IncidentState::None, None), Some(45.0), reference(), &config);
        assert_eq!(out.record.state, IncidentState::New);
        assert_eq!(out.record.incident_start, Some(reference()));
        assert_eq!(out.elapsed_days, Some(0));
        assert!(out.flags.is_empty(), "unexpected flags {:?}", out.flags);
    }

    #[test]
    fn test_threshold_boundary() {
        let config = EngineConfig::default();
        let at = advance(&record(IncidentState::None, None), Some(80.0), reference(), &config);
        assert_eq!(at.record.state, IncidentState::None, "exactly 80% is healthy");
        let below = advance(&record(IncidentState::None, None), Some(79.999), reference(), &config);
        assert_eq!(below.record.state, IncidentState::New, "79.999% is critical");
    }

    #[test]
    fn test_new_stays_new_on_day_5() {
        let config = EngineConfig::default();
        let out = advance(&record(IncidentState::New, Some(days_ago(5))), Some(40.0), reference(), &config);
        assert_eq!(out.record.state, IncidentState::New);
        assert_eq!(out.record.incident_start, Some(days_ago(5)));
    }

    #[test]
    fn test_new_becomes_recurrent_on_day_6() {
        let config = EngineConfig::default();
        let out = advance(&record(IncidentState::New, Some(days_ago(6))), Some(40.0), reference(), &config);
        assert_eq!(out.record.state, IncidentState::Recurrent);
        assert_eq!(out.record.incident_start, Some(days_ago(6)), "start date is retained");
        assert_eq!(out.previous_state, IncidentState::New);
    }

    // --- Resolution and monitoring --------------------------------------------

    #[test]
    fn test_recovered_recurrent_resolves_and_keeps_start_date() {
        let config = EngineConfig::default();
        let out = advance(
            &record(IncidentState::Recurrent, Some(days_ago(40))),
            Some(85.0),
            reference(),
            &config,
        );
        assert_eq!(out.record.state, IncidentState::Resolved);
        assert_eq!(out.record.incident_start, Some(days_ago(40)));
        assert_eq!(out.record.resolved_on, Some(reference()));
        assert_eq!(out.days_since_resolution, Some(0));
    }

    #[test]
    fn test_resolved_clears_after_monitoring_window() {
        let config = EngineConfig::default();
        let start = days_ago(46);
        let resolved = IncidentRecord {
            resolved_on: Some(days_ago(6)),
            ..record(IncidentState::Resolved, Some(start))
        };
        let out = advance(&resolved, Some(90.0), reference(), &config);
        assert_eq!(out.record.state, IncidentState::None);
        assert_eq!(out.record.incident_start, None);
        assert_eq!(out.record.resolved_on, None);
    }

    #[test]
    fn test_resolved_stays_resolved_inside_monitoring_window() {
        let config = EngineConfig::default();
        let resolved = IncidentRecord {
            resolved_on: Some(days_ago(5)),
            ..record(IncidentState::Resolved, Some(days_ago(45)))
        };
        let out = advance(&resolved, Some(90.0), reference(), &config);
        assert_eq!(out.record.state, IncidentState::Resolved);
        assert_eq!(out.days_since_resolution, Some(5));
        assert_eq!(out.record.incident_start, Some(days_ago(45)));
    }

    #[test]
    fn test_relapse_during_monitoring_opens_fresh_incident() {
        let config = EngineConfig::default();
        let resolved = IncidentRecord {
            resolved_on: Some(days_ago(2)),
            ..record(IncidentState::Resolved, Some(days_ago(60)))
        };
        let out = advance(&resolved, Some(10.0), reference(), &config);
        assert_eq!(out.record.state, IncidentState::New);
        assert_eq!(out.record.incident_start, Some(reference()));
        assert_eq!(out.record.resolved_on, None);
    }

    #[test]
    fn test_paralyzed_station_recovers_to_resolved() {
        let config = EngineConfig::default();
        let out = advance(
            &record(IncidentState::Paralyzed, Some(days_ago(300))),
            Some(95.0),
            reference(),
            &config,
        );
        assert_eq!(out.record.state, IncidentState::Resolved);
    }

    #[test]
    fn test_anomalous_availability_is_not_critical() {
        let config = EngineConfig::default();
        let out = advance(
            &record(IncidentState::Recurrent, Some(days_ago(20))),
            Some(105.0),
            reference(),
            &config,
        );
        assert_eq!(out.record.state, IncidentState::Resolved);
    }

    // --- Paralysis ------------------------------------------------------------

    #[test]
    fn test_recurrent_paralyzes_after_window_at_floor() {
        let config = EngineConfig::default();
        let at_boundary = advance(
            &record(IncidentState::Recurrent, Some(days_ago(90))),
            Some(0.5),
            reference(),
            &config,
        );
        assert_eq!(at_boundary.record.state, IncidentState::Recurrent);

        let past = advance(
            &record(IncidentState::Recurrent, Some(days_ago(91))),
            Some(0.3),
            reference(),
            &config,
        );
        assert_eq!(past.record.state, IncidentState::Paralyzed);
        assert_eq!(past.record.incident_start, Some(days_ago(91)), "start date is retained");
    }

    #[test]
    fn test_recurrent_above_floor_stays_recurrent() {
        let config = EngineConfig::default();
        let out = advance(
            &record(IncidentState::Recurrent, Some(days_ago(200))),
            Some(12.0),
            reference(),
            &config,
        );
        assert_eq!(out.record.state, IncidentState::Recurrent);
    }

    #[test]
    fn test_long_new_incident_promotes_and_paralyzes_in_one_period() {
        let config = EngineConfig::default();
        let out = advance(
            &record(IncidentState::New, Some(days_ago(120))),
            Some(0.0),
            reference(),
            &config,
        );
        assert_eq!(out.record.state, IncidentState::Paralyzed);
    }

    #[test]
    fn test_paralyzed_stays_paralyzed_while_critical() {
        let config = EngineConfig::default();
        let out = advance(
            &record(IncidentState::Paralyzed, Some(days_ago(400))),
            Some(40.0),
            reference(),
            &config,
        );
        assert_eq!(out.record.state, IncidentState::Paralyzed);
    }

    // --- Undefined availability -------------------------------------------------

    #[test]
    fn test_undefined_availability_carries_state() {
        let config = EngineConfig::default();
        let stored = IncidentRecord {
            last_availability: Some(30.0),
            ..record(IncidentState::New, Some(days_ago(10)))
        };
        let out = advance(&stored, None, reference(), &config);
        assert_eq!(out.record.state, IncidentState::New, "no promotion without a measurement");
        assert_eq!(out.record.last_availability, Some(30.0));
        assert!(out.flags.contains(&QualityFlag::UndefinedAvailability));
    }

    // --- Reconciliation ---------------------------------------------------------

    #[test]
    fn test_open_state_without_start_date_is_corrected() {
        let config = EngineConfig::default();
        let out = advance(&record(IncidentState::Recurrent, None), Some(20.0), reference(), &config);
        assert_eq!(out.record.incident_start, Some(reference()));
        assert!(out.flags.contains(&QualityFlag::StateCorrected));
        assert_eq!(out.corrections.len(), 1);
    }

    #[test]
    fn test_young_paralyzed_record_is_demoted() {
        let config = EngineConfig::default();
        let out = advance(
            &record(IncidentState::Paralyzed, Some(days_ago(20))),
            Some(0.0),
            reference(),
            &config,
        );
        assert_eq!(out.record.state, IncidentState::Recurrent);
        assert!(out.flags.contains(&QualityFlag::StateCorrected));

        let out = advance(
            &record(IncidentState::Paralyzed, Some(days_ago(3))),
            Some(0.0),
            reference(),
            &config,
        );
        assert_eq!(out.record.state, IncidentState::New);
    }

    #[test]
    fn test_none_with_start_date_is_cleared() {
        let config = EngineConfig::default();
        let out = advance(
            &record(IncidentState::None, Some(days_ago(12))),
            Some(95.0),
            reference(),
            &config,
        );
        assert_eq!(out.record.state, IncidentState::None);
        assert_eq!(out.record.incident_start, None);
        assert!(out.flags.contains(&QualityFlag::StateCorrected));
    }

    #[test]
    fn test_future_start_date_counts_as_day_zero() {
        let config = EngineConfig::default();
        let future = reference() + Duration::days(10);
        let out = advance(&record(IncidentState::New, Some(future)), Some(50.0), reference(), &config);
        assert_eq!(out.elapsed_days, Some(0));
        assert_eq!(out.record.incident_start, Some(reference()));
        assert!(out.flags.contains(&QualityFlag::InvalidIncidentDate));
    }

    #[test]
    fn test_legacy_resolved_record_starts_monitoring_today() {
        let config = EngineConfig::default();
        let out = advance(
            &record(IncidentState::Resolved, Some(days_ago(50))),
            Some(90.0),
            reference(),
            &config,
        );
        assert_eq!(out.record.state, IncidentState::Resolved);
        assert_eq!(out.record.resolved_on, Some(reference()));
        assert!(out.flags.contains(&QualityFlag::StateCorrected));
    }

    #[test]
    fn test_comment_is_carried_verbatim() {
        let config = EngineConfig::default();
        let stored = IncidentRecord {
            comment: Some("  cable cut; crew dispatched  ".to_string()),
            ..record(IncidentState::New, Some(days_ago(2)))
        };
        for availability in [Some(10.0), Some(95.0), None] {
            let out = advance(&stored, availability, reference(), &config);
            assert_eq!(out.record.comment, stored.comment);
        }
    }

    #[test]
    fn test_advance_is_deterministic() {
        let config = EngineConfig::default();
        let stored = record(IncidentState::Recurrent, Some(days_ago(33)));
        let first = advance(&stored, Some(22.0), reference(), &config);
        let second = advance(&stored, Some(22.0), reference(), &config);
        assert_eq!(first, second);
    }
}
