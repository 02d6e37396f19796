/// Paralysis and closure detection.
///
/// A station whose incident has run for months with essentially no data is
/// treated as abandoned rather than merely failing: its incident becomes
/// PARALYZED and drops to LOW priority so it stops crowding out fixable
/// faults. After long enough it is also annotated as a closure candidate for
/// administrative review. Closure candidacy is an annotation only; it never
/// changes the incident state.
///
/// # Boundaries
/// Both day comparisons are strict, the availability floor is inclusive:
///   elapsed > paralysis_days AND availability <= paralysis_floor  →  paralyzed
///   elapsed > closure_days                                         →  closure candidate
/// so 90 days at 0.5% is not yet paralyzed and 730 days is not yet a
/// closure candidate.

use crate::config::EngineConfig;
use crate::model::IncidentState;

const DAYS_PER_YEAR: i64 = 365;

/// Whether a long-running incident has gone dormant enough to be PARALYZED.
pub fn should_paralyze(elapsed_days: i64, availability: f64, config: &EngineConfig) -> bool {
    elapsed_days > config.windows.paralysis_days
        && availability <= config.thresholds.paralysis_floor
}

/// Whether a settled record should be flagged for closure review.
/// Only PARALYZED stations qualify.
pub fn is_closure_candidate(
    state: IncidentState,
    elapsed_days: Option<i64>,
    config: &EngineConfig,
) -> bool {
    state == IncidentState::Paralyzed
        && elapsed_days.is_some_and(|days| days > config.windows.closure_days)
}

/// Whole years an incident has been open, as shown in closure annotations.
pub fn years_open(elapsed_days: i64) -> i64 {
    elapsed_days.max(0) / DAYS_PER_YEAR
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
