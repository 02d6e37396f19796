/// Priority classification.
///
/// Maps a settled incident (state, elapsed days, availability) to the tier
/// operators triage by, plus a generated reason. Rules are checked in order
/// and the first match wins:
///
/// | # | Condition                                   | Tier          | Trigger                 |
/// |---|---------------------------------------------|---------------|-------------------------|
/// | 1 | availability > anomaly threshold            | INFORMATIONAL | anomalous-availability  |
/// | 2 | PARALYZED                                   | LOW           | paralyzed               |
/// | 3 | availability undefined                      | INFORMATIONAL | undefined-availability  |
/// | 4 | NEW/RECURRENT, critical, elapsed <= 30      | HIGH          | critical-availability   |
/// | 5 | NEW/RECURRENT, critical, elapsed > 30       | MEDIUM        | persistent-incident     |
/// | 6 | RESOLVED within the monitoring window       | MEDIUM        | post-fix-monitoring     |
/// | 7 | anything else                               | INFORMATIONAL | operational             |
///
/// The reason is never stored; it is regenerated every period.

use crate::config::EngineConfig;
use crate::incident::paralysis;
use crate::model::{IncidentState, PriorityTier};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Condition that decided a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriorityTrigger {
    CriticalAvailability,
    PersistentIncident,
    PostFixMonitoring,
    Paralyzed,
    AnomalousAvailability,
    UndefinedAvailability,
    Operational,
}

impl PriorityTrigger {
    pub fn name(self) -> &'static str {
        match self {
            PriorityTrigger::CriticalAvailability => "critical-availability",
            PriorityTrigger::PersistentIncident => "persistent-incident",
            PriorityTrigger::PostFixMonitoring => "post-fix-monitoring",
            PriorityTrigger::Paralyzed => "paralyzed",
            PriorityTrigger::AnomalousAvailability => "anomalous-availability",
            PriorityTrigger::UndefinedAvailability => "undefined-availability",
            PriorityTrigger::Operational => "operational",
        }
    }
}

impl fmt::Display for PriorityTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Inputs of the classifier for one station.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorityInput {
    pub state: IncidentState,
    /// Days since the incident started; `None` when there is no start date.
    pub elapsed_days: Option<i64>,
    pub availability: Option<f64>,
    /// Days since resolution for RESOLVED records.
    pub days_since_resolution: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub tier: PriorityTier,
    pub trigger: PriorityTrigger,
    pub closure_candidate: bool,
    pub reason: String,
}

/// Classifies one station. Pure: same input, same output.
pub fn classify(input: &PriorityInput, config: &EngineConfig) -> Classification {
    let (tier, trigger) = tier_for(input, config);
    let closure_candidate =
        paralysis::is_closure_candidate(input.state, input.elapsed_days, config);
    let reason = reason_for(input, trigger, closure_candidate, config);
    Classification {
        tier,
        trigger,
        closure_candidate,
        reason,
    }
}

fn tier_for(input: &PriorityInput, config: &EngineConfig) -> (PriorityTier, PriorityTrigger) {
    let thresholds = &config.thresholds;
    let windows = &config.windows;

    if input.availability.is_some_and(|a| thresholds.is_anomalous(a)) {
        return (PriorityTier::Informational, PriorityTrigger::AnomalousAvailability);
    }
    if input.state == IncidentState::Paralyzed {
        return (PriorityTier::Low, PriorityTrigger::Paralyzed);
    }
    let Some(availability) = input.availability else {
        return (PriorityTier::Informational, PriorityTrigger::UndefinedAvailability);
    };

    match input.state {
        IncidentState::New | IncidentState::Recurrent if thresholds.is_critical(availability) => {
            if input.elapsed_days.unwrap_or(0) <= windows.high_priority_max_days {
                (PriorityTier::High, PriorityTrigger::CriticalAvailability)
            } else {
                (PriorityTier::Medium, PriorityTrigger::PersistentIncident)
            }
        }
        IncidentState::Resolved
            if input.days_since_resolution.unwrap_or(0) <= windows.monitor_days =>
        {
            (PriorityTier::Medium, PriorityTrigger::PostFixMonitoring)
        }
        _ => (PriorityTier::Informational, PriorityTrigger::Operational),
    }
}

fn reason_for(
    input: &PriorityInput,
    trigger: PriorityTrigger,
    closure_candidate: bool,
    config: &EngineConfig,
) -> String {
    let elapsed = input.elapsed_days.unwrap_or(0);
    let availability = match input.availability {
        Some(a) => format!("{:.2}%", a),
        None => "undefined".to_string(),
    };
    let critical = config.thresholds.critical;

    let detail = match trigger {
        PriorityTrigger::CriticalAvailability => {
            format!("{} incident below {}%", input.state, critical)
        }
        PriorityTrigger::PersistentIncident => format!(
            "{} incident below {}% for more than {} days",
            input.state, critical, config.windows.high_priority_max_days
        ),
        PriorityTrigger::PostFixMonitoring => format!(
            "resolved {} days ago, monitored for {} days",
            input.days_since_resolution.unwrap_or(0),
            config.windows.monitor_days
        ),
        PriorityTrigger::Paralyzed => format!(
            "no meaningful data for more than {} days",
            config.windows.paralysis_days
        ),
        PriorityTrigger::AnomalousAvailability => format!(
            "above {}%; check expected counts",
            config.thresholds.anomaly
        ),
        PriorityTrigger::UndefinedAvailability => {
            format!("no expected samples; state {} carried", input.state)
        }
        PriorityTrigger::Operational => format!("state {}", input.state),
    };

    let mut reason = format!(
        "{}: {}; {} days elapsed; availability {}",
        trigger, detail, elapsed, availability
    );
    if closure_candidate {
        reason.push_str(&format!(
            "; closure candidate ({} years)",
            paralysis::years_open(elapsed)
        ));
    }
    reason
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
