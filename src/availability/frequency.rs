/// Frequency resolution.
///
/// The source exports report an expected sample count per variable, but
/// that count is sometimes computed from a stale or wrong cadence. The
/// frequency reference table records the true cadence of each
/// (zone, station, variable) and is authoritative whenever it has an entry.

use crate::model::{FrequencyClass, StationKey};
use std::collections::HashMap;

/// One row of the frequency reference table.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyEntry {
    pub key: StationKey,
    pub variable: String,
    pub frequency: FrequencyClass,
}

/// Immutable (zone, station, variable) → cadence lookup.
#[derive(Debug, Clone, Default)]
pub struct FrequencyResolver {
    table: HashMap<(StationKey, String), FrequencyClass>,
}

impl FrequencyResolver {
    /// Builds the lookup. A later entry for the same triple replaces an
    /// earlier one.
    pub fn new<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = FrequencyEntry>,
    {
        let table = entries
            .into_iter()
            .map(|e| ((e.key, e.variable.trim().to_uppercase()), e.frequency))
            .collect();
        FrequencyResolver { table }
    }

    pub fn resolve(&self, key: &StationKey, variable: &str) -> Option<FrequencyClass> {
        self.table
            .get(&(key.clone(), variable.trim().to_uppercase()))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Samples a variable of the given cadence should deliver over the period.
pub fn expected_samples(frequency: FrequencyClass, period_days: u32) -> u64 {
    frequency.samples_per_day() * u64::from(period_days)
}
