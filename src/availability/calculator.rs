/// Availability calculation.
///
/// Converts raw correct/expected sample counts into percentages at three
/// levels. Variable availability is `correct / expected * 100`, where the
/// expected count comes from the frequency reference table whenever it has
/// an entry. Equipment and station availability are the plain arithmetic
/// mean of the included variable availabilities: every variable weighs the
/// same regardless of how many samples it should deliver.
///
/// Values are never rounded or clamped here. Variables with an undefined
/// availability (zero expected samples) are reported but left out of the
/// means.

use crate::availability::frequency::{expected_samples, FrequencyResolver};
use crate::catalog::{SensorCatalog, UNCLASSIFIED_SENSOR};
use crate::config::EngineConfig;
use crate::logging::{self, Stage};
use crate::model::{
    EquipmentMetric, FrequencyClass, QualityFlag, QualityFlags, RawVariableRow, StationKey,
    StationMetric, VariableMetric,
};
use std::collections::BTreeMap;

/// Output of one calculation pass, every list in deterministic order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AvailabilityReport {
    /// Sorted by station, sensor, variable.
    pub variables: Vec<VariableMetric>,
    /// Sorted by station, sensor.
    pub equipment: Vec<EquipmentMetric>,
    /// Sorted by station.
    pub stations: Vec<StationMetric>,
    /// Rows dropped because they carry housekeeping variables.
    pub housekeeping_rows: usize,
}

/// Percentage of expected samples that arrived correct. `None` when nothing
/// was expected.
pub fn availability_pct(correct: u64, expected: u64) -> Option<f64> {
    if expected == 0 {
        return None;
    }
    Some(correct as f64 / expected as f64 * 100.0)
}

/// Unweighted mean of the defined values. `None` if there are none.
pub fn mean_availability<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let (sum, count) = values
        .into_iter()
        .flatten()
        .fold((0.0_f64, 0_usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

pub struct AvailabilityCalculator<'a> {
    config: &'a EngineConfig,
    resolver: &'a FrequencyResolver,
    catalog: &'a SensorCatalog,
}

impl<'a> AvailabilityCalculator<'a> {
    pub fn new(
        config: &'a EngineConfig,
        resolver: &'a FrequencyResolver,
        catalog: &'a SensorCatalog,
    ) -> Self {
        AvailabilityCalculator {
            config,
            resolver,
            catalog,
        }
    }

    /// Computes the metric of a single variable row.
    pub fn variable_metric(&self, row: &RawVariableRow) -> VariableMetric {
        let settings = &self.config.calculation;
        let thresholds = &self.config.thresholds;
        let mut flags = QualityFlags::new();

        let correct = if settings.discount_leading_sample && row.correct_count > 1 {
            row.correct_count - 1
        } else {
            row.correct_count
        };

        let resolved = self.resolver.resolve(&row.key, &row.variable);
        let expected = match resolved {
            Some(frequency) => expected_samples(frequency, settings.period_days),
            None => {
                flags.insert(QualityFlag::FrequencyFallback);
                logging::debug(
                    Stage::Calculator,
                    Some(&row.key.to_string()),
                    &format!(
                        "no frequency mapping for {}; using reported expected count {:?}",
                        row.variable, row.reported_expected
                    ),
                );
                row.reported_expected.unwrap_or(0)
            }
        };
        let frequency = resolved.or_else(|| {
            row.frequency_label
                .as_deref()
                .and_then(FrequencyClass::from_label)
        });

        let sensor = match self.catalog.sensor_for(&row.key, &row.variable) {
            Some(sensor) => sensor.to_string(),
            None => match row.sensor.as_deref().map(str::trim) {
                Some(label) if !label.is_empty() => label.to_string(),
                _ => {
                    flags.insert(QualityFlag::UnclassifiedVariable);
                    UNCLASSIFIED_SENSOR.to_string()
                }
            },
        };

        let availability = availability_pct(correct, expected);
        match availability {
            None => {
                flags.insert(QualityFlag::UndefinedAvailability);
            }
            Some(a) if thresholds.is_anomalous(a) => {
                flags.insert(QualityFlag::AnomalousAvailability);
            }
            Some(_) => {}
        }

        let received = correct.saturating_add(row.error_count);
        let lost = i64::try_from(expected)
            .unwrap_or(i64::MAX)
            .saturating_sub(i64::try_from(received).unwrap_or(i64::MAX));
        let loss_pct = if expected > 0 {
            lost as f64 / expected as f64 * 100.0
        } else {
            0.0
        };
        let error_pct = if received > 0 {
            row.error_count as f64 / received as f64 * 100.0
        } else {
            0.0
        };

        VariableMetric {
            key: row.key.clone(),
            sensor,
            variable: row.variable.trim().to_string(),
            frequency,
            correct_count: correct,
            error_count: row.error_count,
            expected_count: expected,
            reported_expected_count: row.reported_expected,
            availability,
            band: thresholds.band_for(availability),
            received,
            lost,
            loss_pct,
            error_pct,
            flags,
        }
    }

    /// Runs the calculation over a whole period's rows.
    pub fn compute(&self, rows: &[RawVariableRow]) -> AvailabilityReport {
        let settings = &self.config.calculation;

        let mut housekeeping_rows = 0;
        let mut variables: Vec<VariableMetric> = Vec::with_capacity(rows.len());
        for row in rows {
            if settings.is_housekeeping(&row.variable) {
                housekeeping_rows += 1;
                continue;
            }
            variables.push(self.variable_metric(row));
        }
        variables.sort_by(|a, b| {
            (&a.key, &a.sensor, &a.variable).cmp(&(&b.key, &b.sensor, &b.variable))
        });

        let mut by_equipment: BTreeMap<(&StationKey, &str), Vec<&VariableMetric>> = BTreeMap::new();
        let mut by_station: BTreeMap<&StationKey, Vec<&VariableMetric>> = BTreeMap::new();
        for metric in &variables {
            by_equipment
                .entry((&metric.key, metric.sensor.as_str()))
                .or_default()
                .push(metric);
            by_station.entry(&metric.key).or_default().push(metric);
        }

        let equipment = by_equipment
            .into_iter()
            .map(|((key, sensor), members)| {
                let (availability, included, flags) = self.aggregate(&members);
                EquipmentMetric {
                    key: key.clone(),
                    sensor: sensor.to_string(),
                    availability,
                    band: self.config.thresholds.band_for(availability),
                    variables_included: included,
                    variables_total: members.len(),
                    flags,
                }
            })
            .collect();

        let stations: Vec<StationMetric> = by_station
            .into_iter()
            .map(|(key, members)| {
                let (availability, included, flags) = self.aggregate(&members);
                StationMetric {
                    key: key.clone(),
                    availability,
                    band: self.config.thresholds.band_for(availability),
                    variables_included: included,
                    variables_total: members.len(),
                    flags,
                }
            })
            .collect();

        logging::info(
            Stage::Calculator,
            None,
            &format!(
                "{} variables, {} stations ({} housekeeping rows excluded)",
                variables.len(),
                stations.len(),
                housekeeping_rows
            ),
        );

        AvailabilityReport {
            variables,
            equipment,
            stations,
            housekeeping_rows,
        }
    }

    /// Mean of a group plus the flags the group inherits from its members.
    fn aggregate(&self, members: &[&VariableMetric]) -> (Option<f64>, usize, QualityFlags) {
        let availability = mean_availability(members.iter().map(|m| m.availability));
        let included = members.iter().filter(|m| m.availability.is_some()).count();

        let mut flags = QualityFlags::new();
        for inherited in [QualityFlag::FrequencyFallback, QualityFlag::UnclassifiedVariable] {
            if members.iter().any(|m| m.flags.contains(&inherited)) {
                flags.insert(inherited);
            }
        }
        match availability {
            None => {
                flags.insert(QualityFlag::UndefinedAvailability);
            }
            Some(a) if self.config.thresholds.is_anomalous(a) => {
                flags.insert(QualityFlag::AnomalousAvailability);
            }
            Some(_) => {}
        }
        (availability, included, flags)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
