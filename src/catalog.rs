/// Sensor catalog for the availability service.
///
/// Maps every measured variable to the sensor type (equipment group) it
/// belongs to, which is how variable availabilities roll up into equipment
/// availabilities. The built-in registry below covers the variables the
/// network's loggers export; deployments extend it with `[[sensor]]` tables
/// and pin individual stations with `[[sensor_override]]` tables in the
/// engine configuration. The catalog is built once and never mutated.

use crate::config::EngineConfig;
use crate::model::StationKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Label used for variables no mapping covers.
pub const UNCLASSIFIED_SENSOR: &str = "UNCLASSIFIED";

// ---------------------------------------------------------------------------
// Sensor metadata
// ---------------------------------------------------------------------------

/// Whether a variable is read directly from the instrument or derived by the
/// logger (daily maxima, accumulations, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableKind {
    Observed,
    Calculated,
}

/// One sensor type of the built-in registry.
pub struct SensorGroup {
    /// Sensor-type identifier used in equipment reports.
    pub name: &'static str,
    pub description: &'static str,
    pub observed: &'static [&'static str],
    pub calculated: &'static [&'static str],
}

/// Built-in sensor registry, one entry per instrument family.
pub static SENSOR_REGISTRY: &[SensorGroup] = &[
    SensorGroup {
        name: "s_temp",
        description: "Air temperature",
        observed: &[
            "N_AIRTEMP_INST", "N_AIRTEMP", "N_AIRTEMP_00M", "N_AIRTEMP_10M", "N_AIRTEMP_20M",
            "N_AIRTEMP_30M", "N_AIRTEMP_40M", "N_AIRTEMP_50M", "N_AIRTEMP_60M",
        ],
        calculated: &["N_MAXAT", "N_MINAT", "N_MAXATH", "N_MINATH"],
    },
    SensorGroup {
        name: "s_humre",
        description: "Relative humidity",
        observed: &["N_HUMEDAD", "N_HUMEDAD_INST"],
        calculated: &["N_MAXRH", "N_MINRH", "N_MAXRHH", "N_MINRHH", "N_PTO_ROCIO"],
    },
    SensorGroup {
        name: "s_prec",
        description: "Precipitation",
        observed: &[
            "N_LLUVIA", "N_INT_LLUVIA", "N_INT_2_LLUVIA", "N_LLUVIA_2", "N_RAIN_10M",
            "N_RAIN_2_10M", "N_RAIN_00M", "N_RAIN_20M", "N_RAIN_30M", "N_RAIN_40M", "N_RAIN_50M",
        ],
        calculated: &["N_DAYRAIN", "N_DAYRAIN_2"],
    },
    SensorGroup {
        name: "s_dir_viento",
        description: "Wind direction",
        observed: &[
            "N_DIRVIENTO", "N_DIRVIENTO_INST", "N_DIRVIENTO_02M", "N_DIRRACHA", "N_DIRRACHA_H",
        ],
        calculated: &[
            "N_MAXDIRVIENTO", "N_MAXDIRVIENTO_D", "N_MAXDIRVIENTO_H", "N_MAXDIRVIENTO_02M",
            "N_DEVSTDH",
        ],
    },
    SensorGroup {
        name: "s_vel_viento",
        description: "Wind speed",
        observed: &["N_VELVIENTO", "N_VELVIENTO_INST", "N_VELVIENTO_02M", "N_RACHA", "N_RACHAH"],
        calculated: &[
            "N_MAXVELVIENTO", "N_MAXVELVIENTO_H", "N_MAXVELVIENTO_D", "N_MAXVELVIENTO_02M",
        ],
    },
    SensorGroup {
        name: "s_presion",
        description: "Atmospheric pressure",
        observed: &["N_PRESATM", "N_PRESATM_INST"],
        calculated: &["N_MAXPRESATMH", "N_MINPRESATMH", "N_MAXPRESATMD", "N_MINPRESATMD"],
    },
    SensorGroup {
        name: "s_rad_solar",
        description: "Solar radiation",
        observed: &["N_RADSOLAR", "N_RADSOLAR_INST", "N_RADSOLARHR"],
        calculated: &[
            "N_RADSOLAR_TOT", "N_RADSOLAR_TOT_NET", "N_ENERSOLAR24H", "N_ENERSOL_ACU1H",
            "N_ENERSOLAR1H", "N_HS101",
        ],
    },
    SensorGroup {
        name: "s_rad_uv",
        description: "Ultraviolet radiation",
        observed: &[
            "N_IND_UV", "N_RAUV_A_INST", "N_RAUV_A_PROM", "N_RAUV_BE_INST", "N_RAUV_BE_PROM",
        ],
        calculated: &[],
    },
    SensorGroup {
        name: "s_nivel",
        description: "Water level",
        observed: &[
            "N_NIVELAGUA", "N_NIVELMEDIO", "N_NIV_INST_10", "N_NIV_INST_20", "N_NIV_INST_30",
            "N_NIV_INST_40", "N_NIV_INST_50", "N_NIVEL_INST_H", "N_NIVMEDH", "N_NIVELAGUA_10M",
            "N_NIV_INST_00", "N_NIVEL_INST_RADAR", "N_NIVELAGUAH", "N_VEL_AGUA_10M",
        ],
        calculated: &["N_MAXNIVEL", "N_MINNIVEL", "N_MAXNIVELH", "N_MINNIVELH"],
    },
    SensorGroup {
        name: "s_humhoja",
        description: "Leaf wetness",
        observed: &["N_HOJAHUMED"],
        calculated: &[],
    },
    SensorGroup {
        name: "s_humsuelo",
        description: "Soil moisture",
        observed: &["N_SUELOHUMED"],
        calculated: &[],
    },
    SensorGroup {
        name: "s_temsuelo",
        description: "Soil temperature",
        observed: &["N_SOILTEMP", "N_SOILTEMP_INST"],
        calculated: &[],
    },
    SensorGroup {
        name: "s_radiometrico",
        description: "Radiometric profiler",
        observed: &[
            "N_RS003", "N_RS004", "N_RS005", "N_RS006", "N_RS007", "N_RS008", "N_RS009",
            "N_RS010", "N_RS011", "N_RS012", "N_RS013", "N_TM014",
        ],
        calculated: &[],
    },
    SensorGroup {
        name: "s_nieve",
        description: "Snow",
        observed: &["N_PT003", "N_PT004", "N_PT005", "N_PT006"],
        calculated: &[],
    },
    SensorGroup {
        name: "s_evapo",
        description: "Evaporation",
        observed: &["N_EVAPO_HORARIA", "N_EVAPO_INST_H"],
        calculated: &["N_MAXEVAPOH", "N_MINEVAPOH"],
    },
    SensorGroup {
        name: "s_cal_agua",
        description: "Water quality",
        observed: &["N_COND", "N_OXIGENO", "N_PHH", "N_TURBH", "N_WTEMP", "N_COND_INST"],
        calculated: &[],
    },
    SensorGroup {
        name: "s_temp_ifr",
        description: "Infrared surface temperature",
        observed: &["N_TEMP_IR_SUPERF_HIELO", "N_TEMP_NETRAD_K", "N_TEMP_TERMIS_SENSOR_IR"],
        calculated: &["N_TEMP_IR_SUPERF_HIELO_MAX", "N_TEMP_IR_SUPERF_HIELO_MIN"],
    },
    SensorGroup {
        name: "s_ref_sue",
        description: "Soil reflectometry",
        observed: &["N_VOLAG_INST_H", "N_VOLAG_PROM"],
        calculated: &[],
    },
    SensorGroup {
        name: "s_caudal",
        description: "Streamflow",
        observed: &["N_CAUDAL", "N_CAUDAL_10M"],
        calculated: &["N_CAUDAL_D", "N_CAUDAL_MAX_D", "N_CAUDAL_MIN_D"],
    },
];

// ---------------------------------------------------------------------------
// Configuration tables
// ---------------------------------------------------------------------------

/// `[[sensor]]` table: adds a sensor type or extends an existing one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorGroupConfig {
    pub name: String,
    #[serde(default)]
    pub observed: Vec<String>,
    #[serde(default)]
    pub calculated: Vec<String>,
}

/// `[[sensor_override]]` table: pins the sensor type of one variable at one
/// station, for sites wired differently from the rest of the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorOverrideConfig {
    pub zone: String,
    pub station: String,
    pub variable: String,
    pub sensor: String,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

fn normalize_variable(variable: &str) -> String {
    variable.trim().to_uppercase()
}

/// Immutable variable → sensor-type lookup.
#[derive(Debug, Clone, Default)]
pub struct SensorCatalog {
    by_variable: HashMap<String, (String, VariableKind)>,
    overrides: HashMap<(StationKey, String), String>,
}

impl SensorCatalog {
    /// Catalog holding only the built-in registry.
    pub fn builtin() -> Self {
        let mut catalog = SensorCatalog::default();
        for group in SENSOR_REGISTRY {
            for variable in group.observed {
                catalog.insert(group.name, variable, VariableKind::Observed);
            }
            for variable in group.calculated {
                catalog.insert(group.name, variable, VariableKind::Calculated);
            }
        }
        catalog
    }

    /// Built-in registry extended by the configuration's sensor tables.
    /// Configured entries win over built-in ones for the same variable.
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut catalog = SensorCatalog::builtin();
        for group in &config.sensors {
            for variable in &group.observed {
                catalog.insert(&group.name, variable, VariableKind::Observed);
            }
            for variable in &group.calculated {
                catalog.insert(&group.name, variable, VariableKind::Calculated);
            }
        }
        for o in &config.sensor_overrides {
            catalog.overrides.insert(
                (StationKey::new(&o.zone, &o.station), normalize_variable(&o.variable)),
                o.sensor.trim().to_string(),
            );
        }
        catalog
    }

    fn insert(&mut self, sensor: &str, variable: &str, kind: VariableKind) {
        self.by_variable.insert(
            normalize_variable(variable),
            (sensor.trim().to_string(), kind),
        );
    }

    /// Sensor type of a variable at a station: station override first, then
    /// the catalog. Returns `None` when neither knows the variable.
    pub fn sensor_for(&self, key: &StationKey, variable: &str) -> Option<&str> {
        let variable = normalize_variable(variable);
        if let Some(sensor) = self.overrides.get(&(key.clone(), variable.clone())) {
            return Some(sensor.as_str());
        }
        self.by_variable.get(&variable).map(|(sensor, _)| sensor.as_str())
    }

    pub fn variable_kind(&self, variable: &str) -> Option<VariableKind> {
        self.by_variable
            .get(&normalize_variable(variable))
            .map(|(_, kind)| *kind)
    }

    /// Distinct sensor types, sorted.
    pub fn sensor_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .by_variable
            .values()
            .map(|(sensor, _)| sensor.as_str())
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Number of mapped variables.
    pub fn len(&self) -> usize {
        self.by_variable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_variable.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_variable_belongs_to_two_builtin_sensors() {
        // A variable listed twice would silently move between equipment
        // groups depending on registry order.
        let mut seen = std::collections::HashMap::new();
        for group in SENSOR_REGISTRY {
            for variable in group.observed.iter().chain(group.calculated.iter()) {
                if let Some(previous) = seen.insert(*variable, group.name) {
                    panic!(
                        "variable '{}' is listed under both '{}' and '{}'",
                        variable, previous, group.name
                    );
                }
            }
        }
    }

    #[test]
    fn test_no_duplicate_sensor_names() {
        let mut seen = std::collections::HashSet::new();
        for group in SENSOR_REGISTRY {
            assert!(seen.insert(group.name), "duplicate sensor '{}'", group.name);
        }
    }

    #[test]
    fn test_every_sensor_has_an_observed_variable() {
        for group in SENSOR_REGISTRY {
            assert!(
                !group.observed.is_empty(),
                "sensor '{}' must have at least one observed variable",
                group.name
            );
        }
    }

    #[test]
    fn test_builtin_lookup_is_case_insensitive() {
        let catalog = SensorCatalog::builtin();
        let key = StationKey::new("1", "ALPHA");
        assert_eq!(catalog.sensor_for(&key, "N_AIRTEMP"), Some("s_temp"));
        assert_eq!(catalog.sensor_for(&key, "n_maxrh"), Some("s_humre"));
        assert_eq!(catalog.sensor_for(&key, "N_UNKNOWN"), None);
    }

    #[test]
    fn test_variable_kind() {
        let catalog = SensorCatalog::builtin();
        assert_eq!(catalog.variable_kind("N_LLUVIA"), Some(VariableKind::Observed));
        assert_eq!(catalog.variable_kind("N_DAYRAIN"), Some(VariableKind::Calculated));
        assert_eq!(catalog.variable_kind("N_UNKNOWN"), None);
    }

    #[test]
    fn test_housekeeping_variables_are_not_catalogued() {
        let catalog = SensorCatalog::builtin();
        let key = StationKey::new("1", "ALPHA");
        assert_eq!(catalog.sensor_for(&key, "N_BATERIA"), None);
        assert_eq!(catalog.sensor_for(&key, "N_TEMP_INT_TRANS"), None);
    }

    #[test]
    fn test_configured_groups_extend_and_override_builtin() {
        let mut config = EngineConfig::default();
        config.sensors.push(SensorGroupConfig {
            name: "s_visibility".to_string(),
            observed: vec!["N_VISIB".to_string()],
            calculated: vec![],
        });
        config.sensors.push(SensorGroupConfig {
            name: "s_level_radar".to_string(),
            observed: vec!["N_NIVEL_INST_RADAR".to_string()],
            calculated: vec![],
        });
        let catalog = SensorCatalog::from_config(&config);
        let key = StationKey::new("1", "ALPHA");
        assert_eq!(catalog.sensor_for(&key, "N_VISIB"), Some("s_visibility"));
        assert_eq!(catalog.sensor_for(&key, "N_NIVEL_INST_RADAR"), Some("s_level_radar"));
        assert_eq!(catalog.sensor_for(&key, "N_NIVELAGUA"), Some("s_nivel"));
    }

    #[test]
    fn test_station_override_only_applies_to_that_station() {
        let mut config = EngineConfig::default();
        config.sensor_overrides.push(SensorOverrideConfig {
            zone: "5".to_string(),
            station: "ALPHA".to_string(),
            variable: "n_nivelagua".to_string(),
            sensor: "s_caudal".to_string(),
        });
        let catalog = SensorCatalog::from_config(&config);
        assert_eq!(
            catalog.sensor_for(&StationKey::new("5", "ALPHA"), "N_NIVELAGUA"),
            Some("s_caudal")
        );
        assert_eq!(
            catalog.sensor_for(&StationKey::new("5", "BRAVO"), "N_NIVELAGUA"),
            Some("s_nivel")
        );
    }

    #[test]
    fn test_sensor_names_are_sorted_and_distinct() {
        let catalog = SensorCatalog::builtin();
        let names = catalog.sensor_names();
        assert_eq!(names.len(), SENSOR_REGISTRY.len());
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
    }
}
