/// Tabular boundary adapter.
///
/// Reads the three CSV inputs of a run (current-period metrics, frequency
/// reference table, previous incident snapshot) into typed records, and
/// writes the next snapshot back out in a form this module reads again.
///
/// Source exports are produced by upstream extraction steps and are loose
/// about headers, so columns are matched by alias after trimming,
/// lowercasing, folding accents and turning spaces into underscores
/// (`"Estación"`, `"ESTACION"` and `"estacion"` are the same column).
///
/// A row missing its zone or station is rejected and reported; every other
/// defect degrades to a default value plus a quality flag or a log line.
/// Only a table missing a required column fails as a whole.

use crate::availability::FrequencyEntry;
use crate::config::EngineConfig;
use crate::logging::{self, Stage};
use crate::model::{
    FrequencyClass, IncidentRecord, IncidentState, IngestError, QualityFlag, QualityFlags,
    RawVariableRow, RowRejection, SnapshotEntry, StationKey,
};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

const METRICS_TABLE: &str = "metrics";
const FREQUENCY_TABLE: &str = "frequencies";
const SNAPSHOT_TABLE: &str = "snapshot";

/// Date formats tried after the configured one.
const FALLBACK_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"];

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Column {
    Zone,
    Station,
    Sensor,
    Variable,
    Frequency,
    Correct,
    Error,
    Expected,
    IncidentStart,
    State,
    Comment,
    Availability,
    ResolvedOn,
}

impl Column {
    const ALL: [Column; 13] = [
        Column::Zone,
        Column::Station,
        Column::Sensor,
        Column::Variable,
        Column::Frequency,
        Column::Correct,
        Column::Error,
        Column::Expected,
        Column::IncidentStart,
        Column::State,
        Column::Comment,
        Column::Availability,
        Column::ResolvedOn,
    ];

    /// Canonical name, used in snapshot output and error messages.
    fn name(self) -> &'static str {
        match self {
            Column::Zone => "zone",
            Column::Station => "station",
            Column::Sensor => "sensor",
            Column::Variable => "variable",
            Column::Frequency => "frequency",
            Column::Correct => "correct",
            Column::Error => "error",
            Column::Expected => "expected",
            Column::IncidentStart => "incident_start_date",
            Column::State => "state",
            Column::Comment => "comment",
            Column::Availability => "availability",
            Column::ResolvedOn => "resolved_on",
        }
    }

    /// Normalized header spellings accepted for this column.
    fn aliases(self) -> &'static [&'static str] {
        match self {
            Column::Zone => &["zone", "dz", "zona"],
            Column::Station => &["station", "estacion", "nombre_estacion"],
            Column::Sensor => &["sensor", "equipment", "equipamiento", "equipo"],
            Column::Variable => &["variable", "var"],
            Column::Frequency => &["frequency", "frecuencia", "freq"],
            Column::Correct => &["correct", "correct_count", "datos_flag_c", "flag_c"],
            Column::Error => &["error", "error_count", "datos_flag_m", "flag_m"],
            Column::Expected => &["expected", "expected_count", "datos_esperados"],
            Column::IncidentStart => &[
                "incident_start_date",
                "incident_start",
                "f_inci",
                "fecha_incidencia",
            ],
            Column::State => &["state", "incident_state", "estado_inci", "estado"],
            Column::Comment => &["comment", "comentario", "comentarios"],
            Column::Availability => &[
                "availability",
                "last_availability",
                "disponibilidad",
                "disponibilidad_estacion",
                "disponibilidad_promedio",
            ],
            Column::ResolvedOn => &["resolved_on", "f_resolucion", "fecha_resolucion"],
        }
    }
}

/// Trims, lowercases, folds accents and joins words with underscores.
pub fn normalize_header(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('\u{feff}')
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' => 'a',
            'é' | 'è' | 'ë' => 'e',
            'í' | 'ì' | 'ï' => 'i',
            'ó' | 'ò' | 'ö' => 'o',
            'ú' | 'ù' | 'ü' => 'u',
            'ñ' => 'n',
            ' ' | '-' | '.' => '_',
            other => other,
        })
        .collect()
}

/// Column positions found in a header row.
struct HeaderIndex {
    positions: HashMap<Column, usize>,
}

impl HeaderIndex {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let normalized: Vec<String> = headers.iter().map(normalize_header).collect();
        let mut positions = HashMap::new();
        for column in Column::ALL {
            if let Some(position) = normalized
                .iter()
                .position(|h| column.aliases().contains(&h.as_str()))
            {
                positions.insert(column, position);
            }
        }
        HeaderIndex { positions }
    }

    fn require(&self, table: &'static str, columns: &[Column]) -> Result<(), IngestError> {
        for column in columns {
            if !self.positions.contains_key(column) {
                return Err(IngestError::MissingColumn {
                    table,
                    column: column.name(),
                });
            }
        }
        Ok(())
    }

    /// Trimmed cell value; `None` when the column is absent or the cell is blank.
    fn get<'r>(&self, record: &'r csv::StringRecord, column: Column) -> Option<&'r str> {
        self.positions
            .get(&column)
            .and_then(|&i| record.get(i))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Cell parsing
// ---------------------------------------------------------------------------

/// Sample counts arrive as integers or as spreadsheet floats ("1008.0").
fn parse_count(raw: &str) -> Option<u64> {
    if let Ok(n) = raw.parse::<u64>() {
        return Some(n);
    }
    raw.replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.round() as u64)
}

/// Percentages may carry a trailing `%` and a decimal comma.
fn parse_percentage(raw: &str) -> Option<f64> {
    raw.trim_end_matches('%')
        .trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Parses a date with the configured format, then the common fallbacks.
/// Timestamps keep only their date part.
pub fn parse_date(raw: &str, format: &str) -> Option<NaiveDate> {
    let date_part = raw.split([' ', 'T']).next().unwrap_or(raw);
    std::iter::once(format)
        .chain(FALLBACK_DATE_FORMATS.iter().copied())
        .find_map(|f| {
            NaiveDate::parse_from_str(raw, f)
                .or_else(|_| NaiveDate::parse_from_str(date_part, f))
                .ok()
        })
}

/// Identity of a row, or the reason it cannot be used.
fn station_key(
    index: &HeaderIndex,
    record: &csv::StringRecord,
    table: &str,
) -> Result<StationKey, RowRejection> {
    let line = record.position().map_or(0, |p| p.line());
    match (index.get(record, Column::Zone), index.get(record, Column::Station)) {
        (Some(zone), Some(station)) => Ok(StationKey::new(zone, station)),
        (None, _) => Err(RowRejection {
            table: table.to_string(),
            line,
            reason: "missing zone".to_string(),
        }),
        (_, None) => Err(RowRejection {
            table: table.to_string(),
            line,
            reason: "missing station".to_string(),
        }),
    }
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader)
}

// ---------------------------------------------------------------------------
// Readers
// ---------------------------------------------------------------------------

/// Records of one table plus the rows that could not be identified.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<T> {
    pub records: Vec<T>,
    pub rejections: Vec<RowRejection>,
}

/// Reads the current-period metric set.
pub fn read_metrics<R: Read>(reader: R) -> Result<Parsed<RawVariableRow>, IngestError> {
    let mut csv = csv_reader(reader);
    let index = HeaderIndex::from_headers(csv.headers()?);
    index.require(
        METRICS_TABLE,
        &[Column::Zone, Column::Station, Column::Variable, Column::Correct],
    )?;

    let mut parsed = Parsed {
        records: Vec::new(),
        rejections: Vec::new(),
    };
    for result in csv.records() {
        let record = result?;
        let key = match station_key(&index, &record, METRICS_TABLE) {
            Ok(key) => key,
            Err(rejection) => {
                parsed.rejections.push(rejection);
                continue;
            }
        };
        let Some(variable) = index.get(&record, Column::Variable) else {
            logging::warn(Stage::Ingest, Some(&key.to_string()), "metric row without variable skipped");
            continue;
        };

        let correct_count = match index.get(&record, Column::Correct) {
            Some(raw) => parse_count(raw).unwrap_or_else(|| {
                logging::warn(
                    Stage::Ingest,
                    Some(&key.to_string()),
                    &format!("unreadable correct count '{}' for {}; using 0", raw, variable),
                );
                0
            }),
            None => 0,
        };
        let error_count = index
            .get(&record, Column::Error)
            .and_then(parse_count)
            .unwrap_or(0);

        parsed.records.push(RawVariableRow {
            sensor: index.get(&record, Column::Sensor).map(String::from),
            variable: variable.to_string(),
            frequency_label: index.get(&record, Column::Frequency).map(String::from),
            correct_count,
            error_count,
            reported_expected: index.get(&record, Column::Expected).and_then(parse_count),
            key,
        });
    }

    logging::info(
        Stage::Ingest,
        None,
        &format!(
            "{} metric rows read, {} rejected",
            parsed.records.len(),
            parsed.rejections.len()
        ),
    );
    Ok(parsed)
}

/// Reads the frequency reference table. Rows with an unknown frequency
/// label are skipped: a missing entry only means a fallback later.
pub fn read_frequencies<R: Read>(reader: R) -> Result<Parsed<FrequencyEntry>, IngestError> {
    let mut csv = csv_reader(reader);
    let index = HeaderIndex::from_headers(csv.headers()?);
    index.require(
        FREQUENCY_TABLE,
        &[Column::Zone, Column::Station, Column::Variable, Column::Frequency],
    )?;

    let mut parsed = Parsed {
        records: Vec::new(),
        rejections: Vec::new(),
    };
    for result in csv.records() {
        let record = result?;
        let key = match station_key(&index, &record, FREQUENCY_TABLE) {
            Ok(key) => key,
            Err(rejection) => {
                parsed.rejections.push(rejection);
                continue;
            }
        };
        let variable = index.get(&record, Column::Variable);
        let label = index.get(&record, Column::Frequency);
        match (variable, label.and_then(FrequencyClass::from_label)) {
            (Some(variable), Some(frequency)) => parsed.records.push(FrequencyEntry {
                key,
                variable: variable.to_string(),
                frequency,
            }),
            _ => logging::warn(
                Stage::Ingest,
                Some(&key.to_string()),
                &format!(
                    "frequency entry skipped (variable {:?}, frequency {:?})",
                    variable, label
                ),
            ),
        }
    }
    Ok(parsed)
}

/// Reads a previous incident snapshot.
pub fn read_snapshot<R: Read>(
    reader: R,
    config: &EngineConfig,
) -> Result<Parsed<SnapshotEntry>, IngestError> {
    let date_format = config.calculation.date_format.as_str();
    let mut csv = csv_reader(reader);
    let index = HeaderIndex::from_headers(csv.headers()?);
    index.require(SNAPSHOT_TABLE, &[Column::Zone, Column::Station])?;

    let mut parsed = Parsed {
        records: Vec::new(),
        rejections: Vec::new(),
    };
    for result in csv.records() {
        let record = result?;
        let key = match station_key(&index, &record, SNAPSHOT_TABLE) {
            Ok(key) => key,
            Err(rejection) => {
                parsed.rejections.push(rejection);
                continue;
            }
        };
        let station = key.to_string();
        let mut flags = QualityFlags::new();

        let state = match index.get(&record, Column::State) {
            None => IncidentState::None,
            Some(label) => IncidentState::from_label(label).unwrap_or_else(|| {
                logging::warn(
                    Stage::Ingest,
                    Some(&station),
                    &format!("unrecognized state '{}'; treated as NONE", label),
                );
                flags.insert(QualityFlag::UnrecognizedState);
                IncidentState::None
            }),
        };

        let mut read_date = |column: Column| -> Option<NaiveDate> {
            let raw = index.get(&record, column)?;
            let date = parse_date(raw, date_format);
            if date.is_none() {
                logging::warn(
                    Stage::Ingest,
                    Some(&station),
                    &format!("unreadable {} '{}'", column.name(), raw),
                );
                flags.insert(QualityFlag::InvalidIncidentDate);
            }
            date
        };
        let incident_start = read_date(Column::IncidentStart);
        let resolved_on = read_date(Column::ResolvedOn);

        parsed.records.push(SnapshotEntry {
            record: IncidentRecord {
                state,
                incident_start,
                resolved_on,
                comment: index
                    .positions
                    .get(&Column::Comment)
                    .and_then(|&i| record.get(i))
                    .filter(|c| !c.trim().is_empty())
                    .map(String::from),
                last_availability: index
                    .get(&record, Column::Availability)
                    .and_then(parse_percentage),
                key,
            },
            flags,
        });
    }

    logging::info(
        Stage::Ingest,
        None,
        &format!(
            "{} snapshot records read, {} rejected",
            parsed.records.len(),
            parsed.rejections.len()
        ),
    );
    Ok(parsed)
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

const SNAPSHOT_COLUMNS: [Column; 7] = [
    Column::Zone,
    Column::Station,
    Column::IncidentStart,
    Column::State,
    Column::ResolvedOn,
    Column::Comment,
    Column::Availability,
];

/// Writes the next incident snapshot. Availability is written unrounded.
pub fn write_snapshot<W: Write>(
    writer: W,
    records: &[IncidentRecord],
    config: &EngineConfig,
) -> Result<(), IngestError> {
    let date_format = config.calculation.date_format.as_str();
    let format_date = |d: Option<NaiveDate>| {
        d.map(|d| d.format(date_format).to_string())
            .unwrap_or_default()
    };

    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(SNAPSHOT_COLUMNS.iter().map(|c| c.name()))?;
    for record in records {
        csv.write_record([
            record.key.zone.as_str().to_string(),
            record.key.station.clone(),
            format_date(record.incident_start),
            record.state.label().to_string(),
            format_date(record.resolved_on),
            record.comment.clone().unwrap_or_default(),
            record
                .last_availability
                .map(|a| a.to_string())
                .unwrap_or_default(),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

fn open(path: &Path) -> Result<File, IngestError> {
    File::open(path).map_err(|e| IngestError::Io(format!("{}: {}", path.display(), e)))
}

pub fn load_metrics<P: AsRef<Path>>(path: P) -> Result<Parsed<RawVariableRow>, IngestError> {
    read_metrics(open(path.as_ref())?)
}

pub fn load_frequencies<P: AsRef<Path>>(path: P) -> Result<Parsed<FrequencyEntry>, IngestError> {
    read_frequencies(open(path.as_ref())?)
}

pub fn load_snapshot<P: AsRef<Path>>(
    path: P,
    config: &EngineConfig,
) -> Result<Parsed<SnapshotEntry>, IngestError> {
    read_snapshot(open(path.as_ref())?, config)
}

pub fn save_snapshot<P: AsRef<Path>>(
    path: P,
    records: &[IncidentRecord],
    config: &EngineConfig,
) -> Result<(), IngestError> {
    let path = path.as_ref();
    let file =
        File::create(path).map_err(|e| IngestError::Io(format!("{}: {}", path.display(), e)))?;
    write_snapshot(file, records, config)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
