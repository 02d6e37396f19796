/// Network availability service.
///
/// Turns periodic sample counts from a meteorological station network into
/// availability percentages and a per-station incident history with
/// priority tiers. One run consumes one period's metrics plus the previous
/// incident snapshot and produces a consolidated report and the next
/// snapshot.

pub mod availability;
pub mod catalog;
pub mod config;
pub mod consolidate;
pub mod incident;
pub mod ingest;
pub mod logging;
pub mod model;

pub use config::{load_config, EngineConfig};
pub use consolidate::{run_period, Consolidation, ConsolidatedRow, Indicators};
