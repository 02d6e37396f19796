/// Availability computation for the network availability service.
///
/// Submodules:
/// - `frequency`: true sampling cadence lookup and expected-sample counts.
/// - `calculator`: variable, equipment and station availability.

pub mod calculator;
pub mod frequency;

pub use calculator::{AvailabilityCalculator, AvailabilityReport};
pub use frequency::{FrequencyEntry, FrequencyResolver};
