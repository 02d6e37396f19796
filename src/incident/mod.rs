/// Incident lifecycle for the network availability service.
///
/// Submodules:
/// - `tracker`: advances a station's incident record by one period.
/// - `priority`: maps a settled incident to a priority tier and reason.
/// - `paralysis`: dormant-incident and closure-candidate rules.

pub mod paralysis;
pub mod priority;
pub mod tracker;

pub use priority::{classify, Classification, PriorityInput, PriorityTrigger};
pub use tracker::{advance, reconcile, TrackerOutcome};
