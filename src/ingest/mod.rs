/// Boundary adapters for the network availability service.
///
/// Submodules:
/// - `tabular`: CSV metric exports, frequency table and incident snapshots.

pub mod tabular;
