/// Analysis stages applied after ingestion and QC.
///
/// Submodules:
/// - `align`: joins channels on their normalized timestamp.
/// - `availability`: availability ratios, overall and per month.
/// - `binning`: fixed-width bins of one channel with per-bin statistics.
/// - `correlation`: composite threshold indicators set against an event flag.

pub mod align;
pub mod availability;
pub mod binning;
pub mod correlation;
