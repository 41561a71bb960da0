//! Lidar / met-mast comparison engine.
//!
//! Ingests a lidar export and QC'd met-mast exports, removes rejected
//! mast rows, aligns channels on a minute-resolution timestamp, and
//! produces binned availability tables and composite indicators checked
//! against the mast's ice-detection flag.

pub mod analysis;
pub mod channels;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod qc;
pub mod timestamps;
