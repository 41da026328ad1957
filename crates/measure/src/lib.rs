//! Measurement port
//!
//! Launch contention load, profile the victim workload and tear the load down
//! again. The search engine only sees the [`MeasurementPort`] trait.

#![warn(missing_docs)]

pub mod port;
pub mod config;
pub mod parser;
pub mod perf;
pub mod simulated;

pub use port::{MeasurementPort, MeasureError, Result};
pub use config::ChannelTable;
pub use parser::parse_perf_csv;
pub use perf::PerfPort;
pub use simulated::SimulatedPort;
