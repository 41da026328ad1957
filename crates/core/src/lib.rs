//! PolyTune core data models.
//!
//! This crate defines the data structures shared by the measurement adapter,
//! the evolutionary search engine and the run log.

#![warn(missing_docs)]

// Identities
mod id;

// Search space
mod channel;
mod params;
mod mode;

// Results
mod record;

// Re-exports
pub use id::RunId;
pub use channel::{Channel, ParseChannelError};
pub use params::{
    ParamVector, InitialParams, FixedParams, ParamError,
    NUM_PARAMS, FROZEN_SENTINEL,
};
pub use mode::{WeightMode, MeasurementRegime, ParseWeightModeError};
pub use record::{GenerationRecord, Metrics};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
