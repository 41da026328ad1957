//! Per-generation records produced for the run log.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{Channel, MeasurementRegime, ParamVector, RunId, Time};

/// One measurement: metric name to value.
pub type Metrics = HashMap<String, f64>;

/// Summary of one completed generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    /// Run this generation belongs to
    pub run_id: RunId,
    /// Channel being tuned
    pub channel: Channel,
    /// 1-based iteration number
    pub iteration: usize,
    /// Best elite score of this generation
    pub best_score: f64,
    /// Absolute change from the previous generation's best
    pub score_diff: f64,
    /// Best-scoring parameter vector of this generation
    pub best_params: ParamVector,
    /// Mutation probability after the momentum update
    pub mutation_p: f64,
    /// Regime the generation was scored under
    pub regime: MeasurementRegime,
    /// Whether this generation set a new best-so-far
    pub new_best: bool,
    /// When the generation finished
    pub recorded_at: Time,
}
