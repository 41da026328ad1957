//! Evolution layer - genetic search over load parameters.
//!
//! A generation flows through
//! ```text
//! Evaluate (noisy fitness) → Select elite → Recombine → Mutate
//! ```
//! until the best score stops moving or the iteration budget runs out.

#![warn(missing_docs)]

mod config;
mod error;
pub mod stats;
pub mod population;
pub mod fitness;
pub mod selection;
pub mod crossover;
pub mod mutation;
mod controller;

pub use config::SearchConfig;
pub use error::{SearchError, EvaluationFailure, Stage, Result};
pub use population::{Population, Elite, select_elite};
pub use fitness::{Baseline, FitnessBreakdown, NoisyEvaluator};
pub use selection::{softmax, sample_parents, ParentDraw};
pub use crossover::crossover;
pub use mutation::{mutate, mutate_gene, MomentumRule};
pub use controller::{SearchController, SearchState, SearchOutcome, GenerationReport};
