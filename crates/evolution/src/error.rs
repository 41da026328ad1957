//! Search error types.

use polytune_core::MeasurementRegime;
use polytune_measure::MeasureError;
use polytune_storage::SinkError;

/// Result alias for search operations.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Stage of a run in which an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Validating the configuration
    Configuration,
    /// Acquiring the isolation baseline
    Baseline,
    /// Evaluating a generation
    Evaluation,
    /// Writing the run log
    Logging,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Configuration => f.write_str("configuration"),
            Stage::Baseline => f.write_str("baseline acquisition"),
            Stage::Evaluation => f.write_str("generation evaluation"),
            Stage::Logging => f.write_str("logging"),
        }
    }
}

/// Why a generation could not be evaluated.
#[derive(Debug, thiserror::Error)]
pub enum EvaluationFailure {
    /// The measurement port failed
    #[error(transparent)]
    Measure(#[from] MeasureError),

    /// Every candidate lacked enough valid samples
    #[error("no candidate produced enough valid samples to be scored")]
    Unscored,
}

/// Errors that end a search run.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Configuration rejected before the run started
    #[error("invalid search configuration: {0}")]
    InvalidConfig(String),

    /// No baseline could be measured
    #[error(
        "could not measure a {regime} baseline: {source}; check that the profiler may read \
         system-wide counters (sysctl kernel.perf_event_paranoid=-1 or run as root)"
    )]
    Baseline {
        /// Regime the last attempt used
        regime: MeasurementRegime,
        /// Underlying failure
        source: MeasureError,
    },

    /// A generation kept failing after all retries
    #[error("generation {iteration} failed after {attempts} attempts: {source}")]
    Evaluation {
        /// 1-based iteration number
        iteration: usize,
        /// Attempts made
        attempts: usize,
        /// Last failure
        source: EvaluationFailure,
    },

    /// The run log could not be written
    #[error("failed to write run log: {0}")]
    Sink(#[from] SinkError),
}

impl SearchError {
    /// Stage the error was raised in.
    pub fn stage(&self) -> Stage {
        match self {
            SearchError::InvalidConfig(_) => Stage::Configuration,
            SearchError::Baseline { .. } => Stage::Baseline,
            SearchError::Evaluation { .. } => Stage::Evaluation,
            SearchError::Sink(_) => Stage::Logging,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_error_mentions_privileges() {
        let err = SearchError::Baseline {
            regime: MeasurementRegime::Degraded,
            source: MeasureError::MissingMetric("task-clock".into()),
        };
        assert_eq!(err.stage(), Stage::Baseline);
        let msg = err.to_string();
        assert!(msg.contains("degraded baseline"));
        assert!(msg.contains("perf_event_paranoid"));
    }

    #[test]
    fn test_evaluation_error_names_iteration() {
        let err = SearchError::Evaluation {
            iteration: 7,
            attempts: 4,
            source: EvaluationFailure::Unscored,
        };
        assert_eq!(err.stage(), Stage::Evaluation);
        assert!(err.to_string().starts_with("generation 7 failed after 4 attempts"));
    }
}
