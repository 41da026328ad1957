//! Measurement port abstraction.

use async_trait::async_trait;
use polytune_core::{Channel, MeasurementRegime, Metrics, ParamVector};

/// Error type for measurement operations.
pub type Result<T> = std::result::Result<T, MeasureError>;

/// Errors that can occur while measuring.
#[derive(Debug, thiserror::Error)]
pub enum MeasureError {
    /// The profiler cannot count the events this regime needs
    #[error("measurement unsupported: '{metric}' was not counted ({detail})")]
    Unsupported {
        /// Event that could not be counted
        metric: String,
        /// Profiler diagnostic
        detail: String,
    },

    /// A sample lacks an expected metric
    #[error("metric '{0}' missing from measurement")]
    MissingMetric(String),

    /// A process could not be started
    #[error("failed to launch '{command}': {source}")]
    Launch {
        /// Program that failed to start
        command: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Load generators could not be terminated
    #[error("load teardown failed: {0}")]
    Teardown(String),

    /// Bad channel table
    #[error("invalid configuration: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MeasureError {
    /// Whether this failure means the environment lacks hardware counters.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, MeasureError::Unsupported { .. })
    }
}

/// Takes one measurement of the victim workload at a time.
///
/// Implementations are driven strictly sequentially: every
/// [`measure_candidate`](MeasurementPort::measure_candidate) is followed by
/// [`teardown_load`](MeasurementPort::teardown_load) before the next sample.
#[async_trait]
pub trait MeasurementPort: Send + Sync {
    /// Launch `concurrency` load generators configured by `params`, then
    /// measure the victim once under that load.
    async fn measure_candidate(
        &self,
        channel: Channel,
        params: &ParamVector,
        concurrency: usize,
        regime: MeasurementRegime,
    ) -> Result<Metrics>;

    /// Measure the victim once with no contention load.
    async fn measure_baseline(
        &self,
        channel: Channel,
        regime: MeasurementRegime,
    ) -> Result<Metrics>;

    /// Terminate every load generator launched so far.
    async fn teardown_load(&self) -> Result<()>;
}

#[async_trait]
impl<P: MeasurementPort + ?Sized> MeasurementPort for std::sync::Arc<P> {
    async fn measure_candidate(
        &self,
        channel: Channel,
        params: &ParamVector,
        concurrency: usize,
        regime: MeasurementRegime,
    ) -> Result<Metrics> {
        (**self).measure_candidate(channel, params, concurrency, regime).await
    }

    async fn measure_baseline(
        &self,
        channel: Channel,
        regime: MeasurementRegime,
    ) -> Result<Metrics> {
        (**self).measure_baseline(channel, regime).await
    }

    async fn teardown_load(&self) -> Result<()> {
        (**self).teardown_load().await
    }
}
