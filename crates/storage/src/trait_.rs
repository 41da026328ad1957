//! Sink trait abstraction.

use async_trait::async_trait;
use polytune_core::GenerationRecord;

/// Error type for sink operations.
pub type Result<T> = std::result::Result<T, SinkError>;

/// Errors that can occur while recording.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Append-only destination for generation records.
///
/// The consumer decides persistence and format; the search only appends.
#[async_trait]
pub trait GenerationSink: Send {
    /// Append one record.
    async fn record(&mut self, record: &GenerationRecord) -> Result<()>;

    /// Push buffered records to their destination.
    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
