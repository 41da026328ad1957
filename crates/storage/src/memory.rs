//! In-memory sink.

use async_trait::async_trait;
use polytune_core::GenerationRecord;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::{GenerationSink, Result};

/// Keeps records in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<GenerationRecord>>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub async fn records(&self) -> Vec<GenerationRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl GenerationSink for MemorySink {
    async fn record(&mut self, record: &GenerationRecord) -> Result<()> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }
}
