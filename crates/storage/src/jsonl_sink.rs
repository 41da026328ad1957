//! JSON-lines file sink.
//!
//! Every generation is appended as one JSON object per line and flushed
//! immediately, so a run interrupted half-way still leaves a usable log.

use async_trait::async_trait;
use polytune_core::GenerationRecord;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::{GenerationSink, Result};

/// Appends records to a `.jsonl` file.
pub struct JsonlSink {
    path: PathBuf,
    file: File,
}

impl JsonlSink {
    /// Open (or create) a log file. Parent directories are created as needed
    /// and an existing file is truncated.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .await?;
        Ok(Self { path, file })
    }

    /// Open a log file for appending, keeping earlier records.
    pub async fn append(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self { path, file })
    }

    /// Location of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl GenerationSink for JsonlSink {
    async fn record(&mut self, record: &GenerationRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        self.file.write_all(line.as_bytes()).await?;
        self.file.flush().await?;
        debug!("Logged generation {} to {}", record.iteration, self.path.display());
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.file.flush().await?;
        self.file.sync_data().await?;
        Ok(())
    }
}

/// Read every record back from a log file. Blank lines are ignored.
pub async fn read_records(path: impl AsRef<Path>) -> Result<Vec<GenerationRecord>> {
    let content = fs::read_to_string(path.as_ref()).await?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(Into::into))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use polytune_core::{Channel, MeasurementRegime, ParamVector, RunId};

    fn record(iteration: usize, best_score: f64) -> GenerationRecord {
        GenerationRecord {
            run_id: RunId::new(),
            channel: Channel::Cache,
            iteration,
            best_score,
            score_diff: 0.5,
            best_params: ParamVector([1, 500, 0, 0]),
            mutation_p: 0.209,
            regime: MeasurementRegime::Full,
            new_best: true,
            recorded_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_records_are_appended_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("cache_run_log.jsonl");

        let mut sink = JsonlSink::create(&path).await.unwrap();
        sink.record(&record(1, 10.0)).await.unwrap();
        sink.record(&record(2, 10.5)).await.unwrap();
        sink.flush().await.unwrap();

        let records = read_records(&path).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].iteration, 1);
        assert_eq!(records[1].best_score, 10.5);
        assert_eq!(records[1].best_params, ParamVector([1, 500, 0, 0]));
    }

    #[tokio::test]
    async fn test_append_keeps_existing_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");

        let mut sink = JsonlSink::create(&path).await.unwrap();
        sink.record(&record(1, 1.0)).await.unwrap();
        drop(sink);

        let mut sink = JsonlSink::append(&path).await.unwrap();
        sink.record(&record(2, 2.0)).await.unwrap();
        drop(sink);

        assert_eq!(read_records(&path).await.unwrap().len(), 2);

        // create truncates
        let sink = JsonlSink::create(&path).await.unwrap();
        drop(sink);
        assert!(read_records(&path).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_line_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        fs::write(&path, "{not json}\n").await.unwrap();
        assert!(matches!(read_records(&path).await, Err(crate::SinkError::Json(_))));
    }
}
