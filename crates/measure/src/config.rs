//! Channel table: which programs to run for each channel.

use polytune_core::Channel;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::{MeasureError, Result};

/// Immutable description of the measurement environment.
///
/// Loaded once and handed to the adapter; nothing here is global.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelTable {
    /// Profiler binary, e.g. `perf` or `perf_4.9`
    pub perf_bin: String,

    /// Load generator binary
    pub load_generator: PathBuf,

    /// Victim command line per channel
    pub victims: HashMap<Channel, String>,

    /// Time given to load generators to ramp up before measuring (ms)
    pub load_settle_ms: u64,

    /// Directories prepended to `PATH` for the profiler
    pub extra_path: Vec<PathBuf>,
}

impl Default for ChannelTable {
    fn default() -> Self {
        let victims = [
            (Channel::Cache, "stress-ng --stream 1 --stream-ops 1000 --metrics"),
            (Channel::Network, "stress-ng --udp 1 --udp-ops 50000 --metrics"),
            (Channel::RowBuffer, "stress-ng --stream 1 --stream-ops 50 --metrics"),
            (Channel::Memory, "stress-ng --stream 1 --stream-ops 50 --metrics"),
            (Channel::DiskIo, "stress-ng --io 1 --io-ops 20000 --metrics"),
            (Channel::Tlb, "stress-ng --brk 1 --brk-ops 500000 --metrics"),
        ]
        .into_iter()
        .map(|(channel, cmd)| (channel, cmd.to_string()))
        .collect();

        Self {
            perf_bin: "perf".to_string(),
            load_generator: PathBuf::from("polyrhythm"),
            victims,
            load_settle_ms: 500,
            extra_path: vec![PathBuf::from("/usr/sbin"), PathBuf::from("/sbin")],
        }
    }
}

impl ChannelTable {
    /// Read a table from a JSON file. Missing fields take their defaults.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        let table: Self = serde_json::from_str(&content)?;
        table.validate()?;
        Ok(table)
    }

    /// Use a different profiler binary.
    pub fn with_perf_bin(mut self, perf_bin: impl Into<String>) -> Self {
        self.perf_bin = perf_bin.into();
        self
    }

    /// Check the table is usable.
    pub fn validate(&self) -> Result<()> {
        if self.perf_bin.trim().is_empty() {
            return Err(MeasureError::Config("perf_bin is empty".to_string()));
        }
        if self.load_generator.as_os_str().is_empty() {
            return Err(MeasureError::Config("load_generator is empty".to_string()));
        }
        if let Some((channel, _)) = self.victims.iter().find(|(_, cmd)| cmd.trim().is_empty()) {
            return Err(MeasureError::Config(format!("victim command for {} is empty", channel)));
        }
        Ok(())
    }

    /// Victim command for a channel, split into program and arguments.
    pub fn victim(&self, channel: Channel) -> Result<Vec<String>> {
        let cmd = self
            .victims
            .get(&channel)
            .ok_or_else(|| MeasureError::Config(format!("no victim configured for {}", channel)))?;
        Ok(cmd.split_whitespace().map(str::to_string).collect())
    }

    /// `PATH` value for profiler invocations.
    pub fn search_path(&self) -> Option<std::ffi::OsString> {
        let current = std::env::var_os("PATH").unwrap_or_default();
        let dirs = self
            .extra_path
            .iter()
            .cloned()
            .chain(std::env::split_paths(&current));
        std::env::join_paths(dirs).ok()
    }
}
