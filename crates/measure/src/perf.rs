//! `perf`-based measurement adapter.

use async_trait::async_trait;
use polytune_core::{Channel, MeasurementRegime, Metrics, ParamVector};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::parser::{last_line, parse_perf_csv};
use crate::{ChannelTable, MeasureError, MeasurementPort, Result};

/// Runs the victim under `perf stat` while load generators contend on a channel.
pub struct PerfPort {
    table: ChannelTable,
    running: Mutex<Vec<Child>>,
}

impl PerfPort {
    /// Create an adapter over a channel table.
    pub fn new(table: ChannelTable) -> Self {
        Self {
            table,
            running: Mutex::new(Vec::new()),
        }
    }

    /// The table this adapter was built with.
    pub fn table(&self) -> &ChannelTable {
        &self.table
    }

    /// Events requested from the profiler.
    ///
    /// Only one or two events are sampled to keep multiplexing error low.
    pub fn events(channel: Channel, regime: MeasurementRegime) -> Vec<&'static str> {
        let primary = regime.primary_metric();
        if regime.is_degraded() {
            return vec![primary];
        }
        let secondary = channel.secondary_metric();
        if secondary == primary {
            vec![primary]
        } else {
            vec![primary, secondary]
        }
    }

    /// Arguments passed to one load generator instance.
    pub fn load_args(channel: Channel, params: &ParamVector) -> Vec<String> {
        let mut args = vec![channel.as_str().to_string(), "1".to_string()];
        args.extend(params.genes().iter().map(|g| g.to_string()));
        // online profiling off
        args.push("0".to_string());
        args
    }

    /// Build the profiler command wrapping the channel's victim.
    pub fn perf_command(&self, channel: Channel, regime: MeasurementRegime) -> Result<Command> {
        let victim = self.table.victim(channel)?;
        let events = Self::events(channel, regime).join(",");

        let mut cmd = Command::new(&self.table.perf_bin);
        cmd.args(["stat", "-a", "-x,", "-e", &events, "--"])
            .args(&victim)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        if let Some(path) = self.table.search_path() {
            cmd.env("PATH", path);
        }
        Ok(cmd)
    }

    async fn spawn_load(&self, channel: Channel, params: &ParamVector, concurrency: usize) -> Result<()> {
        let args = Self::load_args(channel, params);
        let mut running = self.running.lock().await;
        for _ in 0..concurrency {
            let child = Command::new(&self.table.load_generator)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .spawn()
                .map_err(|source| MeasureError::Launch {
                    command: self.table.load_generator.display().to_string(),
                    source,
                })?;
            running.push(child);
        }
        debug!(
            "Launched {} load generators: {} {}",
            concurrency,
            self.table.load_generator.display(),
            args.join(" ")
        );
        Ok(())
    }

    async fn profile(&self, channel: Channel, regime: MeasurementRegime) -> Result<Metrics> {
        let mut cmd = self.perf_command(channel, regime)?;
        let output = cmd.output().await.map_err(|source| MeasureError::Launch {
            command: self.table.perf_bin.clone(),
            source,
        })?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        let metrics = parse_perf_csv(&stderr);

        let primary = regime.primary_metric();
        if !metrics.contains_key(primary) {
            warn!("Profiling with {} failed: {}", self.table.perf_bin, last_line(&stderr));
            return Err(MeasureError::Unsupported {
                metric: primary.to_string(),
                detail: last_line(&stderr),
            });
        }
        debug!("Profiled {}: {:?}", channel, metrics);
        Ok(metrics)
    }
}

#[async_trait]
impl MeasurementPort for PerfPort {
    async fn measure_candidate(
        &self,
        channel: Channel,
        params: &ParamVector,
        concurrency: usize,
        regime: MeasurementRegime,
    ) -> Result<Metrics> {
        self.spawn_load(channel, params, concurrency).await?;
        tokio::time::sleep(Duration::from_millis(self.table.load_settle_ms)).await;
        self.profile(channel, regime).await
    }

    async fn measure_baseline(&self, channel: Channel, regime: MeasurementRegime) -> Result<Metrics> {
        self.profile(channel, regime).await
    }

    async fn teardown_load(&self) -> Result<()> {
        let mut running = self.running.lock().await;
        let mut failures = Vec::new();
        for mut child in running.drain(..) {
            let pid = child.id();
            if let Err(e) = child.kill().await {
                failures.push(format!("pid {:?}: {}", pid, e));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(MeasureError::Teardown(failures.join("; ")))
        }
    }
}
