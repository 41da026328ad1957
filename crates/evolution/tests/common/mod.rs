//! Scripted measurement port for controller tests.

#![allow(dead_code)]

use async_trait::async_trait;
use polytune_core::{Channel, MeasurementRegime, Metrics, ParamVector};
use polytune_measure::{MeasureError, MeasurementPort, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use polytune_evolution::SearchConfig;

/// Fast, seeded configuration.
pub fn quick_config() -> SearchConfig {
    SearchConfig::default()
        .with_seed(42)
        .with_baseline_settle(Duration::ZERO)
}

/// Port whose failures are switched on per test.
#[derive(Default)]
pub struct ScriptedPort {
    counters_fail_after: Option<usize>,
    full_baseline_fails: bool,
    degraded_baseline_fails: bool,
    omit_secondary: bool,
    failing_teardowns: usize,

    candidate_calls: AtomicUsize,
    full_candidate_calls: AtomicUsize,
    teardown_calls: AtomicUsize,
    full_baseline_calls: AtomicUsize,
    degraded_baseline_calls: AtomicUsize,
    contaminated: AtomicUsize,
    load_running: AtomicBool,
    measured: Mutex<Vec<ParamVector>>,
}

impl ScriptedPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full-regime candidate samples that succeed before counters disappear
    pub fn with_counters_failing_after(mut self, samples: usize) -> Self {
        self.counters_fail_after = Some(samples);
        self
    }

    /// Full-regime baselines fail
    pub fn with_full_baseline_failing(mut self) -> Self {
        self.full_baseline_fails = true;
        self
    }

    /// Degraded-regime baselines fail
    pub fn with_degraded_baseline_failing(mut self) -> Self {
        self.degraded_baseline_fails = true;
        self
    }

    /// Leave the secondary metric out of every Full sample
    pub fn omitting_secondary(mut self) -> Self {
        self.omit_secondary = true;
        self
    }

    /// Number of leading teardown calls that fail
    pub fn with_failing_teardowns(mut self, count: usize) -> Self {
        self.failing_teardowns = count;
        self
    }

    pub fn candidate_calls(&self) -> usize {
        self.candidate_calls.load(Ordering::SeqCst)
    }

    pub fn teardown_calls(&self) -> usize {
        self.teardown_calls.load(Ordering::SeqCst)
    }

    pub fn full_baseline_calls(&self) -> usize {
        self.full_baseline_calls.load(Ordering::SeqCst)
    }

    pub fn degraded_baseline_calls(&self) -> usize {
        self.degraded_baseline_calls.load(Ordering::SeqCst)
    }

    pub fn contaminated(&self) -> usize {
        self.contaminated.load(Ordering::SeqCst)
    }

    pub fn measured(&self) -> Vec<ParamVector> {
        self.measured.lock().unwrap().clone()
    }

    fn unsupported() -> MeasureError {
        MeasureError::Unsupported {
            metric: "cycles".into(),
            detail: "<not supported>".into(),
        }
    }
}

#[async_trait]
impl MeasurementPort for ScriptedPort {
    async fn measure_candidate(
        &self,
        channel: Channel,
        params: &ParamVector,
        _concurrency: usize,
        regime: MeasurementRegime,
    ) -> Result<Metrics> {
        if self.load_running.swap(true, Ordering::SeqCst) {
            self.contaminated.fetch_add(1, Ordering::SeqCst);
        }
        let call = self.candidate_calls.fetch_add(1, Ordering::SeqCst);
        self.measured.lock().unwrap().push(*params);

        let mut metrics = Metrics::new();
        match regime {
            MeasurementRegime::Full => {
                let full_call = self.full_candidate_calls.fetch_add(1, Ordering::SeqCst);
                if self.counters_fail_after.is_some_and(|n| full_call >= n) {
                    return Err(Self::unsupported());
                }
                let cycles = 1.0e6 + 1.0e3 * params[0] as f64 + params[1] as f64 + (call % 3) as f64;
                metrics.insert("cycles".into(), cycles);
                if !self.omit_secondary {
                    metrics.insert(channel.secondary_metric().into(), 500.0 + (call % 2) as f64);
                }
            }
            MeasurementRegime::Degraded => {
                metrics.insert("task-clock".into(), 100.0 + (call % 5) as f64);
            }
        }
        Ok(metrics)
    }

    async fn measure_baseline(&self, channel: Channel, regime: MeasurementRegime) -> Result<Metrics> {
        let mut metrics = Metrics::new();
        match regime {
            MeasurementRegime::Full => {
                self.full_baseline_calls.fetch_add(1, Ordering::SeqCst);
                if self.full_baseline_fails {
                    return Err(Self::unsupported());
                }
                metrics.insert("cycles".into(), 1.0e6);
                metrics.insert(channel.secondary_metric().into(), 500.0);
            }
            MeasurementRegime::Degraded => {
                self.degraded_baseline_calls.fetch_add(1, Ordering::SeqCst);
                if self.degraded_baseline_fails {
                    return Err(MeasureError::Unsupported {
                        metric: "task-clock".into(),
                        detail: "Permission denied".into(),
                    });
                }
                metrics.insert("task-clock".into(), 100.0);
            }
        }
        Ok(metrics)
    }

    async fn teardown_load(&self) -> Result<()> {
        let call = self.teardown_calls.fetch_add(1, Ordering::SeqCst);
        self.load_running.store(false, Ordering::SeqCst);
        if call < self.failing_teardowns {
            return Err(MeasureError::Teardown("pid 4242: Operation not permitted".into()));
        }
        Ok(())
    }
}
