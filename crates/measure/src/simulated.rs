//! Deterministic stand-in for real hardware.
//!
//! The simulated victim slows down the closer the load parameters are to a
//! hidden optimum. Inside one mutation step of the optimum every sample is
//! exact; further away samples jitter in proportion to the distance, the way
//! badly tuned load produces erratic interference on real machines.

use async_trait::async_trait;
use polytune_core::{Channel, MeasurementRegime, Metrics, ParamVector, NUM_PARAMS};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::{MeasureError, MeasurementPort, Result};

const BASELINE_CYCLES: f64 = 1.0e6;
const BASELINE_SECONDARY: f64 = 1.0e3;
const BASELINE_CLOCK_MS: f64 = 1.0e3;
const PEAK_SLOWDOWN: f64 = 1.0e3;
const MAX_JITTER: f64 = 0.5;

/// Parameters observed to be optimal on a Raspberry Pi 3b.
pub fn reference_optimum(channel: Channel) -> ParamVector {
    match channel {
        Channel::Cache => ParamVector([1, 835, 0, 0]),
        Channel::RowBuffer => ParamVector([1, 15, 0, 0]),
        Channel::Network => ParamVector([65351, 0, 0, 0]),
        Channel::DiskIo => ParamVector([50321, 10, 1, 0]),
        Channel::Tlb => ParamVector([10, 0, 0, 0]),
        Channel::Memory => ParamVector([2, 428, 1, 0]),
    }
}

/// Simulated measurement environment with a known optimum.
pub struct SimulatedPort {
    optimum: ParamVector,
    scales: [f64; NUM_PARAMS],
    noise: f64,
    hardware_counters: bool,
    rng: Mutex<ChaCha8Rng>,
    outstanding_load: AtomicUsize,
    contaminated: AtomicUsize,
    samples: AtomicUsize,
}

impl SimulatedPort {
    /// Create a port peaking at `optimum`.
    ///
    /// `scales` is the distance counted as one unit per dimension; a zero
    /// scale makes the dimension irrelevant.
    pub fn new(optimum: ParamVector, scales: [f64; NUM_PARAMS]) -> Self {
        Self {
            optimum,
            scales,
            noise: 0.01,
            hardware_counters: true,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(0)),
            outstanding_load: AtomicUsize::new(0),
            contaminated: AtomicUsize::new(0),
            samples: AtomicUsize::new(0),
        }
    }

    /// Port peaking at the channel's reference optimum, scaled by the
    /// channel's default mutation steps.
    pub fn for_channel(channel: Channel) -> Self {
        let mut scales = channel.default_initial_params().noise_steps();
        for scale in scales.iter_mut() {
            *scale = scale.max(1.0);
        }
        Self::new(reference_optimum(channel), scales)
    }

    /// Relative jitter per unit of distance.
    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise;
        self
    }

    /// Seed the jitter.
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
            ..self
        }
    }

    /// Behave like a virtual machine without hardware counters.
    pub fn without_hardware_counters(mut self) -> Self {
        self.hardware_counters = false;
        self
    }

    /// The optimum this port rewards.
    pub fn optimum(&self) -> ParamVector {
        self.optimum
    }

    /// Candidate samples taken while an earlier load was still running.
    pub fn contaminated_samples(&self) -> usize {
        self.contaminated.load(Ordering::SeqCst)
    }

    /// Total candidate samples taken.
    pub fn samples_taken(&self) -> usize {
        self.samples.load(Ordering::SeqCst)
    }

    /// Distance from the optimum in scale units, and whether every dimension
    /// is within one unit.
    fn distance(&self, params: &ParamVector) -> (f64, bool) {
        let mut distance = 0.0;
        let mut within = true;
        for i in 0..NUM_PARAMS {
            if self.scales[i] <= 0.0 {
                continue;
            }
            let units = (params[i] as f64 - self.optimum[i] as f64).abs() / self.scales[i];
            within &= units <= 1.0;
            distance += units;
        }
        (distance, within)
    }

    fn jitter(&self, amplitude: f64) -> f64 {
        if amplitude == 0.0 {
            return 0.0;
        }
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        amplitude * rng.random_range(-1.0..1.0)
    }

    fn check_regime(&self, regime: MeasurementRegime) -> Result<()> {
        if !self.hardware_counters && !regime.is_degraded() {
            return Err(MeasureError::Unsupported {
                metric: regime.primary_metric().to_string(),
                detail: "<not supported>".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MeasurementPort for SimulatedPort {
    async fn measure_candidate(
        &self,
        channel: Channel,
        params: &ParamVector,
        _concurrency: usize,
        regime: MeasurementRegime,
    ) -> Result<Metrics> {
        self.check_regime(regime)?;
        if self.outstanding_load.swap(1, Ordering::SeqCst) != 0 {
            self.contaminated.fetch_add(1, Ordering::SeqCst);
        }
        self.samples.fetch_add(1, Ordering::SeqCst);

        let (distance, within) = self.distance(params);
        let amplitude = if within { 0.0 } else { (self.noise * distance).min(MAX_JITTER) };

        let mut metrics = Metrics::new();
        if regime.is_degraded() {
            let clock = BASELINE_CLOCK_MS * (1.0 + self.jitter(amplitude));
            metrics.insert(regime.primary_metric().to_string(), clock);
        } else {
            let slowdown = PEAK_SLOWDOWN * (-distance / 4.0).exp();
            let cycles = BASELINE_CYCLES * slowdown * (1.0 + self.jitter(amplitude));
            metrics.insert(channel.secondary_metric().to_string(), BASELINE_SECONDARY);
            metrics.insert(regime.primary_metric().to_string(), cycles);
        }
        Ok(metrics)
    }

    async fn measure_baseline(&self, channel: Channel, regime: MeasurementRegime) -> Result<Metrics> {
        self.check_regime(regime)?;
        let mut metrics = Metrics::new();
        if regime.is_degraded() {
            metrics.insert(regime.primary_metric().to_string(), BASELINE_CLOCK_MS);
        } else {
            metrics.insert(channel.secondary_metric().to_string(), BASELINE_SECONDARY);
            metrics.insert(regime.primary_metric().to_string(), BASELINE_CYCLES);
        }
        Ok(metrics)
    }

    async fn teardown_load(&self) -> Result<()> {
        self.outstanding_load.store(0, Ordering::SeqCst);
        Ok(())
    }
}
