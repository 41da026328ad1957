//! Noisy fitness evaluation.
//!
//! Every candidate is sampled several times. Samples are normalised by the
//! isolation baseline, outliers are trimmed by variance, and the result is
//! folded into one score where higher is better:
//!
//! - `Full`: `primary + weight * secondary` of the last sample, with the
//!   weight derived from how the two metrics vary across samples
//! - `Degraded`: the negated variance of the timing metric

use polytune_core::{Channel, FixedParams, MeasurementRegime, Metrics, ParamVector, WeightMode};
use polytune_measure::{MeasureError, MeasurementPort};
use serde::Serialize;
use tracing::{debug, warn};

use crate::population::Population;
use crate::stats::{argmax, argmin, mean, ratio_or_zero, trim_outliers};

/// Mean metric values of the victim running alone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Baseline {
    /// Mean primary metric
    pub primary: f64,
    /// Mean secondary metric, `Full` regime only
    pub secondary: Option<f64>,
    /// Regime the baseline was measured in
    pub regime: MeasurementRegime,
}

impl Baseline {
    /// Average a set of baseline samples.
    pub fn from_samples(
        regime: MeasurementRegime,
        primary: &[f64],
        secondary: &[f64],
    ) -> Option<Self> {
        Some(Self {
            primary: mean(primary)?,
            secondary: if regime.is_degraded() { None } else { mean(secondary) },
            regime,
        })
    }

    fn normalize_primary(&self, value: f64) -> f64 {
        normalize(value, Some(self.primary))
    }

    fn normalize_secondary(&self, value: f64) -> f64 {
        normalize(value, self.secondary)
    }
}

fn normalize(value: f64, base: Option<f64>) -> f64 {
    match base {
        Some(base) if base != 0.0 && base.is_finite() => value / base,
        _ => value,
    }
}

/// How a score was put together.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitnessBreakdown {
    /// Final score, higher is better
    pub score: f64,
    /// Primary contribution (normalised primary of the last sample)
    pub primary: f64,
    /// Normalised secondary of the last sample
    pub secondary: f64,
    /// Weight applied to the secondary metric
    pub weight: f64,
    /// Post-trim variance of the primary metric
    pub primary_variance: f64,
    /// Post-trim variance of the secondary metric
    pub secondary_variance: f64,
    /// Samples that contributed
    pub samples: usize,
}

/// Ratio of the secondary metric's swing to the primary's, taken at the
/// samples where the primary metric is largest and smallest.
///
/// Uses the untrimmed samples. Returns 0 when either swing is degenerate.
pub fn sensitivity_weight(primary: &[f64], secondary: &[f64]) -> f64 {
    let (Some(hi), Some(lo)) = (argmax(primary), argmin(primary)) else {
        return 0.0;
    };
    if hi >= secondary.len() || lo >= secondary.len() {
        return 0.0;
    }
    let primary_ratio = ratio_or_zero(primary[hi], primary[lo]);
    let secondary_ratio = ratio_or_zero(secondary[hi], secondary[lo]);
    ratio_or_zero(secondary_ratio, primary_ratio)
}

/// Ratio of the post-trim primary variance to the post-trim secondary variance.
pub fn variation_weight(primary_variance: f64, secondary_variance: f64) -> f64 {
    ratio_or_zero(primary_variance, secondary_variance)
}

/// Score a candidate from normalised `(primary, secondary)` pairs in the
/// order they were drawn. `None` below two pairs.
pub fn score_full(pairs: &[(f64, f64)], mode: WeightMode) -> Option<FitnessBreakdown> {
    if pairs.len() < 2 {
        return None;
    }
    let primary: Vec<f64> = pairs.iter().map(|p| p.0).collect();
    let secondary: Vec<f64> = pairs.iter().map(|p| p.1).collect();

    let sensitivity = sensitivity_weight(&primary, &secondary);

    let primary_variance = trim_outliers(&mut primary.clone())?;
    let secondary_variance = trim_outliers(&mut secondary.clone())?;

    let weight = match mode {
        WeightMode::Sensitivity => sensitivity,
        WeightMode::Variation => variation_weight(primary_variance, secondary_variance),
    };

    let (p_last, s_last) = *pairs.last()?;
    Some(FitnessBreakdown {
        score: p_last + weight * s_last,
        primary: p_last,
        secondary: s_last,
        weight,
        primary_variance,
        secondary_variance,
        samples: pairs.len(),
    })
}

/// Score a candidate from normalised timing samples: the steadier, the better.
pub fn score_degraded(samples: &[f64]) -> Option<FitnessBreakdown> {
    let last = *samples.last()?;
    let variance = trim_outliers(&mut samples.to_vec())?;
    Some(FitnessBreakdown {
        score: -variance,
        primary: last,
        secondary: 0.0,
        weight: 0.0,
        primary_variance: variance,
        secondary_variance: 0.0,
        samples: samples.len(),
    })
}

/// Samples and scores candidates through a measurement port.
#[derive(Debug, Clone)]
pub struct NoisyEvaluator {
    /// Channel under test
    pub channel: Channel,
    /// Load generator instances per sample
    pub concurrency: usize,
    /// Samples per candidate
    pub samples: usize,
    /// Secondary weighting
    pub weight_mode: WeightMode,
    /// Pinned dimensions
    pub fixed: FixedParams,
    /// Values substituted for pinned dimensions
    pub initial: ParamVector,
}

impl NoisyEvaluator {
    /// Score every member of a population, in population order.
    ///
    /// A candidate without enough valid samples scores `None`. Measurement
    /// errors other than a missing metric abort the evaluation; the load is
    /// torn down after every sample either way.
    pub async fn evaluate<P: MeasurementPort + ?Sized>(
        &self,
        port: &P,
        population: &Population,
        regime: MeasurementRegime,
        baseline: Option<&Baseline>,
    ) -> Result<Vec<Option<f64>>, MeasureError> {
        let mut scores = Vec::with_capacity(population.len());
        for (index, candidate) in population.iter().enumerate() {
            let breakdown = self.evaluate_candidate(port, candidate, regime, baseline).await?;
            match &breakdown {
                Some(b) => debug!(
                    "Candidate {} [{}]: score={:.6} weight={:.4} samples={}",
                    index, candidate, b.score, b.weight, b.samples
                ),
                None => warn!("Candidate {} [{}] has too few valid samples", index, candidate),
            }
            scores.push(breakdown.map(|b| b.score));
        }
        Ok(scores)
    }

    /// Sample and score one candidate.
    pub async fn evaluate_candidate<P: MeasurementPort + ?Sized>(
        &self,
        port: &P,
        candidate: &ParamVector,
        regime: MeasurementRegime,
        baseline: Option<&Baseline>,
    ) -> Result<Option<FitnessBreakdown>, MeasureError> {
        let measured = self.fixed.apply(candidate, &self.initial);
        let mut samples = Vec::with_capacity(self.samples);

        for _ in 0..self.samples {
            let result = port
                .measure_candidate(self.channel, &measured, self.concurrency, regime)
                .await;
            let teardown = port.teardown_load().await;

            let metrics = match result {
                Ok(metrics) => metrics,
                Err(MeasureError::MissingMetric(name)) => {
                    debug!("Sample for [{}] lacks {}", measured, name);
                    teardown?;
                    continue;
                }
                Err(e) => {
                    // a failed teardown takes precedence over the sample error
                    if let Err(te) = teardown {
                        warn!("Sample for [{}] failed ({}) and its teardown failed too", measured, e);
                        return Err(te);
                    }
                    return Err(e);
                }
            };
            teardown?;

            if let Some(sample) = self.extract(&metrics, regime, baseline) {
                samples.push(sample);
            } else {
                debug!("Sample for [{}] is missing a required metric", measured);
            }
        }

        Ok(match regime {
            MeasurementRegime::Full => score_full(&samples, self.weight_mode),
            MeasurementRegime::Degraded => {
                let clocks: Vec<f64> = samples.iter().map(|s| s.0).collect();
                score_degraded(&clocks)
            }
        })
    }

    fn extract(
        &self,
        metrics: &Metrics,
        regime: MeasurementRegime,
        baseline: Option<&Baseline>,
    ) -> Option<(f64, f64)> {
        let primary = *metrics.get(regime.primary_metric())?;
        let primary = baseline.map_or(primary, |b| b.normalize_primary(primary));
        if regime.is_degraded() {
            return Some((primary, 0.0));
        }
        let secondary = *metrics.get(self.channel.secondary_metric())?;
        let secondary = baseline.map_or(secondary, |b| b.normalize_secondary(secondary));
        Some((primary, secondary))
    }
}
