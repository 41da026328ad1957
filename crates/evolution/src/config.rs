//! Search configuration.

use polytune_core::{FixedParams, WeightMode};
use std::time::Duration;

use crate::{Result, SearchError};

/// Tunables of one genetic search run.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Candidates per generation
    pub pop_size: usize,

    /// Survivors kept as parents for the next generation
    pub elite_size: usize,

    /// Iteration budget
    pub max_iters: usize,

    /// Stop once the best score moves by no more than this
    pub stop_threshold: f64,

    /// Initial per-gene mutation probability
    pub mutation_p: f64,

    /// Momentum applied to the mutation probability (μ)
    pub momentum: f64,

    /// Step weight of the mutation probability update (α)
    pub step_weight: f64,

    /// Samples drawn per candidate
    pub samples_per_candidate: usize,

    /// Samples drawn for the isolation baseline
    pub baseline_samples: usize,

    /// Pause between baseline samples
    pub baseline_settle: Duration,

    /// Extra attempts for a generation whose evaluation failed
    pub max_eval_retries: usize,

    /// How the secondary metric is weighted
    pub weight_mode: WeightMode,

    /// Load generator instances per sample
    pub concurrency: usize,

    /// Dimensions pinned to their initial value during measurement
    pub fixed: FixedParams,

    /// RNG seed; `None` draws one from the OS
    pub seed: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            pop_size: 10,
            elite_size: 10,
            max_iters: 3000,
            stop_threshold: 1e-2,
            mutation_p: 0.01,
            momentum: 0.9,
            step_weight: 0.1,
            samples_per_candidate: 10,
            baseline_samples: 10,
            baseline_settle: Duration::from_millis(500),
            max_eval_retries: 3,
            weight_mode: WeightMode::default(),
            concurrency: 3,
            fixed: FixedParams::default(),
            seed: None,
        }
    }
}

impl SearchConfig {
    /// Set the population size.
    pub fn with_pop_size(mut self, pop_size: usize) -> Self {
        self.pop_size = pop_size;
        self
    }

    /// Set the elite size.
    pub fn with_elite_size(mut self, elite_size: usize) -> Self {
        self.elite_size = elite_size;
        self
    }

    /// Set the iteration budget.
    pub fn with_max_iters(mut self, max_iters: usize) -> Self {
        self.max_iters = max_iters;
        self
    }

    /// Set the stop threshold.
    pub fn with_stop_threshold(mut self, stop_threshold: f64) -> Self {
        self.stop_threshold = stop_threshold;
        self
    }

    /// Set the initial mutation probability.
    pub fn with_mutation_p(mut self, mutation_p: f64) -> Self {
        self.mutation_p = mutation_p;
        self
    }

    /// Set samples per candidate.
    pub fn with_samples_per_candidate(mut self, samples: usize) -> Self {
        self.samples_per_candidate = samples;
        self
    }

    /// Set baseline samples.
    pub fn with_baseline_samples(mut self, samples: usize) -> Self {
        self.baseline_samples = samples;
        self
    }

    /// Set the pause between baseline samples.
    pub fn with_baseline_settle(mut self, settle: Duration) -> Self {
        self.baseline_settle = settle;
        self
    }

    /// Set the retry budget for failed generations.
    pub fn with_max_eval_retries(mut self, retries: usize) -> Self {
        self.max_eval_retries = retries;
        self
    }

    /// Set the weight mode.
    pub fn with_weight_mode(mut self, mode: WeightMode) -> Self {
        self.weight_mode = mode;
        self
    }

    /// Load concurrency from the number of cores, leaving one for the victim.
    pub fn with_cores(mut self, ncores: usize) -> Self {
        self.concurrency = ncores.saturating_sub(1).max(1);
        self
    }

    /// Set the pinned dimensions.
    pub fn with_fixed(mut self, fixed: FixedParams) -> Self {
        self.fixed = fixed;
        self
    }

    /// Seed the search RNG.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Reject configurations the search cannot run with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(SearchError::InvalidConfig(msg));

        if self.pop_size == 0 {
            return invalid("pop_size must be at least 1".into());
        }
        if self.elite_size == 0 || self.elite_size > self.pop_size {
            return invalid(format!(
                "elite_size must be in 1..={} (got {})",
                self.pop_size, self.elite_size
            ));
        }
        if self.max_iters == 0 {
            return invalid("max_iters must be at least 1".into());
        }
        if !self.stop_threshold.is_finite() || self.stop_threshold < 0.0 {
            return invalid(format!("stop_threshold must be finite and >= 0 (got {})", self.stop_threshold));
        }
        if !(0.0..=1.0).contains(&self.mutation_p) {
            return invalid(format!("mutation_p must be within [0, 1] (got {})", self.mutation_p));
        }
        if !self.momentum.is_finite() || !self.step_weight.is_finite() || self.step_weight < 0.0 {
            return invalid("momentum and step_weight must be finite, step_weight >= 0".into());
        }
        if self.samples_per_candidate < 2 {
            return invalid("samples_per_candidate must be at least 2 to estimate variance".into());
        }
        if self.baseline_samples == 0 {
            return invalid("baseline_samples must be at least 1".into());
        }
        if self.concurrency == 0 {
            return invalid("concurrency must be at least 1".into());
        }
        Ok(())
    }
}
