//! Search controller - drives generations until the best score settles.

use chrono::Utc;
use polytune_core::{Channel, GenerationRecord, InitialParams, MeasurementRegime, ParamVector, RunId, NUM_PARAMS};
use polytune_measure::{MeasureError, MeasurementPort};
use polytune_storage::GenerationSink;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::crossover::crossover;
use crate::fitness::{Baseline, NoisyEvaluator};
use crate::mutation::{mutate, MomentumRule};
use crate::population::{select_elite, Elite, Population};
use crate::selection::sample_parents;
use crate::{EvaluationFailure, Result, SearchConfig, SearchError};

/// Where the controller is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchState {
    /// Population built, nothing measured yet
    Init,
    /// Measuring the isolation baseline
    MeasuringBaseline,
    /// Sampling candidates
    Evaluating,
    /// Ranking and keeping the elite
    Selecting,
    /// Building offspring
    Recombining,
    /// Perturbing offspring
    Mutating,
    /// Finished
    Done,
}

/// Result of one generation.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    /// 1-based iteration number
    pub iteration: usize,
    /// Best elite score
    pub best_score: f64,
    /// Change from the previous generation's best; infinite for the first
    pub score_diff: f64,
    /// Best member of the generation
    pub best_params: ParamVector,
    /// Mutation probability after the momentum update
    pub mutation_p: f64,
    /// Regime the generation was scored in
    pub regime: MeasurementRegime,
    /// Whether the best-so-far improved
    pub new_best: bool,
    /// Candidates that received a score
    pub scored: usize,
    /// Elite set, worst first
    pub elite: Elite,
}

/// Result of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    /// Run identifier
    pub run_id: RunId,
    /// Channel tuned
    pub channel: Channel,
    /// Best member of the last measured generation (the last entry of its
    /// ascending elite set). This is not a freshly mutated offspring; those
    /// are in `next_population` and were never measured.
    pub final_params: ParamVector,
    /// Whether the stop threshold was reached within the budget
    pub converged: bool,
    /// Best vector seen over the whole run
    pub best_params: ParamVector,
    /// Score of `best_params`
    pub best_score: f64,
    /// Generations evaluated
    pub iterations: usize,
    /// Regime at the end of the run
    pub regime: MeasurementRegime,
    /// Baseline the scores were normalised by
    pub baseline: Option<Baseline>,
    /// Offspring produced after the last evaluation, never measured
    pub next_population: Population,
}

/// Genetic search over one channel's load parameters.
///
/// Measurements go strictly one at a time through the port: every
/// candidate sample is followed by a teardown before the next one starts.
pub struct SearchController<P: MeasurementPort> {
    port: P,
    config: SearchConfig,
    evaluator: NoisyEvaluator,
    momentum: MomentumRule,
    steps: [f64; NUM_PARAMS],
    population: Population,
    regime: MeasurementRegime,
    baseline: Option<Baseline>,
    mutation_p: f64,
    prev_best: Option<f64>,
    best: Option<(f64, ParamVector)>,
    last_elite: Option<Elite>,
    iteration: usize,
    state: SearchState,
    rng: ChaCha8Rng,
    sink: Option<Box<dyn GenerationSink>>,
    run_id: RunId,
}

impl<P: MeasurementPort> SearchController<P> {
    /// Build a controller with a population of copies of the initial vector.
    pub fn new(port: P, channel: Channel, initial: InitialParams, config: SearchConfig) -> Result<Self> {
        config.validate()?;

        let start = initial.normalized();
        let seed = config.seed.unwrap_or_else(rand::random);
        debug!("Search RNG seed: {}", seed);
        let rng = ChaCha8Rng::seed_from_u64(seed);
        let evaluator = NoisyEvaluator {
            channel,
            concurrency: config.concurrency,
            samples: config.samples_per_candidate,
            weight_mode: config.weight_mode,
            fixed: config.fixed,
            initial: start,
        };

        Ok(Self {
            port,
            evaluator,
            momentum: MomentumRule {
                momentum: config.momentum,
                step_weight: config.step_weight,
            },
            steps: initial.noise_steps(),
            population: Population::uniform(start, config.pop_size),
            regime: MeasurementRegime::Full,
            baseline: None,
            mutation_p: config.mutation_p,
            prev_best: None,
            best: None,
            last_elite: None,
            iteration: 0,
            state: SearchState::Init,
            rng,
            sink: None,
            run_id: RunId::new(),
            config,
        })
    }

    /// Send a record of every generation to `sink`.
    pub fn with_sink(mut self, sink: Box<dyn GenerationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Current population.
    pub fn population(&self) -> &Population {
        &self.population
    }

    /// Current measurement regime.
    pub fn regime(&self) -> MeasurementRegime {
        self.regime
    }

    /// Current mutation probability.
    pub fn mutation_p(&self) -> f64 {
        self.mutation_p
    }

    /// Per-dimension mutation steps.
    pub fn noise_steps(&self) -> &[f64; NUM_PARAMS] {
        &self.steps
    }

    /// Generations completed so far.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Current state.
    pub fn state(&self) -> SearchState {
        self.state
    }

    /// Baseline in use, once measured.
    pub fn baseline(&self) -> Option<&Baseline> {
        self.baseline.as_ref()
    }

    /// The measurement port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Identifier stamped on every record of this run.
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    async fn measure_baseline(&self, regime: MeasurementRegime) -> std::result::Result<Baseline, MeasureError> {
        let channel = self.evaluator.channel;
        let samples = self.config.baseline_samples;
        let mut primary = Vec::with_capacity(samples);
        let mut secondary = Vec::with_capacity(samples);

        for i in 0..samples {
            let metrics = self.port.measure_baseline(channel, regime).await?;
            let name = regime.primary_metric();
            primary.push(
                *metrics
                    .get(name)
                    .ok_or_else(|| MeasureError::MissingMetric(name.to_string()))?,
            );
            if !regime.is_degraded() {
                let name = channel.secondary_metric();
                secondary.push(
                    *metrics
                        .get(name)
                        .ok_or_else(|| MeasureError::MissingMetric(name.to_string()))?,
                );
            }
            if i + 1 < samples && !self.config.baseline_settle.is_zero() {
                tokio::time::sleep(self.config.baseline_settle).await;
            }
        }

        Baseline::from_samples(regime, &primary, &secondary)
            .ok_or_else(|| MeasureError::MissingMetric(regime.primary_metric().to_string()))
    }

    /// Probe the environment by measuring the baseline.
    ///
    /// A failing `Full` baseline switches the run to `Degraded` for good; a
    /// failing `Degraded` baseline ends the run.
    pub async fn acquire_baseline(&mut self) -> Result<MeasurementRegime> {
        self.state = SearchState::MeasuringBaseline;

        if self.regime == MeasurementRegime::Full {
            match self.measure_baseline(MeasurementRegime::Full).await {
                Ok(baseline) => {
                    info!(
                        "Baseline for {}: {}={:.1} {}={:?}",
                        self.evaluator.channel,
                        MeasurementRegime::Full.primary_metric(),
                        baseline.primary,
                        self.evaluator.channel.secondary_metric(),
                        baseline.secondary
                    );
                    self.baseline = Some(baseline);
                    return Ok(self.regime);
                }
                Err(e) => {
                    warn!("Hardware counters unavailable ({}), falling back to degraded measurement", e);
                    self.regime = MeasurementRegime::Degraded;
                }
            }
        }

        self.acquire_degraded_baseline().await?;
        Ok(self.regime)
    }

    async fn acquire_degraded_baseline(&mut self) -> Result<()> {
        let regime = MeasurementRegime::Degraded;
        let baseline = self.measure_baseline(regime).await.map_err(|source| {
            error!("Degraded baseline failed: {}", source);
            SearchError::Baseline { regime, source }
        })?;
        info!(
            "Baseline for {}: {}={:.3}",
            self.evaluator.channel,
            regime.primary_metric(),
            baseline.primary
        );
        self.baseline = Some(baseline);
        Ok(())
    }

    async fn evaluate_with_retries(&mut self) -> Result<Vec<Option<f64>>> {
        let iteration = self.iteration + 1;
        let mut attempts = 0;

        loop {
            self.state = SearchState::Evaluating;
            let result = self
                .evaluator
                .evaluate(&self.port, &self.population, self.regime, self.baseline.as_ref())
                .await;
            let failure = match result {
                Ok(scores) if scores.iter().any(Option::is_some) => return Ok(scores),
                Ok(_) => EvaluationFailure::Unscored,
                Err(e) if e.is_unsupported() && self.regime == MeasurementRegime::Full => {
                    warn!(
                        "Generation {}: hardware counters stopped working ({}), switching to degraded measurement",
                        iteration, e
                    );
                    self.regime = MeasurementRegime::Degraded;
                    self.state = SearchState::MeasuringBaseline;
                    self.acquire_degraded_baseline().await?;
                    continue;
                }
                Err(e) if e.is_unsupported() => {
                    return Err(SearchError::Evaluation {
                        iteration,
                        attempts: attempts + 1,
                        source: e.into(),
                    });
                }
                Err(e) => EvaluationFailure::Measure(e),
            };

            attempts += 1;
            if attempts > self.config.max_eval_retries {
                error!("Generation {} failed {} times: {}", iteration, attempts, failure);
                return Err(SearchError::Evaluation {
                    iteration,
                    attempts,
                    source: failure,
                });
            }
            warn!(
                "Generation {} evaluation failed ({}), retrying ({}/{})",
                iteration, failure, attempts, self.config.max_eval_retries
            );
        }
    }

    /// Evaluate the current population and breed the next one.
    pub async fn run_generation(&mut self) -> Result<GenerationReport> {
        if self.baseline.is_none() {
            self.acquire_baseline().await?;
        }

        let scores = self.evaluate_with_retries().await?;
        let scored = scores.iter().filter(|s| s.is_some()).count();

        self.state = SearchState::Selecting;
        let elite = select_elite(&self.population, &scores, self.config.elite_size);
        let cur_best = elite.best_score();
        let best_params = elite.best().copied().unwrap_or_default();

        let score_diff = match self.prev_best {
            Some(prev) => {
                self.mutation_p = self.momentum.update(self.mutation_p, prev, cur_best);
                (cur_best - prev).abs()
            }
            None => f64::INFINITY,
        };

        self.state = SearchState::Recombining;
        let draw = sample_parents(&elite, self.config.pop_size, &mut self.rng);
        let offspring = crossover(&elite.members, &draw, &mut self.rng);

        self.state = SearchState::Mutating;
        self.population = mutate(&offspring, self.mutation_p, &self.steps, &mut self.rng);

        let new_best = match self.best {
            Some((score, _)) => cur_best > score,
            None => true,
        };
        if new_best {
            self.best = Some((cur_best, best_params));
        }

        self.prev_best = Some(cur_best);
        self.iteration += 1;

        info!(
            "[{}] iteration {}: best={:.6} diff={:.6} p={:.4} params=[{}]{}",
            self.evaluator.channel,
            self.iteration,
            cur_best,
            score_diff,
            self.mutation_p,
            best_params,
            if new_best { " (new best)" } else { "" }
        );
        debug!("Next population: {:?}", self.population.members());

        if let Some(sink) = self.sink.as_mut() {
            sink.record(&GenerationRecord {
                run_id: self.run_id,
                channel: self.evaluator.channel,
                iteration: self.iteration,
                best_score: cur_best,
                score_diff,
                best_params,
                mutation_p: self.mutation_p,
                regime: self.regime,
                new_best,
                recorded_at: Utc::now(),
            })
            .await?;
        }

        self.last_elite = Some(elite.clone());
        Ok(GenerationReport {
            iteration: self.iteration,
            best_score: cur_best,
            score_diff,
            best_params,
            mutation_p: self.mutation_p,
            regime: self.regime,
            new_best,
            scored,
            elite,
        })
    }

    /// Run generations until the best score settles or the budget is spent.
    pub async fn run(&mut self) -> Result<SearchOutcome> {
        info!(
            "Tuning {} from [{}] (pop={}, elite={}, max_iters={}, mode={})",
            self.evaluator.channel,
            self.evaluator.initial,
            self.config.pop_size,
            self.config.elite_size,
            self.config.max_iters,
            self.config.weight_mode
        );

        if self.baseline.is_none() {
            self.acquire_baseline().await?;
        }

        let mut settled = false;
        while self.iteration < self.config.max_iters {
            let report = self.run_generation().await?;
            if report.score_diff <= self.config.stop_threshold {
                settled = true;
                break;
            }
        }
        self.state = SearchState::Done;

        let final_params = self
            .last_elite
            .as_ref()
            .and_then(|e| e.best().copied())
            .unwrap_or(self.evaluator.initial);
        let (best_score, best_params) = self.best.unwrap_or((f64::NEG_INFINITY, final_params));
        let converged = settled && self.iteration < self.config.max_iters;

        if let Some(sink) = self.sink.as_mut() {
            sink.flush().await?;
        }

        info!(
            "[{}] finished after {} iterations: params=[{}] converged={} best=[{}] ({:.6})",
            self.evaluator.channel, self.iteration, final_params, converged, best_params, best_score
        );

        Ok(SearchOutcome {
            run_id: self.run_id,
            channel: self.evaluator.channel,
            final_params,
            converged,
            best_params,
            best_score,
            iterations: self.iteration,
            regime: self.regime,
            baseline: self.baseline,
            next_population: self.population.clone(),
        })
    }
}
