//! Gaussian mutation and the adaptive mutation probability.

use polytune_core::{ParamVector, NUM_PARAMS};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::population::Population;

/// Apply one gene's perturbation.
///
/// The value is truncated toward zero; a result below zero reverts to the
/// unmutated value.
pub fn mutate_gene(value: u64, noise: f64, apply: bool) -> u64 {
    if !apply {
        return value;
    }
    let mutated = value as f64 + noise;
    if mutated < 0.0 || !mutated.is_finite() {
        value
    } else {
        mutated as u64
    }
}

/// Perturb every gene with probability `p` by Gaussian noise scaled by the
/// dimension's step. A zero step leaves the dimension unchanged.
pub fn mutate<R: Rng>(offspring: &Population, p: f64, steps: &[f64; NUM_PARAMS], rng: &mut R) -> Population {
    let members = offspring
        .iter()
        .map(|parent| {
            let mut child = [0u64; NUM_PARAMS];
            for i in 0..NUM_PARAMS {
                let z: f64 = StandardNormal.sample(rng);
                let apply = rng.random::<f64>() < p;
                child[i] = mutate_gene(parent[i], z * steps[i], apply);
            }
            ParamVector(child)
        })
        .collect();
    Population::from_members(members)
}

/// Momentum update of the mutation probability.
///
/// Smaller score changes raise the probability so a stalled search explores
/// more; large changes let it decay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MomentumRule {
    /// Decay applied to the previous probability (μ)
    pub momentum: f64,
    /// Step weight (α)
    pub step_weight: f64,
}

impl Default for MomentumRule {
    fn default() -> Self {
        Self {
            momentum: 0.9,
            step_weight: 0.1,
        }
    }
}

impl MomentumRule {
    /// Next probability given the previous and current best scores.
    /// Unchanged when the scores are equal. Clamped to `[0, 1]`.
    pub fn update(&self, p: f64, prev_best: f64, cur_best: f64) -> f64 {
        if prev_best == cur_best {
            return p;
        }
        let diff = (prev_best - cur_best).abs();
        let step = (self.step_weight / diff).min(0.5);
        let next = p * self.momentum + if step.is_finite() { step } else { 0.0 };
        next.clamp(0.0, 1.0)
    }
}
