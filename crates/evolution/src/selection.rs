//! Parent sampling.

use rand::Rng;
use rand_distr::{weighted::WeightedIndex, Distribution};

use crate::population::Elite;

/// Parent indices into the elite set, one pair per offspring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentDraw {
    /// First parent of each offspring
    pub first: Vec<usize>,
    /// Second parent of each offspring
    pub second: Vec<usize>,
}

/// Softmax with the maximum subtracted first.
///
/// `-inf` entries get probability 0. If no entry is finite the result is
/// uniform.
pub fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores
        .iter()
        .copied()
        .filter(|s| s.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return vec![1.0 / scores.len() as f64; scores.len()];
    }

    let exps: Vec<f64> = scores
        .iter()
        .map(|&s| if s.is_finite() { (s - max).exp() } else { 0.0 })
        .collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

/// Draw `count` first parents, then `count` second parents, independently
/// and with replacement, each with softmax probability of its score.
pub fn sample_parents<R: Rng>(elite: &Elite, count: usize, rng: &mut R) -> ParentDraw {
    let probs = softmax(&elite.scores);
    let draw = |rng: &mut R| -> Vec<usize> {
        match WeightedIndex::new(&probs) {
            Ok(dist) => (0..count).map(|_| dist.sample(rng)).collect(),
            Err(_) => (0..count).map(|_| rng.random_range(0..elite.len().max(1))).collect(),
        }
    };
    let first = draw(rng);
    let second = draw(rng);
    ParentDraw { first, second }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polytune_core::ParamVector;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_softmax_sums_to_one_and_orders() {
        let p = softmax(&[1.0, 2.0, 3.0]);
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(p[0] < p[1] && p[1] < p[2]);
    }

    #[test]
    fn test_softmax_stable_for_large_scores() {
        let p = softmax(&[1e6, 1e6 + 1.0]);
        assert!(p.iter().all(|x| x.is_finite()));
        assert!((p[1] - 1.0 / (1.0 + (-1.0f64).exp())).abs() < 1e-12);
    }

    #[test]
    fn test_softmax_unscored_get_zero() {
        let p = softmax(&[f64::NEG_INFINITY, 0.0]);
        assert_eq!(p, vec![0.0, 1.0]);
        let p = softmax(&[f64::NEG_INFINITY, f64::NEG_INFINITY]);
        assert_eq!(p, vec![0.5, 0.5]);
    }

    #[test]
    fn test_parents_never_unscored() {
        let elite = Elite {
            members: vec![ParamVector([1, 0, 0, 0]), ParamVector([2, 0, 0, 0])],
            scores: vec![f64::NEG_INFINITY, 1.0],
        };
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let draw = sample_parents(&elite, 50, &mut rng);
        assert_eq!(draw.first.len(), 50);
        assert_eq!(draw.second.len(), 50);
        assert!(draw.first.iter().chain(draw.second.iter()).all(|&i| i == 1));
    }
}
