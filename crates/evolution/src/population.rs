//! Populations and elite selection.

use polytune_core::ParamVector;
use serde::Serialize;

/// An ordered set of candidate parameter vectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Population {
    members: Vec<ParamVector>,
}

impl Population {
    /// `size` copies of one vector.
    pub fn uniform(initial: ParamVector, size: usize) -> Self {
        Self {
            members: vec![initial; size],
        }
    }

    /// Wrap an explicit list of members.
    pub fn from_members(members: Vec<ParamVector>) -> Self {
        Self { members }
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the population is empty.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members in order.
    pub fn members(&self) -> &[ParamVector] {
        &self.members
    }

    /// Iterate over the members.
    pub fn iter(&self) -> std::slice::Iter<'_, ParamVector> {
        self.members.iter()
    }

    /// Last member.
    pub fn last(&self) -> Option<&ParamVector> {
        self.members.last()
    }
}

/// Highest-scoring members of a generation, in ascending score order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Elite {
    /// Members, worst first
    pub members: Vec<ParamVector>,
    /// Score of each member; unscored members carry `-inf`
    pub scores: Vec<f64>,
}

impl Elite {
    /// Best member (the last one).
    pub fn best(&self) -> Option<&ParamVector> {
        self.members.last()
    }

    /// Score of the best member.
    pub fn best_score(&self) -> f64 {
        self.scores.last().copied().unwrap_or(f64::NEG_INFINITY)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the elite set is empty.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Keep the `elite_size` best members.
///
/// Members are sorted ascending by score with a stable sort, so ties keep
/// population order, and the last `elite_size` are kept. Unscored members
/// rank below every scored one.
pub fn select_elite(population: &Population, scores: &[Option<f64>], elite_size: usize) -> Elite {
    let rank = |i: usize| -> f64 {
        match scores.get(i).copied().flatten() {
            Some(s) if !s.is_nan() => s,
            _ => f64::NEG_INFINITY,
        }
    };

    let mut order: Vec<usize> = (0..population.len()).collect();
    order.sort_by(|&a, &b| rank(a).total_cmp(&rank(b)));

    let keep = elite_size.min(order.len());
    let top = &order[order.len() - keep..];
    Elite {
        members: top.iter().map(|&i| population.members[i]).collect(),
        scores: top.iter().map(|&i| rank(i)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pop() -> Population {
        Population::from_members(vec![
            ParamVector([1, 0, 0, 0]),
            ParamVector([2, 0, 0, 0]),
            ParamVector([3, 0, 0, 0]),
            ParamVector([4, 0, 0, 0]),
        ])
    }

    #[test]
    fn test_elite_sorted_ascending() {
        let scores = [Some(3.0), Some(1.0), Some(4.0), Some(2.0)];
        let elite = select_elite(&pop(), &scores, 2);
        assert_eq!(elite.members, vec![ParamVector([1, 0, 0, 0]), ParamVector([3, 0, 0, 0])]);
        assert_eq!(elite.scores, vec![3.0, 4.0]);
        assert_eq!(elite.best(), Some(&ParamVector([3, 0, 0, 0])));
        assert_eq!(elite.best_score(), 4.0);
    }

    #[test]
    fn test_full_elite_is_a_permutation() {
        let scores = [Some(0.5), Some(-1.0), Some(0.5), Some(9.0)];
        let population = pop();
        let elite = select_elite(&population, &scores, 4);
        let mut got = elite.members.clone();
        got.sort_by_key(|v| v.0);
        assert_eq!(got, population.members());
        // ties keep population order
        assert_eq!(elite.members[1], ParamVector([1, 0, 0, 0]));
        assert_eq!(elite.members[2], ParamVector([3, 0, 0, 0]));
    }

    #[test]
    fn test_unscored_rank_lowest() {
        let scores = [None, Some(-5.0), Some(f64::NAN), Some(-7.0)];
        let elite = select_elite(&pop(), &scores, 2);
        assert_eq!(elite.members, vec![ParamVector([4, 0, 0, 0]), ParamVector([2, 0, 0, 0])]);
        assert_eq!(elite.best_score(), -5.0);
    }

    #[test]
    fn test_uniform_population() {
        let p = Population::uniform(ParamVector([1, 500, 0, 0]), 10);
        assert_eq!(p.len(), 10);
        assert!(p.iter().all(|v| *v == ParamVector([1, 500, 0, 0])));
    }
}
