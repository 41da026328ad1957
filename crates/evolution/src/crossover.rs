//! Uniform crossover.

use polytune_core::{ParamVector, NUM_PARAMS};
use rand::Rng;

use crate::population::Population;
use crate::selection::ParentDraw;

/// Build one offspring per parent pair, taking each gene from either parent
/// with equal probability.
pub fn crossover<R: Rng>(parents: &[ParamVector], draw: &ParentDraw, rng: &mut R) -> Population {
    let members = draw
        .first
        .iter()
        .zip(draw.second.iter())
        .map(|(&a, &b)| {
            let (a, b) = (&parents[a], &parents[b]);
            let mut child = [0u64; NUM_PARAMS];
            for (i, gene) in child.iter_mut().enumerate() {
                *gene = if rng.random_bool(0.5) { a[i] } else { b[i] };
            }
            ParamVector(child)
        })
        .collect();
    Population::from_members(members)
}
