//! Parameter vectors describing how contention load is generated.

use serde::{Deserialize, Serialize};

/// Number of tunable dimensions.
pub const NUM_PARAMS: usize = 4;

/// Input value marking a dimension as "do not mutate".
pub const FROZEN_SENTINEL: i64 = -1;

/// Errors raised while building parameter inputs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamError {
    /// Wrong number of values
    #[error("expected {NUM_PARAMS} parameters, got {0}")]
    WrongLength(usize),

    /// Negative value other than the frozen sentinel
    #[error("parameter {index} is {value}; only non-negative values or -1 are allowed")]
    Negative {
        /// Dimension index
        index: usize,
        /// Offending value
        value: i64,
    },

    /// Value that is not an integer
    #[error("invalid parameter '{0}'")]
    Invalid(String),
}

/// Four non-negative integers, one per tunable dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParamVector(pub [u64; NUM_PARAMS]);

impl ParamVector {
    /// Create a vector from its genes.
    pub fn new(genes: [u64; NUM_PARAMS]) -> Self {
        Self(genes)
    }

    /// Genes as a slice.
    pub fn genes(&self) -> &[u64; NUM_PARAMS] {
        &self.0
    }

    /// Value of one dimension.
    pub fn get(&self, index: usize) -> u64 {
        self.0[index]
    }
}

impl std::ops::Index<usize> for ParamVector {
    type Output = u64;

    fn index(&self, index: usize) -> &u64 {
        &self.0[index]
    }
}

impl std::ops::IndexMut<usize> for ParamVector {
    fn index_mut(&mut self, index: usize) -> &mut u64 {
        &mut self.0[index]
    }
}

impl std::fmt::Display for ParamVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{},{},{},{}", a, b, c, d)
    }
}

/// The caller's starting guess, where `-1` freezes a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialParams {
    raw: [i64; NUM_PARAMS],
}

impl InitialParams {
    /// Validate and wrap a raw initial vector.
    pub fn new(raw: [i64; NUM_PARAMS]) -> Result<Self, ParamError> {
        for (index, &value) in raw.iter().enumerate() {
            if value < 0 && value != FROZEN_SENTINEL {
                return Err(ParamError::Negative { index, value });
            }
        }
        Ok(Self { raw })
    }

    pub(crate) fn from_raw(raw: [i64; NUM_PARAMS]) -> Self {
        Self { raw }
    }

    /// The values as given, sentinel included.
    pub fn raw(&self) -> [i64; NUM_PARAMS] {
        self.raw
    }

    /// Whether a dimension carries the frozen sentinel.
    pub fn is_frozen(&self, index: usize) -> bool {
        self.raw[index] == FROZEN_SENTINEL
    }

    /// Initial vector with frozen dimensions normalised to 0.
    pub fn normalized(&self) -> ParamVector {
        let mut genes = [0u64; NUM_PARAMS];
        for (gene, &value) in genes.iter_mut().zip(self.raw.iter()) {
            *gene = value.max(0) as u64;
        }
        ParamVector(genes)
    }

    /// Per-dimension mutation standard deviation: `ceil(v / 10)`, 0 when frozen.
    pub fn noise_steps(&self) -> [f64; NUM_PARAMS] {
        let mut steps = [0.0; NUM_PARAMS];
        for (index, step) in steps.iter_mut().enumerate() {
            if !self.is_frozen(index) {
                *step = (self.raw[index] as f64 / 10.0).ceil();
            }
        }
        steps
    }
}

impl TryFrom<&[i64]> for InitialParams {
    type Error = ParamError;

    fn try_from(values: &[i64]) -> Result<Self, Self::Error> {
        let raw: [i64; NUM_PARAMS] = values
            .try_into()
            .map_err(|_| ParamError::WrongLength(values.len()))?;
        Self::new(raw)
    }
}

impl std::str::FromStr for InitialParams {
    type Err = ParamError;

    /// Parse a comma separated list such as `1,500,-1,-1`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|part| {
                let part = part.trim();
                part.parse::<i64>().map_err(|_| ParamError::Invalid(part.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::try_from(values.as_slice())
    }
}

/// Which of the first two dimensions are pinned to their initial value
/// when a candidate is measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedParams {
    /// Pin dimension 0
    pub param1: bool,
    /// Pin dimension 1
    pub param2: bool,
}

impl FixedParams {
    /// Candidate as it should be measured. The stored population is untouched.
    pub fn apply(&self, candidate: &ParamVector, initial: &ParamVector) -> ParamVector {
        let mut measured = *candidate;
        if self.param1 {
            measured[0] = initial[0];
        }
        if self.param2 {
            measured[1] = initial[1];
        }
        measured
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_normalized_to_zero() {
        let init = InitialParams::new([1, 500, -1, -1]).unwrap();
        assert_eq!(init.normalized(), ParamVector([1, 500, 0, 0]));
        assert!(init.is_frozen(2));
        assert!(!init.is_frozen(0));
    }

    #[test]
    fn test_noise_steps() {
        let init = InitialParams::new([1, 500, 0, -1]).unwrap();
        assert_eq!(init.noise_steps(), [1.0, 50.0, 0.0, 0.0]);

        let init = InitialParams::new([50, 50000, 1, 1]).unwrap();
        assert_eq!(init.noise_steps(), [5.0, 5000.0, 1.0, 1.0]);
    }

    #[test]
    fn test_negative_non_sentinel_rejected() {
        let err = InitialParams::new([1, -2, 0, 0]).unwrap_err();
        assert_eq!(err, ParamError::Negative { index: 1, value: -2 });
    }

    #[test]
    fn test_parse_from_str() {
        let init: InitialParams = "1, 500,-1,-1".parse().unwrap();
        assert_eq!(init.raw(), [1, 500, -1, -1]);

        assert_eq!("1,2,3".parse::<InitialParams>(), Err(ParamError::WrongLength(3)));
        assert!(matches!("1,x,3,4".parse::<InitialParams>(), Err(ParamError::Invalid(_))));
    }

    #[test]
    fn test_fixed_params_are_independent() {
        let initial = ParamVector([1, 500, 0, 0]);
        let candidate = ParamVector([7, 800, 3, 4]);

        let both = FixedParams { param1: true, param2: true };
        assert_eq!(both.apply(&candidate, &initial), ParamVector([1, 500, 3, 4]));

        let second = FixedParams { param1: false, param2: true };
        assert_eq!(second.apply(&candidate, &initial), ParamVector([7, 500, 3, 4]));

        let none = FixedParams::default();
        assert_eq!(none.apply(&candidate, &initial), candidate);
    }

    #[test]
    fn test_display() {
        assert_eq!(ParamVector([1, 835, 0, 0]).to_string(), "1,835,0,0");
    }
}
