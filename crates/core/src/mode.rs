//! Scoring modes.

use serde::{Deserialize, Serialize};

/// How the primary and secondary metrics are combined into one score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightMode {
    /// Weight by the ratio of post-trim variances
    Variation,
    /// Weight by how much more the secondary metric swings than the primary
    #[default]
    Sensitivity,
}

/// Error returned when a weight mode name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown weight mode '{0}' (expected variation|sensitivity or 1|2)")]
pub struct ParseWeightModeError(pub String);

impl std::str::FromStr for WeightMode {
    type Err = ParseWeightModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "variation" | "1" => Ok(WeightMode::Variation),
            "sensitivity" | "2" => Ok(WeightMode::Sensitivity),
            _ => Err(ParseWeightModeError(s.to_string())),
        }
    }
}

impl std::fmt::Display for WeightMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WeightMode::Variation => f.write_str("variation"),
            WeightMode::Sensitivity => f.write_str("sensitivity"),
        }
    }
}

/// Which counters the measurement environment can provide.
///
/// A run starts in `Full` and may fall back to `Degraded` once; it never
/// returns to `Full`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementRegime {
    /// Hardware counters available: primary + channel-specific secondary metric
    #[default]
    Full,
    /// Only a coarse timing metric is available
    Degraded,
}

impl MeasurementRegime {
    /// Metric every sample must contain in this regime.
    pub fn primary_metric(&self) -> &'static str {
        match self {
            MeasurementRegime::Full => "cycles",
            MeasurementRegime::Degraded => "task-clock",
        }
    }

    /// Whether this is the timing-only fallback.
    pub fn is_degraded(&self) -> bool {
        matches!(self, MeasurementRegime::Degraded)
    }
}

impl std::fmt::Display for MeasurementRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MeasurementRegime::Full => f.write_str("full"),
            MeasurementRegime::Degraded => f.write_str("degraded"),
        }
    }
}
