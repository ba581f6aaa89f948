use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{CalculationError, Result};
use crate::models::Metric;
use crate::scoring::ComponentScores;

/// Overall recovery status derived from the composite score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecoveryStatus {
    Poor,
    Moderate,
    Good,
    Optimal,
}

impl RecoveryStatus {
    pub fn description(&self) -> &'static str {
        match self {
            RecoveryStatus::Optimal => "Fully recovered, ready for high-intensity work",
            RecoveryStatus::Good => "Recovered, normal training is appropriate",
            RecoveryStatus::Moderate => "Partially recovered, keep intensity low",
            RecoveryStatus::Poor => "Under-recovered, prioritize rest",
        }
    }
}

impl fmt::Display for RecoveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RecoveryStatus::Optimal => "OPTIMAL",
            RecoveryStatus::Good => "GOOD",
            RecoveryStatus::Moderate => "MODERATE",
            RecoveryStatus::Poor => "POOR",
        };
        write!(f, "{}", label)
    }
}

/// Lower bounds (inclusive) of each status band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusCutPoints {
    pub optimal: f64,
    pub good: f64,
    pub moderate: f64,
}

impl Default for StatusCutPoints {
    fn default() -> Self {
        StatusCutPoints {
            optimal: 80.0,
            good: 65.0,
            moderate: 50.0,
        }
    }
}

impl StatusCutPoints {
    pub fn status(&self, score: f64) -> RecoveryStatus {
        if score >= self.optimal {
            RecoveryStatus::Optimal
        } else if score >= self.good {
            RecoveryStatus::Good
        } else if score >= self.moderate {
            RecoveryStatus::Moderate
        } else {
            RecoveryStatus::Poor
        }
    }
}

/// Composite weights and status bands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessConfig {
    /// Nominal weight per metric; renormalized over the metrics present
    pub weights: BTreeMap<Metric, f64>,
    pub cut_points: StatusCutPoints,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        let weights = BTreeMap::from([
            (Metric::RestingHr, 0.25),
            (Metric::Hrv, 0.30),
            (Metric::Sleep, 0.20),
            (Metric::ReadinessIndex, 0.15),
            (Metric::Temperature, 0.05),
            (Metric::Spo2, 0.05),
        ]);
        ReadinessConfig {
            weights,
            cut_points: StatusCutPoints::default(),
        }
    }
}

/// Weighted readiness score for one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeReadiness {
    /// Composite score in [0, 100]
    pub score: f64,
    pub status: RecoveryStatus,

    /// Effective weights after renormalization
    pub weights: BTreeMap<Metric, f64>,

    /// Metrics that contributed
    pub metrics_used: Vec<Metric>,
}

/// Combines component scores into one readiness score
pub struct ReadinessCalculator {
    config: ReadinessConfig,
}

impl ReadinessCalculator {
    pub fn new() -> Self {
        ReadinessCalculator {
            config: ReadinessConfig::default(),
        }
    }

    pub fn with_config(config: ReadinessConfig) -> Self {
        ReadinessCalculator { config }
    }

    /// Weights of the present metrics, rescaled to sum to one
    ///
    /// Metrics with no configured (or a zero) weight are ignored.
    pub fn normalized_weights(&self, present: &[Metric]) -> BTreeMap<Metric, f64> {
        let nominal: Vec<(Metric, f64)> = present
            .iter()
            .filter_map(|m| {
                self.config
                    .weights
                    .get(m)
                    .copied()
                    .filter(|w| *w > 0.0)
                    .map(|w| (*m, w))
            })
            .collect();

        let total: f64 = nominal.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            return BTreeMap::new();
        }

        nominal.into_iter().map(|(m, w)| (m, w / total)).collect()
    }

    /// Composite score over whatever components were scored
    pub fn calculate(&self, components: &ComponentScores) -> Result<CompositeReadiness> {
        let present: Vec<Metric> = components.keys().copied().collect();
        let weights = self.normalized_weights(&present);

        if weights.is_empty() {
            return Err(CalculationError::InsufficientData {
                calculation: "composite readiness".to_string(),
                reason: "no component could be scored".to_string(),
            }
            .into());
        }

        let score = weights
            .iter()
            .map(|(metric, weight)| components[metric].score as f64 * weight)
            .sum::<f64>()
            .clamp(0.0, 100.0);

        Ok(CompositeReadiness {
            score,
            status: self.config.cut_points.status(score),
            metrics_used: weights.keys().copied().collect(),
            weights,
        })
    }
}

impl Default for ReadinessCalculator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::ComponentScore;
    use proptest::prelude::*;

    fn components(entries: &[(Metric, u8)]) -> ComponentScores {
        entries
            .iter()
            .map(|(metric, score)| {
                (
                    *metric,
                    ComponentScore {
                        metric: *metric,
                        score: *score,
                        deviation: None,
                        deviation_kind: None,
                        sleep: None,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_full_composite() {
        let calculator = ReadinessCalculator::new();
        let readiness = calculator
            .calculate(&components(&[
                (Metric::RestingHr, 100),
                (Metric::Hrv, 100),
                (Metric::Sleep, 80),
                (Metric::ReadinessIndex, 60),
                (Metric::Temperature, 100),
                (Metric::Spo2, 100),
            ]))
            .unwrap();

        // 25 + 30 + 16 + 9 + 5 + 5
        assert!((readiness.score - 90.0).abs() < 1e-9);
        assert_eq!(readiness.status, RecoveryStatus::Optimal);
        assert_eq!(readiness.metrics_used.len(), 6);
    }

    #[test]
    fn test_missing_metric_renormalizes() {
        let calculator = ReadinessCalculator::new();
        let readiness = calculator
            .calculate(&components(&[(Metric::RestingHr, 40), (Metric::Hrv, 70)]))
            .unwrap();

        // (0.25*40 + 0.30*70) / 0.55
        let expected = (10.0 + 21.0) / 0.55;
        assert!((readiness.score - expected).abs() < 1e-9);
        assert_eq!(readiness.status, RecoveryStatus::Moderate);
        assert!((readiness.weights[&Metric::Hrv] - 0.30 / 0.55).abs() < 1e-12);
    }

    #[test]
    fn test_no_components_is_insufficient_data() {
        let calculator = ReadinessCalculator::new();
        let err = calculator.calculate(&ComponentScores::new()).unwrap_err();
        assert!(err.is_insufficient_data());
    }

    #[test]
    fn test_status_cut_points() {
        let cuts = StatusCutPoints::default();
        assert_eq!(cuts.status(80.0), RecoveryStatus::Optimal);
        assert_eq!(cuts.status(79.99), RecoveryStatus::Good);
        assert_eq!(cuts.status(65.0), RecoveryStatus::Good);
        assert_eq!(cuts.status(50.0), RecoveryStatus::Moderate);
        assert_eq!(cuts.status(49.9), RecoveryStatus::Poor);
    }

    #[test]
    fn test_status_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&RecoveryStatus::Optimal).unwrap(), "\"OPTIMAL\"");
        assert_eq!(RecoveryStatus::Poor.to_string(), "POOR");
    }

    fn metric_subset() -> impl Strategy<Value = Vec<(Metric, u8)>> {
        proptest::collection::vec((any::<bool>(), 0u8..=100), Metric::ALL.len()).prop_map(|flags| {
            flags
                .into_iter()
                .zip(Metric::ALL)
                .filter(|((keep, _), _)| *keep)
                .map(|((_, score), metric)| (metric, score))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_weights_sum_to_one(entries in metric_subset()) {
            let calculator = ReadinessCalculator::new();
            let present: Vec<Metric> = entries.iter().map(|(m, _)| *m).collect();
            let weights = calculator.normalized_weights(&present);

            if present.is_empty() {
                prop_assert!(weights.is_empty());
            } else {
                let total: f64 = weights.values().sum();
                prop_assert!((total - 1.0).abs() < 1e-9);
            }
        }

        #[test]
        fn prop_composite_in_range(entries in metric_subset()) {
            prop_assume!(!entries.is_empty());
            let calculator = ReadinessCalculator::new();
            let readiness = calculator.calculate(&components(&entries)).unwrap();
            prop_assert!(readiness.score >= 0.0 && readiness.score <= 100.0);
        }
    }
}
