//! Per-metric component scores
//!
//! Each baselined metric maps its deviation onto a fixed score through an
//! ordered threshold table. Tables are configuration, not computed, and every
//! table is total: any real input (including exact tier boundaries) lands in
//! exactly one tier, with boundaries belonging to the more favorable tier.
//!
//! # Canonical tables
//!
//! | Metric      | Deviation        | Tiers                                               |
//! |-------------|------------------|-----------------------------------------------------|
//! | RHR         | bpm vs baseline  | ≤-3:100, ≤-1:85, ≤1:70, ≤3:40, ≤5:20, else 0         |
//! | HRV         | z-score          | ≥1:100, ≥0.5:85, ≥-0.5:70, ≥-1:40, else 10          |
//! | Temperature | °C vs baseline   | ≤0.3:100, ≤0.5:50, else 20                          |
//! | SpO2        | points vs base   | ≥-1:100, ≥-3:60, else 20                            |
//!
//! Sleep is not baselined: it is a weighted blend of efficiency, duration and
//! deep-sleep sub-scores computed from the night's absolute values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::deviation::{Deviation, DeviationKind};
use crate::models::{Metric, MetricSample};

/// Which side of a table is physiologically better
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreDirection {
    /// Tiers are inclusive upper bounds, ascending (e.g. RHR)
    HigherIsWorse,
    /// Tiers are inclusive lower bounds, descending (e.g. HRV)
    HigherIsBetter,
}

/// One row of a threshold table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub bound: f64,
    pub score: u8,
}

impl Tier {
    pub const fn new(bound: f64, score: u8) -> Self {
        Tier { bound, score }
    }
}

/// Ordered threshold table mapping a deviation to a score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdTable {
    pub direction: ScoreDirection,
    pub tiers: Vec<Tier>,
    /// Score when no tier matches (the least favorable tier)
    pub floor: u8,
}

impl ThresholdTable {
    /// Score a deviation; NaN falls through to the floor
    pub fn score(&self, deviation: f64) -> u8 {
        let matched = match self.direction {
            ScoreDirection::HigherIsWorse => self.tiers.iter().find(|t| deviation <= t.bound),
            ScoreDirection::HigherIsBetter => self.tiers.iter().find(|t| deviation >= t.bound),
        };
        matched.map(|t| t.score).unwrap_or(self.floor)
    }

    /// Check tier ordering and score monotonicity
    pub fn validate(&self) -> Result<(), String> {
        if self.tiers.is_empty() {
            return Err("threshold table has no tiers".to_string());
        }

        for pair in self.tiers.windows(2) {
            let ordered = match self.direction {
                ScoreDirection::HigherIsWorse => pair[0].bound < pair[1].bound,
                ScoreDirection::HigherIsBetter => pair[0].bound > pair[1].bound,
            };
            if !ordered {
                return Err(format!(
                    "tier bounds out of order: {} then {}",
                    pair[0].bound, pair[1].bound
                ));
            }
            if pair[1].score > pair[0].score {
                return Err(format!(
                    "tier scores must not increase: {} then {}",
                    pair[0].score, pair[1].score
                ));
            }
        }

        let last = self.tiers[self.tiers.len() - 1].score;
        if self.floor > last {
            return Err(format!("floor {} above last tier score {}", self.floor, last));
        }
        if self.tiers.iter().any(|t| t.score > 100) || !self.tiers.iter().all(|t| t.bound.is_finite()) {
            return Err("tier scores must be 0-100 with finite bounds".to_string());
        }

        Ok(())
    }
}

/// Scoring setup for one baselined metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricScoring {
    /// Deviation representation fed to the table
    pub deviation: DeviationKind,
    pub table: ThresholdTable,
}

/// Sleep composite configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepScoringConfig {
    /// Efficiency that earns a full sub-score (default: 85%)
    pub efficiency_target: f64,

    /// Deep-sleep fraction that earns a full sub-score (default: 20%)
    pub deep_sleep_target: f64,

    /// Optimal duration band in hours (default: 7-9)
    pub duration_optimal_min: f64,
    pub duration_optimal_max: f64,

    /// Distance outside the optimal band for the near and far bands
    pub duration_near_band: f64,
    pub duration_far_band: f64,

    /// Duration sub-scores: optimal, near, far, beyond
    pub duration_scores: [u8; 4],

    /// Sub-score weights: efficiency, duration, deep
    pub efficiency_weight: f64,
    pub duration_weight: f64,
    pub deep_weight: f64,
}

impl Default for SleepScoringConfig {
    fn default() -> Self {
        SleepScoringConfig {
            efficiency_target: 85.0,
            deep_sleep_target: 20.0,
            duration_optimal_min: 7.0,
            duration_optimal_max: 9.0,
            duration_near_band: 0.5,
            duration_far_band: 1.0,
            duration_scores: [100, 80, 60, 30],
            efficiency_weight: 0.40,
            duration_weight: 0.35,
            deep_weight: 0.25,
        }
    }
}

/// Per-metric threshold tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub resting_hr: MetricScoring,
    pub hrv: MetricScoring,
    pub temperature: MetricScoring,
    pub spo2: MetricScoring,
    pub sleep: SleepScoringConfig,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            resting_hr: MetricScoring {
                deviation: DeviationKind::Absolute,
                table: ThresholdTable {
                    direction: ScoreDirection::HigherIsWorse,
                    tiers: vec![
                        Tier::new(-3.0, 100),
                        Tier::new(-1.0, 85),
                        Tier::new(1.0, 70),
                        Tier::new(3.0, 40),
                        Tier::new(5.0, 20),
                    ],
                    floor: 0,
                },
            },
            hrv: MetricScoring {
                deviation: DeviationKind::ZScore,
                table: ThresholdTable {
                    direction: ScoreDirection::HigherIsBetter,
                    tiers: vec![
                        Tier::new(1.0, 100),
                        Tier::new(0.5, 85),
                        Tier::new(-0.5, 70),
                        Tier::new(-1.0, 40),
                    ],
                    floor: 10,
                },
            },
            temperature: MetricScoring {
                deviation: DeviationKind::Absolute,
                table: ThresholdTable {
                    direction: ScoreDirection::HigherIsWorse,
                    tiers: vec![Tier::new(0.3, 100), Tier::new(0.5, 50)],
                    floor: 20,
                },
            },
            spo2: MetricScoring {
                deviation: DeviationKind::Absolute,
                table: ThresholdTable {
                    direction: ScoreDirection::HigherIsBetter,
                    tiers: vec![Tier::new(-1.0, 100), Tier::new(-3.0, 60)],
                    floor: 20,
                },
            },
            sleep: SleepScoringConfig::default(),
        }
    }
}

impl ScoringConfig {
    /// Scoring setup of a baselined metric
    pub fn for_metric(&self, metric: Metric) -> Option<&MetricScoring> {
        match metric {
            Metric::RestingHr => Some(&self.resting_hr),
            Metric::Hrv => Some(&self.hrv),
            Metric::Temperature => Some(&self.temperature),
            Metric::Spo2 => Some(&self.spo2),
            Metric::Sleep | Metric::ReadinessIndex => None,
        }
    }
}

/// Sleep score with its sub-scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepScore {
    pub efficiency: Option<f64>,
    pub duration: Option<f64>,
    pub deep: Option<f64>,
    pub total: u8,
}

/// Score of one metric for the day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentScore {
    pub metric: Metric,
    pub score: u8,

    /// Deviation value fed to the table, for baselined metrics
    pub deviation: Option<f64>,
    pub deviation_kind: Option<DeviationKind>,

    /// Sub-scores, for sleep
    pub sleep: Option<SleepScore>,
}

/// Scores keyed by metric, in stable order
pub type ComponentScores = BTreeMap<Metric, ComponentScore>;

/// Maps deviations and raw sleep values onto 0-100 component scores
pub struct ComponentScorer {
    config: ScoringConfig,
}

impl ComponentScorer {
    /// Create scorer with the canonical tables
    pub fn new() -> Self {
        ComponentScorer {
            config: ScoringConfig::default(),
        }
    }

    /// Create scorer with custom tables
    pub fn with_config(config: ScoringConfig) -> Self {
        ComponentScorer { config }
    }

    /// Score one baselined metric from its deviation
    pub fn score_deviation(&self, deviation: &Deviation) -> Option<ComponentScore> {
        let scoring = self.config.for_metric(deviation.metric)?;
        let value = deviation.value(scoring.deviation);

        Some(ComponentScore {
            metric: deviation.metric,
            score: scoring.table.score(value),
            deviation: Some(value),
            deviation_kind: Some(scoring.deviation),
            sleep: None,
        })
    }

    /// Efficiency scaled against the target, capped at 100
    pub fn efficiency_score(&self, efficiency: f64) -> f64 {
        scaled_to_target(efficiency, self.config.sleep.efficiency_target)
    }

    /// Deep-sleep fraction scaled against the target, capped at 100
    pub fn deep_sleep_score(&self, deep_pct: f64) -> f64 {
        scaled_to_target(deep_pct, self.config.sleep.deep_sleep_target)
    }

    /// Duration banded around the optimal window
    pub fn duration_score(&self, hours: f64) -> f64 {
        let sleep = &self.config.sleep;
        let gap = if hours < sleep.duration_optimal_min {
            sleep.duration_optimal_min - hours
        } else if hours > sleep.duration_optimal_max {
            hours - sleep.duration_optimal_max
        } else {
            0.0
        };

        let [optimal, near, far, beyond] = sleep.duration_scores;
        let score = if gap <= 0.0 {
            optimal
        } else if gap <= sleep.duration_near_band {
            near
        } else if gap <= sleep.duration_far_band {
            far
        } else {
            beyond
        };
        score as f64
    }

    /// Sleep composite of the recorded sub-scores
    ///
    /// Missing sub-scores are excluded and the remaining weights rescaled;
    /// `None` when the night has no sleep data at all.
    pub fn score_sleep(&self, sample: &MetricSample) -> Option<SleepScore> {
        let sleep = &self.config.sleep;
        let efficiency = sample.sleep_efficiency.map(|v| self.efficiency_score(v));
        let duration = sample.sleep_duration.map(|v| self.duration_score(v));
        let deep = sample.deep_sleep_pct.map(|v| self.deep_sleep_score(v));

        let parts = [
            (efficiency, sleep.efficiency_weight),
            (duration, sleep.duration_weight),
            (deep, sleep.deep_weight),
        ];

        let total_weight: f64 = parts.iter().filter(|(s, _)| s.is_some()).map(|(_, w)| w).sum();
        if total_weight <= 0.0 {
            return None;
        }

        let weighted: f64 = parts
            .iter()
            .filter_map(|(s, w)| s.map(|s| s * w))
            .sum::<f64>()
            / total_weight;

        Some(SleepScore {
            efficiency,
            duration,
            deep,
            total: clamp_score(weighted),
        })
    }

    /// Score every metric available for the day
    pub fn score_components(
        &self,
        sample: &MetricSample,
        deviations: &BTreeMap<Metric, Deviation>,
    ) -> ComponentScores {
        let mut scores: ComponentScores = deviations
            .values()
            .filter_map(|d| self.score_deviation(d))
            .map(|s| (s.metric, s))
            .collect();

        if let Some(sleep) = self.score_sleep(sample) {
            scores.insert(
                Metric::Sleep,
                ComponentScore {
                    metric: Metric::Sleep,
                    score: sleep.total,
                    deviation: None,
                    deviation_kind: None,
                    sleep: Some(sleep),
                },
            );
        }

        if let Some(index) = sample.readiness_index {
            scores.insert(
                Metric::ReadinessIndex,
                ComponentScore {
                    metric: Metric::ReadinessIndex,
                    score: clamp_score(index),
                    deviation: None,
                    deviation_kind: None,
                    sleep: None,
                },
            );
        }

        scores
    }
}

impl Default for ComponentScorer {
    fn default() -> Self {
        Self::new()
    }
}

fn scaled_to_target(value: f64, target: f64) -> f64 {
    if target <= 0.0 {
        return 100.0;
    }
    (value / target * 100.0).clamp(0.0, 100.0)
}

/// Round to the nearest integer score in [0, 100]
pub(crate) fn clamp_score(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}
