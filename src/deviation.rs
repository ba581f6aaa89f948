//! Current-day readings expressed relative to their baseline

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::baseline::{BaselineStatus, BaselineWindow};
use crate::models::{Metric, MetricSample};

/// Standard deviations below this are treated as zero
const STD_EPSILON: f64 = 1e-9;

/// Representation of a deviation fed to a score table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviationKind {
    /// `value - reference` in the metric's own unit
    Absolute,
    /// `(value - mean) / std`
    ZScore,
    /// `(value - mean) / mean * 100`
    Percent,
}

/// One metric's current reading measured against its baseline
///
/// All three representations are kept: the scorer reads the one its table
/// is configured for, while alert rules read fixed ones (bpm for RHR,
/// percent for HRV).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deviation {
    pub metric: Metric,
    pub current: f64,
    pub reference: f64,
    pub absolute: f64,
    pub z_score: f64,
    pub percent: f64,
}

impl Deviation {
    /// Measure `current` against a ready baseline window
    pub fn from_baseline(current: f64, window: &BaselineWindow) -> Self {
        Deviation {
            metric: window.metric,
            current,
            reference: window.reference,
            absolute: current - window.reference,
            z_score: z_score(current, window.mean, window.std_dev),
            percent: percent_deviation(current, window.mean),
        }
    }

    /// Value in the requested representation
    pub fn value(&self, kind: DeviationKind) -> f64 {
        match kind {
            DeviationKind::Absolute => self.absolute,
            DeviationKind::ZScore => self.z_score,
            DeviationKind::Percent => self.percent,
        }
    }
}

/// Z-score with a zero-spread guard
///
/// A flat baseline carries no information about spread, so any reading is
/// reported as zero deviation instead of dividing by zero.
pub fn z_score(value: f64, mean: f64, std_dev: f64) -> f64 {
    if std_dev.abs() < STD_EPSILON {
        return 0.0;
    }
    (value - mean) / std_dev
}

/// Percent deviation from a mean, zero when the mean is zero
pub fn percent_deviation(value: f64, mean: f64) -> f64 {
    if mean.abs() < STD_EPSILON {
        return 0.0;
    }
    (value - mean) / mean * 100.0
}

/// Deviation of every baselined metric present in `sample`
///
/// Metrics without a ready baseline, or missing from the sample, are left
/// out of the map.
pub fn calculate_deviations(
    sample: &MetricSample,
    baselines: &BTreeMap<Metric, BaselineStatus>,
) -> BTreeMap<Metric, Deviation> {
    baselines
        .iter()
        .filter_map(|(metric, status)| {
            let window = status.window()?;
            let current = sample.baseline_value(*metric)?;
            Some((*metric, Deviation::from_baseline(current, window)))
        })
        .collect()
}
