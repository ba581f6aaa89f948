//! Rolling personal baselines
//!
//! Every baselined metric is compared against a trailing window of the
//! athlete's own history rather than a population norm. The window ends the
//! day before the evaluation date so the current reading never contaminates
//! its own reference.
//!
//! - **Reference**: mean, or median for metrics with single-day noise (RHR)
//! - **Spread**: population standard deviation and the 10th/90th percentile
//! - **Outliers**: HRV readings outside `Q1 - k·IQR ..= Q3 + k·IQR` are
//!   dropped before averaging to suppress motion-artifact spikes
//!
//! A metric with fewer than `min_samples` readings in the window has no
//! baseline. That is reported as [`BaselineStatus::InsufficientData`] and
//! never collapses into a score.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics, Statistics};
use std::collections::BTreeMap;

use crate::models::{Metric, MetricSample};

/// Baseline window configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineConfig {
    /// Trailing window length in days (default: 28)
    pub window_days: u16,

    /// Minimum valid readings before a baseline is usable (default: 14)
    pub min_samples: u16,

    /// Metrics whose reference is the median instead of the mean
    pub median_reference: Vec<Metric>,

    /// Metrics that are IQR-clipped before statistics are taken
    pub iqr_clipped: Vec<Metric>,

    /// IQR multiplier for outlier fences (default: 1.5)
    pub iqr_multiplier: f64,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        BaselineConfig {
            window_days: 28,
            min_samples: 14,
            median_reference: vec![Metric::RestingHr],
            iqr_clipped: vec![Metric::Hrv],
            iqr_multiplier: 1.5,
        }
    }
}

/// Reference statistics for one metric on one evaluation date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineWindow {
    pub metric: Metric,

    /// Value deviations are measured from (mean or median)
    pub reference: f64,

    pub mean: f64,
    pub median: f64,

    /// Population standard deviation
    pub std_dev: f64,

    pub p10: f64,
    pub p90: f64,

    /// Readings used after outlier clipping
    pub sample_count: usize,

    /// Readings dropped by outlier clipping
    pub clipped_count: usize,

    /// First and last day of the trailing window (inclusive)
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
}

/// Outcome of a baseline estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BaselineStatus {
    Ready(BaselineWindow),
    InsufficientData { available: usize, required: usize },
}

impl BaselineStatus {
    pub fn window(&self) -> Option<&BaselineWindow> {
        match self {
            BaselineStatus::Ready(window) => Some(window),
            BaselineStatus::InsufficientData { .. } => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, BaselineStatus::Ready(_))
    }
}

/// Baseline estimator over an explicit history snapshot
pub struct BaselineEstimator {
    config: BaselineConfig,
}

impl BaselineEstimator {
    /// Create estimator with default configuration
    pub fn new() -> Self {
        BaselineEstimator {
            config: BaselineConfig::default(),
        }
    }

    /// Create estimator with custom configuration
    pub fn with_config(config: BaselineConfig) -> Self {
        BaselineEstimator { config }
    }

    /// Trailing window `[date - window_days, date - 1]`
    pub fn window_bounds(&self, date: NaiveDate) -> (NaiveDate, NaiveDate) {
        let start = date
            .checked_sub_days(Days::new(self.config.window_days as u64))
            .unwrap_or(NaiveDate::MIN);
        let end = date.pred_opt().unwrap_or(NaiveDate::MIN);
        (start, end)
    }

    /// Estimate the baseline of a single metric as of `date`
    pub fn estimate(
        &self,
        history: &[MetricSample],
        date: NaiveDate,
        metric: Metric,
    ) -> BaselineStatus {
        let (window_start, window_end) = self.window_bounds(date);
        let required = self.config.min_samples as usize;

        let values: Vec<f64> = history
            .iter()
            .filter(|s| s.date >= window_start && s.date <= window_end)
            .filter_map(|s| s.baseline_value(metric))
            .filter(|v| v.is_finite())
            .collect();

        if values.len() < required || values.is_empty() {
            return BaselineStatus::InsufficientData {
                available: values.len(),
                required,
            };
        }

        let raw_count = values.len();
        let values = if self.config.iqr_clipped.contains(&metric) {
            clip_outliers(values, self.config.iqr_multiplier)
        } else {
            values
        };

        let mean = values.iter().mean();
        let std_dev = values.iter().population_std_dev();

        let mut data = Data::new(values.clone());
        let median = data.percentile(50);
        let p10 = data.percentile(10);
        let p90 = data.percentile(90);

        let reference = if self.config.median_reference.contains(&metric) {
            median
        } else {
            mean
        };

        BaselineStatus::Ready(BaselineWindow {
            metric,
            reference,
            mean,
            median,
            std_dev,
            p10,
            p90,
            sample_count: values.len(),
            clipped_count: raw_count - values.len(),
            window_start,
            window_end,
        })
    }

    /// Estimate baselines for every baselined metric
    pub fn estimate_all(
        &self,
        history: &[MetricSample],
        date: NaiveDate,
    ) -> BTreeMap<Metric, BaselineStatus> {
        Metric::BASELINED
            .iter()
            .map(|&metric| (metric, self.estimate(history, date, metric)))
            .collect()
    }
}

impl Default for BaselineEstimator {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop values outside the Tukey fences
///
/// Falls back to the unclipped values when clipping would empty the set,
/// which only happens with degenerate multipliers.
fn clip_outliers(values: Vec<f64>, multiplier: f64) -> Vec<f64> {
    let mut data = Data::new(values.clone());
    let q1 = data.lower_quartile();
    let q3 = data.upper_quartile();
    let iqr = q3 - q1;
    let low = q1 - multiplier * iqr;
    let high = q3 + multiplier * iqr;

    let kept: Vec<f64> = values
        .iter()
        .copied()
        .filter(|v| *v >= low && *v <= high)
        .collect();

    if kept.is_empty() {
        values
    } else {
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, day).unwrap()
    }

    fn rhr_history(values: &[f64], last_day: u32) -> Vec<MetricSample> {
        let first = last_day + 1 - values.len() as u32;
        values
            .iter()
            .enumerate()
            .map(|(i, v)| MetricSample {
                resting_hr: Some(*v),
                ..MetricSample::new("athlete", date(first + i as u32))
            })
            .collect()
    }

    #[test]
    fn test_insufficient_data_below_minimum() {
        let history = rhr_history(&[50.0; 10], 20);
        let estimator = BaselineEstimator::new();

        let status = estimator.estimate(&history, date(21), Metric::RestingHr);
        assert_eq!(
            status,
            BaselineStatus::InsufficientData {
                available: 10,
                required: 14
            }
        );
        assert!(status.window().is_none());
    }

    #[test]
    fn test_mean_and_population_std() {
        // 48/52 alternating: mean 50, population std 2
        let values: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 48.0 } else { 52.0 }).collect();
        let history = rhr_history(&values, 28);
        let estimator = BaselineEstimator::new();

        let window = estimator
            .estimate(&history, date(29), Metric::RestingHr)
            .window()
            .cloned()
            .unwrap();

        assert!((window.mean - 50.0).abs() < 1e-9);
        assert!((window.std_dev - 2.0).abs() < 1e-9);
        assert!((window.reference - 50.0).abs() < 1e-9);
        assert_eq!(window.sample_count, 20);
    }

    #[test]
    fn test_rhr_reference_is_median() {
        // One noisy day pulls the mean but not the median
        let mut values = vec![50.0; 15];
        values.push(80.0);
        let history = rhr_history(&values, 28);
        let estimator = BaselineEstimator::new();

        let window = estimator
            .estimate(&history, date(29), Metric::RestingHr)
            .window()
            .cloned()
            .unwrap();

        assert_eq!(window.reference, 50.0);
        assert!(window.mean > 51.0);
    }

    #[test]
    fn test_hrv_outlier_clipping() {
        let mut history: Vec<MetricSample> = (1..=20)
            .map(|d| MetricSample {
                hrv: Some(if d % 2 == 0 { 60.0 } else { 64.0 }),
                ..MetricSample::new("athlete", date(d))
            })
            .collect();
        history.push(MetricSample {
            hrv: Some(250.0),
            ..MetricSample::new("athlete", date(21))
        });

        let estimator = BaselineEstimator::new();
        let window = estimator
            .estimate(&history, date(22), Metric::Hrv)
            .window()
            .cloned()
            .unwrap();

        assert_eq!(window.clipped_count, 1);
        assert!((window.mean - 62.0).abs() < 1e-9);
        assert!(window.p90 <= 64.0);
    }

    #[test]
    fn test_window_excludes_evaluation_day_and_old_samples() {
        let mut history = rhr_history(&[50.0; 14], 28);
        // Evaluation-day reading must not leak into its own baseline
        history.push(MetricSample {
            resting_hr: Some(90.0),
            ..MetricSample::new("athlete", date(29))
        });
        // Older than 28 days before Sept 29
        history.push(MetricSample {
            resting_hr: Some(90.0),
            ..MetricSample::new("athlete", NaiveDate::from_ymd_opt(2024, 8, 15).unwrap())
        });

        let estimator = BaselineEstimator::new();
        let window = estimator
            .estimate(&history, date(29), Metric::RestingHr)
            .window()
            .cloned()
            .unwrap();

        assert_eq!(window.sample_count, 14);
        assert_eq!(window.mean, 50.0);
        assert_eq!(window.window_end, date(28));
        assert_eq!(window.window_start, date(1));
    }

    #[test]
    fn test_estimate_all_covers_baselined_metrics() {
        let history = rhr_history(&[50.0; 14], 28);
        let estimator = BaselineEstimator::new();
        let all = estimator.estimate_all(&history, date(29));

        assert_eq!(all.len(), Metric::BASELINED.len());
        assert!(all[&Metric::RestingHr].is_ready());
        assert!(!all[&Metric::Hrv].is_ready());
    }

    #[test]
    fn test_custom_window() {
        let config = BaselineConfig {
            window_days: 7,
            min_samples: 5,
            ..BaselineConfig::default()
        };
        let history = rhr_history(&[50.0; 14], 28);
        let estimator = BaselineEstimator::with_config(config);

        let window = estimator
            .estimate(&history, date(29), Metric::RestingHr)
            .window()
            .cloned()
            .unwrap();
        assert_eq!(window.sample_count, 7);
    }
}
