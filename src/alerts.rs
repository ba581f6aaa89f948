//! Tiered overtraining, injury-risk and illness alerts
//!
//! Alerts are evaluated independently of the composite score: a day can be
//! GOOD overall and still raise an illness alert. Every rule emits at most
//! one record, at the highest tier it reaches, and rules never suppress each
//! other.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::deviation::Deviation;
use crate::models::{Metric, MetricSample};
use crate::training_load::TrainingLoadMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    Overtraining,
    InjuryRisk,
    Illness,
}

impl fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AlertCategory::Overtraining => "overtraining",
            AlertCategory::InjuryRisk => "injury_risk",
            AlertCategory::Illness => "illness",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Yellow,
    Red,
    Critical,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AlertSeverity::Yellow => "yellow",
            AlertSeverity::Red => "red",
            AlertSeverity::Critical => "critical",
        };
        write!(f, "{}", label)
    }
}

/// Signal that tripped an alert rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSignal {
    RestingHr,
    Hrv,
    Acwr,
    Temperature,
}

/// Which way a signal has to move to become alarming
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertDirection {
    Rising,
    Falling,
}

/// Yellow / red / critical thresholds for one signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertTiers {
    pub direction: AlertDirection,
    pub yellow: f64,
    pub red: f64,
    #[serde(default)]
    pub critical: Option<f64>,
}

impl AlertTiers {
    pub fn rising(yellow: f64, red: f64, critical: Option<f64>) -> Self {
        AlertTiers { direction: AlertDirection::Rising, yellow, red, critical }
    }

    pub fn falling(yellow: f64, red: f64, critical: Option<f64>) -> Self {
        AlertTiers { direction: AlertDirection::Falling, yellow, red, critical }
    }

    fn reached(&self, value: f64, threshold: f64) -> bool {
        match self.direction {
            AlertDirection::Rising => value >= threshold,
            AlertDirection::Falling => value <= threshold,
        }
    }

    /// Highest tier reached by `value`, with its threshold
    pub fn classify(&self, value: f64) -> Option<(AlertSeverity, f64)> {
        if let Some(critical) = self.critical {
            if self.reached(value, critical) {
                return Some((AlertSeverity::Critical, critical));
            }
        }
        if self.reached(value, self.red) {
            Some((AlertSeverity::Red, self.red))
        } else if self.reached(value, self.yellow) {
            Some((AlertSeverity::Yellow, self.yellow))
        } else {
            None
        }
    }

    /// Check that tiers escalate in the alarming direction
    pub fn validate(&self) -> Result<(), String> {
        let mut bounds = vec![self.yellow, self.red];
        bounds.extend(self.critical);
        let ordered = bounds.windows(2).all(|pair| match self.direction {
            AlertDirection::Rising => pair[0] < pair[1],
            AlertDirection::Falling => pair[0] > pair[1],
        });
        if ordered {
            Ok(())
        } else {
            Err(format!("alert tiers do not escalate: {:?}", bounds))
        }
    }
}

/// Alert thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Resting HR in bpm above baseline
    pub resting_hr: AlertTiers,

    /// HRV percent deviation from baseline
    pub hrv_percent: AlertTiers,

    /// Acute:chronic workload ratio
    pub acwr: AlertTiers,

    /// Temperature in °C above baseline
    pub temperature: AlertTiers,

    /// Compound illness rule: RHR at or above this many bpm...
    pub compound_rhr_bpm: f64,

    /// ...together with HRV at or below this percent deviation
    pub compound_hrv_percent: f64,

    pub compound_severity: AlertSeverity,
}

impl Default for AlertConfig {
    fn default() -> Self {
        AlertConfig {
            resting_hr: AlertTiers::rising(3.0, 5.0, Some(7.0)),
            hrv_percent: AlertTiers::falling(-15.0, -25.0, Some(-35.0)),
            acwr: AlertTiers::rising(1.3, 1.5, None),
            temperature: AlertTiers::rising(0.3, 0.5, None),
            compound_rhr_bpm: 3.0,
            compound_hrv_percent: -15.0,
            compound_severity: AlertSeverity::Red,
        }
    }
}

/// One raised alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub category: AlertCategory,
    pub severity: AlertSeverity,
    pub signals: Vec<AlertSignal>,

    /// Observed value of the (first) triggering signal
    pub value: f64,

    /// Threshold of the tier that was reached
    pub threshold: f64,
    pub message: String,
}

impl AlertRecord {
    pub fn involves(&self, signal: AlertSignal) -> bool {
        self.signals.contains(&signal)
    }
}

pub struct AlertClassifier {
    config: AlertConfig,
}

impl AlertClassifier {
    pub fn new() -> Self {
        AlertClassifier {
            config: AlertConfig::default(),
        }
    }

    pub fn with_config(config: AlertConfig) -> Self {
        AlertClassifier { config }
    }

    /// Evaluate every alert rule for the day
    ///
    /// Records come out in a fixed order: RHR, HRV, ACWR, temperature, then
    /// the compound illness rule.
    pub fn classify(
        &self,
        sample: &MetricSample,
        deviations: &BTreeMap<Metric, Deviation>,
        load: Option<&TrainingLoadMetrics>,
    ) -> Vec<AlertRecord> {
        let mut alerts = Vec::new();
        let rhr_bpm = deviations.get(&Metric::RestingHr).map(|d| d.absolute);
        let hrv_pct = deviations.get(&Metric::Hrv).map(|d| d.percent);

        if let Some(bpm) = rhr_bpm {
            if let Some((severity, threshold)) = self.config.resting_hr.classify(bpm) {
                alerts.push(AlertRecord {
                    category: AlertCategory::Overtraining,
                    severity,
                    signals: vec![AlertSignal::RestingHr],
                    value: bpm,
                    threshold,
                    message: format!("Resting HR {:+.1} bpm above baseline", bpm),
                });
            }
        }

        if let Some(pct) = hrv_pct {
            if let Some((severity, threshold)) = self.config.hrv_percent.classify(pct) {
                alerts.push(AlertRecord {
                    category: AlertCategory::Overtraining,
                    severity,
                    signals: vec![AlertSignal::Hrv],
                    value: pct,
                    threshold,
                    message: format!("HRV {:.1}% below baseline", pct.abs()),
                });
            }
        }

        if let Some(metrics) = load {
            if let Some((severity, threshold)) = self.config.acwr.classify(metrics.acwr) {
                alerts.push(AlertRecord {
                    category: AlertCategory::InjuryRisk,
                    severity,
                    signals: vec![AlertSignal::Acwr],
                    value: metrics.acwr,
                    threshold,
                    message: format!("Acute:chronic workload ratio {:.2}", metrics.acwr),
                });
            }
        }

        // The device already reports temperature as a delta, so it stands in
        // while the personal baseline is still building
        let temperature = deviations
            .get(&Metric::Temperature)
            .map(|d| d.absolute)
            .or(sample.temperature_delta);
        if let Some(delta) = temperature {
            if let Some((severity, threshold)) = self.config.temperature.classify(delta) {
                alerts.push(AlertRecord {
                    category: AlertCategory::Illness,
                    severity,
                    signals: vec![AlertSignal::Temperature],
                    value: delta,
                    threshold,
                    message: format!("Temperature {:+.2} °C above baseline", delta),
                });
            }
        }

        if let (Some(bpm), Some(pct)) = (rhr_bpm, hrv_pct) {
            if bpm >= self.config.compound_rhr_bpm && pct <= self.config.compound_hrv_percent {
                alerts.push(AlertRecord {
                    category: AlertCategory::Illness,
                    severity: self.config.compound_severity,
                    signals: vec![AlertSignal::RestingHr, AlertSignal::Hrv],
                    value: bpm,
                    threshold: self.config.compound_rhr_bpm,
                    message: format!(
                        "Elevated resting HR ({:+.1} bpm) with suppressed HRV ({:.1}%)",
                        bpm, pct
                    ),
                });
            }
        }

        debug!(date = %sample.date, count = alerts.len(), "Alerts classified");
        alerts
    }
}

impl Default for AlertClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Highest severity among the alerts, if any
pub fn highest_severity(alerts: &[AlertRecord]) -> Option<AlertSeverity> {
    alerts.iter().map(|a| a.severity).max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training_load::{AcwrBand, FitnessOutlook, TsbInterpretation};
    use chrono::NaiveDate;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 29).unwrap()
    }

    fn deviation(metric: Metric, current: f64, reference: f64) -> Deviation {
        Deviation {
            metric,
            current,
            reference,
            absolute: current - reference,
            z_score: 0.0,
            percent: (current - reference) / reference * 100.0,
        }
    }

    fn load(acwr: f64) -> TrainingLoadMetrics {
        TrainingLoadMetrics {
            date: day(),
            acute_load: acwr * 100.0,
            chronic_load: 100.0,
            acwr,
            acwr_band: AcwrBand::HighConcern,
            ctl: 100.0,
            atl: 100.0,
            tsb: 0.0,
            tsb_interpretation: TsbInterpretation::Neutral,
            load_progression_pct: (acwr - 1.0) * 100.0,
            history_days: 28,
            fitness: FitnessOutlook::default(),
        }
    }

    #[test]
    fn test_tier_classification() {
        let tiers = AlertTiers::rising(3.0, 5.0, Some(7.0));
        assert_eq!(tiers.classify(2.9), None);
        assert_eq!(tiers.classify(3.0), Some((AlertSeverity::Yellow, 3.0)));
        assert_eq!(tiers.classify(5.5), Some((AlertSeverity::Red, 5.0)));
        assert_eq!(tiers.classify(9.0), Some((AlertSeverity::Critical, 7.0)));

        let tiers = AlertTiers::falling(-15.0, -25.0, Some(-35.0));
        assert_eq!(tiers.classify(-10.0), None);
        assert_eq!(tiers.classify(-25.0), Some((AlertSeverity::Red, -25.0)));
        assert_eq!(tiers.classify(-40.0), Some((AlertSeverity::Critical, -35.0)));
    }

    #[test]
    fn test_tier_validation() {
        assert!(AlertConfig::default().resting_hr.validate().is_ok());
        assert!(AlertConfig::default().hrv_percent.validate().is_ok());
        assert!(AlertTiers::rising(5.0, 3.0, None).validate().is_err());
        assert!(AlertTiers::falling(-15.0, -10.0, None).validate().is_err());
    }

    #[test]
    fn test_compound_illness_alert() {
        let sample = MetricSample::new("athlete", day());
        let deviations = BTreeMap::from([
            (Metric::RestingHr, deviation(Metric::RestingHr, 54.0, 50.0)),
            (Metric::Hrv, deviation(Metric::Hrv, 48.0, 60.0)),
        ]);

        let alerts = AlertClassifier::new().classify(&sample, &deviations, None);
        assert_eq!(alerts.len(), 3);

        assert_eq!(alerts[0].category, AlertCategory::Overtraining);
        assert_eq!(alerts[0].severity, AlertSeverity::Yellow);
        assert!(alerts[0].involves(AlertSignal::RestingHr));

        assert_eq!(alerts[1].category, AlertCategory::Overtraining);
        assert!(alerts[1].involves(AlertSignal::Hrv));

        let illness = &alerts[2];
        assert_eq!(illness.category, AlertCategory::Illness);
        assert_eq!(illness.severity, AlertSeverity::Red);
        assert_eq!(illness.signals, vec![AlertSignal::RestingHr, AlertSignal::Hrv]);
    }

    #[test]
    fn test_single_record_per_rule_at_highest_tier() {
        let sample = MetricSample::new("athlete", day());
        let deviations = BTreeMap::from([(
            Metric::RestingHr,
            deviation(Metric::RestingHr, 58.0, 50.0),
        )]);

        let alerts = AlertClassifier::new().classify(&sample, &deviations, None);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);
        assert_eq!(highest_severity(&alerts), Some(AlertSeverity::Critical));
    }

    #[test]
    fn test_acwr_alert() {
        let sample = MetricSample::new("athlete", day());
        let classifier = AlertClassifier::new();

        let alerts = classifier.classify(&sample, &BTreeMap::new(), Some(&load(1.2)));
        assert!(alerts.is_empty());

        let alerts = classifier.classify(&sample, &BTreeMap::new(), Some(&load(1.6)));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].category, AlertCategory::InjuryRisk);
        assert_eq!(alerts[0].severity, AlertSeverity::Red);
    }

    #[test]
    fn test_temperature_alert_falls_back_to_device_delta() {
        let sample = MetricSample {
            temperature_delta: Some(0.4),
            ..MetricSample::new("athlete", day())
        };
        let alerts = AlertClassifier::new().classify(&sample, &BTreeMap::new(), None);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].category, AlertCategory::Illness);
        assert_eq!(alerts[0].severity, AlertSeverity::Yellow);
    }

    #[test]
    fn test_quiet_day_has_no_alerts() {
        let sample = MetricSample::new("athlete", day());
        let deviations = BTreeMap::from([
            (Metric::RestingHr, deviation(Metric::RestingHr, 49.0, 50.0)),
            (Metric::Hrv, deviation(Metric::Hrv, 62.0, 60.0)),
        ]);
        assert!(AlertClassifier::new().classify(&sample, &deviations, None).is_empty());
    }
}
