//! Daily evaluation pipeline
//!
//! `history → baselines → deviations → component scores → composite
//! readiness → (load, alerts) → decision → interventions`
//!
//! The engine holds configuration only. Every call works on the history
//! snapshot it is given, so evaluating the same (history, date, config)
//! twice yields identical output, and evaluating day N never looks at
//! samples dated after N.

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info_span, warn};

use crate::alerts::{AlertClassifier, AlertRecord};
use crate::baseline::{BaselineEstimator, BaselineStatus};
use crate::config::EngineConfig;
use crate::decision::{DecisionContext, DecisionTree, RecommendationDecision};
use crate::deviation::{calculate_deviations, Deviation};
use crate::error::{CalculationError, Result, ValidationError};
use crate::interventions::{InterventionGenerator, InterventionInputs, InterventionPlan};
use crate::models::{Metric, MetricSample};
use crate::readiness::{CompositeReadiness, ReadinessCalculator};
use crate::scoring::{ComponentScorer, ComponentScores};
use crate::training_load::{days_since_last_hard, days_since_recovery_day, LoadStatus, TrainingLoadAnalyzer};
use crate::trends::{TrendAnalyzer, TrendReport};

/// Everything one evaluation produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyEvaluation {
    pub athlete_id: String,
    pub date: NaiveDate,
    pub baselines: BTreeMap<Metric, BaselineStatus>,
    pub deviations: BTreeMap<Metric, Deviation>,
    pub components: ComponentScores,
    pub readiness: CompositeReadiness,
    pub training_load: LoadStatus,
    pub days_since_hard: u32,
    pub days_since_recovery: u32,
    pub trends: TrendReport,
    pub alerts: Vec<AlertRecord>,
    pub decision: RecommendationDecision,
    pub interventions: InterventionPlan,
}

/// Recovery scoring and recommendation engine
pub struct RecoveryEngine {
    config: EngineConfig,
    baselines: BaselineEstimator,
    scorer: ComponentScorer,
    readiness: ReadinessCalculator,
    load: TrainingLoadAnalyzer,
    alerts: AlertClassifier,
    tree: DecisionTree,
    interventions: InterventionGenerator,
    trends: TrendAnalyzer,
}

impl RecoveryEngine {
    /// Create engine with the canonical configuration
    pub fn new() -> Self {
        Self::build(EngineConfig::default())
    }

    /// Create engine with a custom configuration, validating it first
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: EngineConfig) -> Self {
        RecoveryEngine {
            baselines: BaselineEstimator::with_config(config.baseline.clone()),
            scorer: ComponentScorer::with_config(config.scoring.clone()),
            readiness: ReadinessCalculator::with_config(config.readiness.clone()),
            load: TrainingLoadAnalyzer::with_config(config.training_load.clone()),
            alerts: AlertClassifier::with_config(config.alerts.clone()),
            tree: DecisionTree::with_config(config.decision.clone()),
            interventions: InterventionGenerator::with_config(config.interventions.clone()),
            trends: TrendAnalyzer::with_config(config.trends.clone()),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate and order the samples usable for an evaluation on `date`
    ///
    /// Samples dated after `date` are dropped. An invalid sample from an
    /// earlier day is dropped with a warning; an invalid sample on `date`
    /// rejects the evaluation. A duplicate day or foreign athlete rejects
    /// the whole history.
    pub fn prepare_history(&self, history: &[MetricSample], date: NaiveDate) -> Result<Vec<MetricSample>> {
        let mut samples: Vec<MetricSample> = Vec::with_capacity(history.len());
        let mut future = 0usize;

        for sample in history {
            if sample.date > date {
                future += 1;
                continue;
            }
            if let Err(e) = sample.validate() {
                if sample.date == date {
                    warn!(%date, error = %e, "Evaluation day sample rejected");
                    return Err(e.into());
                }
                warn!(date = %sample.date, error = %e, "Dropping invalid sample from history");
                continue;
            }
            samples.push(sample.clone());
        }

        if future > 0 {
            debug!(%date, count = future, "Ignoring samples dated after evaluation day");
        }

        if let Some(first) = samples.first() {
            let expected = first.athlete_id.clone();
            if let Some(other) = samples.iter().find(|s| s.athlete_id != expected) {
                return Err(ValidationError::MixedAthletes {
                    expected,
                    found: other.athlete_id.clone(),
                }
                .into());
            }
        }

        samples.sort_by_key(|s| s.date);
        let mut seen = BTreeSet::new();
        for sample in &samples {
            if !seen.insert(sample.date) {
                return Err(ValidationError::DuplicateDate { date: sample.date }.into());
            }
        }

        Ok(samples)
    }

    /// Evaluate one athlete on one day
    pub fn evaluate(&self, history: &[MetricSample], date: NaiveDate) -> Result<DailyEvaluation> {
        let history = self.prepare_history(history, date)?;

        let today = history
            .iter()
            .rev()
            .find(|s| s.date == date)
            .cloned()
            .ok_or_else(|| CalculationError::InsufficientData {
                calculation: "daily evaluation".to_string(),
                reason: format!("no sample recorded for {}", date),
            })?;

        let _span = info_span!("evaluate", athlete = %today.athlete_id, %date).entered();

        let baselines = self.baselines.estimate_all(&history, date);
        for (metric, status) in &baselines {
            if let BaselineStatus::InsufficientData { available, required } = status {
                debug!(%metric, available, required, "Baseline not ready");
            }
        }

        let deviations = calculate_deviations(&today, &baselines);
        let components = self.scorer.score_components(&today, &deviations);
        debug!(count = components.len(), "Components scored");

        let readiness = self.readiness.calculate(&components)?;
        debug!(score = readiness.score, status = %readiness.status, "Composite readiness");

        let training_load = self.load.analyze(&history, date);
        if let LoadStatus::InsufficientData { reason, .. } = &training_load {
            debug!(reason = %reason, "Load analytics unavailable");
        }

        let days_since_hard =
            days_since_last_hard(&history, date, self.config.decision.hard_lookback_days);
        let days_since_recovery =
            days_since_recovery_day(&history, date, self.config.interventions.recovery_lookback_days);

        let trends = self.trends.analyze(&history, date);
        let alerts = self.alerts.classify(&today, &deviations, training_load.metrics());
        for alert in &alerts {
            warn!(
                category = %alert.category,
                severity = %alert.severity,
                "{}",
                alert.message
            );
        }

        let decision = self.tree.decide(&DecisionContext {
            date,
            readiness: &readiness,
            components: &components,
            alerts: &alerts,
            load: training_load.metrics(),
            days_since_hard,
        });

        let interventions = self.interventions.generate(&InterventionInputs {
            components: &components,
            alerts: &alerts,
            days_since_recovery,
            sleep_debt_hours: trends.sleep_debt_hours,
        });

        Ok(DailyEvaluation {
            athlete_id: today.athlete_id,
            date,
            baselines,
            deviations,
            components,
            readiness,
            training_load,
            days_since_hard,
            days_since_recovery,
            trends,
            alerts,
            decision,
            interventions,
        })
    }

    /// Evaluate many athletes in parallel
    ///
    /// Each history is evaluated independently; results come back in input
    /// order.
    pub fn evaluate_batch(
        &self,
        histories: &[Vec<MetricSample>],
        date: NaiveDate,
    ) -> Vec<Result<DailyEvaluation>> {
        histories
            .par_iter()
            .map(|history| self.evaluate(history, date))
            .collect()
    }

    /// Evaluate every day in `[start, end]` that has a sample
    pub fn evaluate_range(
        &self,
        history: &[MetricSample],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<Result<DailyEvaluation>> {
        let days: BTreeSet<NaiveDate> = history
            .iter()
            .map(|s| s.date)
            .filter(|d| *d >= start && *d <= end)
            .collect();

        days.into_iter().map(|day| self.evaluate(history, day)).collect()
    }
}

impl Default for RecoveryEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::TrainingCategory;
    use crate::error::ReadyRsError;
    use crate::models::SessionIntensity;
    use chrono::Days;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 1).unwrap()
    }

    fn steady_history(days: u64) -> Vec<MetricSample> {
        (0..days)
            .map(|i| MetricSample {
                resting_hr: Some(if i % 2 == 0 { 48.0 } else { 52.0 }),
                hrv: Some(if i % 2 == 0 { 58.0 } else { 62.0 }),
                sleep_efficiency: Some(90.0),
                sleep_duration: Some(8.0),
                deep_sleep_pct: Some(21.0),
                training_load: Some(if i % 7 == 6 { 0.0 } else { 80.0 }),
                session_intensity: Some(if i % 7 == 6 {
                    SessionIntensity::Rest
                } else {
                    SessionIntensity::Moderate
                }),
                ..MetricSample::new("athlete", start() + Days::new(i))
            })
            .collect()
    }

    #[test]
    fn test_steady_athlete_gets_training() {
        let history = steady_history(35);
        let date = start() + Days::new(34);

        let evaluation = RecoveryEngine::new().evaluate(&history, date).unwrap();

        assert!(evaluation.baselines[&Metric::RestingHr].is_ready());
        assert!(evaluation.training_load.metrics().is_some());
        assert!(evaluation.alerts.is_empty());
        assert_ne!(evaluation.decision.category, TrainingCategory::Rest);
        assert_eq!(evaluation.days_since_hard, 7);
    }

    #[test]
    fn test_missing_evaluation_day() {
        let history = steady_history(20);
        let err = RecoveryEngine::new()
            .evaluate(&history, start() + Days::new(25))
            .unwrap_err();
        assert!(err.is_insufficient_data());
    }

    #[test]
    fn test_invalid_evaluation_day_rejected() {
        let mut history = steady_history(20);
        history[19].resting_hr = Some(-1.0);
        let err = RecoveryEngine::new()
            .evaluate(&history, start() + Days::new(19))
            .unwrap_err();
        assert!(matches!(err, ReadyRsError::InvalidInput(ValidationError::OutOfRange { .. })));
    }

    #[test]
    fn test_old_invalid_sample_is_dropped() {
        let engine = RecoveryEngine::new();
        let date = start() + Days::new(119);

        let mut history = steady_history(120);
        history[19].hrv = Some(320.0);
        let with_bad_day = engine.evaluate(&history, date).unwrap();

        history.remove(19);
        let without_bad_day = engine.evaluate(&history, date).unwrap();
        assert_eq!(with_bad_day, without_bad_day);
    }

    #[test]
    fn test_invalid_sample_inside_window_is_dropped() {
        let engine = RecoveryEngine::new();
        let date = start() + Days::new(34);

        let mut history = steady_history(35);
        history[30].resting_hr = Some(-1.0);
        let prepared = engine.prepare_history(&history, date).unwrap();
        assert_eq!(prepared.len(), 34);
        assert!(prepared.iter().all(|s| s.date != start() + Days::new(30)));

        let evaluation = engine.evaluate(&history, date).unwrap();
        assert!(evaluation.baselines[&Metric::RestingHr].is_ready());
    }

    #[test]
    fn test_duplicate_and_mixed_histories_rejected() {
        let engine = RecoveryEngine::new();
        let date = start() + Days::new(19);

        let mut history = steady_history(20);
        history.push(history[3].clone());
        assert!(matches!(
            engine.evaluate(&history, date),
            Err(ReadyRsError::InvalidInput(ValidationError::DuplicateDate { .. }))
        ));

        let mut history = steady_history(20);
        history[2].athlete_id = "someone-else".to_string();
        assert!(matches!(
            engine.evaluate(&history, date),
            Err(ReadyRsError::InvalidInput(ValidationError::MixedAthletes { .. }))
        ));
    }

    #[test]
    fn test_future_samples_do_not_change_result() {
        let engine = RecoveryEngine::new();
        let history = steady_history(40);
        let date = start() + Days::new(30);

        let full = engine.evaluate(&history, date).unwrap();
        let truncated = engine.evaluate(&history[..31], date).unwrap();
        assert_eq!(full, truncated);
    }

    #[test]
    fn test_invalid_future_sample_is_ignored() {
        let mut history = steady_history(32);
        history[31].hrv = Some(900.0);
        assert!(RecoveryEngine::new()
            .evaluate(&history, start() + Days::new(30))
            .is_ok());
    }

    #[test]
    fn test_batch_preserves_order() {
        let engine = RecoveryEngine::new();
        let date = start() + Days::new(29);
        let mut second = steady_history(30);
        for sample in &mut second {
            sample.athlete_id = "second".to_string();
        }

        let results = engine.evaluate_batch(&[steady_history(30), second, Vec::new()], date);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().athlete_id, "athlete");
        assert_eq!(results[1].as_ref().unwrap().athlete_id, "second");
        assert!(results[2].is_err());
    }

    #[test]
    fn test_evaluate_range() {
        let engine = RecoveryEngine::new();
        let history = steady_history(20);
        let results = engine.evaluate_range(&history, start() + Days::new(15), start() + Days::new(40));
        assert_eq!(results.len(), 5);
        assert!(results.iter().all(|r| r.is_ok()));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = EngineConfig::default();
        config.trends.short_days = 0;
        assert!(RecoveryEngine::with_config(config).is_err());
    }
}
