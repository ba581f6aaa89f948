use serde::{Deserialize, Serialize};
use std::fmt;

use crate::alerts::{AlertCategory, AlertRecord, AlertSignal};
use crate::models::Metric;
use crate::scoring::ComponentScores;

/// Area a recovery intervention targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionCategory {
    Sleep,
    StressManagement,
    RestingHr,
    ActiveRecovery,
    Illness,
}

impl fmt::Display for InterventionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InterventionCategory::Sleep => "Sleep optimization",
            InterventionCategory::StressManagement => "Stress management",
            InterventionCategory::RestingHr => "Resting HR recovery",
            InterventionCategory::ActiveRecovery => "Active recovery",
            InterventionCategory::Illness => "Illness precautions",
        };
        write!(f, "{}", label)
    }
}

/// Advisory priority; HIGH sorts first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InterventionPriority {
    High,
    Medium,
    Low,
}

impl fmt::Display for InterventionPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InterventionPriority::High => "HIGH",
            InterventionPriority::Medium => "MEDIUM",
            InterventionPriority::Low => "LOW",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intervention {
    pub category: InterventionCategory,
    pub priority: InterventionPriority,
    pub rationale: String,
    pub actions: Vec<String>,
}

/// Recovery actions for the day, highest priority first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterventionPlan {
    pub interventions: Vec<Intervention>,
}

impl InterventionPlan {
    pub fn is_empty(&self) -> bool {
        self.interventions.is_empty()
    }

    pub fn get(&self, category: InterventionCategory) -> Option<&Intervention> {
        self.interventions.iter().find(|i| i.category == category)
    }
}

/// Trigger thresholds for interventions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionConfig {
    /// Sleep score below this triggers sleep optimization (default: 70)
    pub sleep_score_below: u8,

    /// HRV score below this triggers stress management (default: 60)
    pub hrv_score_below: u8,

    /// RHR score below this triggers RHR recovery actions (default: 60)
    pub rhr_score_below: u8,

    /// More days than this without a recovery day triggers active recovery (default: 2)
    pub max_days_without_recovery: u32,

    /// 7-day sleep debt in hours that triggers repayment actions (default: 5)
    pub sleep_debt_hours: f64,

    /// Days searched back for a recovery day (default: 7)
    pub recovery_lookback_days: u16,
}

impl Default for InterventionConfig {
    fn default() -> Self {
        InterventionConfig {
            sleep_score_below: 70,
            hrv_score_below: 60,
            rhr_score_below: 60,
            max_days_without_recovery: 2,
            sleep_debt_hours: 5.0,
            recovery_lookback_days: 7,
        }
    }
}

/// Inputs the generator looks at
#[derive(Debug, Clone, Copy)]
pub struct InterventionInputs<'a> {
    pub components: &'a ComponentScores,
    pub alerts: &'a [AlertRecord],
    pub days_since_recovery: u32,
    pub sleep_debt_hours: Option<f64>,
}

pub struct InterventionGenerator {
    config: InterventionConfig,
}

impl InterventionGenerator {
    pub fn new() -> Self {
        InterventionGenerator {
            config: InterventionConfig::default(),
        }
    }

    pub fn with_config(config: InterventionConfig) -> Self {
        InterventionGenerator { config }
    }

    pub fn generate(&self, inputs: &InterventionInputs<'_>) -> InterventionPlan {
        let score = |metric: Metric| inputs.components.get(&metric).map(|c| c.score);
        let has_alert = |category: AlertCategory| inputs.alerts.iter().any(|a| a.category == category);

        let mut interventions = Vec::new();

        let sleep_score = score(Metric::Sleep).filter(|s| *s < self.config.sleep_score_below);
        let sleep_debt = inputs
            .sleep_debt_hours
            .filter(|debt| *debt >= self.config.sleep_debt_hours);
        if sleep_score.is_some() || sleep_debt.is_some() {
            let mut actions = Vec::new();
            let mut rationale = Vec::new();
            if let Some(s) = sleep_score {
                rationale.push(format!("sleep score {}", s));
                actions.push("Keep a fixed bedtime and wake time".to_string());
                actions.push("No screens or caffeine in the evening".to_string());
                actions.push("Keep the bedroom cool and dark".to_string());
            }
            if let Some(debt) = sleep_debt {
                rationale.push(format!("{:.1} h sleep debt over 7 days", debt));
                actions.push(format!("Add 30-60 minutes of sleep per night until the {:.1} h debt is repaid", debt));
                actions.push("Take a 20-minute early-afternoon nap".to_string());
            }
            interventions.push(Intervention {
                category: InterventionCategory::Sleep,
                priority: InterventionPriority::High,
                rationale: rationale.join(", "),
                actions,
            });
        }

        let hrv_low = score(Metric::Hrv).filter(|s| *s < self.config.hrv_score_below);
        let overtraining = has_alert(AlertCategory::Overtraining);
        if hrv_low.is_some() || overtraining {
            let rationale = match hrv_low {
                Some(s) if overtraining => format!("HRV score {} with an overtraining alert", s),
                Some(s) => format!("HRV score {}", s),
                None => "overtraining alert raised".to_string(),
            };
            interventions.push(Intervention {
                category: InterventionCategory::StressManagement,
                priority: if overtraining {
                    InterventionPriority::High
                } else {
                    InterventionPriority::Medium
                },
                rationale,
                actions: vec![
                    "10 minutes of slow breathing (6 breaths per minute) twice a day".to_string(),
                    "Reduce non-training stressors where possible".to_string(),
                    "Avoid alcohol and late meals".to_string(),
                ],
            });
        }

        if let Some(s) = score(Metric::RestingHr).filter(|s| *s < self.config.rhr_score_below) {
            let rhr_alert = inputs
                .alerts
                .iter()
                .any(|a| a.category == AlertCategory::Overtraining && a.involves(AlertSignal::RestingHr));
            interventions.push(Intervention {
                category: InterventionCategory::RestingHr,
                priority: if rhr_alert {
                    InterventionPriority::Medium
                } else {
                    InterventionPriority::Low
                },
                rationale: format!("resting HR score {}", s),
                actions: vec![
                    "Increase fluid and electrolyte intake".to_string(),
                    "Keep any training strictly aerobic".to_string(),
                    "Recheck resting HR tomorrow morning".to_string(),
                ],
            });
        }

        if inputs.days_since_recovery > self.config.max_days_without_recovery {
            interventions.push(Intervention {
                category: InterventionCategory::ActiveRecovery,
                priority: InterventionPriority::Medium,
                rationale: format!("{} days without an easy or rest day", inputs.days_since_recovery),
                actions: vec![
                    "Schedule an easy or rest day".to_string(),
                    "20-30 minutes of mobility or light spinning".to_string(),
                ],
            });
        }

        if has_alert(AlertCategory::Illness) {
            interventions.push(Intervention {
                category: InterventionCategory::Illness,
                priority: InterventionPriority::High,
                rationale: "illness markers raised".to_string(),
                actions: vec![
                    "Take an extra rest day".to_string(),
                    "Monitor symptoms and temperature".to_string(),
                    "Resume training only after markers normalize".to_string(),
                ],
            });
        }

        interventions.sort_by_key(|i| (i.priority, i.category));
        InterventionPlan { interventions }
    }
}

impl Default for InterventionGenerator {
    fn default() -> Self {
        Self::new()
    }
}
