//! Recommendation decision tree
//!
//! The tree is an ordered table of guard/action rules evaluated top-down;
//! the first rule whose guard matches decides the day. Guards return the
//! reason string when they match so the explanation always quotes the
//! numbers that actually drove the decision.
//!
//! | #  | Rule               | Guard                                                | Category |
//! |----|--------------------|------------------------------------------------------|----------|
//! | 1  | `critical_flags`   | ≥2 scores at a critical cut-off, or a critical alert | REST     |
//! | 2  | `load_risk`        | ACWR > 1.5 or progression > 30 %                     | EASY     |
//! | 3  | `optimal_hard`     | OPTIMAL, ≥2 days since hard, TSB > -10               | HARD     |
//! | 4  | `optimal_moderate` | OPTIMAL, ≥1 day since hard                           | MODERATE |
//! | 5  | `optimal_easy`     | OPTIMAL                                              | EASY     |
//! | 6  | `good_moderate`    | GOOD, ≥3 days since hard, ACWR < 1.2                 | MODERATE |
//! | 7  | `good_easy`        | GOOD                                                 | EASY     |
//! | 8  | `moderate_easy`    | MODERATE, ≥2 days since hard, score > 55             | EASY     |
//! | 9  | `moderate_rest`    | MODERATE                                             | REST     |
//! | 10 | `poor_rest`        | POOR                                                 | REST     |
//!
//! Guards that need TSB or ACWR never match while load history is
//! insufficient.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

use crate::alerts::{AlertRecord, AlertSeverity};
use crate::models::Metric;
use crate::readiness::{CompositeReadiness, RecoveryStatus};
use crate::scoring::ComponentScores;
use crate::training_load::TrainingLoadMetrics;

/// Recommended training category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrainingCategory {
    Rest,
    Easy,
    Moderate,
    Hard,
}

impl fmt::Display for TrainingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TrainingCategory::Rest => "REST",
            TrainingCategory::Easy => "EASY",
            TrainingCategory::Moderate => "MODERATE",
            TrainingCategory::Hard => "HARD",
        };
        write!(f, "{}", label)
    }
}

/// Intensity (0-1) attached to each category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryIntensities {
    pub rest: f64,
    pub easy: f64,
    pub moderate: f64,
    pub hard: f64,
}

impl Default for CategoryIntensities {
    fn default() -> Self {
        CategoryIntensities {
            rest: 0.0,
            easy: 0.3,
            moderate: 0.6,
            hard: 0.9,
        }
    }
}

impl CategoryIntensities {
    pub fn for_category(&self, category: TrainingCategory) -> f64 {
        match category {
            TrainingCategory::Rest => self.rest,
            TrainingCategory::Easy => self.easy,
            TrainingCategory::Moderate => self.moderate,
            TrainingCategory::Hard => self.hard,
        }
    }
}

/// Decision tree thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionConfig {
    /// Score at or below which a component counts as a critical flag
    pub critical_cutoffs: BTreeMap<Metric, u8>,

    /// Critical flags needed to force REST (default: 2)
    pub min_critical_flags: usize,

    /// ACWR above which load overrides readiness (default: 1.5)
    pub acwr_override: f64,

    /// Load progression (%) above which load overrides readiness (default: 30)
    pub progression_override: f64,

    /// Days since the last hard session required for HARD (default: 2)
    pub hard_min_rest_days: u32,

    /// TSB must be above this for HARD (default: -10)
    pub hard_min_tsb: f64,

    /// Days since hard required for MODERATE under OPTIMAL (default: 1)
    pub optimal_moderate_rest_days: u32,

    /// Days since hard required for MODERATE under GOOD (default: 3)
    pub good_moderate_rest_days: u32,

    /// ACWR must be below this for MODERATE under GOOD (default: 1.2)
    pub good_moderate_max_acwr: f64,

    /// Days since hard required for EASY under MODERATE (default: 2)
    pub moderate_easy_rest_days: u32,

    /// Composite must be above this for EASY under MODERATE (default: 55)
    pub moderate_easy_min_score: f64,

    /// Days searched back for the last hard session (default: 7)
    pub hard_lookback_days: u16,

    pub intensities: CategoryIntensities,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        DecisionConfig {
            critical_cutoffs: BTreeMap::from([
                (Metric::RestingHr, 20),
                (Metric::Hrv, 10),
                (Metric::Sleep, 40),
                (Metric::Temperature, 50),
                (Metric::Spo2, 20),
            ]),
            min_critical_flags: 2,
            acwr_override: 1.5,
            progression_override: 30.0,
            hard_min_rest_days: 2,
            hard_min_tsb: -10.0,
            optimal_moderate_rest_days: 1,
            good_moderate_rest_days: 3,
            good_moderate_max_acwr: 1.2,
            moderate_easy_rest_days: 2,
            moderate_easy_min_score: 55.0,
            hard_lookback_days: 7,
            intensities: CategoryIntensities::default(),
        }
    }
}

/// Everything a rule guard may look at
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext<'a> {
    pub date: NaiveDate,
    pub readiness: &'a CompositeReadiness,
    pub components: &'a ComponentScores,
    pub alerts: &'a [AlertRecord],
    pub load: Option<&'a TrainingLoadMetrics>,
    pub days_since_hard: u32,
}

impl<'a> DecisionContext<'a> {
    fn status(&self) -> RecoveryStatus {
        self.readiness.status
    }

    fn acwr(&self) -> Option<f64> {
        self.load.map(|l| l.acwr)
    }

    fn tsb(&self) -> Option<f64> {
        self.load.map(|l| l.tsb)
    }

    /// Components at or below their critical cut-off, formatted for a reason
    fn critical_flags(&self, config: &DecisionConfig) -> Vec<String> {
        self.components
            .values()
            .filter(|c| {
                config
                    .critical_cutoffs
                    .get(&c.metric)
                    .map_or(false, |cutoff| c.score <= *cutoff)
            })
            .map(|c| format!("{} score {}", c.metric, c.score))
            .collect()
    }
}

pub type RuleGuard = fn(&DecisionContext<'_>, &DecisionConfig) -> Option<String>;

/// One row of the decision table
#[derive(Clone)]
pub struct DecisionRule {
    pub name: &'static str,
    pub category: TrainingCategory,
    pub confidence: f64,
    pub guard: RuleGuard,
}

impl fmt::Debug for DecisionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecisionRule")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("confidence", &self.confidence)
            .finish()
    }
}

fn critical_flags(ctx: &DecisionContext<'_>, config: &DecisionConfig) -> Option<String> {
    let flags = ctx.critical_flags(config);
    let critical_alerts: Vec<String> = ctx
        .alerts
        .iter()
        .filter(|a| a.severity == AlertSeverity::Critical)
        .map(|a| format!("critical {} alert: {}", a.category, a.message))
        .collect();

    if flags.len() >= config.min_critical_flags || !critical_alerts.is_empty() {
        let mut reasons = flags;
        reasons.extend(critical_alerts);
        Some(format!("Critical recovery flags: {}", reasons.join("; ")))
    } else {
        None
    }
}

fn load_risk(ctx: &DecisionContext<'_>, config: &DecisionConfig) -> Option<String> {
    let load = ctx.load?;
    if load.acwr > config.acwr_override || load.load_progression_pct > config.progression_override {
        Some(format!(
            "Training load spike: ACWR {:.2}, load progression {:+.0}%",
            load.acwr, load.load_progression_pct
        ))
    } else {
        None
    }
}

fn optimal_hard(ctx: &DecisionContext<'_>, config: &DecisionConfig) -> Option<String> {
    let tsb = ctx.tsb()?;
    (ctx.status() == RecoveryStatus::Optimal
        && ctx.days_since_hard >= config.hard_min_rest_days
        && tsb > config.hard_min_tsb)
        .then(|| {
            format!(
                "Optimal readiness ({:.0}), {} days since last hard session, TSB {:.1}",
                ctx.readiness.score, ctx.days_since_hard, tsb
            )
        })
}

fn optimal_moderate(ctx: &DecisionContext<'_>, config: &DecisionConfig) -> Option<String> {
    (ctx.status() == RecoveryStatus::Optimal
        && ctx.days_since_hard >= config.optimal_moderate_rest_days)
        .then(|| {
            format!(
                "Optimal readiness ({:.0}), {} day(s) since last hard session",
                ctx.readiness.score, ctx.days_since_hard
            )
        })
}

fn optimal_easy(ctx: &DecisionContext<'_>, _config: &DecisionConfig) -> Option<String> {
    (ctx.status() == RecoveryStatus::Optimal).then(|| {
        format!(
            "Optimal readiness ({:.0}) but a hard session was done today",
            ctx.readiness.score
        )
    })
}

fn good_moderate(ctx: &DecisionContext<'_>, config: &DecisionConfig) -> Option<String> {
    let acwr = ctx.acwr()?;
    (ctx.status() == RecoveryStatus::Good
        && ctx.days_since_hard >= config.good_moderate_rest_days
        && acwr < config.good_moderate_max_acwr)
        .then(|| {
            format!(
                "Good readiness ({:.0}), {} days since last hard session, ACWR {:.2}",
                ctx.readiness.score, ctx.days_since_hard, acwr
            )
        })
}

fn good_easy(ctx: &DecisionContext<'_>, _config: &DecisionConfig) -> Option<String> {
    (ctx.status() == RecoveryStatus::Good)
        .then(|| format!("Good readiness ({:.0})", ctx.readiness.score))
}

fn moderate_easy(ctx: &DecisionContext<'_>, config: &DecisionConfig) -> Option<String> {
    (ctx.status() == RecoveryStatus::Moderate
        && ctx.days_since_hard >= config.moderate_easy_rest_days
        && ctx.readiness.score > config.moderate_easy_min_score)
        .then(|| {
            format!(
                "Moderate readiness ({:.0}), {} days since last hard session",
                ctx.readiness.score, ctx.days_since_hard
            )
        })
}

fn moderate_rest(ctx: &DecisionContext<'_>, _config: &DecisionConfig) -> Option<String> {
    (ctx.status() == RecoveryStatus::Moderate)
        .then(|| format!("Moderate readiness ({:.0}), recovery still incomplete", ctx.readiness.score))
}

fn poor_rest(ctx: &DecisionContext<'_>, _config: &DecisionConfig) -> Option<String> {
    (ctx.status() == RecoveryStatus::Poor)
        .then(|| format!("Poor readiness ({:.0})", ctx.readiness.score))
}

/// The canonical rule table, in evaluation order
pub fn default_rules() -> Vec<DecisionRule> {
    vec![
        DecisionRule { name: "critical_flags", category: TrainingCategory::Rest, confidence: 0.95, guard: critical_flags },
        DecisionRule { name: "load_risk", category: TrainingCategory::Easy, confidence: 0.90, guard: load_risk },
        DecisionRule { name: "optimal_hard", category: TrainingCategory::Hard, confidence: 0.85, guard: optimal_hard },
        DecisionRule { name: "optimal_moderate", category: TrainingCategory::Moderate, confidence: 0.80, guard: optimal_moderate },
        DecisionRule { name: "optimal_easy", category: TrainingCategory::Easy, confidence: 0.75, guard: optimal_easy },
        DecisionRule { name: "good_moderate", category: TrainingCategory::Moderate, confidence: 0.80, guard: good_moderate },
        DecisionRule { name: "good_easy", category: TrainingCategory::Easy, confidence: 0.75, guard: good_easy },
        DecisionRule { name: "moderate_easy", category: TrainingCategory::Easy, confidence: 0.70, guard: moderate_easy },
        DecisionRule { name: "moderate_rest", category: TrainingCategory::Rest, confidence: 0.75, guard: moderate_rest },
        DecisionRule { name: "poor_rest", category: TrainingCategory::Rest, confidence: 0.90, guard: poor_rest },
    ]
}

/// Name and confidence used when no rule matches
const FALLBACK_RULE: &str = "fallback_rest";
const FALLBACK_CONFIDENCE: f64 = 0.5;

/// The day's training recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationDecision {
    pub date: NaiveDate,
    pub category: TrainingCategory,
    pub intensity: f64,
    pub confidence: f64,
    pub reason: String,

    /// Name of the rule that fired
    pub rule: String,

    /// Component scores the decision was based on
    pub components: BTreeMap<Metric, u8>,

    pub readiness_score: f64,
    pub status: RecoveryStatus,
}

/// Ordered-rule decision tree
pub struct DecisionTree {
    config: DecisionConfig,
    rules: Vec<DecisionRule>,
}

impl DecisionTree {
    pub fn new() -> Self {
        Self::with_config(DecisionConfig::default())
    }

    pub fn with_config(config: DecisionConfig) -> Self {
        DecisionTree {
            config,
            rules: default_rules(),
        }
    }

    /// Replace the rule table (mainly for testing single rules)
    pub fn with_rules(config: DecisionConfig, rules: Vec<DecisionRule>) -> Self {
        DecisionTree { config, rules }
    }

    pub fn rules(&self) -> &[DecisionRule] {
        &self.rules
    }

    /// First matching rule and its reason
    pub fn first_match(&self, ctx: &DecisionContext<'_>) -> Option<(&DecisionRule, String)> {
        self.rules
            .iter()
            .find_map(|rule| (rule.guard)(ctx, &self.config).map(|reason| (rule, reason)))
    }

    pub fn decide(&self, ctx: &DecisionContext<'_>) -> RecommendationDecision {
        let (name, category, confidence, reason) = match self.first_match(ctx) {
            Some((rule, reason)) => (rule.name, rule.category, rule.confidence, reason),
            None => (
                FALLBACK_RULE,
                TrainingCategory::Rest,
                FALLBACK_CONFIDENCE,
                "No rule matched".to_string(),
            ),
        };

        info!(
            date = %ctx.date,
            rule = name,
            category = %category,
            readiness = ctx.readiness.score,
            "Recommendation decided"
        );

        RecommendationDecision {
            date: ctx.date,
            category,
            intensity: self.config.intensities.for_category(category),
            confidence,
            reason,
            rule: name.to_string(),
            components: ctx.components.iter().map(|(m, c)| (*m, c.score)).collect(),
            readiness_score: ctx.readiness.score,
            status: ctx.readiness.status,
        }
    }
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}
