// Library interface for ReadyRS modules
// The CLI, integration tests and benchmarks all go through this crate root

pub mod alerts;
pub mod baseline;
pub mod config;
pub mod decision;
pub mod deviation;
pub mod engine;
pub mod error;
pub mod import;
pub mod interventions;
pub mod logging;
pub mod models;
pub mod readiness;
pub mod scoring;
pub mod training_load;
pub mod trends;

// Re-export commonly used types for convenience
pub use models::*;
pub use alerts::{AlertCategory, AlertClassifier, AlertRecord, AlertSeverity};
pub use baseline::{BaselineEstimator, BaselineStatus, BaselineWindow};
pub use config::EngineConfig;
pub use decision::{DecisionTree, RecommendationDecision, TrainingCategory};
pub use deviation::{Deviation, DeviationKind};
pub use engine::{DailyEvaluation, RecoveryEngine};
pub use error::{CalculationError, ReadyRsError, Result, ValidationError};
pub use interventions::{InterventionPlan, InterventionPriority};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use readiness::{CompositeReadiness, RecoveryStatus};
pub use scoring::{ComponentScore, ComponentScorer, ComponentScores};
pub use training_load::{
    FitnessOutlook, LoadStatus, RaceReadiness, TrainingLoadAnalyzer, TrainingLoadMetrics,
};
pub use trends::{TrendAnalyzer, TrendReport};
