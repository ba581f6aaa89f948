use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::alerts::AlertConfig;
use crate::baseline::BaselineConfig;
use crate::decision::DecisionConfig;
use crate::error::ReadyRsError;
use crate::interventions::InterventionConfig;
use crate::readiness::ReadinessConfig;
use crate::scoring::ScoringConfig;
use crate::training_load::TrainingLoadConfig;
use crate::trends::TrendConfig;

/// Engine configuration
///
/// Every threshold, weight and window the engine uses lives here; the
/// defaults are the canonical tables. Sections missing from a TOML file fall
/// back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Configuration format version
    pub version: String,
    pub baseline: BaselineConfig,
    pub scoring: ScoringConfig,
    pub readiness: ReadinessConfig,
    pub training_load: TrainingLoadConfig,
    pub alerts: AlertConfig,
    pub decision: DecisionConfig,
    pub interventions: InterventionConfig,
    pub trends: TrendConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            version: env!("CARGO_PKG_VERSION").to_string(),
            baseline: BaselineConfig::default(),
            scoring: ScoringConfig::default(),
            readiness: ReadinessConfig::default(),
            training_load: TrainingLoadConfig::default(),
            alerts: AlertConfig::default(),
            decision: DecisionConfig::default(),
            interventions: InterventionConfig::default(),
            trends: TrendConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: EngineConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;

        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".readyrs")
            .join("config.toml")
    }

    /// Load configuration with fallback to defaults
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();

        match Self::load_from_file(&config_path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    path = %config_path.display(),
                    error = %e,
                    "Config not loaded, using defaults"
                );
                Self::default()
            }
        }
    }

    /// Check the configuration for values the engine cannot work with
    pub fn validate(&self) -> crate::Result<()> {
        let fail = |msg: String| Err(ReadyRsError::Configuration(msg));

        let b = &self.baseline;
        if b.window_days == 0 || b.min_samples == 0 || b.min_samples > b.window_days {
            return fail(format!(
                "baseline needs 0 < min_samples ({}) <= window_days ({})",
                b.min_samples, b.window_days
            ));
        }
        if !(b.iqr_multiplier > 0.0) {
            return fail(format!("iqr_multiplier must be positive, got {}", b.iqr_multiplier));
        }

        for (name, scoring) in [
            ("resting_hr", &self.scoring.resting_hr),
            ("hrv", &self.scoring.hrv),
            ("temperature", &self.scoring.temperature),
            ("spo2", &self.scoring.spo2),
        ] {
            if let Err(e) = scoring.table.validate() {
                return fail(format!("{} score table: {}", name, e));
            }
        }

        let sleep = &self.scoring.sleep;
        if sleep.duration_optimal_min > sleep.duration_optimal_max
            || sleep.duration_near_band > sleep.duration_far_band
        {
            return fail("sleep duration bands are out of order".to_string());
        }

        let weights = &self.readiness.weights;
        if weights.values().any(|w| !w.is_finite() || *w < 0.0) {
            return fail("readiness weights must be finite and non-negative".to_string());
        }
        if !weights.values().any(|w| *w > 0.0) {
            return fail("at least one readiness weight must be positive".to_string());
        }

        let cuts = &self.readiness.cut_points;
        if !(cuts.optimal > cuts.good && cuts.good > cuts.moderate) {
            return fail(format!(
                "status cut-points must descend: {} > {} > {}",
                cuts.optimal, cuts.good, cuts.moderate
            ));
        }

        let load = &self.training_load;
        if load.acute_days == 0 || load.acute_days >= load.chronic_days {
            return fail(format!(
                "load windows need 0 < acute ({}) < chronic ({})",
                load.acute_days, load.chronic_days
            ));
        }
        if load.atl_span == 0 || load.ctl_span == 0 {
            return fail("EMA spans must be positive".to_string());
        }
        if !(load.acwr_slight_min <= load.acwr_optimal_min
            && load.acwr_optimal_min <= load.acwr_optimal_max
            && load.acwr_optimal_max <= load.acwr_slight_max)
        {
            return fail("ACWR bands are out of order".to_string());
        }
        if load.trend_days == 0 || load.trend_change_threshold <= 0.0 {
            return fail("fitness trend lookback and threshold must be positive".to_string());
        }

        for (name, tiers) in [
            ("resting_hr", &self.alerts.resting_hr),
            ("hrv_percent", &self.alerts.hrv_percent),
            ("acwr", &self.alerts.acwr),
            ("temperature", &self.alerts.temperature),
        ] {
            if let Err(e) = tiers.validate() {
                return fail(format!("{} alert: {}", name, e));
            }
        }

        let i = &self.decision.intensities;
        if [i.rest, i.easy, i.moderate, i.hard].iter().any(|v| !(0.0..=1.0).contains(v)) {
            return fail("decision intensities must lie in [0, 1]".to_string());
        }
        if self.decision.hard_lookback_days == 0 || self.interventions.recovery_lookback_days == 0 {
            return fail("lookback windows must be positive".to_string());
        }

        let t = &self.trends;
        if t.short_days == 0 || t.short_days > t.medium_days || t.medium_days > t.long_days {
            return fail("trend windows must satisfy 0 < short <= medium <= long".to_string());
        }

        Ok(())
    }
}
