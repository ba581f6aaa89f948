use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::models::MetricSample;
use crate::trends::{trend_direction, TrendDirection};

/// Training load analysis configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingLoadConfig {
    /// Acute window in days (default: 7)
    pub acute_days: u16,

    /// Chronic window in days (default: 28)
    pub chronic_days: u16,

    /// EMA span of the fatigue (ATL) average (default: 7)
    pub atl_span: u16,

    /// EMA span of the fitness (CTL) average (default: 42)
    pub ctl_span: u16,

    /// ACWR band considered optimal, inclusive (default: 0.8-1.3)
    pub acwr_optimal_min: f64,
    pub acwr_optimal_max: f64,

    /// Outer edges of the slight-concern bands (default: 0.7 and 1.5)
    pub acwr_slight_min: f64,
    pub acwr_slight_max: f64,

    /// Lookback for the CTL/ATL/TSB trends and the CTL ramp rate (default: 7)
    pub trend_days: u16,

    /// Relative change that counts as a fitness trend (default: 0.05)
    pub trend_change_threshold: f64,

    /// TSB a taper aims for, the floor of the fresh band (default: 5.0)
    pub taper_target_tsb: f64,

    /// Longest taper worth projecting (default: 21 days)
    pub taper_max_days: u16,
}

impl Default for TrainingLoadConfig {
    fn default() -> Self {
        TrainingLoadConfig {
            acute_days: 7,
            chronic_days: 28,
            atl_span: 7,
            ctl_span: 42,
            acwr_optimal_min: 0.8,
            acwr_optimal_max: 1.3,
            acwr_slight_min: 0.7,
            acwr_slight_max: 1.5,
            trend_days: 7,
            trend_change_threshold: 0.05,
            taper_target_tsb: 5.0,
            taper_max_days: 21,
        }
    }
}

/// Injury-risk band of an acute:chronic workload ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcwrBand {
    Optimal,       // 0.8 to 1.3
    SlightConcern, // 0.7 to 0.8, or 1.3 to 1.5
    HighConcern,   // below 0.7 or above 1.5
}

impl AcwrBand {
    pub fn description(&self) -> &'static str {
        match self {
            AcwrBand::Optimal => "Load is in the optimal range",
            AcwrBand::SlightConcern => "Load is slightly outside the optimal range",
            AcwrBand::HighConcern => "Load change is large enough to raise injury risk",
        }
    }
}

/// Training Stress Balance interpretation ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TsbInterpretation {
    VeryFresh,    // +25 and above
    Fresh,        // +5 to +25
    Neutral,      // -10 to +5
    Fatigued,     // -30 to -10
    VeryFatigued, // Below -30
}

impl TsbInterpretation {
    /// Get TSB interpretation from numeric value
    pub fn from_tsb(tsb: f64) -> Self {
        if tsb >= 25.0 {
            TsbInterpretation::VeryFresh
        } else if tsb >= 5.0 {
            TsbInterpretation::Fresh
        } else if tsb >= -10.0 {
            TsbInterpretation::Neutral
        } else if tsb >= -30.0 {
            TsbInterpretation::Fatigued
        } else {
            TsbInterpretation::VeryFatigued
        }
    }

    /// Get interpretation description
    pub fn description(&self) -> &'static str {
        match self {
            TsbInterpretation::VeryFresh => "Very fresh (may be losing fitness)",
            TsbInterpretation::Fresh => "Fresh and ready for hard training/racing",
            TsbInterpretation::Neutral => "Neutral (normal training)",
            TsbInterpretation::Fatigued => "Fatigued (monitor closely)",
            TsbInterpretation::VeryFatigued => "Very fatigued (rest needed)",
        }
    }
}

/// Race readiness read from form (TSB) and the fitness/fatigue trends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceReadiness {
    /// Fresh with fitness intact, a good window to race
    Peaked,
    /// Fatigue clearing while form is still neutral
    Tapering,
    /// Normal training, fitness being built
    #[default]
    Building,
    /// Fatigue is high and fitness is not rising to match it
    Overreached,
    /// Very fresh with fitness falling away
    Detraining,
}

impl RaceReadiness {
    /// Unknown trends are read as stable
    pub fn assess(
        tsb: TsbInterpretation,
        ctl_trend: Option<TrendDirection>,
        atl_trend: Option<TrendDirection>,
    ) -> Self {
        let ctl_trend = ctl_trend.unwrap_or(TrendDirection::Stable);
        let atl_trend = atl_trend.unwrap_or(TrendDirection::Stable);

        match tsb {
            TsbInterpretation::VeryFresh if ctl_trend == TrendDirection::Decreasing => {
                RaceReadiness::Detraining
            }
            TsbInterpretation::VeryFresh | TsbInterpretation::Fresh => RaceReadiness::Peaked,
            TsbInterpretation::Neutral if atl_trend == TrendDirection::Decreasing => {
                RaceReadiness::Tapering
            }
            TsbInterpretation::Neutral => RaceReadiness::Building,
            TsbInterpretation::Fatigued if ctl_trend == TrendDirection::Increasing => {
                RaceReadiness::Building
            }
            TsbInterpretation::Fatigued | TsbInterpretation::VeryFatigued => {
                RaceReadiness::Overreached
            }
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RaceReadiness::Peaked => "Fresh with fitness intact: good window to race",
            RaceReadiness::Tapering => "Taper underway, fatigue is clearing",
            RaceReadiness::Building => "Building fitness, not race-ready yet",
            RaceReadiness::Overreached => "Fatigue outpacing fitness, back off before racing",
            RaceReadiness::Detraining => "Fresh but losing fitness, taper has run too long",
        }
    }
}

/// Fitness trend and taper outlook derived from the CTL/ATL series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FitnessOutlook {
    /// Direction of CTL, ATL and TSB over the trend lookback;
    /// `None` when the series is not longer than the lookback
    pub ctl_trend: Option<TrendDirection>,
    pub atl_trend: Option<TrendDirection>,
    pub tsb_trend: Option<TrendDirection>,

    /// CTL change per week over the trend lookback
    pub ctl_ramp_rate: Option<f64>,

    pub race_readiness: RaceReadiness,

    /// Zero-load days until TSB reaches the taper target; `None` when it
    /// is not reachable within the projection limit
    pub taper_days: Option<u32>,
}

/// Load analytics for one evaluation date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingLoadMetrics {
    /// Date these metrics are calculated for
    pub date: NaiveDate,

    /// Mean daily load over the acute window
    pub acute_load: f64,

    /// Mean daily load over the chronic window
    pub chronic_load: f64,

    /// Acute:chronic workload ratio
    pub acwr: f64,
    pub acwr_band: AcwrBand,

    /// Fitness: EMA of daily load with the long span
    pub ctl: f64,

    /// Fatigue: EMA of daily load with the short span
    pub atl: f64,

    /// Training Stress Balance (CTL - ATL)
    pub tsb: f64,
    pub tsb_interpretation: TsbInterpretation,

    /// Acute vs chronic change in percent
    pub load_progression_pct: f64,

    /// Days of load history behind these numbers
    pub history_days: u32,

    pub fitness: FitnessOutlook,
}

/// Outcome of the load analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoadStatus {
    Ready(TrainingLoadMetrics),
    InsufficientData { available_days: u32, required_days: u32, reason: String },
}

impl LoadStatus {
    pub fn metrics(&self) -> Option<&TrainingLoadMetrics> {
        match self {
            LoadStatus::Ready(metrics) => Some(metrics),
            LoadStatus::InsufficientData { .. } => None,
        }
    }
}

/// Acute:chronic workload, training stress balance and load progression
pub struct TrainingLoadAnalyzer {
    config: TrainingLoadConfig,
}

impl TrainingLoadAnalyzer {
    /// Create analyzer with default configuration
    pub fn new() -> Self {
        TrainingLoadAnalyzer {
            config: TrainingLoadConfig::default(),
        }
    }

    /// Create analyzer with custom configuration
    pub fn with_config(config: TrainingLoadConfig) -> Self {
        TrainingLoadAnalyzer { config }
    }

    /// Sum recorded load per day, ignoring days after `date`
    pub fn aggregate_daily_load(
        &self,
        history: &[MetricSample],
        date: NaiveDate,
    ) -> BTreeMap<NaiveDate, f64> {
        let mut daily: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for sample in history.iter().filter(|s| s.date <= date) {
            if let Some(load) = sample.training_load {
                *daily.entry(sample.date).or_insert(0.0) += load;
            }
        }
        daily
    }

    /// Classify an ACWR value into its risk band
    pub fn acwr_band(&self, acwr: f64) -> AcwrBand {
        let c = &self.config;
        if acwr >= c.acwr_optimal_min && acwr <= c.acwr_optimal_max {
            AcwrBand::Optimal
        } else if (acwr >= c.acwr_slight_min && acwr < c.acwr_optimal_min)
            || (acwr > c.acwr_optimal_max && acwr <= c.acwr_slight_max)
        {
            AcwrBand::SlightConcern
        } else {
            AcwrBand::HighConcern
        }
    }

    /// Exponential moving average with `alpha = 2 / (span + 1)`,
    /// seeded with the first value
    pub fn ema(values: &[f64], span: u16) -> Option<f64> {
        Self::ema_series(values, span).last().copied()
    }

    /// Running EMA for every day of `values`
    pub fn ema_series(values: &[f64], span: u16) -> Vec<f64> {
        let alpha = 2.0 / (span as f64 + 1.0);
        let mut series = Vec::with_capacity(values.len());
        let mut iter = values.iter();
        if let Some(first) = iter.next() {
            let mut ema = *first;
            series.push(ema);
            for v in iter {
                ema += alpha * (v - ema);
                series.push(ema);
            }
        }
        series
    }

    /// Zero-load days until `ctl - atl` reaches the taper target
    ///
    /// Both averages decay by their own EMA factor on each rest day.
    pub fn taper_days(&self, ctl: f64, atl: f64) -> Option<u32> {
        let ctl_decay = 1.0 - 2.0 / (self.config.ctl_span as f64 + 1.0);
        let atl_decay = 1.0 - 2.0 / (self.config.atl_span as f64 + 1.0);
        let (mut ctl, mut atl) = (ctl, atl);

        for day in 0..=self.config.taper_max_days as u32 {
            if ctl - atl >= self.config.taper_target_tsb {
                return Some(day);
            }
            ctl *= ctl_decay;
            atl *= atl_decay;
        }
        None
    }

    /// Trends, ramp rate and race readiness from the daily CTL/ATL series
    fn fitness_outlook(&self, ctl_series: &[f64], atl_series: &[f64]) -> FitnessOutlook {
        let (Some(&ctl), Some(&atl)) = (ctl_series.last(), atl_series.last()) else {
            return FitnessOutlook::default();
        };
        let tsb = ctl - atl;
        let lookback = self.config.trend_days as usize;
        let threshold = self.config.trend_change_threshold;

        let (ctl_trend, atl_trend, tsb_trend, ctl_ramp_rate) = if ctl_series.len() > lookback {
            let past = ctl_series.len() - 1 - lookback;
            let (past_ctl, past_atl) = (ctl_series[past], atl_series[past]);
            let weeks = lookback as f64 / 7.0;
            (
                Some(trend_direction(past_ctl, ctl, threshold)),
                Some(trend_direction(past_atl, atl, threshold)),
                Some(trend_direction(past_ctl - past_atl, tsb, threshold)),
                Some((ctl - past_ctl) / weeks),
            )
        } else {
            (None, None, None, None)
        };

        FitnessOutlook {
            ctl_trend,
            atl_trend,
            tsb_trend,
            ctl_ramp_rate,
            race_readiness: RaceReadiness::assess(
                TsbInterpretation::from_tsb(tsb),
                ctl_trend,
                atl_trend,
            ),
            taper_days: self.taper_days(ctl, atl),
        }
    }

    /// Compute load analytics as of `date`
    ///
    /// Days inside the history without a recorded load count as zero-load
    /// rest days. The chronic mean divides by the days of history actually
    /// available (capped at the chronic window) so a young history does not
    /// inflate the ratio.
    pub fn analyze(&self, history: &[MetricSample], date: NaiveDate) -> LoadStatus {
        let daily = self.aggregate_daily_load(history, date);
        let required_days = self.config.acute_days as u32;

        let Some(first_date) = daily.keys().next().copied() else {
            return LoadStatus::InsufficientData {
                available_days: 0,
                required_days,
                reason: "no training load recorded".to_string(),
            };
        };

        let history_days = ((date - first_date).num_days() + 1) as u32;
        if history_days < required_days {
            return LoadStatus::InsufficientData {
                available_days: history_days,
                required_days,
                reason: format!(
                    "need at least {} days of load history",
                    self.config.acute_days
                ),
            };
        }

        // Dense day-by-day series from the first recorded load up to `date`
        let mut series = Vec::with_capacity(history_days as usize);
        let mut current = first_date;
        while current <= date {
            series.push(daily.get(&current).copied().unwrap_or(0.0));
            match current.succ_opt() {
                Some(next) => current = next,
                None => break,
            }
        }

        let acute_load = trailing_mean(&series, self.config.acute_days as usize);
        let chronic_load = trailing_mean(&series, self.config.chronic_days as usize);

        if chronic_load <= 0.0 {
            return LoadStatus::InsufficientData {
                available_days: history_days,
                required_days,
                reason: "chronic load is zero".to_string(),
            };
        }

        let acwr = acute_load / chronic_load;
        let load_progression_pct = (acute_load - chronic_load) / chronic_load * 100.0;

        let ctl_series = Self::ema_series(&series, self.config.ctl_span);
        let atl_series = Self::ema_series(&series, self.config.atl_span);
        let ctl = ctl_series.last().copied().unwrap_or(0.0);
        let atl = atl_series.last().copied().unwrap_or(0.0);
        let tsb = ctl - atl;
        let fitness = self.fitness_outlook(&ctl_series, &atl_series);

        debug!(
            %date,
            acute_load,
            chronic_load,
            acwr,
            tsb,
            race_readiness = ?fitness.race_readiness,
            "Training load analyzed"
        );

        LoadStatus::Ready(TrainingLoadMetrics {
            date,
            acute_load,
            chronic_load,
            acwr,
            acwr_band: self.acwr_band(acwr),
            ctl,
            atl,
            tsb,
            tsb_interpretation: TsbInterpretation::from_tsb(tsb),
            load_progression_pct,
            history_days,
            fitness,
        })
    }
}

impl Default for TrainingLoadAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Mean of the last `window` values (or all of them when shorter)
fn trailing_mean(series: &[f64], window: usize) -> f64 {
    let take = window.min(series.len());
    if take == 0 {
        return 0.0;
    }
    series[series.len() - take..].iter().sum::<f64>() / take as f64
}

/// Days since the most recent hard session, looking back `lookback` days
///
/// A hard session on `date` itself counts as zero days. With no hard
/// session inside the lookback the athlete is considered rested and the
/// lookback length is returned.
pub fn days_since_last_hard(history: &[MetricSample], date: NaiveDate, lookback: u16) -> u32 {
    days_since(history, date, lookback, |sample| {
        sample.session_intensity.map_or(false, |i| i.is_hard())
    })
}

/// Days since the most recent rest or easy day, looking back `lookback` days
///
/// A day with no recorded sample, or a sample with neither a session tag nor
/// any load, counts as a rest day.
pub fn days_since_recovery_day(history: &[MetricSample], date: NaiveDate, lookback: u16) -> u32 {
    let by_date: BTreeMap<NaiveDate, &MetricSample> = history
        .iter()
        .filter(|s| s.date <= date)
        .map(|s| (s.date, s))
        .collect();

    for offset in 0..lookback as u64 {
        let Some(day) = date.checked_sub_days(Days::new(offset)) else {
            break;
        };
        let is_recovery = match by_date.get(&day) {
            None => true,
            Some(sample) => match sample.session_intensity {
                Some(intensity) => intensity.is_recovery(),
                None => sample.training_load.map_or(true, |load| load <= 0.0),
            },
        };
        if is_recovery {
            return offset as u32;
        }
    }
    lookback as u32
}

fn days_since<F>(history: &[MetricSample], date: NaiveDate, lookback: u16, matches: F) -> u32
where
    F: Fn(&MetricSample) -> bool,
{
    history
        .iter()
        .filter(|s| s.date <= date)
        .filter(|s| (date - s.date).num_days() < lookback as i64)
        .filter(|s| matches(s))
        .map(|s| (date - s.date).num_days() as u32)
        .min()
        .unwrap_or(lookback as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionIntensity;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 1).unwrap()
    }

    fn load_history(loads: &[f64]) -> Vec<MetricSample> {
        loads
            .iter()
            .enumerate()
            .map(|(i, load)| MetricSample {
                training_load: Some(*load),
                ..MetricSample::new("athlete", start() + Days::new(i as u64))
            })
            .collect()
    }

    fn last_day(len: usize) -> NaiveDate {
        start() + Days::new(len as u64 - 1)
    }

    #[test]
    fn test_acwr_optimal_scenario() {
        // 21 days at 93.33 then 7 days at 120: acute 120, chronic 100
        let mut loads = vec![280.0 / 3.0; 21];
        loads.extend(vec![120.0; 7]);
        let history = load_history(&loads);

        let analyzer = TrainingLoadAnalyzer::new();
        let status = analyzer.analyze(&history, last_day(28));
        let metrics = status.metrics().unwrap();

        assert!((metrics.acute_load - 120.0).abs() < 1e-9);
        assert!((metrics.chronic_load - 100.0).abs() < 1e-9);
        assert!((metrics.acwr - 1.2).abs() < 1e-9);
        assert_eq!(metrics.acwr_band, AcwrBand::Optimal);
        assert!((metrics.load_progression_pct - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_insufficient_history() {
        let history = load_history(&[50.0; 5]);
        let analyzer = TrainingLoadAnalyzer::new();

        match analyzer.analyze(&history, last_day(5)) {
            LoadStatus::InsufficientData { available_days, required_days, .. } => {
                assert_eq!(available_days, 5);
                assert_eq!(required_days, 7);
            }
            other => panic!("expected insufficient data, got {:?}", other),
        }

        assert!(analyzer.analyze(&[], start()).metrics().is_none());
    }

    #[test]
    fn test_zero_chronic_load_is_insufficient() {
        let history = load_history(&[0.0; 28]);
        let analyzer = TrainingLoadAnalyzer::new();
        assert!(analyzer.analyze(&history, last_day(28)).metrics().is_none());
    }

    #[test]
    fn test_missing_days_count_as_rest() {
        let mut history = load_history(&[100.0; 14]);
        // Leave a 7-day gap, then a single session
        history.push(MetricSample {
            training_load: Some(70.0),
            ..MetricSample::new("athlete", start() + Days::new(21))
        });

        let analyzer = TrainingLoadAnalyzer::new();
        let metrics = analyzer.analyze(&history, start() + Days::new(21)).metrics().cloned().unwrap();

        assert!((metrics.acute_load - 10.0).abs() < 1e-9);
        assert!((metrics.chronic_load - 1470.0 / 22.0).abs() < 1e-9);
        assert_eq!(metrics.history_days, 22);
        assert_eq!(metrics.acwr_band, AcwrBand::HighConcern);
    }

    #[test]
    fn test_acwr_bands() {
        let analyzer = TrainingLoadAnalyzer::new();
        assert_eq!(analyzer.acwr_band(0.8), AcwrBand::Optimal);
        assert_eq!(analyzer.acwr_band(1.3), AcwrBand::Optimal);
        assert_eq!(analyzer.acwr_band(0.75), AcwrBand::SlightConcern);
        assert_eq!(analyzer.acwr_band(1.4), AcwrBand::SlightConcern);
        assert_eq!(analyzer.acwr_band(1.5), AcwrBand::SlightConcern);
        assert_eq!(analyzer.acwr_band(1.51), AcwrBand::HighConcern);
        assert_eq!(analyzer.acwr_band(0.5), AcwrBand::HighConcern);
    }

    #[test]
    fn test_tsb_negative_after_load_spike() {
        let mut loads = vec![50.0; 35];
        loads.extend(vec![150.0; 7]);
        let history = load_history(&loads);

        let analyzer = TrainingLoadAnalyzer::new();
        let metrics = analyzer.analyze(&history, last_day(42)).metrics().cloned().unwrap();

        // Fatigue reacts faster than fitness
        assert!(metrics.atl > metrics.ctl);
        assert!(metrics.tsb < 0.0);
        assert!(metrics.acwr > 1.5);
    }

    #[test]
    fn test_ema_steady_state() {
        assert_eq!(TrainingLoadAnalyzer::ema(&[80.0; 10], 7), Some(80.0));
        assert_eq!(TrainingLoadAnalyzer::ema(&[], 7), None);

        // alpha = 2/(1+1) = 1 tracks the latest value
        assert_eq!(TrainingLoadAnalyzer::ema(&[10.0, 20.0, 30.0], 1), Some(30.0));
    }

    #[test]
    fn test_tsb_interpretation() {
        assert_eq!(TsbInterpretation::from_tsb(30.0), TsbInterpretation::VeryFresh);
        assert_eq!(TsbInterpretation::from_tsb(10.0), TsbInterpretation::Fresh);
        assert_eq!(TsbInterpretation::from_tsb(0.0), TsbInterpretation::Neutral);
        assert_eq!(TsbInterpretation::from_tsb(-20.0), TsbInterpretation::Fatigued);
        assert_eq!(TsbInterpretation::from_tsb(-40.0), TsbInterpretation::VeryFatigued);
    }

    #[test]
    fn test_steady_load_is_stable() {
        let history = load_history(&[100.0; 60]);
        let metrics = TrainingLoadAnalyzer::new()
            .analyze(&history, last_day(60))
            .metrics()
            .cloned()
            .unwrap();
        let fitness = &metrics.fitness;

        assert_eq!(fitness.ctl_trend, Some(TrendDirection::Stable));
        assert_eq!(fitness.atl_trend, Some(TrendDirection::Stable));
        assert_eq!(fitness.tsb_trend, Some(TrendDirection::Stable));
        assert!(fitness.ctl_ramp_rate.unwrap().abs() < 1e-9);
        assert_eq!(fitness.race_readiness, RaceReadiness::Building);
        // One rest day: 100 * 41/43 - 100 * 6/8 is already past +5
        assert_eq!(fitness.taper_days, Some(1));
    }

    #[test]
    fn test_build_block_ramps_fitness() {
        let mut loads = vec![50.0; 30];
        loads.extend(vec![100.0; 14]);
        let history = load_history(&loads);

        let metrics = TrainingLoadAnalyzer::new()
            .analyze(&history, last_day(44))
            .metrics()
            .cloned()
            .unwrap();

        assert_eq!(metrics.tsb_interpretation, TsbInterpretation::Fatigued);
        assert_eq!(metrics.fitness.ctl_trend, Some(TrendDirection::Increasing));
        assert!(metrics.fitness.ctl_ramp_rate.unwrap() > 5.0);
        assert_eq!(metrics.fitness.race_readiness, RaceReadiness::Building);
        assert!(metrics.fitness.taper_days.unwrap() > 0);
    }

    #[test]
    fn test_short_taper_peaks() {
        let mut loads = vec![100.0; 42];
        loads.extend(vec![60.0; 3]);
        let history = load_history(&loads);

        let metrics = TrainingLoadAnalyzer::new()
            .analyze(&history, last_day(45))
            .metrics()
            .cloned()
            .unwrap();

        assert_eq!(metrics.tsb_interpretation, TsbInterpretation::Fresh);
        assert_eq!(metrics.fitness.race_readiness, RaceReadiness::Peaked);
        assert_eq!(metrics.fitness.taper_days, Some(0));
    }

    #[test]
    fn test_long_taper_detrains() {
        let mut loads = vec![100.0; 42];
        loads.extend(vec![30.0; 10]);
        let history = load_history(&loads);

        let metrics = TrainingLoadAnalyzer::new()
            .analyze(&history, last_day(52))
            .metrics()
            .cloned()
            .unwrap();

        assert_eq!(metrics.tsb_interpretation, TsbInterpretation::VeryFresh);
        assert_eq!(metrics.fitness.ctl_trend, Some(TrendDirection::Decreasing));
        assert!(metrics.fitness.ctl_ramp_rate.unwrap() < 0.0);
        assert_eq!(metrics.fitness.race_readiness, RaceReadiness::Detraining);
    }

    #[test]
    fn test_fitness_trends_need_lookback() {
        let history = load_history(&[80.0; 7]);
        let metrics = TrainingLoadAnalyzer::new()
            .analyze(&history, last_day(7))
            .metrics()
            .cloned()
            .unwrap();

        assert_eq!(metrics.fitness.ctl_trend, None);
        assert_eq!(metrics.fitness.ctl_ramp_rate, None);
        assert_eq!(metrics.fitness.race_readiness, RaceReadiness::Building);
    }

    #[test]
    fn test_race_readiness_table() {
        use crate::trends::TrendDirection::*;

        assert_eq!(
            RaceReadiness::assess(TsbInterpretation::Neutral, Some(Stable), Some(Decreasing)),
            RaceReadiness::Tapering
        );
        assert_eq!(
            RaceReadiness::assess(TsbInterpretation::Fatigued, Some(Stable), None),
            RaceReadiness::Overreached
        );
        assert_eq!(
            RaceReadiness::assess(TsbInterpretation::Fatigued, Some(Increasing), None),
            RaceReadiness::Building
        );
        assert_eq!(
            RaceReadiness::assess(TsbInterpretation::VeryFatigued, Some(Increasing), None),
            RaceReadiness::Overreached
        );
        assert_eq!(
            RaceReadiness::assess(TsbInterpretation::VeryFresh, None, None),
            RaceReadiness::Peaked
        );
    }

    #[test]
    fn test_taper_unreachable_with_low_fitness() {
        let analyzer = TrainingLoadAnalyzer::new();
        assert_eq!(analyzer.taper_days(3.0, 3.0), None);
        assert_eq!(analyzer.taper_days(60.0, 40.0), Some(0));
        // ctl 60, atl 80: 57.2 - 60.0 after one day, 54.5 - 45.0 after two
        assert_eq!(analyzer.taper_days(60.0, 80.0), Some(2));
    }

    fn tagged(offset_from_end: u64, end: NaiveDate, intensity: SessionIntensity) -> MetricSample {
        MetricSample {
            session_intensity: Some(intensity),
            training_load: Some(80.0),
            ..MetricSample::new("athlete", end - Days::new(offset_from_end))
        }
    }

    #[test]
    fn test_days_since_last_hard() {
        let end = NaiveDate::from_ymd_opt(2024, 9, 20).unwrap();

        let history = vec![tagged(0, end, SessionIntensity::Hard)];
        assert_eq!(days_since_last_hard(&history, end, 7), 0);

        let history = vec![
            tagged(5, end, SessionIntensity::Vo2max),
            tagged(3, end, SessionIntensity::Threshold),
            tagged(1, end, SessionIntensity::Easy),
        ];
        assert_eq!(days_since_last_hard(&history, end, 7), 3);

        // Outside the lookback counts as rested
        let history = vec![tagged(9, end, SessionIntensity::Hard)];
        assert_eq!(days_since_last_hard(&history, end, 7), 7);
        assert_eq!(days_since_last_hard(&[], end, 7), 7);
    }

    #[test]
    fn test_days_since_recovery_day() {
        let end = NaiveDate::from_ymd_opt(2024, 9, 20).unwrap();
        let history: Vec<MetricSample> = (0..5)
            .map(|offset| tagged(offset, end, SessionIntensity::Moderate))
            .collect();
        // Days 0-4 trained, day 5 has no sample
        assert_eq!(days_since_recovery_day(&history, end, 7), 5);

        let mut history = history;
        history.push(tagged(7, end, SessionIntensity::Rest));
        history.push(tagged(6, end, SessionIntensity::Hard));
        history.push(tagged(5, end, SessionIntensity::Easy));
        assert_eq!(days_since_recovery_day(&history, end, 7), 5);

        let today_rest = vec![tagged(0, end, SessionIntensity::Rest)];
        assert_eq!(days_since_recovery_day(&today_rest, end, 7), 0);
    }
}
