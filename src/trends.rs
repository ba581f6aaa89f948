use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::MetricSample;

/// Trend direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Stable,
    Decreasing,
}

/// Daily value whose short-term trend is tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendedValue {
    RestingHr,
    Hrv,
    SleepDuration,
}

impl TrendedValue {
    pub const ALL: [TrendedValue; 3] = [
        TrendedValue::RestingHr,
        TrendedValue::Hrv,
        TrendedValue::SleepDuration,
    ];

    fn read(&self, sample: &MetricSample) -> Option<f64> {
        match self {
            TrendedValue::RestingHr => sample.resting_hr,
            TrendedValue::Hrv => sample.hrv,
            TrendedValue::SleepDuration => sample.sleep_duration,
        }
    }
}

/// Direction of the relative change from `start` to `end`
///
/// The change is taken against `|start|` floored at 1 so values near zero
/// (TSB in particular) do not blow up the ratio.
pub fn trend_direction(start: f64, end: f64, threshold: f64) -> TrendDirection {
    let percent_change = (end - start) / start.abs().max(1.0);

    if percent_change > threshold {
        TrendDirection::Increasing
    } else if percent_change < -threshold {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendConfig {
    /// Short window in days (default: 3)
    pub short_days: u16,

    /// Medium window in days (default: 7)
    pub medium_days: u16,

    /// Long window in days (default: 28)
    pub long_days: u16,

    /// Relative change that counts as a trend (default: 0.05)
    pub change_threshold: f64,

    /// Nightly sleep need for the debt calculation (default: 8 h)
    pub sleep_need_hours: f64,

    /// Days summed for sleep debt (default: 7)
    pub sleep_debt_days: u16,
}

impl Default for TrendConfig {
    fn default() -> Self {
        TrendConfig {
            short_days: 3,
            medium_days: 7,
            long_days: 28,
            change_threshold: 0.05,
            sleep_need_hours: 8.0,
            sleep_debt_days: 7,
        }
    }
}

/// Windowed means of one value and the short-vs-long direction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueTrend {
    pub value: TrendedValue,
    pub short_mean: Option<f64>,
    pub medium_mean: Option<f64>,
    pub long_mean: Option<f64>,
    pub direction: Option<TrendDirection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    pub date: NaiveDate,
    pub trends: Vec<ValueTrend>,

    /// Hours of sleep short of the nightly need, `None` without sleep data
    pub sleep_debt_hours: Option<f64>,
}

impl TrendReport {
    pub fn get(&self, value: TrendedValue) -> Option<&ValueTrend> {
        self.trends.iter().find(|t| t.value == value)
    }
}

pub struct TrendAnalyzer {
    config: TrendConfig,
}

impl TrendAnalyzer {
    pub fn new() -> Self {
        TrendAnalyzer {
            config: TrendConfig::default(),
        }
    }

    pub fn with_config(config: TrendConfig) -> Self {
        TrendAnalyzer { config }
    }

    /// Values recorded in the `days`-long window ending on `date` (inclusive)
    fn window<'a>(
        history: &'a [MetricSample],
        date: NaiveDate,
        days: u16,
    ) -> impl Iterator<Item = &'a MetricSample> + 'a {
        let start = date
            .checked_sub_days(Days::new(days.saturating_sub(1) as u64))
            .unwrap_or(NaiveDate::MIN);
        history.iter().filter(move |s| s.date >= start && s.date <= date)
    }

    fn mean(history: &[MetricSample], date: NaiveDate, days: u16, value: TrendedValue) -> Option<f64> {
        let values: Vec<f64> = Self::window(history, date, days)
            .filter_map(|s| value.read(s))
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    }

    /// Relative change from `start` to `end` against the threshold
    pub fn determine_trend(&self, start: f64, end: f64) -> TrendDirection {
        trend_direction(start, end, self.config.change_threshold)
    }

    /// Sum of nightly shortfalls over the debt window; missing nights skipped
    pub fn sleep_debt(&self, history: &[MetricSample], date: NaiveDate) -> Option<f64> {
        let nights: Vec<f64> = Self::window(history, date, self.config.sleep_debt_days)
            .filter_map(|s| s.sleep_duration)
            .collect();
        if nights.is_empty() {
            return None;
        }
        Some(
            nights
                .iter()
                .map(|hours| (self.config.sleep_need_hours - hours).max(0.0))
                .sum(),
        )
    }

    pub fn analyze(&self, history: &[MetricSample], date: NaiveDate) -> TrendReport {
        let trends = TrendedValue::ALL
            .iter()
            .map(|&value| {
                let short_mean = Self::mean(history, date, self.config.short_days, value);
                let medium_mean = Self::mean(history, date, self.config.medium_days, value);
                let long_mean = Self::mean(history, date, self.config.long_days, value);
                let direction = match (long_mean, short_mean) {
                    (Some(long), Some(short)) => Some(self.determine_trend(long, short)),
                    _ => None,
                };
                ValueTrend {
                    value,
                    short_mean,
                    medium_mean,
                    long_mean,
                    direction,
                }
            })
            .collect();

        TrendReport {
            date,
            trends,
            sleep_debt_hours: self.sleep_debt(history, date),
        }
    }
}

impl Default for TrendAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
