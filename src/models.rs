use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

/// Physiological metrics that contribute a component score to readiness
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    RestingHr,
    Hrv,
    Sleep,
    ReadinessIndex,
    Temperature,
    Spo2,
}

impl Metric {
    /// Every scored metric, in composite table order
    pub const ALL: [Metric; 6] = [
        Metric::RestingHr,
        Metric::Hrv,
        Metric::Sleep,
        Metric::ReadinessIndex,
        Metric::Temperature,
        Metric::Spo2,
    ];

    /// Metrics that are scored against a rolling personal baseline
    pub const BASELINED: [Metric; 4] = [
        Metric::RestingHr,
        Metric::Hrv,
        Metric::Temperature,
        Metric::Spo2,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::RestingHr => "resting_hr",
            Metric::Hrv => "hrv",
            Metric::Sleep => "sleep",
            Metric::ReadinessIndex => "readiness_index",
            Metric::Temperature => "temperature",
            Metric::Spo2 => "spo2",
        }
    }

    /// Unit used when printing the raw deviation
    pub fn unit(&self) -> &'static str {
        match self {
            Metric::RestingHr => "bpm",
            Metric::Hrv => "ms",
            Metric::Temperature => "°C",
            Metric::Spo2 | Metric::Sleep => "%",
            Metric::ReadinessIndex => "pts",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Intensity tag of the day's main training session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionIntensity {
    Rest,
    Easy,
    Moderate,
    #[serde(alias = "high")]
    Hard,
    Threshold,
    #[serde(alias = "vo2_max")]
    Vo2max,
}

impl SessionIntensity {
    /// Sessions that count as "hard" for spacing rules
    pub fn is_hard(&self) -> bool {
        matches!(
            self,
            SessionIntensity::Hard | SessionIntensity::Threshold | SessionIntensity::Vo2max
        )
    }

    /// Sessions that count as a recovery day
    pub fn is_recovery(&self) -> bool {
        matches!(self, SessionIntensity::Rest | SessionIntensity::Easy)
    }
}

impl std::str::FromStr for SessionIntensity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rest" | "off" => Ok(SessionIntensity::Rest),
            "easy" | "recovery" => Ok(SessionIntensity::Easy),
            "moderate" | "tempo" => Ok(SessionIntensity::Moderate),
            "hard" | "high" => Ok(SessionIntensity::Hard),
            "threshold" => Ok(SessionIntensity::Threshold),
            "vo2max" | "vo2_max" => Ok(SessionIntensity::Vo2max),
            _ => Err(format!("Invalid session intensity: {}", s)),
        }
    }
}

/// One calendar day of observations for one athlete
///
/// Every physiological field is optional: wearables routinely skip a
/// reading, and the engine excludes missing metrics instead of scoring
/// them as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Athlete identifier
    pub athlete_id: String,

    /// Calendar day the observations belong to
    pub date: NaiveDate,

    /// Resting heart rate in beats per minute
    #[serde(default)]
    pub resting_hr: Option<f64>,

    /// Heart-rate variability (RMSSD in ms, or the device's own unit)
    #[serde(default)]
    pub hrv: Option<f64>,

    /// Sleep efficiency as a percentage of time in bed
    #[serde(default)]
    pub sleep_efficiency: Option<f64>,

    /// Total sleep in hours
    #[serde(default)]
    pub sleep_duration: Option<f64>,

    /// Deep sleep as a percentage of total sleep
    #[serde(default)]
    pub deep_sleep_pct: Option<f64>,

    /// Skin/body temperature delta reported by the device in °C
    #[serde(default)]
    pub temperature_delta: Option<f64>,

    /// Blood-oxygen saturation in percent
    #[serde(default)]
    pub spo2: Option<f64>,

    /// Device readiness index (0-100), passed through as its own component
    #[serde(default)]
    pub readiness_index: Option<f64>,

    /// Training load in the device's unit (TSS, TRIMP, ...)
    #[serde(default)]
    pub training_load: Option<f64>,

    /// Intensity tag of the day's main session
    #[serde(default)]
    pub session_intensity: Option<SessionIntensity>,
}

/// Inclusive physiological bounds used to reject samples upstream of scoring
struct FieldRange {
    field: &'static str,
    min: f64,
    max: f64,
}

const RESTING_HR_RANGE: FieldRange = FieldRange { field: "resting_hr", min: 25.0, max: 220.0 };
const HRV_RANGE: FieldRange = FieldRange { field: "hrv", min: 1.0, max: 300.0 };
const SLEEP_EFFICIENCY_RANGE: FieldRange = FieldRange { field: "sleep_efficiency", min: 0.0, max: 100.0 };
const SLEEP_DURATION_RANGE: FieldRange = FieldRange { field: "sleep_duration", min: 0.0, max: 24.0 };
const DEEP_SLEEP_RANGE: FieldRange = FieldRange { field: "deep_sleep_pct", min: 0.0, max: 100.0 };
const TEMPERATURE_RANGE: FieldRange = FieldRange { field: "temperature_delta", min: -5.0, max: 5.0 };
const SPO2_RANGE: FieldRange = FieldRange { field: "spo2", min: 50.0, max: 100.0 };
const READINESS_RANGE: FieldRange = FieldRange { field: "readiness_index", min: 0.0, max: 100.0 };
const LOAD_RANGE: FieldRange = FieldRange { field: "training_load", min: 0.0, max: 10_000.0 };

impl MetricSample {
    /// Create an empty sample for an athlete and day
    pub fn new(athlete_id: impl Into<String>, date: NaiveDate) -> Self {
        MetricSample {
            athlete_id: athlete_id.into(),
            date,
            resting_hr: None,
            hrv: None,
            sleep_efficiency: None,
            sleep_duration: None,
            deep_sleep_pct: None,
            temperature_delta: None,
            spo2: None,
            readiness_index: None,
            training_load: None,
            session_intensity: None,
        }
    }

    /// Raw value of a baselined metric, if recorded
    pub fn baseline_value(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::RestingHr => self.resting_hr,
            Metric::Hrv => self.hrv,
            Metric::Temperature => self.temperature_delta,
            Metric::Spo2 => self.spo2,
            Metric::Sleep | Metric::ReadinessIndex => None,
        }
    }

    /// True when no physiological field was recorded for the day
    pub fn is_empty(&self) -> bool {
        self.resting_hr.is_none()
            && self.hrv.is_none()
            && self.sleep_efficiency.is_none()
            && self.sleep_duration.is_none()
            && self.deep_sleep_pct.is_none()
            && self.temperature_delta.is_none()
            && self.spo2.is_none()
            && self.readiness_index.is_none()
    }

    /// Reject values outside physiological ranges
    ///
    /// Out-of-range readings are treated as device or transfer errors: the
    /// sample is rejected as a whole instead of being partially scored.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let checks = [
            (self.resting_hr, &RESTING_HR_RANGE),
            (self.hrv, &HRV_RANGE),
            (self.sleep_efficiency, &SLEEP_EFFICIENCY_RANGE),
            (self.sleep_duration, &SLEEP_DURATION_RANGE),
            (self.deep_sleep_pct, &DEEP_SLEEP_RANGE),
            (self.temperature_delta, &TEMPERATURE_RANGE),
            (self.spo2, &SPO2_RANGE),
            (self.readiness_index, &READINESS_RANGE),
            (self.training_load, &LOAD_RANGE),
        ];

        for (value, range) in checks {
            let Some(value) = value else { continue };
            if !value.is_finite() {
                return Err(ValidationError::NotFinite {
                    field: range.field,
                    date: self.date,
                });
            }
            if value < range.min || value > range.max {
                return Err(ValidationError::OutOfRange {
                    field: range.field,
                    value,
                    min: range.min,
                    max: range.max,
                    date: self.date,
                });
            }
        }

        Ok(())
    }
}
