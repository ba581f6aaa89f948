//! Unified error hierarchy for ReadyRS
//!
//! Provides a structured error type system for the scoring engine, with
//! severity levels that map onto the tracing system.

use chrono::NaiveDate;
use thiserror::Error;

/// Top-level error type for all ReadyRS operations
#[derive(Debug, Error)]
pub enum ReadyRsError {
    /// Sample rejected before scoring
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    /// Calculation errors
    #[error("Calculation error: {0}")]
    Calculation(#[from] CalculationError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Sample validation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Field value outside its physiological range
    #[error("{field}={value} on {date} is outside the valid range {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
        date: NaiveDate,
    },

    /// Field is NaN or infinite
    #[error("{field} on {date} is not a finite number")]
    NotFinite { field: &'static str, date: NaiveDate },

    /// Two samples recorded for the same day
    #[error("Duplicate sample for {date}")]
    DuplicateDate { date: NaiveDate },

    /// History mixes samples of different athletes
    #[error("History mixes athletes {expected} and {found}")]
    MixedAthletes { expected: String, found: String },
}

/// Calculation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalculationError {
    /// Insufficient data for calculation
    #[error("Insufficient data for {calculation}: {reason}")]
    InsufficientData { calculation: String, reason: String },
}

/// Result type alias for ReadyRS operations
pub type Result<T> = std::result::Result<T, ReadyRsError>;

impl ReadyRsError {
    /// Whether the caller should treat this as "not enough history yet"
    /// rather than as a failure.
    pub fn is_insufficient_data(&self) -> bool {
        matches!(
            self,
            ReadyRsError::Calculation(CalculationError::InsufficientData { .. })
        )
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ReadyRsError::Calculation(CalculationError::InsufficientData { .. }) => {
                ErrorSeverity::Info
            }
            ReadyRsError::InvalidInput(_) => ErrorSeverity::Warning,
            ReadyRsError::Configuration(_) => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            ReadyRsError::Calculation(CalculationError::InsufficientData {
                calculation, ..
            }) => {
                format!(
                    "Not enough history to calculate {}. Keep recording daily metrics.",
                    calculation
                )
            }
            ReadyRsError::InvalidInput(err) => {
                format!("A sample was rejected: {}", err)
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
    /// Informational message
    Info,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
            ErrorSeverity::Info => tracing::Level::INFO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 23).unwrap()
    }

    #[test]
    fn test_error_severity() {
        let err = ReadyRsError::Calculation(CalculationError::InsufficientData {
            calculation: "composite readiness".to_string(),
            reason: "no metrics".to_string(),
        });
        assert_eq!(err.severity(), ErrorSeverity::Info);
        assert!(err.is_insufficient_data());

        let err = ReadyRsError::Configuration("weights sum to zero".to_string());
        assert_eq!(err.severity(), ErrorSeverity::Error);
        assert_eq!(err.severity().to_tracing_level(), tracing::Level::ERROR);
        assert!(!err.is_insufficient_data());
    }

    #[test]
    fn test_validation_error_converts() {
        let err: ReadyRsError = ValidationError::DuplicateDate { date: day() }.into();
        assert_eq!(err.severity(), ErrorSeverity::Warning);
        assert_eq!(err.severity().to_tracing_level(), tracing::Level::WARN);
    }

    #[test]
    fn test_user_messages() {
        let err: ReadyRsError = ValidationError::OutOfRange {
            field: "resting_hr",
            value: -5.0,
            min: 25.0,
            max: 220.0,
            date: day(),
        }
        .into();
        let message = err.user_message();
        assert!(message.contains("rejected"));
        assert!(message.contains("resting_hr=-5"));
    }
}
