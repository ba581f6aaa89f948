use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::import::{has_extension, ImportFormat};
use crate::models::MetricSample;

/// Accepted JSON layouts: a bare array of samples, or an object wrapping one
#[derive(Deserialize)]
#[serde(untagged)]
enum JsonHistory {
    Samples(Vec<MetricSample>),
    Wrapped { samples: Vec<MetricSample> },
}

/// JSON importer for serialized `MetricSample` history
pub struct JsonImporter;

impl JsonImporter {
    pub fn new() -> Self {
        JsonImporter
    }

    pub fn parse_str(content: &str) -> Result<Vec<MetricSample>> {
        let history: JsonHistory =
            serde_json::from_str(content).with_context(|| "Failed to parse JSON history")?;
        Ok(match history {
            JsonHistory::Samples(samples) => samples,
            JsonHistory::Wrapped { samples } => samples,
        })
    }
}

impl Default for JsonImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportFormat for JsonImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        has_extension(file_path, "json")
    }

    fn import_file(&self, file_path: &Path) -> Result<Vec<MetricSample>> {
        let content = fs::read_to_string(file_path)
            .with_context(|| format!("Failed to read {}", file_path.display()))?;
        Self::parse_str(&content).with_context(|| format!("In {}", file_path.display()))
    }

    fn get_format_name(&self) -> &'static str {
        "JSON"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionIntensity;

    #[test]
    fn test_bare_and_wrapped_layouts() {
        let bare = r#"[{"athlete_id":"a1","date":"2024-09-01","resting_hr":50.0}]"#;
        let wrapped = r#"{"samples":[{"athlete_id":"a1","date":"2024-09-01","session_intensity":"high"}]}"#;

        assert_eq!(JsonImporter::parse_str(bare).unwrap()[0].resting_hr, Some(50.0));
        assert_eq!(
            JsonImporter::parse_str(wrapped).unwrap()[0].session_intensity,
            Some(SessionIntensity::Hard)
        );
    }

    #[test]
    fn test_malformed_json() {
        assert!(JsonImporter::parse_str(r#"[{"date":"2024-09-01"}]"#).is_err());
        assert!(JsonImporter::parse_str("not json").is_err());
    }
}
