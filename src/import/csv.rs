use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::path::Path;

use crate::import::{has_extension, ImportFormat};
use crate::models::{MetricSample, SessionIntensity};

/// Numeric columns after header normalization
const NUMERIC_COLUMNS: [&str; 9] = [
    "resting_hr",
    "hrv",
    "sleep_efficiency",
    "sleep_duration",
    "deep_sleep_pct",
    "temperature_delta",
    "spo2",
    "readiness_index",
    "training_load",
];

/// CSV importer with flexible column mapping
///
/// One row per day. Empty cells are missing readings; unknown columns are
/// ignored.
pub struct CsvImporter {
    column_mapping: HashMap<String, String>,
    default_athlete: Option<String>,
}

impl CsvImporter {
    pub fn new(default_athlete: Option<String>) -> Self {
        let mut column_mapping = HashMap::new();

        // Common column name variations
        Self::add_mapping(&mut column_mapping, "athlete_id", &["athlete_id", "athlete", "user", "user_id"]);
        Self::add_mapping(&mut column_mapping, "date", &["date", "day", "calendar_date", "timestamp"]);
        Self::add_mapping(
            &mut column_mapping,
            "resting_hr",
            &["resting_hr", "rhr", "resting_heart_rate", "resting_hr_bpm"],
        );
        Self::add_mapping(&mut column_mapping, "hrv", &["hrv", "rmssd", "hrv_rmssd", "hrv_ms"]);
        Self::add_mapping(
            &mut column_mapping,
            "sleep_efficiency",
            &["sleep_efficiency", "efficiency", "sleep_eff"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "sleep_duration",
            &["sleep_duration", "sleep_hours", "total_sleep", "sleep"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "deep_sleep_pct",
            &["deep_sleep_pct", "deep_sleep", "deep_pct"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "temperature_delta",
            &["temperature_delta", "temperature", "temp_delta", "temperature_deviation"],
        );
        Self::add_mapping(&mut column_mapping, "spo2", &["spo2", "oxygen_saturation", "blood_oxygen"]);
        Self::add_mapping(
            &mut column_mapping,
            "readiness_index",
            &["readiness_index", "readiness", "readiness_score"],
        );
        Self::add_mapping(&mut column_mapping, "training_load", &["training_load", "load", "tss", "trimp"]);
        Self::add_mapping(
            &mut column_mapping,
            "session_intensity",
            &["session_intensity", "intensity", "session"],
        );

        Self {
            column_mapping,
            default_athlete,
        }
    }

    fn add_mapping(mapping: &mut HashMap<String, String>, standard: &str, variations: &[&str]) {
        for variation in variations {
            mapping.insert(variation.to_lowercase(), standard.to_string());
        }
    }

    fn normalize_column_name(&self, name: &str) -> String {
        let normalized = name.trim().to_lowercase().replace([' ', '-'], "_");

        self.column_mapping
            .get(&normalized)
            .cloned()
            .unwrap_or(normalized)
    }

    fn parse_date(date_str: &str) -> Result<NaiveDate> {
        let date_formats = ["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y"];
        for format in &date_formats {
            if let Ok(date) = NaiveDate::parse_from_str(date_str, format) {
                return Ok(date);
            }
        }

        // Timestamps keep only their calendar day
        let datetime_formats = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%SZ"];
        for format in &datetime_formats {
            if let Ok(datetime) = NaiveDateTime::parse_from_str(date_str, format) {
                return Ok(datetime.date());
            }
        }

        anyhow::bail!("Unable to parse date: {}", date_str);
    }

    fn parse_number(column: &str, value: &str, row: usize) -> Result<Option<f64>> {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("na") || value.eq_ignore_ascii_case("null") {
            return Ok(None);
        }
        value
            .parse::<f64>()
            .map(Some)
            .with_context(|| format!("Row {}: invalid number in column {}: {}", row, column, value))
    }
}

impl ImportFormat for CsvImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        has_extension(file_path, "csv")
    }

    fn import_file(&self, file_path: &Path) -> Result<Vec<MetricSample>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(file_path)
            .with_context(|| format!("Failed to open {}", file_path.display()))?;

        let headers = reader.headers()?.clone();

        // Map headers to standard names
        let header_mapping: HashMap<usize, String> = headers
            .iter()
            .enumerate()
            .map(|(i, header)| (i, self.normalize_column_name(header)))
            .collect();

        if !header_mapping.values().any(|name| name == "date") {
            anyhow::bail!("CSV file {} has no date column", file_path.display());
        }

        let mut samples = Vec::new();

        for (index, result) in reader.records().enumerate() {
            let record = result?;
            // Header is line 1
            let row = index + 2;

            let mut athlete_id = self.default_athlete.clone();
            let mut date = None;
            let mut values: HashMap<&'static str, f64> = HashMap::new();
            let mut session_intensity = None;

            for (i, value) in record.iter().enumerate() {
                let Some(column_name) = header_mapping.get(&i) else { continue };
                if value.is_empty() {
                    continue;
                }

                match column_name.as_str() {
                    "athlete_id" => athlete_id = Some(value.to_string()),
                    "date" => {
                        date = Some(Self::parse_date(value).with_context(|| format!("Row {}", row))?);
                    }
                    "session_intensity" => {
                        let intensity: SessionIntensity = value
                            .parse()
                            .map_err(|e: String| anyhow::anyhow!("Row {}: {}", row, e))?;
                        session_intensity = Some(intensity);
                    }
                    other => {
                        if let Some(column) = NUMERIC_COLUMNS.iter().find(|c| **c == other) {
                            if let Some(number) = Self::parse_number(column, value, row)? {
                                values.insert(*column, number);
                            }
                        }
                    }
                }
            }

            let date = date.with_context(|| format!("Row {}: missing date", row))?;
            let athlete_id = athlete_id.with_context(|| {
                format!("Row {}: no athlete column and no default athlete given", row)
            })?;

            samples.push(MetricSample {
                resting_hr: values.get("resting_hr").copied(),
                hrv: values.get("hrv").copied(),
                sleep_efficiency: values.get("sleep_efficiency").copied(),
                sleep_duration: values.get("sleep_duration").copied(),
                deep_sleep_pct: values.get("deep_sleep_pct").copied(),
                temperature_delta: values.get("temperature_delta").copied(),
                spo2: values.get("spo2").copied(),
                readiness_index: values.get("readiness_index").copied(),
                training_load: values.get("training_load").copied(),
                session_intensity,
                ..MetricSample::new(athlete_id, date)
            });
        }

        if samples.is_empty() {
            anyhow::bail!("No samples found in CSV file {}", file_path.display());
        }

        Ok(samples)
    }

    fn get_format_name(&self) -> &'static str {
        "CSV"
    }
}
