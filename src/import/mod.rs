use crate::models::MetricSample;
use anyhow::Result;
use std::path::Path;
use tracing::info;

pub mod csv;
pub mod json;

/// Trait for loading daily metric history from different file formats
pub trait ImportFormat {
    /// Check if this importer can handle the given file
    fn can_import(&self, file_path: &Path) -> bool;

    /// Load every sample in the file
    fn import_file(&self, file_path: &Path) -> Result<Vec<MetricSample>>;

    /// Get the format name for this importer
    fn get_format_name(&self) -> &'static str;
}

/// Picks an importer by file extension
pub struct ImportManager {
    importers: Vec<Box<dyn ImportFormat>>,
}

impl ImportManager {
    /// Create a manager with all available importers
    ///
    /// `default_athlete` is used for CSV files without an athlete column.
    pub fn new(default_athlete: Option<String>) -> Self {
        let importers: Vec<Box<dyn ImportFormat>> = vec![
            Box::new(csv::CsvImporter::new(default_athlete)),
            Box::new(json::JsonImporter::new()),
        ];

        Self { importers }
    }

    /// Import a single file, auto-detecting the format
    pub fn import_file(&self, file_path: &Path) -> Result<Vec<MetricSample>> {
        for importer in &self.importers {
            if importer.can_import(file_path) {
                let samples = importer.import_file(file_path)?;
                info!(
                    path = %file_path.display(),
                    format = importer.get_format_name(),
                    samples = samples.len(),
                    "History loaded"
                );
                return Ok(samples);
            }
        }

        anyhow::bail!("No importer found for file: {}", file_path.display());
    }
}

fn has_extension(file_path: &Path, wanted: &str) -> bool {
    file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(wanted))
        .unwrap_or(false)
}
