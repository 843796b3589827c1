//! On-disk output bundle.
//!
//! ```text
//! <output>/
//!   evaluation.json   EvaluationResult
//!   metrics_log.csv   one row per frame
//!   manifest.json     provenance (generation time, fingerprints, version)
//! ```
//!
//! Each file is written to a temporary sibling and renamed into place, so a
//! reader never observes a half-written artifact.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::evaluation::{EvaluationResult, MetricsLogRow};
use crate::signal::Metric;

pub const EVALUATION_FILE: &str = "evaluation.json";
pub const METRICS_LOG_FILE: &str = "metrics_log.csv";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Provenance record written next to the evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Bundle schema version.
    pub version: String,

    /// Name and version of the tool that produced the bundle.
    pub generator: String,

    /// Generation timestamp (ISO 8601).
    pub generated_at: String,

    /// Fingerprint of the input frame stream.
    pub input_fingerprint: String,

    /// Fingerprint of the effective analysis configuration.
    pub config_fingerprint: String,

    pub frames_processed: u64,

    pub complete: bool,
}

impl Manifest {
    pub fn new(
        generator: impl Into<String>,
        input_fingerprint: impl Into<String>,
        config_fingerprint: impl Into<String>,
        evaluation: &EvaluationResult,
    ) -> Self {
        Self {
            version: "1.0".to_string(),
            generator: generator.into(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            input_fingerprint: input_fingerprint.into(),
            config_fingerprint: config_fingerprint.into(),
            frames_processed: evaluation.frames_processed,
            complete: evaluation.complete,
        }
    }
}

/// Everything a run writes to its output directory.
#[derive(Debug, Clone)]
pub struct AnalysisBundle {
    pub evaluation: EvaluationResult,
    pub metrics_log: Vec<MetricsLogRow>,
    pub manifest: Manifest,
}

impl AnalysisBundle {
    /// Write all artifacts into `root`, creating it if needed.
    pub fn write(&self, root: impl AsRef<Path>) -> Result<(), ArtifactError> {
        let root = root.as_ref();
        std::fs::create_dir_all(root).map_err(|e| ArtifactError::IoError {
            path: root.to_path_buf(),
            source: e,
        })?;

        let evaluation_path = root.join(EVALUATION_FILE);
        let evaluation_json = serde_json::to_string_pretty(&self.evaluation).map_err(|e| {
            ArtifactError::ParseError {
                path: evaluation_path.clone(),
                source: e,
            }
        })?;
        write_atomic(&evaluation_path, evaluation_json.as_bytes())?;

        let log_path = root.join(METRICS_LOG_FILE);
        write_atomic(&log_path, metrics_log_csv(&self.metrics_log).as_bytes())?;

        let manifest_path = root.join(MANIFEST_FILE);
        let manifest_json = serde_json::to_string_pretty(&self.manifest).map_err(|e| {
            ArtifactError::ParseError {
                path: manifest_path.clone(),
                source: e,
            }
        })?;
        write_atomic(&manifest_path, manifest_json.as_bytes())?;

        Ok(())
    }

    /// Read back the evaluation of a previously written bundle.
    pub fn load_evaluation(root: impl AsRef<Path>) -> Result<EvaluationResult, ArtifactError> {
        let path = root.as_ref().join(EVALUATION_FILE);
        let json = std::fs::read_to_string(&path).map_err(|e| ArtifactError::IoError {
            path: path.clone(),
            source: e,
        })?;
        serde_json::from_str(&json).map_err(|e| ArtifactError::ParseError { path, source: e })
    }

    /// Read back the manifest of a previously written bundle.
    pub fn load_manifest(root: impl AsRef<Path>) -> Result<Manifest, ArtifactError> {
        let path = root.as_ref().join(MANIFEST_FILE);
        let json = std::fs::read_to_string(&path).map_err(|e| ArtifactError::IoError {
            path: path.clone(),
            source: e,
        })?;
        serde_json::from_str(&json).map_err(|e| ArtifactError::ParseError { path, source: e })
    }
}

/// Write `bytes` to a temporary sibling of `path`, then rename over it.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ArtifactError> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| ArtifactError::ValidationError {
            message: format!("not a file path: {}", path.display()),
        })?;
    let temp_path = path.with_file_name(format!(".{file_name}.{}.tmp", std::process::id()));

    std::fs::write(&temp_path, bytes).map_err(|e| ArtifactError::IoError {
        path: temp_path.clone(),
        source: e,
    })?;
    std::fs::rename(&temp_path, path).map_err(|e| {
        std::fs::remove_file(&temp_path).ok();
        ArtifactError::IoError {
            path: path.to_path_buf(),
            source: e,
        }
    })
}

/// Header row of the metrics log.
pub fn metrics_log_header() -> String {
    let mut columns = vec!["frame".to_string(), "timestamp_s".to_string()];
    columns.extend(Metric::ALL.iter().map(|m| m.name().to_string()));
    columns.push("wrist_speed".to_string());
    columns.push("phase".to_string());
    columns.join(",")
}

/// Render the metrics log as CSV. Missing values are empty cells.
pub fn metrics_log_csv(rows: &[MetricsLogRow]) -> String {
    let mut out = metrics_log_header();
    out.push('\n');

    for row in rows {
        let mut cells = vec![row.frame.to_string(), format!("{:.6}", row.timestamp_secs)];
        for metric in Metric::ALL {
            cells.push(format_cell(row.metrics.get(&metric).copied().flatten()));
        }
        cells.push(format_cell(row.wrist_speed));
        cells.push(row.phase.map(|p| p.name().to_string()).unwrap_or_default());
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    out
}

fn format_cell(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.6}"),
        _ => String::new(),
    }
}

/// Errors raised while reading or writing artifacts.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid artifact: {message}")]
    ValidationError { message: String },
}
