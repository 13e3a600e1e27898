//! Model export: hyperparameters, metrics, portable and binary artifacts.
//!
//! Every artifact is written to a temporary file in the output directory and
//! renamed into place. The three file exports are independent; one failing
//! never stops the others.

mod binary;
pub mod naming;
mod portable;

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::ml::gbm::{GbmModel, ModelCategory};

pub use binary::{load_binary, write_binary};
pub use portable::{PortableManifest, load_portable, write_portable};

/// Default output directory, relative to the working directory.
pub const DEFAULT_OUTPUT_DIR: &str = "models";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to create temporary file in {dir}: {source}")]
    TempFile {
        dir: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to rename temporary file to {path}: {source}")]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        source: serde_json::Error,
    },
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid artifact {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

/// Export step that can fail on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStep {
    Parameters,
    Portable,
    Binary,
}

impl fmt::Display for ExportStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExportStep::Parameters => "hyperparameters",
            ExportStep::Portable => "portable artifact",
            ExportStep::Binary => "binary artifact",
        })
    }
}

/// A failed export step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFailure {
    pub step: ExportStep,
    pub path: PathBuf,
    pub message: String,
}

/// Names, metrics, and paths of one export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportArtifact {
    pub model_name: String,
    /// `{model_name}_{run_label}`.
    pub basename: String,
    pub category: ModelCategory,
    /// Reported metrics that were available; unavailable ones are omitted.
    pub metrics: BTreeMap<String, f64>,
    pub json_path: PathBuf,
    pub mojo_path: PathBuf,
    pub binary_path: PathBuf,
}

/// Result of exporting a model: what was produced and what failed.
#[derive(Debug, Clone)]
pub struct ExportReport {
    pub artifact: ExportArtifact,
    pub failures: Vec<ExportFailure>,
}

impl ExportReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Writes model artifacts into one output directory.
#[derive(Debug, Clone)]
pub struct ModelExporter {
    output_dir: PathBuf,
}

impl Default for ModelExporter {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_DIR)
    }
}

impl ModelExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Export `model` under `{model_name}_{run_label}`.
    ///
    /// Every step is attempted; failures are logged and collected.
    pub fn export(&self, model: &GbmModel, run_label: &str) -> ExportReport {
        let model_name = model.name().to_string();
        let basename = naming::basename(&model_name, run_label);
        let dir = &self.output_dir;
        let artifact_path = |ext| naming::artifact_path(dir, &basename, ext);
        let json_path = artifact_path(naming::PARAMS_EXT);
        let mojo_path = artifact_path(naming::PORTABLE_EXT);
        let binary_path = artifact_path(naming::BINARY_EXT);

        tracing::info!(
            "Model {}: {} trees, {} predictors, response {}",
            model_name,
            model.trees.len(),
            model.predictors.len(),
            model.parameters.response_column
        );
        if let Err(source) = std::fs::create_dir_all(dir) {
            // Each step below reports its own failure.
            tracing::warn!(
                "{}",
                ExportError::CreateDir {
                    path: dir.clone(),
                    source
                }
            );
        }

        let mut failures = Vec::new();
        let mut record = |step: ExportStep, path: &Path, result: Result<(), ExportError>| {
            match result {
                Ok(()) => tracing::info!("Exported {} to {}", step, path.display()),
                Err(err) => {
                    tracing::error!("Error exporting {}: {}", step, err);
                    failures.push(ExportFailure {
                        step,
                        path: path.to_path_buf(),
                        message: err.to_string(),
                    });
                }
            }
        };

        record(
            ExportStep::Parameters,
            &json_path,
            write_parameters(&json_path, model),
        );
        let metrics = log_metrics(model);
        tracing::info!("modelname: {}", model_name);
        tracing::info!("basename: {}", basename);
        record(
            ExportStep::Portable,
            &mojo_path,
            write_portable(&mojo_path, model),
        );
        record(
            ExportStep::Binary,
            &binary_path,
            write_binary(&binary_path, model),
        );

        ExportReport {
            artifact: ExportArtifact {
                model_name,
                basename,
                category: model.category,
                metrics,
                json_path,
                mojo_path,
                binary_path,
            },
            failures,
        }
    }
}

/// Write the training hyperparameters as pretty JSON.
pub fn write_parameters(path: &Path, model: &GbmModel) -> Result<(), ExportError> {
    let json =
        serde_json::to_vec_pretty(&model.parameters).map_err(|source| ExportError::Encode {
            what: "hyperparameters",
            source,
        })?;
    write_atomic(path, |file| file.write_all(&json))
}

/// Load a model artifact, picking the reader from the file extension.
pub fn load_model(path: &Path) -> Result<GbmModel, ExportError> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(naming::PORTABLE_EXT) => load_portable(path),
        Some(naming::BINARY_EXT) => load_binary(path),
        _ => Err(ExportError::Invalid {
            path: path.to_path_buf(),
            reason: format!(
                "expected a .{} or .{} artifact",
                naming::PORTABLE_EXT,
                naming::BINARY_EXT
            ),
        }),
    }
}

/// Log the metrics reported for the model's category and collect the
/// available ones.
fn log_metrics(model: &GbmModel) -> BTreeMap<String, f64> {
    tracing::info!("Category: {}", model.category);
    tracing::info!("loss: {}", model.distribution);
    let mut available = BTreeMap::new();
    for (name, value) in model.training_metrics.reported(model.category) {
        match value {
            Some(value) => {
                tracing::info!("{}: {}", name, value);
                available.insert(name.to_string(), value);
            }
            None => tracing::warn!("{}: unavailable", name),
        }
    }
    available
}

/// Write through a temporary file in the destination directory, then rename.
pub(crate) fn write_atomic<F>(path: &Path, write: F) -> Result<(), ExportError>
where
    F: FnOnce(&mut File) -> std::io::Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = tempfile::Builder::new()
        .prefix(".gbmtrain")
        .tempfile_in(dir)
        .map_err(|source| ExportError::TempFile {
            dir: dir.to_path_buf(),
            source,
        })?;
    let file = temp.as_file_mut();
    write(file)
        .and_then(|()| file.sync_all())
        .map_err(|source| ExportError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    temp.persist(path).map_err(|err| ExportError::Persist {
        path: path.to_path_buf(),
        source: err.error,
    })?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::columns::ColumnSet;
    use crate::frame::{Column, ColumnData, Frame};
    use crate::ml::gbm::{Distribution, GbmParameters, train_gbm};
    use tempfile::tempdir;

    pub(crate) fn tiny_model() -> GbmModel {
        let x: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| (v / 10.0).floor()).collect();
        let frame = Frame::new(
            "tiny.csv",
            vec![
                Column {
                    name: "x".to_string(),
                    data: ColumnData::Numeric(x),
                },
                Column {
                    name: "TTATA".to_string(),
                    data: ColumnData::Numeric(y),
                },
            ],
        );
        let columns = ColumnSet::select(frame.column_names(), &[], "TTATA");
        let params = GbmParameters {
            model_id: "GBM_80_16".to_string(),
            training_frame: frame.name.clone(),
            response_column: "TTATA".to_string(),
            ignored_columns: Vec::new(),
            ntrees: 5,
            max_depth: 3,
            learn_rate: 0.5,
            min_rows: 2,
            min_split_improvement: 1e-8,
            nbins: 10,
            distribution: Distribution::Auto,
        };
        train_gbm(&frame, &columns, &params).unwrap()
    }

    #[test]
    fn export_writes_all_three_artifacts() {
        let dir = tempdir().unwrap();
        let exporter = ModelExporter::new(dir.path().join("models"));
        let model = tiny_model();
        let report = exporter.export(&model, "20250308_080101");
        assert!(report.is_complete(), "{:?}", report.failures);

        let artifact = &report.artifact;
        assert_eq!(artifact.basename, "GBM_80_16_20250308_080101");
        assert_eq!(
            artifact.json_path,
            dir.path().join("models/GBM_80_16_20250308_080101.json")
        );
        let params: GbmParameters =
            serde_json::from_slice(&std::fs::read(&artifact.json_path).unwrap()).unwrap();
        assert_eq!(params, model.parameters);
        assert_eq!(load_portable(&artifact.mojo_path).unwrap(), model);
        assert_eq!(load_binary(&artifact.binary_path).unwrap(), model);
        let names: Vec<&str> = artifact.metrics.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["mae", "mse", "r2"]);
    }

    #[test]
    fn failed_portable_export_does_not_block_siblings() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("models");
        // A directory squatting on the target path makes the rename fail.
        std::fs::create_dir_all(out.join("GBM_80_16_now.zip")).unwrap();
        let report = ModelExporter::new(&out).export(&tiny_model(), "now");

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].step, ExportStep::Portable);
        assert!(report.artifact.json_path.is_file());
        assert!(report.artifact.binary_path.is_file());
        assert!(load_binary(&report.artifact.binary_path).is_ok());
    }

    #[test]
    fn failed_parameter_export_does_not_block_artifacts() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("models");
        std::fs::create_dir_all(out.join("GBM_80_16_now.json")).unwrap();
        let report = ModelExporter::new(&out).export(&tiny_model(), "now");

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].step, ExportStep::Parameters);
        assert!(report.artifact.mojo_path.is_file());
        assert!(report.artifact.binary_path.is_file());
    }

    #[test]
    fn unwritable_output_dir_fails_every_step() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("models");
        std::fs::write(&blocker, b"file, not dir").unwrap();
        let report = ModelExporter::new(&blocker).export(&tiny_model(), "now");
        let steps: Vec<ExportStep> = report.failures.iter().map(|f| f.step).collect();
        assert_eq!(
            steps,
            vec![ExportStep::Parameters, ExportStep::Portable, ExportStep::Binary]
        );
    }

    #[test]
    fn load_model_dispatches_on_extension() {
        let dir = tempdir().unwrap();
        let report = ModelExporter::new(dir.path()).export(&tiny_model(), "now");
        assert!(report.is_complete());
        let from_zip = load_model(&report.artifact.mojo_path).unwrap();
        let from_bin = load_model(&report.artifact.binary_path).unwrap();
        assert_eq!(from_zip, from_bin);
        assert!(matches!(
            load_model(&report.artifact.json_path),
            Err(ExportError::Invalid { .. })
        ));
    }

    #[test]
    fn exported_model_carries_resolved_loss() {
        let model = tiny_model();
        assert_eq!(model.distribution.to_string(), "gaussian");
        let dir = tempdir().unwrap();
        let report = ModelExporter::new(dir.path()).export(&model, "now");
        let loaded = load_binary(&report.artifact.binary_path).unwrap();
        assert_eq!(loaded.distribution, Distribution::Gaussian);
    }

    #[test]
    fn unavailable_metrics_are_left_out() {
        let mut model = tiny_model();
        model.training_metrics.r2 = None;
        let metrics = log_metrics(&model);
        assert!(!metrics.contains_key("r2"));
        assert!(metrics.contains_key("mae"));
    }
}
