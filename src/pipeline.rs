//! One training run: load, select columns, train, export.

use thiserror::Error;

use crate::columns::ColumnSet;
use crate::config::{ProfileKind, TrainingConfig, TrainingProfile, load_profile, resolve_args};
use crate::export::{ExportArtifact, ExportFailure, ExportReport, ModelExporter, naming};
use crate::frame::{Frame, FrameError};
use crate::ml::gbm::{Distribution, GbmParameters, TrainError, train_gbm};

/// Exit code of a run whose configuration could not be resolved.
pub const EXIT_CONFIG_ERROR: i32 = 2;

/// Errors that stop a run before anything is exported.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to load training data: {0}")]
    Load(#[from] FrameError),
    #[error("Training failed: {0}")]
    Train(#[from] TrainError),
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// Every artifact was written.
    Success(ExportArtifact),
    /// The model trained but at least one export step failed.
    PartialFailure {
        artifact: ExportArtifact,
        failures: Vec<ExportFailure>,
    },
    /// Nothing was exported.
    Failure(PipelineError),
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Success(_) => 0,
            RunOutcome::Failure(_) => 1,
            RunOutcome::PartialFailure { .. } => 3,
        }
    }

    pub fn artifact(&self) -> Option<&ExportArtifact> {
        match self {
            RunOutcome::Success(artifact) | RunOutcome::PartialFailure { artifact, .. } => {
                Some(artifact)
            }
            RunOutcome::Failure(_) => None,
        }
    }
}

/// Train on `config.dataset_path` with the profile's columns and export the
/// model through `exporter`.
pub fn run(
    config: &TrainingConfig,
    profile: &TrainingProfile,
    exporter: &ModelExporter,
) -> RunOutcome {
    log_config(config, profile);
    match train_and_export(config, profile, exporter) {
        Ok(report) if report.is_complete() => RunOutcome::Success(report.artifact),
        Ok(report) => {
            tracing::warn!(
                "{} of 3 export steps failed for {}",
                report.failures.len(),
                report.artifact.basename
            );
            RunOutcome::PartialFailure {
                artifact: report.artifact,
                failures: report.failures,
            }
        }
        Err(err) => {
            tracing::error!("{}", err);
            RunOutcome::Failure(err)
        }
    }
}

/// Shared body of the training binaries: resolve `args` (the arguments after
/// the program name) against the profile, run, and return the exit code.
pub fn run_tool(kind: ProfileKind, args: &[String]) -> i32 {
    run_tool_with(kind, args, &ModelExporter::default())
}

/// [`run_tool`] with an explicit exporter.
pub fn run_tool_with(kind: ProfileKind, args: &[String], exporter: &ModelExporter) -> i32 {
    let code = match load_profile(kind).map_err(|err| err.to_string()).and_then(|profile| {
        resolve_args(args, &profile)
            .map(|config| (config, profile))
            .map_err(|err| err.to_string())
    }) {
        Ok((config, profile)) => run(&config, &profile, exporter).exit_code(),
        Err(err) => {
            tracing::error!("{}", err);
            EXIT_CONFIG_ERROR
        }
    };
    tracing::info!("Done!");
    code
}

fn train_and_export(
    config: &TrainingConfig,
    profile: &TrainingProfile,
    exporter: &ModelExporter,
) -> Result<ExportReport, PipelineError> {
    let frame = Frame::from_csv_path(&config.dataset_path)?;
    tracing::info!("{}", frame);

    let columns = ColumnSet::select(
        frame.column_names(),
        &profile.ignored_columns,
        &profile.response_column,
    );
    for name in columns.absent_ignored() {
        tracing::debug!("Ignored column {} is not in the dataset", name);
    }
    tracing::info!("Predictors: {}", columns.predictors.join(", "));

    let params = GbmParameters {
        model_id: naming::model_name(&profile.model_prefix, config.tree_count, config.max_depth),
        training_frame: frame.name.clone(),
        response_column: profile.response_column.clone(),
        ignored_columns: profile.ignored_columns.clone(),
        ntrees: config.tree_count,
        max_depth: config.max_depth,
        learn_rate: config.learn_rate,
        min_rows: config.min_rows,
        min_split_improvement: config.min_split_improvement,
        nbins: config.nbins,
        distribution: Distribution::Auto,
    };
    let model = train_gbm(&frame, &columns, &params)?;
    tracing::info!("Trained {} ({})", model.name(), model.category);
    Ok(exporter.export(&model, &config.run_label))
}

fn log_config(config: &TrainingConfig, profile: &TrainingProfile) {
    tracing::info!("Profile: {}", profile.name);
    tracing::info!("Run label: {}", config.run_label);
    tracing::info!("Dataset: {}", config.dataset_path.display());
    tracing::info!("Number of trees: {}", config.tree_count);
    tracing::info!("Max depth: {}", config.max_depth);
    tracing::info!("Learn rate: {}", config.learn_rate);
    tracing::info!("Min rows: {}", config.min_rows);
    tracing::info!("Min split improvement: {}", config.min_split_improvement);
    tracing::info!("Response column: {}", profile.response_column);
    tracing::info!(
        "Ignored columns ({}): {}",
        profile.ignored_columns.len(),
        profile.ignored_columns.join(", ")
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::ExportStep;
    use std::path::Path;
    use tempfile::tempdir;

    fn write_csv(path: &Path, rows: usize) {
        let mut text = String::from("Group,x,TTATA,Target\n");
        for i in 0..rows {
            let x = i as f64;
            let ttata = if i < rows / 2 { 1.0 } else { 5.0 };
            let target = if i % 3 == 0 { "yes" } else { "no" };
            text.push_str(&format!("g{},{},{},{}\n", i % 4, x, ttata, target));
        }
        std::fs::write(path, text).unwrap();
    }

    fn config_for(profile: &TrainingProfile, dataset: &Path) -> TrainingConfig {
        TrainingConfig {
            dataset_path: dataset.to_path_buf(),
            tree_count: 3,
            max_depth: 2,
            run_label: "test".to_string(),
            ..TrainingConfig::defaults(profile)
        }
    }

    #[test]
    fn regression_run_succeeds() {
        let dir = tempdir().unwrap();
        let csv = dir.path().join("small.csv");
        write_csv(&csv, 40);
        let profile = TrainingProfile::builtin(ProfileKind::Regression);
        let exporter = ModelExporter::new(dir.path().join("models"));

        let outcome = run(&config_for(&profile, &csv), &profile, &exporter);
        assert_eq!(outcome.exit_code(), 0);
        let artifact = outcome.artifact().unwrap();
        assert_eq!(artifact.basename, "GBMRegression_3_2_test");
        assert!(artifact.binary_path.is_file());
    }

    #[test]
    fn missing_dataset_is_failure() {
        let dir = tempdir().unwrap();
        let profile = TrainingProfile::builtin(ProfileKind::Target);
        let exporter = ModelExporter::new(dir.path().join("models"));
        let config = config_for(&profile, &dir.path().join("nope.csv"));

        let outcome = run(&config, &profile, &exporter);
        assert!(matches!(
            outcome,
            RunOutcome::Failure(PipelineError::Load(_))
        ));
        assert_eq!(outcome.exit_code(), 1);
        assert!(!dir.path().join("models").exists());
    }

    #[test]
    fn missing_response_is_failure() {
        let dir = tempdir().unwrap();
        let csv = dir.path().join("small.csv");
        std::fs::write(&csv, "x,y\n1,2\n3,4\n").unwrap();
        let profile = TrainingProfile::builtin(ProfileKind::Target);
        let exporter = ModelExporter::new(dir.path().join("models"));

        let outcome = run(&config_for(&profile, &csv), &profile, &exporter);
        assert!(matches!(
            outcome,
            RunOutcome::Failure(PipelineError::Train(TrainError::MissingResponse(_)))
        ));
    }

    #[test]
    fn failed_export_step_is_partial_failure() {
        let dir = tempdir().unwrap();
        let csv = dir.path().join("small.csv");
        write_csv(&csv, 40);
        let profile = TrainingProfile::builtin(ProfileKind::Target);
        let out = dir.path().join("models");
        std::fs::create_dir_all(out.join("GBM_3_2_test.h2o")).unwrap();

        let outcome = run(
            &config_for(&profile, &csv),
            &profile,
            &ModelExporter::new(&out),
        );
        assert_eq!(outcome.exit_code(), 3);
        match outcome {
            RunOutcome::PartialFailure { artifact, failures } => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].step, ExportStep::Binary);
                assert!(artifact.json_path.is_file());
                assert!(artifact.mojo_path.is_file());
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
