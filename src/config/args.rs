//! Positional argument resolution.
//!
//! The training tools take no flags. Zero, one, or four positional arguments
//! are recognized; every other count quietly falls back to the profile
//! defaults.

use std::path::PathBuf;

use super::errors::ArgsError;
use super::profile::TrainingProfile;

/// Fully resolved configuration for one training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    /// CSV file to train on.
    pub dataset_path: PathBuf,
    /// Number of boosting rounds.
    pub tree_count: u32,
    /// Maximum depth of each tree.
    pub max_depth: u32,
    /// Free-text tag appended to exported file names.
    pub run_label: String,
    pub learn_rate: f64,
    pub min_rows: u32,
    pub min_split_improvement: f64,
    pub nbins: u32,
}

impl TrainingConfig {
    /// Configuration made only of profile defaults.
    pub fn defaults(profile: &TrainingProfile) -> Self {
        Self {
            dataset_path: profile.default_dataset_path.clone(),
            tree_count: profile.default_tree_count,
            max_depth: profile.default_max_depth,
            run_label: profile.default_run_label.clone(),
            learn_rate: profile.learn_rate,
            min_rows: profile.min_rows,
            min_split_improvement: profile.min_split_improvement,
            nbins: profile.nbins,
        }
    }
}

/// Resolve the arguments that follow the program name.
///
/// - `[dataset]` overrides the dataset path only.
/// - `[dataset, ntrees, max_depth, run_label]` overrides all four fields.
/// - Anything else yields the profile defaults.
///
/// Malformed or zero numbers are errors, never replaced by defaults. So is a
/// run label that would not stay a single file name inside the output
/// directory.
pub fn resolve_args(
    args: &[String],
    profile: &TrainingProfile,
) -> Result<TrainingConfig, ArgsError> {
    let mut config = TrainingConfig::defaults(profile);
    match args {
        [dataset] => {
            config.dataset_path = PathBuf::from(dataset);
        }
        [dataset, ntrees, max_depth, run_label] => {
            config.dataset_path = PathBuf::from(dataset);
            config.tree_count = parse_positive("ntrees", ntrees)?;
            config.max_depth = parse_positive("max_depth", max_depth)?;
            check_run_label(run_label)?;
            config.run_label = run_label.clone();
        }
        _ => {}
    }
    Ok(config)
}

fn parse_positive(field: &'static str, raw: &str) -> Result<u32, ArgsError> {
    let value = raw
        .trim()
        .parse::<u32>()
        .map_err(|_| ArgsError::InvalidNumber {
            field,
            value: raw.to_string(),
        })?;
    if value == 0 {
        return Err(ArgsError::NotPositive { field, value });
    }
    Ok(value)
}

/// Accept labels that can be appended to a file name as-is.
pub(crate) fn check_run_label(label: &str) -> Result<(), ArgsError> {
    let reason = if label.trim().is_empty() {
        "must not be empty"
    } else if label.contains(['/', '\\']) {
        "must not contain path separators"
    } else if label.contains("..") {
        "must not contain '..'"
    } else if label.chars().any(char::is_control) {
        "must not contain control characters"
    } else {
        return Ok(());
    };
    Err(ArgsError::InvalidRunLabel {
        value: label.to_string(),
        reason,
    })
}
