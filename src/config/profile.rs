//! Fixed per-tool training constants.
//!
//! Each training tool runs with a profile: which column is the response,
//! which dataset fields are never predictors, the positional defaults, and
//! the booster hyperparameters that are not exposed on the command line.
//! A profile can be adjusted without recompiling by dropping
//! `profiles/<name>.toml` into the application directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::app_dirs;

use super::args::check_run_label;
use super::errors::ConfigError;

/// Built-in profiles, one per training tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileKind {
    /// Regression on `TTATA` (`gbm-regression`).
    Regression,
    /// Boosting on `Target` (`gbm-train`).
    Target,
}

impl ProfileKind {
    /// Profile name used for override files and logs.
    pub fn name(self) -> &'static str {
        match self {
            ProfileKind::Regression => "regression",
            ProfileKind::Target => "target",
        }
    }
}

/// Resolved training profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingProfile {
    /// Profile name.
    pub name: String,
    /// Model name prefix; the full name is `{prefix}_{ntrees}_{max_depth}`.
    pub model_prefix: String,
    /// Column the model learns to predict.
    pub response_column: String,
    /// Columns never used as predictors (filter semantics).
    pub ignored_columns: Vec<String>,
    /// Dataset used when no positional arguments are given.
    pub default_dataset_path: PathBuf,
    /// Boosting rounds used unless four arguments are given.
    pub default_tree_count: u32,
    /// Maximum tree depth used unless four arguments are given.
    pub default_max_depth: u32,
    /// Run label used unless four arguments are given.
    pub default_run_label: String,
    /// Shrinkage applied to every tree.
    pub learn_rate: f64,
    /// Minimum number of rows in each leaf.
    pub min_rows: u32,
    /// Minimum relative squared-error reduction for a split.
    pub min_split_improvement: f64,
    /// Histogram bins per numeric predictor.
    pub nbins: u32,
}

impl TrainingProfile {
    /// Built-in constants for a profile.
    pub fn builtin(kind: ProfileKind) -> Self {
        // The other profile's response is an outcome too, so it never predicts.
        let (model_prefix, response, other_outcome, trees, depth, label) = match kind {
            ProfileKind::Regression => ("GBMRegression", "TTATA", "Target", 30, 10, "now"),
            ProfileKind::Target => ("GBM", "Target", "TTATA", 80, 16, "20250308_080101"),
        };
        let ignored_columns = ["Group", "EventTime", "EventIndex", "DTA", other_outcome, "Fraction"]
            .iter()
            .map(|name| name.to_string())
            .collect();
        Self {
            name: kind.name().to_string(),
            model_prefix: model_prefix.to_string(),
            response_column: response.to_string(),
            ignored_columns,
            default_dataset_path: PathBuf::from("../csv/small.csv"),
            default_tree_count: trees,
            default_max_depth: depth,
            default_run_label: label.to_string(),
            learn_rate: 0.09,
            min_rows: 9,
            min_split_improvement: 1e-8,
            nbins: 20,
        }
    }

    fn apply(&mut self, overrides: ProfileOverrides) {
        if let Some(value) = overrides.model_prefix {
            self.model_prefix = value;
        }
        if let Some(value) = overrides.response_column {
            self.response_column = value;
        }
        if let Some(value) = overrides.ignored_columns {
            self.ignored_columns = value;
        }
        if let Some(value) = overrides.default_dataset_path {
            self.default_dataset_path = value;
        }
        if let Some(value) = overrides.default_tree_count {
            self.default_tree_count = value;
        }
        if let Some(value) = overrides.default_max_depth {
            self.default_max_depth = value;
        }
        if let Some(value) = overrides.default_run_label {
            self.default_run_label = value;
        }
        if let Some(value) = overrides.learn_rate {
            self.learn_rate = value;
        }
        if let Some(value) = overrides.min_rows {
            self.min_rows = value;
        }
        if let Some(value) = overrides.min_split_improvement {
            self.min_split_improvement = value;
        }
        if let Some(value) = overrides.nbins {
            self.nbins = value;
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.response_column.trim().is_empty() {
            return Err("response_column must not be empty".to_string());
        }
        if self.model_prefix.trim().is_empty() {
            return Err("model_prefix must not be empty".to_string());
        }
        check_run_label(&self.default_run_label).map_err(|err| err.to_string())?;
        if self.default_tree_count == 0 || self.default_max_depth == 0 {
            return Err("default_tree_count and default_max_depth must be positive".to_string());
        }
        if !(self.learn_rate > 0.0 && self.learn_rate <= 1.0) {
            return Err(format!("learn_rate must be in (0, 1], got {}", self.learn_rate));
        }
        if self.min_rows == 0 {
            return Err("min_rows must be at least 1".to_string());
        }
        if !(self.min_split_improvement >= 0.0) {
            return Err("min_split_improvement must be non-negative".to_string());
        }
        if !(2..=256).contains(&self.nbins) {
            return Err(format!("nbins must be in 2..=256, got {}", self.nbins));
        }
        Ok(())
    }
}

/// Partial profile read from TOML; every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProfileOverrides {
    model_prefix: Option<String>,
    response_column: Option<String>,
    ignored_columns: Option<Vec<String>>,
    default_dataset_path: Option<PathBuf>,
    default_tree_count: Option<u32>,
    default_max_depth: Option<u32>,
    default_run_label: Option<String>,
    learn_rate: Option<f64>,
    min_rows: Option<u32>,
    min_split_improvement: Option<f64>,
    nbins: Option<u32>,
}

/// Path of the override file for a profile.
pub fn profile_override_path(kind: ProfileKind) -> Result<PathBuf, ConfigError> {
    let dir = app_dirs::profiles_dir().map_err(map_app_dir_error)?;
    Ok(dir.join(format!("{}.toml", kind.name())))
}

/// Load a built-in profile, applying the app-directory override if present.
///
/// An unresolvable or unusable config root means there is no override; only
/// an override file that exists but cannot be read or applied is an error.
pub fn load_profile(kind: ProfileKind) -> Result<TrainingProfile, ConfigError> {
    let base = TrainingProfile::builtin(kind);
    match profile_override_path(kind) {
        Ok(path) => load_profile_from(&path, base),
        Err(err) => {
            tracing::warn!("Using built-in {} profile: {}", kind.name(), err);
            Ok(base)
        }
    }
}

/// Apply the TOML overrides at `path` on top of `base`.
///
/// A missing file returns `base` unchanged.
pub fn load_profile_from(
    path: &Path,
    mut base: TrainingProfile,
) -> Result<TrainingProfile, ConfigError> {
    if !path.is_file() {
        return Ok(base);
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let overrides: ProfileOverrides =
        toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })?;
    base.apply(overrides);
    base.validate().map_err(|reason| ConfigError::Invalid {
        path: path.to_path_buf(),
        reason,
    })?;
    tracing::info!("Applied profile override from {}", path.display());
    Ok(base)
}

fn map_app_dir_error(error: app_dirs::AppDirError) -> ConfigError {
    match error {
        app_dirs::AppDirError::NoBaseDir | app_dirs::AppDirError::CreateDir { .. } => {
            ConfigError::NoConfigDir
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn regression_profile_ignores_target_and_predicts_ttata() {
        let profile = TrainingProfile::builtin(ProfileKind::Regression);
        assert_eq!(profile.response_column, "TTATA");
        assert_eq!(
            profile.ignored_columns,
            vec!["Group", "EventTime", "EventIndex", "DTA", "Target", "Fraction"]
        );
        assert_eq!(profile.default_tree_count, 30);
        assert_eq!(profile.default_max_depth, 10);
        assert_eq!(profile.default_run_label, "now");
        assert_eq!(profile.default_dataset_path, PathBuf::from("../csv/small.csv"));
        assert_eq!(profile.min_rows, 9);
        assert!(profile.validate().is_ok());
    }

    #[test]
    fn target_profile_swaps_response_and_ignore() {
        let profile = TrainingProfile::builtin(ProfileKind::Target);
        assert_eq!(profile.response_column, "Target");
        assert!(profile.ignored_columns.contains(&"TTATA".to_string()));
        assert!(!profile.ignored_columns.contains(&"Target".to_string()));
        assert_eq!(profile.model_prefix, "GBM");
        assert_eq!(profile.default_tree_count, 80);
        assert_eq!(profile.default_max_depth, 16);
    }

    #[test]
    fn missing_override_file_keeps_builtin() {
        let dir = tempdir().unwrap();
        let base = TrainingProfile::builtin(ProfileKind::Target);
        let loaded = load_profile_from(&dir.path().join("target.toml"), base.clone()).unwrap();
        assert_eq!(loaded, base);
    }

    #[test]
    fn override_replaces_only_given_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("regression.toml");
        std::fs::write(&path, "learn_rate = 0.2\nignored_columns = [\"Group\"]\n").unwrap();
        let loaded =
            load_profile_from(&path, TrainingProfile::builtin(ProfileKind::Regression)).unwrap();
        assert_eq!(loaded.learn_rate, 0.2);
        assert_eq!(loaded.ignored_columns, vec!["Group"]);
        assert_eq!(loaded.response_column, "TTATA");
        assert_eq!(loaded.min_rows, 9);
    }

    #[test]
    fn override_with_unknown_key_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("regression.toml");
        std::fs::write(&path, "ntrees = 5\n").unwrap();
        let err = load_profile_from(&path, TrainingProfile::builtin(ProfileKind::Regression))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ParseToml { .. }));
    }

    #[test]
    fn override_with_bad_value_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("regression.toml");
        std::fs::write(&path, "nbins = 1\n").unwrap();
        let err = load_profile_from(&path, TrainingProfile::builtin(ProfileKind::Regression))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn override_with_path_like_run_label_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("target.toml");
        std::fs::write(&path, "default_run_label = \"../outside\"\n").unwrap();
        let err = load_profile_from(&path, TrainingProfile::builtin(ProfileKind::Target))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn load_profile_reads_app_directory_override() {
        let base = tempdir().unwrap();
        let _guard = app_dirs::OverrideGuard::set(base.path().to_path_buf());
        let profiles = app_dirs::profiles_dir().unwrap();
        std::fs::create_dir_all(&profiles).unwrap();
        std::fs::write(profiles.join("target.toml"), "model_prefix = \"GBMx\"\n").unwrap();
        let loaded = load_profile(ProfileKind::Target).unwrap();
        assert_eq!(loaded.model_prefix, "GBMx");
        let untouched = load_profile(ProfileKind::Regression).unwrap();
        assert_eq!(untouched, TrainingProfile::builtin(ProfileKind::Regression));
    }

    #[test]
    fn unusable_config_root_falls_back_to_builtin() {
        let base = tempdir().unwrap();
        let root_file = base.path().join("not-a-dir");
        std::fs::write(&root_file, b"plain file").unwrap();
        let _guard = app_dirs::OverrideGuard::set(root_file);
        let loaded = load_profile(ProfileKind::Regression).unwrap();
        assert_eq!(loaded, TrainingProfile::builtin(ProfileKind::Regression));
    }

    #[test]
    fn looking_up_overrides_creates_no_directories() {
        let base = tempdir().unwrap();
        let _guard = app_dirs::OverrideGuard::set(base.path().to_path_buf());
        load_profile(ProfileKind::Target).unwrap();
        assert!(!base.path().join(app_dirs::APP_DIR_NAME).exists());
    }
}
