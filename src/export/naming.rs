//! Output file naming convention.

use std::path::{Path, PathBuf};

/// Extension of the hyperparameter file.
pub const PARAMS_EXT: &str = "json";
/// Extension of the portable scoring artifact.
pub const PORTABLE_EXT: &str = "zip";
/// Extension of the binary artifact.
pub const BINARY_EXT: &str = "h2o";

/// `{prefix}_{ntrees}_{max_depth}`.
pub fn model_name(prefix: &str, ntrees: u32, max_depth: u32) -> String {
    format!("{prefix}_{ntrees}_{max_depth}")
}

/// `{model_name}_{run_label}`.
pub fn basename(model_name: &str, run_label: &str) -> String {
    format!("{model_name}_{run_label}")
}

/// `{dir}/{basename}.{ext}`.
pub fn artifact_path(dir: &Path, basename: &str, ext: &str) -> PathBuf {
    dir.join(format!("{basename}.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basename_joins_model_name_and_label() {
        assert_eq!(
            basename("GBM_80_16", "20250308_080101"),
            "GBM_80_16_20250308_080101"
        );
    }

    #[test]
    fn model_name_encodes_tree_shape() {
        assert_eq!(model_name("GBMRegression", 30, 10), "GBMRegression_30_10");
    }

    #[test]
    fn artifact_path_keeps_dots_in_label() {
        let path = artifact_path(Path::new("models"), "GBM_1_2_v1.5", BINARY_EXT);
        assert_eq!(path, PathBuf::from("models/GBM_1_2_v1.5.h2o"));
    }
}
