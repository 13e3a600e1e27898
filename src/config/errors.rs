use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while resolving positional command-line arguments.
#[derive(Debug, Error)]
pub enum ArgsError {
    /// A numeric argument could not be parsed.
    #[error("Invalid {field} value: {value}")]
    InvalidNumber {
        /// Name of the configuration field.
        field: &'static str,
        /// Raw token supplied on the command line.
        value: String,
    },
    /// A numeric argument parsed but is not strictly positive.
    #[error("{field} must be greater than zero (got {value})")]
    NotPositive {
        /// Name of the configuration field.
        field: &'static str,
        /// Parsed value.
        value: u32,
    },
    /// The run label cannot be used inside a file name.
    #[error("Invalid run label {value:?}: {reason}")]
    InvalidRunLabel {
        /// Raw token supplied on the command line.
        value: String,
        /// Why the label was refused.
        reason: &'static str,
    },
}

/// Errors that may occur while loading a training profile override.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No usable config directory found.
    #[error("No suitable config directory found")]
    NoConfigDir,
    /// Failed to read a profile file.
    #[error("Failed to read {path}: {source}")]
    Read {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// Failed to parse TOML profile.
    #[error("Invalid profile at {path}: {source}")]
    ParseToml {
        /// TOML file path.
        path: PathBuf,
        /// TOML parse error.
        source: toml::de::Error,
    },
    /// The merged profile violates a structural constraint.
    #[error("Invalid profile at {path}: {reason}")]
    Invalid {
        /// TOML file path.
        path: PathBuf,
        /// Human-readable reason.
        reason: String,
    },
}
