//! Training configuration: built-in profiles, TOML overrides, and the
//! positional argument resolver.

pub mod args;
mod errors;
pub mod profile;

pub use args::{TrainingConfig, resolve_args};
pub use errors::{ArgsError, ConfigError};
pub use profile::{ProfileKind, TrainingProfile, load_profile, load_profile_from};
