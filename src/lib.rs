//! Gradient-boosted tree training tools.
//!
//! The `gbm-regression` and `gbm-train` binaries resolve positional
//! arguments against a [`config::TrainingProfile`], train a model on a CSV
//! dataset, and export it under `models/`. `gbm-score` scores a CSV with an
//! exported artifact.

/// Application directory resolution.
pub mod app_dirs;
/// Predictor column selection.
pub mod columns;
/// Training profiles and argument resolution.
pub mod config;
/// Model artifact writers and readers.
pub mod export;
/// In-memory CSV frames.
pub mod frame;
/// Tracing setup and log file rotation.
pub mod logging;
/// Model training and metrics.
pub mod ml;
/// End-to-end training run.
pub mod pipeline;
/// Batch scoring with a trained model.
pub mod scoring;
