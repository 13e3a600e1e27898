//! Model training and evaluation.
//!
//! The booster and its metrics are self-contained; no external engine is
//! involved in fitting or scoring.

pub mod gbm;
pub mod metrics;
