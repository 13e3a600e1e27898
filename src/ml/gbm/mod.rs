//! Gradient-boosted regression trees.
//!
//! A small single-process booster:
//! - Squared-error boosting for numeric responses.
//! - Bernoulli boosting with Newton leaf steps for two-level responses.
//! - Equal-width histogram split search with learned missing-value routing.
//! - Serializable model with training metrics attached.

mod grow;
mod model;
mod train;

pub use model::{
    Distribution, GbmModel, GbmParameters, MODEL_VERSION, ModelCategory, Node, Tree,
};
pub use train::{TrainError, train_gbm};
