//! Predictor column selection.

use std::collections::BTreeSet;

/// Dataset columns split into response, ignored, and predictor roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSet {
    /// Every column in dataset order.
    pub all_columns: Vec<String>,
    /// Columns excluded from training.
    pub ignored_columns: BTreeSet<String>,
    /// Column the model learns to predict.
    pub response_column: String,
    /// `all_columns` minus ignored and response columns, in dataset order.
    pub predictors: Vec<String>,
}

impl ColumnSet {
    /// Derive predictors by filtering `all_columns`.
    ///
    /// Ignored names that are not in the dataset are fine; the response is
    /// always excluded even when it is not listed as ignored.
    pub fn select(all_columns: Vec<String>, ignored: &[String], response: &str) -> Self {
        let ignored_columns: BTreeSet<String> = ignored.iter().cloned().collect();
        let predictors = all_columns
            .iter()
            .filter(|name| !ignored_columns.contains(*name) && name.as_str() != response)
            .cloned()
            .collect();
        Self {
            all_columns,
            ignored_columns,
            response_column: response.to_string(),
            predictors,
        }
    }

    /// Whether the response column is present in the dataset.
    pub fn has_response(&self) -> bool {
        self.all_columns.iter().any(|name| name == &self.response_column)
    }

    /// Ignored names that the dataset does not contain.
    pub fn absent_ignored(&self) -> Vec<&str> {
        self.ignored_columns
            .iter()
            .filter(|name| !self.all_columns.contains(name))
            .map(String::as_str)
            .collect()
    }
}
