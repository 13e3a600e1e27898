//! Training metrics for regression and binomial models.

use serde::{Deserialize, Serialize};

use super::gbm::ModelCategory;

/// Smallest probability used inside `ln` for log loss.
const LOGLOSS_EPS: f64 = 1e-15;

#[derive(Debug, Clone)]
/// Confusion matrix for a `K`-class classifier.
pub struct ConfusionMatrix {
    /// Number of classes.
    pub n_classes: usize,
    /// Row-major `KxK` counts (`truth * K + predicted`).
    pub counts: Vec<u32>,
}

impl ConfusionMatrix {
    /// Create an empty `KxK` confusion matrix.
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            counts: vec![0; n_classes * n_classes],
        }
    }

    pub fn add(&mut self, truth: usize, predicted: usize) {
        if truth >= self.n_classes || predicted >= self.n_classes {
            return;
        }
        let idx = truth * self.n_classes + predicted;
        self.counts[idx] = self.counts[idx].saturating_add(1);
    }

    pub fn get(&self, truth: usize, predicted: usize) -> u32 {
        self.counts[truth * self.n_classes + predicted]
    }
}

#[derive(Debug, Clone)]
/// Precision/recall statistics for a single class.
pub struct PerClassStats {
    /// `TP / (TP + FP)`.
    pub precision: f64,
    /// `TP / (TP + FN)`.
    pub recall: f64,
    /// Total number of true examples for the class.
    pub support: u32,
}

/// Compute per-class precision and recall from a confusion matrix.
pub fn precision_recall_by_class(cm: &ConfusionMatrix) -> Vec<PerClassStats> {
    let k = cm.n_classes;
    let mut stats = Vec::with_capacity(k);
    for class_idx in 0..k {
        let tp = cm.get(class_idx, class_idx) as f64;
        let mut fp = 0f64;
        let mut fn_ = 0f64;
        let mut support = 0u32;
        for j in 0..k {
            let v = cm.get(class_idx, j);
            support = support.saturating_add(v);
            if j != class_idx {
                fn_ += v as f64;
            }
        }
        for i in 0..k {
            if i != class_idx {
                fp += cm.get(i, class_idx) as f64;
            }
        }
        let precision = if tp + fp == 0.0 { 0.0 } else { tp / (tp + fp) };
        let recall = if tp + fn_ == 0.0 { 0.0 } else { tp / (tp + fn_) };
        stats.push(PerClassStats {
            precision,
            recall,
            support,
        });
    }
    stats
}

/// Metrics computed on the training frame after fitting.
///
/// `None` marks a metric that is undefined for the data, such as `r2` with a
/// constant response or `auc` when only one class is present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Number of scored rows.
    pub nobs: usize,
    pub mse: Option<f64>,
    pub rmse: Option<f64>,
    pub r2: Option<f64>,
    pub mae: Option<f64>,
    pub mean_residual_deviance: Option<f64>,
    pub auc: Option<f64>,
    pub logloss: Option<f64>,
    pub mean_per_class_error: Option<f64>,
}

impl ModelMetrics {
    /// Metrics for real-valued predictions.
    pub fn regression(actual: &[f64], predicted: &[f64]) -> Self {
        let n = actual.len().min(predicted.len());
        if n == 0 {
            return Self::default();
        }
        let mut sq = 0.0;
        let mut abs = 0.0;
        for (&y, &p) in actual.iter().zip(predicted) {
            let err = y - p;
            sq += err * err;
            abs += err.abs();
        }
        let mse = sq / n as f64;
        Self {
            nobs: n,
            mse: Some(mse),
            rmse: Some(mse.sqrt()),
            r2: r_squared(&actual[..n], mse),
            mae: Some(abs / n as f64),
            mean_residual_deviance: Some(mse),
            ..Self::default()
        }
    }

    /// Metrics for positive-class probabilities against `0/1` labels.
    pub fn binomial(actual: &[f64], probabilities: &[f64]) -> Self {
        let n = actual.len().min(probabilities.len());
        if n == 0 {
            return Self::default();
        }
        let actual = &actual[..n];
        let probabilities = &probabilities[..n];
        let mut sq = 0.0;
        let mut log_loss = 0.0;
        let mut cm = ConfusionMatrix::new(2);
        for (&y, &p) in actual.iter().zip(probabilities) {
            let err = y - p;
            sq += err * err;
            let p = p.clamp(LOGLOSS_EPS, 1.0 - LOGLOSS_EPS);
            log_loss -= if y > 0.5 { p.ln() } else { (1.0 - p).ln() };
            cm.add(usize::from(y > 0.5), usize::from(p >= 0.5));
        }
        let mse = sq / n as f64;
        Self {
            nobs: n,
            mse: Some(mse),
            rmse: Some(mse.sqrt()),
            r2: r_squared(actual, mse),
            auc: auc(actual, probabilities),
            logloss: Some(log_loss / n as f64),
            mean_per_class_error: mean_per_class_error(&cm),
            ..Self::default()
        }
    }

    /// Metrics reported for a model category, in logging order.
    ///
    /// Binomial models report ranking and classification errors, regression
    /// models the absolute error; both report `r2` and `mse`.
    pub fn reported(&self, category: ModelCategory) -> Vec<(&'static str, Option<f64>)> {
        let mut out = match category {
            ModelCategory::Binomial => vec![
                ("auc", self.auc),
                ("logloss", self.logloss),
                ("mean_per_class_error", self.mean_per_class_error),
            ],
            ModelCategory::Regression => vec![("mae", self.mae)],
        };
        out.push(("r2", self.r2));
        out.push(("mse", self.mse));
        out
    }
}

fn r_squared(actual: &[f64], mse: f64) -> Option<f64> {
    let n = actual.len() as f64;
    let mean = actual.iter().sum::<f64>() / n;
    let variance = actual.iter().map(|y| (y - mean).powi(2)).sum::<f64>() / n;
    if variance > 0.0 {
        Some(1.0 - mse / variance)
    } else {
        None
    }
}

/// Area under the ROC curve via the rank-sum statistic; ties share ranks.
fn auc(actual: &[f64], probabilities: &[f64]) -> Option<f64> {
    let positives = actual.iter().filter(|&&y| y > 0.5).count();
    let negatives = actual.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }
    let mut order: Vec<usize> = (0..actual.len()).collect();
    order.sort_by(|&a, &b| probabilities[a].total_cmp(&probabilities[b]));

    let mut positive_rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && probabilities[order[end]] == probabilities[order[start]] {
            end += 1;
        }
        // Ranks are 1-based; a tie group shares the mean of its ranks.
        let shared_rank = (start + 1 + end) as f64 / 2.0;
        let group_positives = order[start..end]
            .iter()
            .filter(|&&idx| actual[idx] > 0.5)
            .count();
        positive_rank_sum += shared_rank * group_positives as f64;
        start = end;
    }
    let p = positives as f64;
    let u = positive_rank_sum - p * (p + 1.0) / 2.0;
    Some(u / (p * negatives as f64))
}

/// Mean over present classes of `1 - recall`.
fn mean_per_class_error(cm: &ConfusionMatrix) -> Option<f64> {
    let present: Vec<f64> = precision_recall_by_class(cm)
        .into_iter()
        .filter(|stats| stats.support > 0)
        .map(|stats| 1.0 - stats.recall)
        .collect();
    if present.is_empty() {
        None
    } else {
        Some(present.iter().sum::<f64>() / present.len() as f64)
    }
}
