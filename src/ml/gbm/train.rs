use thiserror::Error;

use crate::columns::ColumnSet;
use crate::frame::{ColumnData, Frame};
use crate::ml::metrics::ModelMetrics;

use super::grow::{FeatureBins, GrowContext, grow_tree};
use super::model::{
    Distribution, GbmModel, GbmParameters, MODEL_VERSION, ModelCategory, Tree, sigmoid,
};

/// Largest absolute Bernoulli leaf value.
const MAX_BERNOULLI_LEAF: f64 = 19.0;
/// Probabilities are kept inside `[P_EPS, 1 - P_EPS]` for the initial log-odds.
const P_EPS: f64 = 1e-10;

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("Response column {0} not found in training frame")]
    MissingResponse(String),
    #[error("Predictor column {0} not found in training frame")]
    MissingPredictor(String),
    #[error("No predictor columns left after removing ignored and response columns")]
    NoPredictors,
    #[error("Response column {column} has {levels} levels; only numeric or two-level responses are supported")]
    UnsupportedResponse { column: String, levels: usize },
    #[error("Distribution {distribution:?} does not match {category} response {column}")]
    DistributionMismatch {
        distribution: Distribution,
        category: ModelCategory,
        column: String,
    },
    #[error("Response column {0} has no non-missing values")]
    NoUsableRows(String),
}

/// Training inputs after response filtering and predictor encoding.
struct TrainingData {
    category: ModelCategory,
    response_domain: Option<Vec<String>>,
    predictor_domains: Vec<Option<Vec<String>>>,
    /// Column-major predictor values for the kept rows.
    features: Vec<Vec<f64>>,
    /// Response per kept row; `0/1` for binomial.
    y: Vec<f64>,
}

/// Fit a gradient-boosted tree model on `frame`.
///
/// Rows with a missing response are skipped. Each round fits one tree to the
/// negative gradient of the loss: squared error for numeric responses,
/// Bernoulli deviance for two-level categorical ones.
pub fn train_gbm(
    frame: &Frame,
    columns: &ColumnSet,
    params: &GbmParameters,
) -> Result<GbmModel, TrainError> {
    params.validate().map_err(TrainError::InvalidParameters)?;
    let data = prepare(frame, columns, params)?;
    let distribution = match data.category {
        ModelCategory::Regression => Distribution::Gaussian,
        ModelCategory::Binomial => Distribution::Bernoulli,
    };

    let nbins = params.nbins as usize;
    let bins: Vec<FeatureBins> = data
        .features
        .iter()
        .map(|values| FeatureBins::fit(values, nbins))
        .collect();
    let binned: Vec<Vec<u16>> = data
        .features
        .iter()
        .zip(&bins)
        .map(|(values, bins)| values.iter().map(|&v| bins.bin(v)).collect())
        .collect();

    let n = data.y.len();
    let init_f = initial_prediction(distribution, &data.y);
    let mut raw = vec![init_f; n];
    let mut residuals = vec![0.0; n];
    let mut hessians = vec![1.0; n];
    let max_abs_leaf = match distribution {
        Distribution::Bernoulli => MAX_BERNOULLI_LEAF,
        _ => f64::INFINITY,
    };

    let mut trees: Vec<Tree> = Vec::with_capacity(params.ntrees as usize);
    for round in 0..params.ntrees {
        for i in 0..n {
            match distribution {
                Distribution::Bernoulli => {
                    let p = sigmoid(raw[i]);
                    residuals[i] = data.y[i] - p;
                    hessians[i] = p * (1.0 - p);
                }
                _ => residuals[i] = data.y[i] - raw[i],
            }
        }
        let ctx = GrowContext {
            features: &data.features,
            binned: &binned,
            bins: &bins,
            residuals: &residuals,
            hessians: &hessians,
            max_depth: params.max_depth as usize,
            min_rows: params.min_rows as usize,
            min_split_improvement: params.min_split_improvement,
            max_abs_leaf,
        };
        let (tree, row_values) = grow_tree(&ctx);
        for (f, value) in raw.iter_mut().zip(&row_values) {
            *f += params.learn_rate * value;
        }
        tracing::debug!(
            "round {}/{}: {} leaves, depth {}",
            round + 1,
            params.ntrees,
            tree.leaf_count(),
            tree.depth()
        );
        trees.push(tree);
    }

    let training_metrics = match distribution {
        Distribution::Bernoulli => {
            let probabilities: Vec<f64> = raw.iter().map(|&f| sigmoid(f)).collect();
            ModelMetrics::binomial(&data.y, &probabilities)
        }
        _ => ModelMetrics::regression(&data.y, &raw),
    };

    Ok(GbmModel {
        model_version: MODEL_VERSION,
        category: data.category,
        distribution,
        parameters: params.clone(),
        predictors: columns.predictors.clone(),
        predictor_domains: data.predictor_domains,
        response_domain: data.response_domain,
        init_f,
        trees,
        training_metrics,
    })
}

fn prepare(
    frame: &Frame,
    columns: &ColumnSet,
    params: &GbmParameters,
) -> Result<TrainingData, TrainError> {
    let response = frame
        .column(&columns.response_column)
        .ok_or_else(|| TrainError::MissingResponse(columns.response_column.clone()))?;
    if columns.predictors.is_empty() {
        return Err(TrainError::NoPredictors);
    }

    let category = match &response.data {
        ColumnData::Numeric(_) => ModelCategory::Regression,
        ColumnData::Categorical { levels, .. } if levels.len() == 2 => ModelCategory::Binomial,
        ColumnData::Categorical { levels, .. } => {
            return Err(TrainError::UnsupportedResponse {
                column: response.name.clone(),
                levels: levels.len(),
            });
        }
    };
    let expected = match category {
        ModelCategory::Regression => Distribution::Gaussian,
        ModelCategory::Binomial => Distribution::Bernoulli,
    };
    if params.distribution != Distribution::Auto && params.distribution != expected {
        return Err(TrainError::DistributionMismatch {
            distribution: params.distribution,
            category,
            column: response.name.clone(),
        });
    }

    let kept: Vec<usize> = (0..frame.rows())
        .filter(|&row| !response.data.is_missing(row))
        .collect();
    if kept.is_empty() {
        return Err(TrainError::NoUsableRows(response.name.clone()));
    }
    let y = kept
        .iter()
        .map(|&row| response.data.value_f64(row))
        .collect();

    let mut features = Vec::with_capacity(columns.predictors.len());
    let mut predictor_domains = Vec::with_capacity(columns.predictors.len());
    for name in &columns.predictors {
        let column = frame
            .column(name)
            .ok_or_else(|| TrainError::MissingPredictor(name.clone()))?;
        features.push(
            kept.iter()
                .map(|&row| column.data.value_f64(row))
                .collect::<Vec<f64>>(),
        );
        predictor_domains.push(column.data.levels().map(|levels| levels.to_vec()));
    }

    Ok(TrainingData {
        category,
        response_domain: response.data.levels().map(|levels| levels.to_vec()),
        predictor_domains,
        features,
        y,
    })
}

fn initial_prediction(distribution: Distribution, y: &[f64]) -> f64 {
    let mean = y.iter().sum::<f64>() / y.len() as f64;
    match distribution {
        Distribution::Bernoulli => {
            let p = mean.clamp(P_EPS, 1.0 - P_EPS);
            (p / (1.0 - p)).ln()
        }
        _ => mean,
    }
}
