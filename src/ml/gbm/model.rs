use std::fmt;

use serde::{Deserialize, Serialize};

use crate::frame::{ColumnData, Frame};
use crate::ml::metrics::ModelMetrics;

/// Current model payload version.
pub const MODEL_VERSION: u32 = 1;

/// Kind of prediction a model makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelCategory {
    Regression,
    Binomial,
}

impl fmt::Display for ModelCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModelCategory::Regression => "Regression",
            ModelCategory::Binomial => "Binomial",
        })
    }
}

/// Loss function; `Auto` picks one from the response column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    #[default]
    Auto,
    Gaussian,
    Bernoulli,
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Distribution::Auto => "auto",
            Distribution::Gaussian => "gaussian",
            Distribution::Bernoulli => "bernoulli",
        })
    }
}

/// Hyperparameters of a training run, exported verbatim as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GbmParameters {
    pub model_id: String,
    pub training_frame: String,
    pub response_column: String,
    pub ignored_columns: Vec<String>,
    pub ntrees: u32,
    pub max_depth: u32,
    pub learn_rate: f64,
    pub min_rows: u32,
    pub min_split_improvement: f64,
    pub nbins: u32,
    #[serde(default)]
    pub distribution: Distribution,
}

impl GbmParameters {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.ntrees == 0 {
            return Err("ntrees must be positive".to_string());
        }
        if self.max_depth == 0 {
            return Err("max_depth must be positive".to_string());
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

/// Tree node stored in a flat arena; children always follow their parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Split {
        /// Predictor index.
        feature: u32,
        /// Rows with `value < threshold` go left.
        threshold: f64,
        /// Direction taken by missing values.
        na_left: bool,
        left: u32,
        right: u32,
    },
    Leaf {
        value: f64,
    },
}

/// Regression tree fitted to one boosting round's gradient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    /// Leaf value reached by a row of predictor values.
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    na_left,
                    left,
                    right,
                } => {
                    let value = row.get(*feature as usize).copied().unwrap_or(f64::NAN);
                    let go_left = if value.is_nan() {
                        *na_left
                    } else {
                        value < *threshold
                    };
                    let next = if go_left { *left } else { *right };
                    idx = next as usize;
                }
            }
        }
    }

    /// Number of edges on the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        let mut depths = vec![0usize; self.nodes.len()];
        let mut max_depth = 0;
        for (idx, node) in self.nodes.iter().enumerate() {
            if let Node::Split { left, right, .. } = node {
                let child_depth = depths[idx] + 1;
                depths[*left as usize] = child_depth;
                depths[*right as usize] = child_depth;
                max_depth = max_depth.max(child_depth);
            }
        }
        max_depth
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node, Node::Leaf { .. }))
            .count()
    }

    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            if let Node::Split {
                feature,
                left,
                right,
                ..
            } = node
            {
                if *feature as usize >= n_features {
                    return Err(format!("node {idx} splits on unknown feature {feature}"));
                }
                for child in [*left, *right] {
                    let child = child as usize;
                    if child <= idx || child >= self.nodes.len() {
                        return Err(format!("node {idx} has invalid child {child}"));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Trained gradient-boosted tree model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GbmModel {
    pub model_version: u32,
    pub category: ModelCategory,
    /// Resolved loss function.
    pub distribution: Distribution,
    pub parameters: GbmParameters,
    /// Predictor names in feature-index order.
    pub predictors: Vec<String>,
    /// Levels of categorical predictors (`None` for numeric ones).
    pub predictor_domains: Vec<Option<Vec<String>>>,
    /// Response levels for binomial models; index 1 is the positive class.
    pub response_domain: Option<Vec<String>>,
    /// Prediction before any tree (mean or log-odds).
    pub init_f: f64,
    pub trees: Vec<Tree>,
    pub training_metrics: ModelMetrics,
}

impl GbmModel {
    /// Model identifier, `{prefix}_{ntrees}_{max_depth}`.
    pub fn name(&self) -> &str {
        &self.parameters.model_id
    }

    /// Validate structural invariants of a model, typically after loading.
    pub fn validate(&self) -> Result<(), String> {
        if self.model_version != MODEL_VERSION {
            return Err(format!(
                "Unsupported model_version {} (expected {MODEL_VERSION})",
                self.model_version
            ));
        }
        if self.predictor_domains.len() != self.predictors.len() {
            return Err("predictor_domains length must match predictors length".to_string());
        }
        match (self.category, &self.response_domain) {
            (ModelCategory::Binomial, Some(domain)) if domain.len() == 2 => {}
            (ModelCategory::Binomial, _) => {
                return Err("Binomial model needs a two-level response domain".to_string());
            }
            (ModelCategory::Regression, None) => {}
            (ModelCategory::Regression, Some(_)) => {
                return Err("Regression model must not carry a response domain".to_string());
            }
        }
        for (idx, tree) in self.trees.iter().enumerate() {
            tree.validate(self.predictors.len())
                .map_err(|err| format!("Tree {idx}: {err}"))?;
        }
        Ok(())
    }

    /// Raw score: `init_f + learn_rate * sum(tree outputs)`.
    pub fn predict_raw(&self, row: &[f64]) -> f64 {
        let boosted: f64 = self.trees.iter().map(|tree| tree.predict(row)).sum();
        self.init_f + self.parameters.learn_rate * boosted
    }

    /// Regression value, or positive-class probability for binomial models.
    pub fn predict(&self, row: &[f64]) -> f64 {
        let raw = self.predict_raw(row);
        match self.category {
            ModelCategory::Regression => raw,
            ModelCategory::Binomial => sigmoid(raw),
        }
    }

    /// Predicted response level for binomial models at a 0.5 threshold.
    pub fn predict_label(&self, row: &[f64]) -> Option<&str> {
        let domain = self.response_domain.as_ref()?;
        let idx = usize::from(self.predict(row) >= 0.5);
        domain.get(idx).map(String::as_str)
    }

    /// Encode a frame into row-major predictor vectors for scoring.
    ///
    /// Columns are matched by name. Missing columns and unseen categorical
    /// levels become `NaN`, which follows each split's missing direction.
    /// Returns the rows plus the names of predictors absent from the frame.
    pub fn encode_frame(&self, frame: &Frame) -> (Vec<Vec<f64>>, Vec<String>) {
        let mut rows = vec![vec![f64::NAN; self.predictors.len()]; frame.rows()];
        let mut absent = Vec::new();
        for (feature, (name, domain)) in self
            .predictors
            .iter()
            .zip(&self.predictor_domains)
            .enumerate()
        {
            let Some(column) = frame.column(name) else {
                absent.push(name.clone());
                continue;
            };
            for (row_idx, row) in rows.iter_mut().enumerate() {
                row[feature] = encode_cell(&column.data, row_idx, domain.as_deref());
            }
        }
        (rows, absent)
    }
}

fn encode_cell(data: &ColumnData, row: usize, domain: Option<&[String]>) -> f64 {
    if data.is_missing(row) {
        return f64::NAN;
    }
    match (data, domain) {
        (ColumnData::Numeric(values), None) => values[row],
        (ColumnData::Categorical { levels, codes }, None) => codes[row]
            .and_then(|code| levels.get(code as usize))
            .and_then(|level| level.parse::<f64>().ok())
            .unwrap_or(f64::NAN),
        (ColumnData::Numeric(values), Some(domain)) => numeric_level_code(domain, values[row]),
        (ColumnData::Categorical { levels, codes }, Some(domain)) => codes[row]
            .and_then(|code| levels.get(code as usize))
            .map(|level| level_code(domain, level))
            .unwrap_or(f64::NAN),
    }
}

fn level_code(domain: &[String], level: &str) -> f64 {
    domain
        .iter()
        .position(|known| known == level)
        .map(|idx| idx as f64)
        .unwrap_or(f64::NAN)
}

/// Numeric cells only keep their value, so `1` matches a level spelled `01`
/// or `1.0`. Ambiguous domains resolve to the first matching level.
fn numeric_level_code(domain: &[String], value: f64) -> f64 {
    domain
        .iter()
        .position(|known| known.parse::<f64>().is_ok_and(|level| level == value))
        .map(|idx| idx as f64)
        .unwrap_or(f64::NAN)
}

pub(crate) fn sigmoid(raw: f64) -> f64 {
    1.0 / (1.0 + (-raw).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Column;

    fn params() -> GbmParameters {
        GbmParameters {
            model_id: "GBM_1_1".to_string(),
            training_frame: "t.csv".to_string(),
            response_column: "y".to_string(),
            ignored_columns: Vec::new(),
            ntrees: 1,
            max_depth: 1,
            learn_rate: 0.5,
            min_rows: 1,
            min_split_improvement: 0.0,
            nbins: 20,
            distribution: Distribution::Auto,
        }
    }

    fn stump(threshold: f64, na_left: bool) -> Tree {
        Tree {
            nodes: vec![
                Node::Split {
                    feature: 0,
                    threshold,
                    na_left,
                    left: 1,
                    right: 2,
                },
                Node::Leaf { value: -2.0 },
                Node::Leaf { value: 4.0 },
            ],
        }
    }

    fn model(category: ModelCategory) -> GbmModel {
        GbmModel {
            model_version: MODEL_VERSION,
            category,
            distribution: Distribution::Gaussian,
            parameters: params(),
            predictors: vec!["x".to_string(), "c".to_string()],
            predictor_domains: vec![None, Some(vec!["lo".to_string(), "hi".to_string()])],
            response_domain: match category {
                ModelCategory::Binomial => Some(vec!["no".to_string(), "yes".to_string()]),
                ModelCategory::Regression => None,
            },
            init_f: 1.0,
            trees: vec![stump(0.5, true)],
            training_metrics: ModelMetrics::default(),
        }
    }

    #[test]
    fn tree_routes_by_threshold_and_missing_direction() {
        let tree = stump(0.5, false);
        assert_eq!(tree.predict(&[0.4]), -2.0);
        assert_eq!(tree.predict(&[0.5]), 4.0);
        assert_eq!(tree.predict(&[f64::NAN]), 4.0);
        assert_eq!(stump(0.5, true).predict(&[f64::NAN]), -2.0);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.leaf_count(), 2);
    }

    #[test]
    fn predict_scales_trees_by_learn_rate() {
        let model = model(ModelCategory::Regression);
        assert_eq!(model.predict(&[0.0, 0.0]), 0.0);
        assert_eq!(model.predict(&[1.0, 0.0]), 3.0);
        assert!(model.validate().is_ok());
    }

    #[test]
    fn binomial_predicts_probability_and_label() {
        let model = model(ModelCategory::Binomial);
        let p = model.predict(&[1.0, 0.0]);
        assert!((p - sigmoid(3.0)).abs() < 1e-12);
        assert_eq!(model.predict_label(&[1.0, 0.0]), Some("yes"));
        assert_eq!(model.predict_label(&[0.0, 0.0]), Some("yes"));
        assert!(model.validate().is_ok());
    }

    #[test]
    fn validate_rejects_backward_child_links() {
        let mut model = model(ModelCategory::Regression);
        model.trees[0].nodes[0] = Node::Split {
            feature: 0,
            threshold: 0.0,
            na_left: true,
            left: 0,
            right: 2,
        };
        assert!(model.validate().is_err());
    }

    #[test]
    fn validate_rejects_domain_mismatch() {
        let mut model = model(ModelCategory::Regression);
        model.response_domain = Some(vec!["a".to_string(), "b".to_string()]);
        assert!(model.validate().is_err());
    }

    #[test]
    fn encode_frame_maps_levels_and_absent_columns() {
        let model = model(ModelCategory::Regression);
        let frame = Frame::new(
            "score.csv",
            vec![Column {
                name: "c".to_string(),
                data: ColumnData::Categorical {
                    levels: vec!["hi".to_string(), "new".to_string()],
                    codes: vec![Some(0), Some(1), None],
                },
            }],
        );
        let (rows, absent) = model.encode_frame(&frame);
        assert_eq!(absent, vec!["x".to_string()]);
        assert!(rows[0][0].is_nan());
        assert_eq!(rows[0][1], 1.0);
        assert!(rows[1][1].is_nan());
        assert!(rows[2][1].is_nan());
    }

    #[test]
    fn numeric_cells_match_levels_by_value() {
        let mut model = model(ModelCategory::Regression);
        model.predictor_domains[1] = Some(vec!["01".to_string(), "2.0".to_string()]);
        let frame = Frame::new(
            "score.csv",
            vec![
                Column {
                    name: "x".to_string(),
                    data: ColumnData::Categorical {
                        levels: vec!["0.75".to_string(), "n/a-ish".to_string()],
                        codes: vec![Some(0), Some(1), Some(0)],
                    },
                },
                Column {
                    name: "c".to_string(),
                    data: ColumnData::Numeric(vec![1.0, 2.0, 3.0]),
                },
            ],
        );
        let (rows, absent) = model.encode_frame(&frame);
        assert!(absent.is_empty());
        assert_eq!(rows[0], vec![0.75, 0.0]);
        assert!(rows[1][0].is_nan());
        assert_eq!(rows[1][1], 1.0);
        assert!(rows[2][1].is_nan());
    }

    #[test]
    fn distribution_displays_loss_name() {
        assert_eq!(Distribution::Gaussian.to_string(), "gaussian");
        assert_eq!(Distribution::Bernoulli.to_string(), "bernoulli");
    }
}
