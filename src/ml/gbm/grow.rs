//! Histogram-based growth of a single regression tree.

use super::model::{Node, Tree};

/// Bin index reserved for missing values.
pub(crate) const MISSING_BIN: u16 = u16::MAX;

/// Equal-width binning of one predictor between its observed min and max.
#[derive(Debug, Clone)]
pub(crate) struct FeatureBins {
    min: f64,
    width: f64,
    bins: usize,
}

impl FeatureBins {
    pub(crate) fn fit(values: &[f64], bins: usize) -> Self {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &v in values.iter().filter(|v| v.is_finite()) {
            min = min.min(v);
            max = max.max(v);
        }
        if !min.is_finite() || !max.is_finite() {
            min = 0.0;
            max = 0.0;
        }
        if min == max {
            max = min + 1.0;
        }
        Self {
            min,
            width: (max - min) / bins as f64,
            bins,
        }
    }

    pub(crate) fn bin(&self, value: f64) -> u16 {
        if value.is_nan() {
            return MISSING_BIN;
        }
        let pos = ((value - self.min) / self.width).floor();
        pos.clamp(0.0, (self.bins - 1) as f64) as u16
    }

    /// Threshold separating bins `..=split_bin` from the rest.
    ///
    /// The last bin keeps every present value on the left, which only makes
    /// sense when missing values go right. `f64::MAX` stays JSON-encodable.
    fn threshold(&self, split_bin: usize) -> f64 {
        if split_bin + 1 >= self.bins {
            f64::MAX
        } else {
            self.min + (split_bin + 1) as f64 * self.width
        }
    }
}

/// Per-round training inputs shared by every node.
pub(crate) struct GrowContext<'a> {
    /// Column-major raw predictor values.
    pub features: &'a [Vec<f64>],
    /// Column-major bin indices aligned with `features`.
    pub binned: &'a [Vec<u16>],
    pub bins: &'a [FeatureBins],
    /// Negative gradient per row.
    pub residuals: &'a [f64],
    /// Second-order weight per row (1 for squared error).
    pub hessians: &'a [f64],
    pub max_depth: usize,
    pub min_rows: usize,
    pub min_split_improvement: f64,
    /// Bound applied to leaf values.
    pub max_abs_leaf: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Stats {
    count: usize,
    sum: f64,
    sum_sq: f64,
}

impl Stats {
    fn push(&mut self, r: f64) {
        self.count += 1;
        self.sum += r;
        self.sum_sq += r * r;
    }

    fn merged(self, other: Stats) -> Stats {
        Stats {
            count: self.count + other.count,
            sum: self.sum + other.sum,
            sum_sq: self.sum_sq + other.sum_sq,
        }
    }

    fn minus(self, other: Stats) -> Stats {
        Stats {
            count: self.count - other.count,
            sum: self.sum - other.sum,
            sum_sq: self.sum_sq - other.sum_sq,
        }
    }

    fn sse(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        (self.sum_sq - self.sum * self.sum / self.count as f64).max(0.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    gain: f64,
    feature: usize,
    threshold: f64,
    na_left: bool,
}

/// Grow one tree; returns it together with each row's leaf value.
pub(crate) fn grow_tree(ctx: &GrowContext<'_>) -> (Tree, Vec<f64>) {
    let n_rows = ctx.residuals.len();
    let mut row_values = vec![0.0; n_rows];
    let mut nodes = vec![Node::Leaf { value: 0.0 }];
    let mut pending: Vec<(usize, Vec<u32>, usize)> = vec![(0, (0..n_rows as u32).collect(), 0)];

    while let Some((node_idx, rows, depth)) = pending.pop() {
        let split = if depth < ctx.max_depth {
            best_split(ctx, &rows)
        } else {
            None
        };
        let partition = split.and_then(|split| {
            let (left, right) = partition_rows(ctx, &rows, &split);
            // Raw thresholds can disagree with bin edges by rounding.
            (left.len() >= ctx.min_rows && right.len() >= ctx.min_rows)
                .then_some((split, left, right))
        });
        match partition {
            Some((split, left_rows, right_rows)) => {
                let left = nodes.len();
                nodes.push(Node::Leaf { value: 0.0 });
                nodes.push(Node::Leaf { value: 0.0 });
                nodes[node_idx] = Node::Split {
                    feature: split.feature as u32,
                    threshold: split.threshold,
                    na_left: split.na_left,
                    left: left as u32,
                    right: (left + 1) as u32,
                };
                pending.push((left, left_rows, depth + 1));
                pending.push((left + 1, right_rows, depth + 1));
            }
            None => {
                let value = leaf_value(ctx, &rows);
                for &row in &rows {
                    row_values[row as usize] = value;
                }
                nodes[node_idx] = Node::Leaf { value };
            }
        }
    }
    (Tree { nodes }, row_values)
}

fn leaf_value(ctx: &GrowContext<'_>, rows: &[u32]) -> f64 {
    let mut sum = 0.0;
    let mut weight = 0.0;
    for &row in rows {
        sum += ctx.residuals[row as usize];
        weight += ctx.hessians[row as usize];
    }
    if weight <= 1e-10 {
        return 0.0;
    }
    (sum / weight).clamp(-ctx.max_abs_leaf, ctx.max_abs_leaf)
}

fn best_split(ctx: &GrowContext<'_>, rows: &[u32]) -> Option<SplitCandidate> {
    if rows.len() < 2 * ctx.min_rows {
        return None;
    }
    let mut parent = Stats::default();
    for &row in rows {
        parent.push(ctx.residuals[row as usize]);
    }
    let parent_sse = parent.sse();
    // Below this the node is pure up to rounding noise.
    if parent_sse <= 16.0 * f64::EPSILON * parent.sum_sq {
        return None;
    }

    let mut best: Option<SplitCandidate> = None;
    for (feature, bins) in ctx.bins.iter().enumerate() {
        let Some(candidate) = best_split_for_feature(ctx, rows, feature, bins, parent, parent_sse)
        else {
            continue;
        };
        if best.is_none_or(|current| candidate.gain > current.gain) {
            best = Some(candidate);
        }
    }
    best.filter(|split| {
        split.gain > 0.0 && split.gain > ctx.min_split_improvement * parent_sse
    })
}

fn best_split_for_feature(
    ctx: &GrowContext<'_>,
    rows: &[u32],
    feature: usize,
    bins: &FeatureBins,
    parent: Stats,
    parent_sse: f64,
) -> Option<SplitCandidate> {
    let binned = &ctx.binned[feature];
    let mut hist = vec![Stats::default(); bins.bins];
    let mut missing = Stats::default();
    for &row in rows {
        let r = ctx.residuals[row as usize];
        match binned[row as usize] {
            MISSING_BIN => missing.push(r),
            bin => hist[bin as usize].push(r),
        }
    }
    let present = parent.minus(missing);

    let mut best: Option<SplitCandidate> = None;
    let mut left_present = Stats::default();
    for (split_bin, bin_stats) in hist.iter().enumerate() {
        left_present = left_present.merged(*bin_stats);
        let right_present = present.minus(left_present);
        for na_left in [true, false] {
            if missing.count == 0 && !na_left {
                continue;
            }
            let (left, right) = if na_left {
                (left_present.merged(missing), right_present)
            } else {
                (left_present, right_present.merged(missing))
            };
            if left.count < ctx.min_rows || right.count < ctx.min_rows {
                continue;
            }
            let gain = parent_sse - left.sse() - right.sse();
            if best.is_none_or(|current| gain > current.gain) {
                // Without training NAs, unseen missing values follow the larger side.
                let na_left = if missing.count == 0 {
                    left.count >= right.count
                } else {
                    na_left
                };
                best = Some(SplitCandidate {
                    gain,
                    feature,
                    threshold: bins.threshold(split_bin),
                    na_left,
                });
            }
        }
    }
    best
}

fn partition_rows(
    ctx: &GrowContext<'_>,
    rows: &[u32],
    split: &SplitCandidate,
) -> (Vec<u32>, Vec<u32>) {
    let values = &ctx.features[split.feature];
    rows.iter().partition(|&&row| {
        let value = values[row as usize];
        if value.is_nan() {
            split.na_left
        } else {
            value < split.threshold
        }
    })
}
