//! Decision-tree predictor (CART, variance-reduction splits)

use super::{ModelAdapter, Predictor};
use crate::calibration::{HyperGrid, ParamSet, ParamValue};
use crate::config::RunConfig;
use crate::error::{EnsembleError, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MaxFeatures {
    All,
    Sqrt,
}

#[derive(Debug, Clone)]
pub struct DecisionTree {
    seed: u64,
    root: Option<Node>,
}

struct TreeParams {
    max_depth: usize,
    min_samples_split: usize,
    max_features: MaxFeatures,
}

impl DecisionTree {
    /// The seed fixes the feature subsampling stream so repeated fits on the
    /// same window give the same tree.
    pub fn new(seed: u64) -> Self {
        Self { seed, root: None }
    }
}

fn read_params(params: &ParamSet) -> Result<TreeParams> {
    let max_depth = match params.get_int("max_depth") {
        Some(v) if v >= 1 => v as usize,
        Some(v) => {
            return Err(EnsembleError::InvalidConfiguration(format!(
                "max_depth must be positive, got {}",
                v
            )))
        }
        None => 5,
    };
    let min_samples_split = match params.get_int("min_samples_split") {
        Some(v) if v >= 2 => v as usize,
        Some(v) => {
            return Err(EnsembleError::InvalidConfiguration(format!(
                "min_samples_split must be at least 2, got {}",
                v
            )))
        }
        None => 10,
    };
    let max_features = match params.get_text("max_features") {
        None | Some("all") => MaxFeatures::All,
        Some("sqrt") => MaxFeatures::Sqrt,
        Some(other) => {
            return Err(EnsembleError::InvalidConfiguration(format!(
                "Unknown max_features '{}'",
                other
            )))
        }
    };
    Ok(TreeParams {
        max_depth,
        min_samples_split,
        max_features,
    })
}

impl Predictor for DecisionTree {
    fn fit(&mut self, rows: &[Vec<f64>], targets: &[f64], params: &ParamSet) -> Result<()> {
        if rows.is_empty() || rows[0].is_empty() {
            return Err(EnsembleError::ModelError(
                "Empty training window".to_string(),
            ));
        }
        if rows.len() != targets.len() {
            return Err(EnsembleError::ModelError(format!(
                "Training rows ({}) don't match targets ({})",
                rows.len(),
                targets.len()
            )));
        }
        let tree_params = read_params(params)?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let indices: Vec<usize> = (0..rows.len()).collect();
        self.root = Some(build_node(
            rows,
            targets,
            &indices,
            tree_params.max_depth,
            &tree_params,
            &mut rng,
        ));
        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> Result<f64> {
        let mut node = self
            .root
            .as_ref()
            .ok_or_else(|| EnsembleError::ModelError("Decision tree used before fit".to_string()))?;
        loop {
            match node {
                Node::Leaf { value } => return Ok(*value),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let x = row.get(*feature).ok_or_else(|| {
                        EnsembleError::ModelError(format!(
                            "Row of width {} missing split feature {}",
                            row.len(),
                            feature
                        ))
                    })?;
                    node = if *x <= *threshold {
                        left.as_ref()
                    } else {
                        right.as_ref()
                    };
                }
            }
        }
    }

    fn boxed_clone(&self) -> Box<dyn Predictor> {
        Box::new(self.clone())
    }
}

fn mean_of(targets: &[f64], indices: &[usize]) -> f64 {
    indices.iter().map(|&i| targets[i]).sum::<f64>() / indices.len() as f64
}

fn sse_of(targets: &[f64], indices: &[usize]) -> f64 {
    let mean = mean_of(targets, indices);
    indices.iter().map(|&i| (targets[i] - mean).powi(2)).sum()
}

fn build_node(
    rows: &[Vec<f64>],
    targets: &[f64],
    indices: &[usize],
    depth_left: usize,
    params: &TreeParams,
    rng: &mut StdRng,
) -> Node {
    let leaf = Node::Leaf {
        value: mean_of(targets, indices),
    };
    if depth_left == 0 || indices.len() < params.min_samples_split {
        return leaf;
    }
    if sse_of(targets, indices) < 1e-12 {
        return leaf;
    }

    let width = rows[0].len();
    let features: Vec<usize> = match params.max_features {
        MaxFeatures::All => (0..width).collect(),
        MaxFeatures::Sqrt => {
            let k = ((width as f64).sqrt().ceil() as usize).clamp(1, width);
            let mut picked: Vec<usize> =
                rand::seq::index::sample(rng, width, k).into_iter().collect();
            picked.sort_unstable();
            picked
        }
    };

    let mut best: Option<(usize, f64, f64)> = None; // (feature, threshold, sse)
    for &feature in &features {
        if let Some((threshold, sse)) = best_split_on(rows, targets, indices, feature) {
            if best.as_ref().map_or(true, |&(_, _, s)| sse < s) {
                best = Some((feature, threshold, sse));
            }
        }
    }
    let Some((feature, threshold, _)) = best else {
        return leaf;
    };

    let (left, right): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .copied()
        .partition(|&i| rows[i][feature] <= threshold);
    if left.is_empty() || right.is_empty() {
        return leaf;
    }

    Node::Split {
        feature,
        threshold,
        left: Box::new(build_node(
            rows,
            targets,
            &left,
            depth_left - 1,
            params,
            rng,
        )),
        right: Box::new(build_node(
            rows,
            targets,
            &right,
            depth_left - 1,
            params,
            rng,
        )),
    }
}

/// Best threshold for one feature by total child SSE, scanned over sorted
/// values with prefix sums.
fn best_split_on(
    rows: &[Vec<f64>],
    targets: &[f64],
    indices: &[usize],
    feature: usize,
) -> Option<(f64, f64)> {
    let mut pairs: Vec<(f64, f64)> = indices
        .iter()
        .map(|&i| (rows[i][feature], targets[i]))
        .collect();
    pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let n = pairs.len();
    let total_sum: f64 = pairs.iter().map(|p| p.1).sum();
    let total_sq: f64 = pairs.iter().map(|p| p.1 * p.1).sum();

    let mut best: Option<(f64, f64)> = None;
    let mut left_sum = 0.0;
    let mut left_sq = 0.0;
    for s in 1..n {
        left_sum += pairs[s - 1].1;
        left_sq += pairs[s - 1].1 * pairs[s - 1].1;
        if pairs[s].0 <= pairs[s - 1].0 {
            continue; // no boundary between equal feature values
        }
        let left_n = s as f64;
        let right_n = (n - s) as f64;
        let right_sum = total_sum - left_sum;
        let right_sq = total_sq - left_sq;
        let sse =
            (left_sq - left_sum * left_sum / left_n) + (right_sq - right_sum * right_sum / right_n);
        if best.as_ref().map_or(true, |&(_, b)| sse < b) {
            let threshold = (pairs[s - 1].0 + pairs[s].0) / 2.0;
            best = Some((threshold, sse));
        }
    }
    best
}

/// CART tree with calibrated depth and feature subsampling.
pub fn decision_tree(run_config: &RunConfig) -> Result<ModelAdapter> {
    let grid = HyperGrid::new()
        .with_values(
            "max_features",
            vec![
                ParamValue::Text("sqrt".to_string()),
                ParamValue::Text("all".to_string()),
            ],
        )
        .with_values(
            "max_depth",
            vec![ParamValue::Int(3), ParamValue::Int(5), ParamValue::Int(10)],
        );
    Ok(ModelAdapter::new(
        "decision_tree",
        Box::new(DecisionTree::new(7)),
        grid,
        run_config,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn learns_a_step_function() {
        // y = 1 when x0 > 5, else -1
        let rows: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64]).collect();
        let targets: Vec<f64> = (0..20).map(|i| if i > 5 { 1.0 } else { -1.0 }).collect();

        let mut tree = DecisionTree::new(0);
        tree.fit(&rows, &targets, &ParamSet::default()).unwrap();

        assert!((tree.predict_row(&[2.0]).unwrap() + 1.0).abs() < 1e-12);
        assert!((tree.predict_row(&[15.0]).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn depth_one_gives_a_single_split() {
        let rows: Vec<Vec<f64>> = (0..30).map(|i| vec![i as f64]).collect();
        let targets: Vec<f64> = (0..30).map(|i| i as f64).collect();

        let mut params = ParamSet::default();
        params.insert("max_depth", ParamValue::Int(1));
        params.insert("min_samples_split", ParamValue::Int(2));
        let mut tree = DecisionTree::new(0);
        tree.fit(&rows, &targets, &params).unwrap();

        // one split means at most two distinct leaf values
        let mut values: Vec<i64> = (0..30)
            .map(|i| (tree.predict_row(&[i as f64]).unwrap() * 1000.0) as i64)
            .collect();
        values.sort_unstable();
        values.dedup();
        assert!(values.len() <= 2);
    }

    #[test]
    fn repeated_fits_are_identical() {
        let rows: Vec<Vec<f64>> = (0..40)
            .map(|i| vec![i as f64, (i * 3 % 7) as f64, (i % 4) as f64])
            .collect();
        let targets: Vec<f64> = (0..40).map(|i| ((i * 5) % 11) as f64).collect();
        let mut params = ParamSet::default();
        params.insert("max_features", ParamValue::Text("sqrt".to_string()));

        let mut first = DecisionTree::new(3);
        first.fit(&rows, &targets, &params).unwrap();
        let mut second = DecisionTree::new(3);
        second.fit(&rows, &targets, &params).unwrap();

        for row in &rows {
            assert_eq!(
                first.predict_row(row).unwrap(),
                second.predict_row(row).unwrap()
            );
        }
    }

    #[test]
    fn rejects_bad_hyperparameters() {
        let mut params = ParamSet::default();
        params.insert("max_features", ParamValue::Text("log2".to_string()));
        let mut tree = DecisionTree::new(0);
        assert!(tree
            .fit(&[vec![1.0]], &[1.0], &params)
            .is_err());
    }
}
