//! Salience pooling: a sparse global-context step before decoding.
//!
//! The fastest-moving nodes of the raw graph seed a gate. Each node's
//! expanded gate row is turned into softmax weights over the latent
//! channels, and those weights decide how strongly every latent node
//! vector contributes to its new features.
//!
//! For `N` nodes with latent matrix `X` (`N × L`):
//!
//! 1. `s_i = ‖v_i‖²` from the raw velocity block.
//! 2. The top `k = ⌈percent · N / 100⌉` nodes by `s` are kept, ties going
//!    to the lower index.
//! 3. `H` (`N × 3`) holds `v_i` for kept nodes and zero elsewhere;
//!    `S = softmax_rows(expand(H))` is `N × L`.
//! 4. `G = S · Xᵀ` is `N × N`; the remixed features are `G · X`.
//! 5. `X' = reduce(G · X)`.
//!
//! The gate is dense, so memory grows with `N²`.

use tracing::debug;

use drape_core::{DrapeError, DrapeResult, Matrix, MultiGraph, POSITION_DIM};

use crate::mlp::Network;

/// Squared velocity magnitude per node, read from the first three raw
/// feature columns.
///
/// # Errors
///
/// Returns [`DrapeError::ShapeMismatch`] if the features are narrower than
/// a velocity.
pub fn salience_scores(raw_nodes: &Matrix) -> DrapeResult<Vec<f32>> {
    if raw_nodes.cols() < POSITION_DIM {
        return Err(DrapeError::shape(format!(
            "salience needs {POSITION_DIM} velocity columns, raw nodes have {}",
            raw_nodes.cols()
        )));
    }
    Ok(raw_nodes
        .iter_rows()
        .map(|row| row[..POSITION_DIM].iter().map(|v| v * v).sum())
        .collect())
}

/// Number of nodes that seed the gate: `⌈percent · n / 100⌉`.
///
/// # Example
///
/// ```
/// use drape_net::pooling::salient_count;
///
/// assert_eq!(salient_count(3, 1), 1);
/// assert_eq!(salient_count(100, 1), 1);
/// assert_eq!(salient_count(101, 1), 2);
/// assert_eq!(salient_count(0, 1), 0);
/// ```
pub fn salient_count(n: usize, percent: u32) -> usize {
    (n * percent as usize).div_ceil(100)
}

/// Indices of the `k` highest scores, highest first.
///
/// The sort is stable, so equal scores keep ascending index order.
///
/// # Example
///
/// ```
/// use drape_net::pooling::select_salient;
///
/// assert_eq!(select_salient(&[1.0, 5.0, 5.0, 2.0], 2), vec![1, 2]);
/// ```
pub fn select_salient(scores: &[f32], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    order.truncate(k);
    order
}

/// Softmax over each row independently.
///
/// The row maximum is subtracted first so large logits stay finite.
pub fn row_softmax(m: &mut Matrix) {
    for r in 0..m.rows() {
        let row = m.row_mut(r);
        let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let mut sum = 0.0;
        for x in row.iter_mut() {
            *x = (*x - max).exp();
            sum += *x;
        }
        if sum > 0.0 {
            row.iter_mut().for_each(|x| *x /= sum);
        }
    }
}

/// Re-mixes latent node features through a salience-seeded gate.
#[derive(Debug)]
pub struct SaliencePooling {
    expand_net: Box<dyn Network>,
    reduce_net: Box<dyn Network>,
    percent: u32,
}

impl SaliencePooling {
    /// `expand_net` maps a velocity (3) to `L`; `reduce_net` maps `L → L`.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::InvalidConfiguration`] if the widths do not
    /// match or `percent` is outside `1..=100`.
    pub fn new(
        expand_net: Box<dyn Network>,
        reduce_net: Box<dyn Network>,
        percent: u32,
    ) -> DrapeResult<Self> {
        if expand_net.input_width() != POSITION_DIM {
            return Err(DrapeError::config(format!(
                "gate expansion must take {POSITION_DIM} inputs, takes {}",
                expand_net.input_width()
            )));
        }
        let l = expand_net.output_width();
        if reduce_net.input_width() != l || reduce_net.output_width() != l {
            return Err(DrapeError::config(format!(
                "gate reduction must map {l}→{l}, maps {}→{}",
                reduce_net.input_width(),
                reduce_net.output_width()
            )));
        }
        if !(1..=100).contains(&percent) {
            return Err(DrapeError::config(format!(
                "salience percent must be in 1..=100, got {percent}"
            )));
        }
        Ok(Self {
            expand_net,
            reduce_net,
            percent,
        })
    }

    /// Latent width `L` the gate expands velocities to.
    pub fn latent_width(&self) -> usize {
        self.expand_net.output_width()
    }

    /// Percentage of nodes, rounded up, that seed the gate.
    pub fn percent(&self) -> u32 {
        self.percent
    }

    /// Builds the sparse gate input `H`.
    fn gate_input(&self, raw_nodes: &Matrix) -> DrapeResult<Matrix> {
        let scores = salience_scores(raw_nodes)?;
        let k = salient_count(scores.len(), self.percent);
        let mut gate = Matrix::zeros(raw_nodes.rows(), POSITION_DIM);
        for i in select_salient(&scores, k) {
            gate.row_mut(i)
                .copy_from_slice(&raw_nodes.row(i)[..POSITION_DIM]);
        }
        Ok(gate)
    }

    /// Replaces the latent node features; edge sets pass through.
    ///
    /// `raw` must be the un-normalized graph the latent one was encoded
    /// from.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::ShapeMismatch`] if the graphs disagree on the
    /// node count or the latent width is wrong.
    pub fn forward(&self, latent: MultiGraph, raw: &MultiGraph) -> DrapeResult<MultiGraph> {
        if raw.num_nodes() != latent.num_nodes() {
            return Err(DrapeError::shape(format!(
                "salience pooling: raw graph has {} nodes, latent graph {}",
                raw.num_nodes(),
                latent.num_nodes()
            )));
        }
        let x = latent.node_features();
        if x.cols() != self.latent_width() {
            return Err(DrapeError::shape(format!(
                "salience pooling expects latent width {}, got {}",
                self.latent_width(),
                x.cols()
            )));
        }

        let mut weights = self.expand_net.forward(&self.gate_input(raw.node_features())?)?;
        row_softmax(&mut weights);
        let gate = weights.matmul(&x.transpose())?;
        let remixed = gate.matmul(x)?;
        let pooled = self.reduce_net.forward(&remixed)?;
        debug!(
            nodes = x.rows(),
            seeds = salient_count(x.rows(), self.percent),
            "salience pooling done"
        );
        latent.with_node_features(pooled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Projection;

    #[test]
    fn scores_use_velocity_block_only() {
        let raw = Matrix::from_rows(&[[1.0, 2.0, 0.0, 9.0], [0.0, 0.0, -3.0, 9.0]]).unwrap();
        assert_eq!(salience_scores(&raw).unwrap(), vec![5.0, 9.0]);
        assert!(salience_scores(&Matrix::zeros(2, 2)).is_err());
    }

    #[test]
    fn ties_go_to_lower_index() {
        assert_eq!(select_salient(&[2.0, 2.0, 2.0], 1), vec![0]);
        assert_eq!(select_salient(&[0.0, 3.0, 1.0, 3.0], 3), vec![1, 3, 2]);
        assert_eq!(select_salient(&[1.0], 5), vec![0]);
    }

    #[test]
    fn count_rounds_up() {
        assert_eq!(salient_count(1, 1), 1);
        assert_eq!(salient_count(250, 1), 3);
        assert_eq!(salient_count(10, 100), 10);
        assert_eq!(salient_count(10, 15), 2);
    }

    #[test]
    fn softmax_rows_sum_to_one() {
        let mut m = Matrix::from_rows(&[[0.0, 0.0], [1000.0, 0.0], [1.0, 2.0]]).unwrap();
        row_softmax(&mut m);
        for row in m.iter_rows() {
            assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        }
        assert_eq!(m.row(0), &[0.5, 0.5]);
        assert!((m.get(1, 0) - 1.0).abs() < 1e-6);
        assert!(m.is_finite());
    }

    fn identity_pooling() -> SaliencePooling {
        SaliencePooling::new(
            Box::new(Projection::identity(3)),
            Box::new(Projection::identity(3)),
            1,
        )
        .unwrap()
    }

    #[test]
    fn uniform_gate_weighs_nodes_by_channel_sum() {
        // All velocities zero: every softmax row is 1/3, so node j enters
        // each gate row with weight sum(X_j) / 3.
        let raw = MultiGraph::new(Matrix::zeros(2, 12), vec![]).unwrap();
        let latent =
            MultiGraph::new(Matrix::from_rows(&[[1.0, 0.0, 2.0], [3.0, 4.0, 0.0]]).unwrap(), vec![])
                .unwrap();
        let out = identity_pooling().forward(latent, &raw).unwrap();
        // 1·[1, 0, 2] + 7/3·[3, 4, 0]
        for row in out.node_features().iter_rows() {
            assert!((row[0] - 8.0).abs() < 1e-5);
            assert!((row[1] - 28.0 / 3.0).abs() < 1e-5);
            assert!((row[2] - 2.0).abs() < 1e-5);
        }
    }

    #[test]
    fn seed_sharpens_its_own_softmax_row() {
        // Node 0 moves along x, so its softmax row is [e, 1, 1] / (e + 2);
        // the other rows stay uniform.
        let mut raw_nodes = Matrix::zeros(3, 12);
        raw_nodes.row_mut(0)[0] = 1.0;
        let raw = MultiGraph::new(raw_nodes, vec![]).unwrap();
        let x = Matrix::from_rows(&[[2.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]]).unwrap();
        let latent = MultiGraph::new(x, vec![]).unwrap();
        let out = identity_pooling().forward(latent, &raw).unwrap();

        let e = 1.0f32.exp();
        let expected = 4.0 * e / (e + 2.0);
        assert!((out.node_features().get(0, 0) - expected).abs() < 1e-5);
        for r in 1..3 {
            assert!((out.node_features().get(r, 0) - 4.0 / 3.0).abs() < 1e-5);
            assert_eq!(out.node_features().get(r, 1), 0.0);
        }
    }

    #[test]
    fn node_count_mismatch_rejected() {
        let raw = MultiGraph::new(Matrix::zeros(3, 12), vec![]).unwrap();
        let latent = MultiGraph::new(Matrix::zeros(2, 3), vec![]).unwrap();
        assert!(matches!(
            identity_pooling().forward(latent, &raw),
            Err(DrapeError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn bad_widths_rejected() {
        assert!(SaliencePooling::new(
            Box::new(Projection::identity(4)),
            Box::new(Projection::identity(4)),
            1
        )
        .is_err());
        assert!(SaliencePooling::new(
            Box::new(Projection::identity(3)),
            Box::new(Projection::leading(3, 2)),
            1
        )
        .is_err());
        assert!(SaliencePooling::new(
            Box::new(Projection::identity(3)),
            Box::new(Projection::identity(3)),
            0
        )
        .is_err());
    }

    #[test]
    fn empty_graph_passes_through() {
        let raw = MultiGraph::new(Matrix::zeros(0, 12), vec![]).unwrap();
        let latent = MultiGraph::new(Matrix::zeros(0, 3), vec![]).unwrap();
        let out = identity_pooling().forward(latent, &raw).unwrap();
        assert_eq!(out.node_features().shape(), (0, 3));
    }
}
