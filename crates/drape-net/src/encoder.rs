//! Raw features → latent features.

use tracing::debug;

use drape_core::{DrapeError, DrapeResult, MultiGraph};

use crate::mlp::Network;

/// Encodes node and edge features into the latent width.
///
/// One network handles every node, a second one every edge of every edge
/// set. Both must produce the same latent width.
#[derive(Debug)]
pub struct FeatureEncoder {
    node_net: Box<dyn Network>,
    edge_net: Box<dyn Network>,
}

impl FeatureEncoder {
    /// # Errors
    ///
    /// Returns [`DrapeError::InvalidConfiguration`] if the two networks
    /// disagree on the latent width.
    pub fn new(node_net: Box<dyn Network>, edge_net: Box<dyn Network>) -> DrapeResult<Self> {
        if node_net.output_width() != edge_net.output_width() {
            return Err(DrapeError::config(format!(
                "node encoder emits {} features, edge encoder {}",
                node_net.output_width(),
                edge_net.output_width()
            )));
        }
        Ok(Self { node_net, edge_net })
    }

    /// Width of the raw node features the node network takes.
    pub fn node_input_width(&self) -> usize {
        self.node_net.input_width()
    }

    /// Width of the raw edge features the edge network takes.
    pub fn edge_input_width(&self) -> usize {
        self.edge_net.input_width()
    }

    /// Width of the latent node and edge vectors produced.
    pub fn latent_width(&self) -> usize {
        self.node_net.output_width()
    }

    /// Encodes every node and edge of `graph` into a new latent graph.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::ShapeMismatch`] if a feature matrix has the
    /// wrong width for its network.
    pub fn forward(&self, graph: &MultiGraph) -> DrapeResult<MultiGraph> {
        let nodes = self.node_net.forward(graph.node_features())?;
        let edge_sets = graph
            .edge_sets()
            .iter()
            .map(|set| set.with_features(self.edge_net.forward(set.features())?))
            .collect::<DrapeResult<Vec<_>>>()?;
        debug!(
            nodes = nodes.rows(),
            edge_sets = edge_sets.len(),
            latent = self.latent_width(),
            "encoded graph"
        );
        MultiGraph::new(nodes, edge_sets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Projection;
    use drape_core::{EdgeSet, Matrix};

    fn raw_graph() -> MultiGraph {
        let nodes = Matrix::from_rows(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]).unwrap();
        let edges = Matrix::from_rows(&[[7.0, 8.0, 9.0, 10.0], [11.0, 12.0, 13.0, 14.0]]).unwrap();
        let set = EdgeSet::new("mesh_edges", edges, vec![0, 1], vec![1, 0]).unwrap();
        MultiGraph::new(nodes, vec![set]).unwrap()
    }

    #[test]
    fn encodes_nodes_and_edges_to_latent() {
        let enc = FeatureEncoder::new(
            Box::new(Projection::leading(3, 2)),
            Box::new(Projection::leading(4, 2)),
        )
        .unwrap();
        let latent = enc.forward(&raw_graph()).unwrap();
        assert_eq!(latent.node_features().data(), &[1.0, 2.0, 4.0, 5.0]);
        let e = &latent.edge_sets()[0];
        assert_eq!(e.features().data(), &[7.0, 8.0, 11.0, 12.0]);
        assert_eq!(e.senders(), &[0, 1]);
    }

    #[test]
    fn mismatched_latent_widths_rejected() {
        let err = FeatureEncoder::new(
            Box::new(Projection::leading(3, 2)),
            Box::new(Projection::leading(4, 3)),
        )
        .unwrap_err();
        assert!(matches!(err, DrapeError::InvalidConfiguration { .. }));
    }

    #[test]
    fn wrong_raw_width_is_shape_mismatch() {
        let enc = FeatureEncoder::new(
            Box::new(Projection::leading(5, 2)),
            Box::new(Projection::leading(4, 2)),
        )
        .unwrap();
        assert!(matches!(
            enc.forward(&raw_graph()),
            Err(DrapeError::ShapeMismatch { .. })
        ));
    }
}
