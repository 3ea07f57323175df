//! Latent node features → per-node output quantity.

use drape_core::{DrapeResult, Matrix, MultiGraph};

use crate::mlp::Network;

/// Maps each latent node vector to the model output (an acceleration-like
/// 3-vector for cloth). Edge sets are ignored.
#[derive(Debug)]
pub struct FeatureDecoder {
    net: Box<dyn Network>,
}

impl FeatureDecoder {
    /// Wraps `net`, which maps latent node vectors to the output.
    pub fn new(net: Box<dyn Network>) -> Self {
        Self { net }
    }

    /// Latent width the decoder reads.
    pub fn latent_width(&self) -> usize {
        self.net.input_width()
    }

    /// Width of each decoded row, 3 for an acceleration.
    pub fn output_width(&self) -> usize {
        self.net.output_width()
    }

    /// Decodes the node features of `graph`, one output row per node.
    pub fn forward(&self, graph: &MultiGraph) -> DrapeResult<Matrix> {
        self.net.forward(graph.node_features())
    }
}
