//! Message passing: [`InteractionBlock`] and the [`Processor`] that
//! chains them.
//!
//! One block updates every edge from its two endpoint nodes, then every
//! node from the reduced edges that point at it:
//!
//! ```text
//! e' = e + edge_net(x[sender] ‖ x[receiver] ‖ e)
//! x' = x + node_net(x ‖ reduce_0(e'_0, receivers_0) ‖ ... ‖ reduce_k(e'_k, receivers_k))
//! ```
//!
//! Blocks never share weights. Step `k + 1` consumes exactly the graph
//! step `k` returned.

use tracing::trace;

use drape_core::{DrapeError, DrapeResult, Matrix, MultiGraph};

use crate::context::ExecutionContext;
use crate::mlp::Network;
use crate::segment::SegmentReducer;

/// A single message-passing step with residual connections.
#[derive(Debug)]
pub struct InteractionBlock {
    edge_net: Box<dyn Network>,
    node_net: Box<dyn Network>,
    reducer: SegmentReducer,
    latent_width: usize,
}

impl InteractionBlock {
    /// Creates a block for graphs with `edge_set_count` edge sets.
    ///
    /// The edge network must map `3·L → L` and the node network
    /// `(1 + edge_set_count)·L → L`, where `L` is the edge network's
    /// output width.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::InvalidConfiguration`] if the widths do not
    /// line up.
    pub fn new(
        edge_net: Box<dyn Network>,
        node_net: Box<dyn Network>,
        reducer: SegmentReducer,
        edge_set_count: usize,
    ) -> DrapeResult<Self> {
        let l = edge_net.output_width();
        let expected = [
            ("edge network input", edge_net.input_width(), 3 * l),
            ("node network input", node_net.input_width(), (1 + edge_set_count) * l),
            ("node network output", node_net.output_width(), l),
        ];
        for (what, got, want) in expected {
            if got != want {
                return Err(DrapeError::config(format!(
                    "interaction block with latent width {l}: {what} is {got}, expected {want}"
                )));
            }
        }
        Ok(Self {
            edge_net,
            node_net,
            reducer,
            latent_width: l,
        })
    }

    /// Latent width of node and edge vectors in and out of the block.
    pub fn latent_width(&self) -> usize {
        self.latent_width
    }

    /// Reducer used to gather edge messages at their receivers.
    pub fn reducer(&self) -> SegmentReducer {
        self.reducer
    }

    /// Runs one step of message passing.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::ShapeMismatch`] if the graph's latent widths
    /// or edge set count differ from what the block was built for.
    pub fn forward(&self, graph: MultiGraph) -> DrapeResult<MultiGraph> {
        let nodes = graph.node_features();
        let n = graph.num_nodes();

        let mut new_sets = Vec::with_capacity(graph.edge_sets().len());
        let mut node_inputs: Vec<Matrix> = Vec::with_capacity(graph.edge_sets().len());
        for set in graph.edge_sets() {
            let senders = nodes.select_rows(set.senders())?;
            let receivers = nodes.select_rows(set.receivers())?;
            let edge_in = Matrix::hstack(&[&senders, &receivers, set.features()])?;
            let updated = self.edge_net.forward(&edge_in)?;
            node_inputs.push(self.reducer.reduce(&updated, set.receivers(), n)?);
            new_sets.push(set.with_features(updated.add(set.features())?)?);
        }

        let mut parts: Vec<&Matrix> = Vec::with_capacity(1 + node_inputs.len());
        parts.push(nodes);
        parts.extend(node_inputs.iter());
        let node_in = Matrix::hstack(&parts)?;
        let new_nodes = self.node_net.forward(&node_in)?.add(nodes)?;

        graph.with_edge_sets(new_sets)?.with_node_features(new_nodes)
    }
}

/// A stack of [`InteractionBlock`]s applied strictly in order.
#[derive(Debug)]
pub struct Processor {
    blocks: Vec<InteractionBlock>,
}

impl Processor {
    /// # Errors
    ///
    /// Returns [`DrapeError::InvalidConfiguration`] for an empty stack or
    /// blocks with different latent widths.
    pub fn new(blocks: Vec<InteractionBlock>) -> DrapeResult<Self> {
        let first = blocks
            .first()
            .ok_or_else(|| DrapeError::config("processor needs at least one block"))?;
        let l = first.latent_width();
        if let Some((i, b)) = blocks
            .iter()
            .enumerate()
            .find(|(_, b)| b.latent_width() != l)
        {
            return Err(DrapeError::config(format!(
                "block {i} has latent width {}, block 0 has {l}",
                b.latent_width()
            )));
        }
        Ok(Self { blocks })
    }

    /// Number of message-passing steps.
    pub fn steps(&self) -> usize {
        self.blocks.len()
    }

    /// Latent width shared by every block.
    pub fn latent_width(&self) -> usize {
        self.blocks[0].latent_width()
    }

    /// The blocks in application order.
    pub fn blocks(&self) -> &[InteractionBlock] {
        &self.blocks
    }

    /// Runs every block in order, checking each output against the
    /// context's numeric policy.
    pub fn forward(&self, graph: MultiGraph, ctx: &mut ExecutionContext) -> DrapeResult<MultiGraph> {
        let mut graph = graph;
        for (step, block) in self.blocks.iter().enumerate() {
            graph = block.forward(graph)?;
            trace!(step, nodes = graph.num_nodes(), "message passing step done");
            ctx.inspect("processor", graph.node_features())?;
        }
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Aggregator;
    use crate::test_support::Projection;
    use drape_core::EdgeSet;

    const L: usize = 2;

    /// Edge net passes its own latent through, node net passes the node
    /// latent through; with residuals both double.
    fn passthrough_block(agg: Aggregator) -> InteractionBlock {
        InteractionBlock::new(
            Box::new(Projection::trailing(3 * L, L)),
            Box::new(Projection::leading(2 * L, L)),
            SegmentReducer::new(agg),
            1,
        )
        .unwrap()
    }

    fn latent_graph() -> MultiGraph {
        let nodes = Matrix::from_rows(&[[1.0, -1.0], [0.5, 2.0], [3.0, 0.0]]).unwrap();
        let edges = Matrix::from_rows(&[[1.0, 1.0], [2.0, -2.0], [0.0, 4.0]]).unwrap();
        let set = EdgeSet::new("mesh_edges", edges, vec![0, 1, 2], vec![1, 2, 0]).unwrap();
        MultiGraph::new(nodes, vec![set]).unwrap()
    }

    #[test]
    fn identity_networks_double_latents() {
        let g = latent_graph();
        let out = passthrough_block(Aggregator::Sum).forward(g.clone()).unwrap();
        assert_eq!(out.node_features(), &g.node_features().scale(2.0));
        assert_eq!(
            out.edge_sets()[0].features(),
            &g.edge_sets()[0].features().scale(2.0)
        );
        assert_eq!(out.edge_sets()[0].senders(), g.edge_sets()[0].senders());
    }

    #[test]
    fn node_update_sees_reduced_edges() {
        // Node net keeps only the reduced-edge half of its input.
        let block = InteractionBlock::new(
            Box::new(Projection::trailing(3 * L, L)),
            Box::new(Projection::trailing(2 * L, L)),
            SegmentReducer::new(Aggregator::Sum),
            1,
        )
        .unwrap();
        let g = latent_graph();
        let out = block.forward(g.clone()).unwrap();
        // node 1 receives edge 0 = [1, 1]; x' = x + [1, 1]
        assert_eq!(out.node_features().row(1), &[1.5, 3.0]);
        // node 0 receives edge 2 = [0, 4]
        assert_eq!(out.node_features().row(0), &[1.0, 3.0]);
    }

    #[test]
    fn edge_update_sees_sender_latent() {
        let block = InteractionBlock::new(
            Box::new(Projection::leading(3 * L, L)),
            Box::new(Projection::leading(2 * L, L)),
            SegmentReducer::new(Aggregator::Sum),
            1,
        )
        .unwrap();
        let g = latent_graph();
        let out = block.forward(g).unwrap();
        // edge 1 goes 1→2: e' = [2, -2] + x[1]
        assert_eq!(out.edge_sets()[0].features().row(1), &[2.5, 0.0]);
    }

    #[test]
    fn width_mismatch_rejected_at_construction() {
        let err = InteractionBlock::new(
            Box::new(Projection::trailing(3 * L, L)),
            Box::new(Projection::leading(3 * L, L)),
            SegmentReducer::default(),
            1,
        )
        .unwrap_err();
        assert!(matches!(err, DrapeError::InvalidConfiguration { .. }));
    }

    #[test]
    fn wrong_latent_width_at_call_time() {
        let block = passthrough_block(Aggregator::Sum);
        let nodes = Matrix::zeros(2, 3);
        let set = EdgeSet::new("mesh_edges", Matrix::zeros(1, 3), vec![0], vec![1]).unwrap();
        let g = MultiGraph::new(nodes, vec![set]).unwrap();
        assert!(matches!(block.forward(g), Err(DrapeError::ShapeMismatch { .. })));
    }

    #[test]
    fn processor_applies_blocks_in_sequence() {
        let blocks = (0..3).map(|_| passthrough_block(Aggregator::Mean)).collect();
        let processor = Processor::new(blocks).unwrap();
        assert_eq!(processor.steps(), 3);
        let g = latent_graph();
        let mut ctx = ExecutionContext::default();
        let out = processor.forward(g.clone(), &mut ctx).unwrap();
        assert_eq!(out.node_features(), &g.node_features().scale(8.0));
    }

    #[test]
    fn empty_processor_rejected() {
        assert!(Processor::new(Vec::new()).is_err());
    }

    #[test]
    fn graph_without_edges_still_updates_nodes() {
        let block = passthrough_block(Aggregator::Max);
        let set = EdgeSet::new("mesh_edges", Matrix::zeros(0, L), vec![], vec![]).unwrap();
        let g = MultiGraph::new(Matrix::from_rows(&[[1.0, 2.0]]).unwrap(), vec![set]).unwrap();
        let out = block.forward(g).unwrap();
        assert_eq!(out.node_features().row(0), &[2.0, 4.0]);
    }
}
