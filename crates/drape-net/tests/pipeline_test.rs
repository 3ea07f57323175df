//! End-to-end tests of the cloth pipeline.
//!
//! The fixture model is assembled from parameter-free projection networks
//! so every intermediate value can be computed by hand.

use drape_core::{DrapeResult, Matrix, NodeType, TrajectoryFrame, MESH_EDGES};
use drape_net::block::{InteractionBlock, Processor};
use drape_net::decoder::FeatureDecoder;
use drape_net::encoder::FeatureEncoder;
use drape_net::graph_builder::build_graph;
use drape_net::mlp::{check_input, Network};
use drape_net::pooling::SaliencePooling;
use drape_net::segment::SegmentReducer;
use drape_net::{
    Aggregator, ClothModel, EncodeProcessDecode, ExecutionContext, Mode, ModelConfig, ModelOutput,
};

const L: usize = 3;

/// Copies columns `start..end` of its input.
#[derive(Debug)]
struct Projection {
    input_width: usize,
    start: usize,
    end: usize,
}

impl Projection {
    fn leading(input_width: usize, width: usize) -> Box<dyn Network> {
        Box::new(Self {
            input_width,
            start: 0,
            end: width,
        })
    }

    fn trailing(input_width: usize, width: usize) -> Box<dyn Network> {
        Box::new(Self {
            input_width,
            start: input_width - width,
            end: input_width,
        })
    }
}

impl Network for Projection {
    fn input_width(&self) -> usize {
        self.input_width
    }

    fn output_width(&self) -> usize {
        self.end - self.start
    }

    fn forward(&self, input: &Matrix) -> DrapeResult<Matrix> {
        check_input(self, input, "projection")?;
        input.columns(self.start, self.end)
    }
}

fn fixture_config() -> ModelConfig {
    ModelConfig {
        aggregator: Aggregator::Sum,
        message_passing_steps: 1,
        latent_width: L,
        num_layers: 1,
        output_width: 3,
        mesh_pos_width: 2,
        normalize_gate: false,
        salience_percent: 1,
    }
}

/// Encoders keep velocity and relative world position, the block's
/// sub-networks pass their own latent through, pooling and decoder are
/// identities.
fn fixture_model() -> EncodeProcessDecode {
    let config = fixture_config();
    let encoder = FeatureEncoder::new(
        Projection::leading(config.node_input_width(), L),
        Projection::leading(config.edge_input_width(), L),
    )
    .unwrap();
    let block = InteractionBlock::new(
        Projection::trailing(3 * L, L),
        Projection::leading(2 * L, L),
        SegmentReducer::new(Aggregator::Sum),
        1,
    )
    .unwrap();
    let processor = Processor::new(vec![block]).unwrap();
    let pooling =
        SaliencePooling::new(Projection::leading(3, L), Projection::leading(L, L), 1).unwrap();
    let decoder = FeatureDecoder::new(Projection::leading(L, 3));
    EncodeProcessDecode::from_parts(config, encoder, processor, pooling, decoder).unwrap()
}

/// Single triangle; only node 0 moves, along +x.
fn fixture_frame() -> TrajectoryFrame {
    TrajectoryFrame {
        world_pos: vec![[1.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        prev_world_pos: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        mesh_pos: Matrix::from_rows(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]).unwrap(),
        node_type: vec![NodeType::Normal; 3],
        cells: vec![[0, 1, 2]],
    }
}

fn assert_close(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len());
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!((a - e).abs() < 1e-5, "index {i}: got {a}, expected {e}");
    }
}

#[test]
fn fixture_latents_double_through_one_step() {
    let model = fixture_model();
    let raw = build_graph(&fixture_frame()).unwrap();
    let latent = model.encoder().forward(&raw).unwrap();
    let mut ctx = ExecutionContext::default();
    let processed = model.processor().forward(latent.clone(), &mut ctx).unwrap();

    assert_eq!(processed.node_features(), &latent.node_features().scale(2.0));
    assert_eq!(processed.node_features().row(0), &[2.0, 0.0, 0.0]);
    let edges = processed.edge_set(MESH_EDGES).unwrap();
    assert_eq!(edges.len(), 6);
    assert_eq!(edges.features(), &latent.edge_sets()[0].features().scale(2.0));
}

#[test]
fn fixture_decoder_output_is_hand_computable() {
    let model = fixture_model();
    let raw = build_graph(&fixture_frame()).unwrap();
    let mut ctx = ExecutionContext::default();
    let out = model.forward(&raw, &mut ctx).unwrap();

    // Node 0 seeds the gate with (1, 0, 0), so its softmax weights are
    // [e, 1, 1] / (e + 2); nodes 1 and 2 weigh channels uniformly. Only
    // latent row 0 = (2, 0, 0) is non-zero, giving G[i][0] = 2·S[i][0] and
    // remixed row i = 4·S[i][0] along x.
    let e = 1.0f32.exp();
    let seed_mix = 4.0 * e / (e + 2.0);
    assert_close(out.row(0), &[seed_mix, 0.0, 0.0]);
    assert_close(out.row(1), &[4.0 / 3.0, 0.0, 0.0]);
    assert_close(out.row(2), &[4.0 / 3.0, 0.0, 0.0]);
    assert!(ctx.issues().is_empty());
}

#[test]
fn fixture_inference_integrates_positions() {
    let cloth = ClothModel::new(fixture_model());
    let mut ctx = ExecutionContext::default();
    let ModelOutput::NextPosition(next) = cloth
        .forward(&fixture_frame(), Mode::Inference, &mut ctx)
        .unwrap()
    else {
        panic!("inference must return positions");
    };
    let e = 1.0f32.exp();
    let seed_mix = 4.0 * e / (e + 2.0);
    assert_close(&next[0], &[2.0 + seed_mix, 0.0, 0.0]);
    assert_close(&next[1], &[1.0 + 4.0 / 3.0, 0.0, 0.0]);
    assert_close(&next[2], &[4.0 / 3.0, 1.0, 0.0]);
}

#[test]
fn fixture_training_mode_skips_integration() {
    let cloth = ClothModel::new(fixture_model());
    let mut ctx = ExecutionContext::default();
    let out = cloth
        .forward(&fixture_frame(), Mode::Training, &mut ctx)
        .unwrap();
    let ModelOutput::Raw(raw) = out else {
        panic!("training must return the decoder output");
    };
    assert_close(raw.row(1), &[4.0 / 3.0, 0.0, 0.0]);
}

#[test]
fn from_parts_rejects_wrong_latent_width() {
    let config = ModelConfig {
        latent_width: 4,
        ..fixture_config()
    };
    let encoder = FeatureEncoder::new(
        Projection::leading(12, L),
        Projection::leading(7, L),
    )
    .unwrap();
    let block = InteractionBlock::new(
        Projection::trailing(3 * L, L),
        Projection::leading(2 * L, L),
        SegmentReducer::new(Aggregator::Sum),
        1,
    )
    .unwrap();
    let pooling =
        SaliencePooling::new(Projection::leading(3, L), Projection::leading(L, L), 1).unwrap();
    let result = EncodeProcessDecode::from_parts(
        config,
        encoder,
        Processor::new(vec![block]).unwrap(),
        pooling,
        FeatureDecoder::new(Projection::leading(L, 3)),
    );
    assert!(matches!(
        result,
        Err(drape_core::DrapeError::InvalidConfiguration { .. })
    ));
}

#[test]
fn random_model_runs_on_larger_mesh() {
    // 4×4 grid of nodes, two triangles per square
    let side = 4;
    let n = side * side;
    let mut world = Vec::with_capacity(n);
    let mut mesh = Vec::with_capacity(n);
    for y in 0..side {
        for x in 0..side {
            world.push([x as f32, y as f32, 0.0]);
            mesh.push([x as f32, y as f32]);
        }
    }
    let mut cells = Vec::new();
    for y in 0..side - 1 {
        for x in 0..side - 1 {
            let i = y * side + x;
            cells.push([i, i + 1, i + side]);
            cells.push([i + 1, i + side + 1, i + side]);
        }
    }
    let mut prev = world.clone();
    prev[5][2] = -0.2;
    let mut node_type = vec![NodeType::Normal; n];
    node_type[0] = NodeType::Handle;
    let frame = TrajectoryFrame {
        world_pos: world,
        prev_world_pos: prev,
        mesh_pos: Matrix::from_rows(&mesh).unwrap(),
        node_type,
        cells,
    };

    let config = ModelConfig {
        latent_width: 16,
        message_passing_steps: 3,
        aggregator: Aggregator::Mean,
        ..ModelConfig::default()
    };
    let cloth = ClothModel::new(EncodeProcessDecode::new_random(config, 99).unwrap());
    let graph = cloth.build_graph(&frame).unwrap();
    assert_eq!(graph.edge_sets()[0].len(), 2 * 3 * 18);

    let mut ctx = ExecutionContext::default();
    let next = cloth.predict_next(&frame, &mut ctx).unwrap();
    assert_eq!(next.len(), n);
    assert!(next.iter().flatten().all(|x| x.is_finite()));
    assert!(ctx.issues().is_empty());
}
