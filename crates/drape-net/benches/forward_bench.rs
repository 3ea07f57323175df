use criterion::{black_box, criterion_group, criterion_main, Criterion};

use drape_core::{Matrix, NodeType, TrajectoryFrame};
use drape_net::graph_builder::build_graph;
use drape_net::segment::segment_reduce;
use drape_net::{Aggregator, ClothModel, EncodeProcessDecode, ExecutionContext, ModelConfig};

/// Flat `side × side` sheet with a slight initial sag in the middle.
fn grid_frame(side: usize) -> TrajectoryFrame {
    let mut world = Vec::with_capacity(side * side);
    let mut mesh = Vec::with_capacity(side * side);
    for y in 0..side {
        for x in 0..side {
            world.push([x as f32 / side as f32, y as f32 / side as f32, 0.0]);
            mesh.push([x as f32 / side as f32, y as f32 / side as f32]);
        }
    }
    let mut prev = world.clone();
    prev[side * side / 2][2] = 0.01;
    let mut cells = Vec::with_capacity(2 * (side - 1) * (side - 1));
    for y in 0..side - 1 {
        for x in 0..side - 1 {
            let i = y * side + x;
            cells.push([i, i + 1, i + side]);
            cells.push([i + 1, i + side + 1, i + side]);
        }
    }
    let mut node_type = vec![NodeType::Normal; side * side];
    node_type[0] = NodeType::Handle;
    node_type[side - 1] = NodeType::Handle;
    TrajectoryFrame {
        world_pos: world,
        prev_world_pos: prev,
        mesh_pos: Matrix::from_rows(&mesh).expect("grid mesh"),
        node_type,
        cells,
    }
}

fn bench_segment_reduce(c: &mut Criterion) {
    let rows = 6_000;
    let data = Matrix::from_vec(
        rows,
        128,
        (0..rows * 128).map(|i| (i % 101) as f32 * 0.01).collect(),
    )
    .expect("data");
    let ids: Vec<usize> = (0..rows).map(|i| (i * 7) % 1_000).collect();

    c.bench_function("segment_reduce_sum_6000x128", |b| {
        b.iter(|| segment_reduce(black_box(&data), black_box(&ids), 1_000, Aggregator::Sum))
    });
    c.bench_function("segment_reduce_max_6000x128", |b| {
        b.iter(|| segment_reduce(black_box(&data), black_box(&ids), 1_000, Aggregator::Max))
    });
}

fn bench_build_graph(c: &mut Criterion) {
    let frame = grid_frame(32);
    c.bench_function("build_graph_32x32", |b| {
        b.iter(|| build_graph(black_box(&frame)))
    });
}

fn bench_forward(c: &mut Criterion) {
    let config = ModelConfig {
        latent_width: 32,
        message_passing_steps: 4,
        ..ModelConfig::default()
    };
    let model = ClothModel::new(EncodeProcessDecode::new_random(config, 42).expect("model"));
    let frame = grid_frame(16);

    c.bench_function("predict_next_16x16_latent32_steps4", |b| {
        b.iter(|| {
            let mut ctx = ExecutionContext::default();
            model.predict_next(black_box(&frame), &mut ctx)
        })
    });
}

criterion_group!(benches, bench_segment_reduce, bench_build_graph, bench_forward);
criterion_main!(benches);
