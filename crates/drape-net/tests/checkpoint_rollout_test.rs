//! Checkpoint files and multi-step rollouts through the public API.

use drape_core::{DrapeError, Matrix, NodeType, TrajectoryFrame};
use drape_net::checkpoint::{load_from_path, save_to_path};
use drape_net::params::ModelParams;
use drape_net::rollout::rollout;
use drape_net::{Aggregator, ClothModel, EncodeProcessDecode, ExecutionContext, ModelConfig};

fn small_config() -> ModelConfig {
    ModelConfig {
        latent_width: 8,
        message_passing_steps: 2,
        num_layers: 2,
        aggregator: Aggregator::Max,
        ..ModelConfig::default()
    }
}

fn square_frame() -> TrajectoryFrame {
    TrajectoryFrame {
        world_pos: vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, -0.05],
        ],
        prev_world_pos: vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
        ],
        mesh_pos: Matrix::from_rows(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]).unwrap(),
        node_type: vec![
            NodeType::Handle,
            NodeType::Normal,
            NodeType::Normal,
            NodeType::Normal,
        ],
        cells: vec![[0, 1, 2], [1, 3, 2]],
    }
}

#[test]
fn checkpoint_file_restores_identical_predictions() {
    let config = small_config();
    let params = ModelParams::new_random(&config, 21).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.drp");

    save_to_path(&path, &config, &params).unwrap();
    let (loaded_config, loaded_params) = load_from_path(&path).unwrap();
    assert_eq!(loaded_config, config);
    assert_eq!(loaded_params, params);

    let original = ClothModel::new(EncodeProcessDecode::from_params(config, params).unwrap());
    let restored =
        ClothModel::new(EncodeProcessDecode::from_params(loaded_config, loaded_params).unwrap());
    let mut ctx = ExecutionContext::default();
    let a = original.predict_next(&square_frame(), &mut ctx).unwrap();
    let b = restored.predict_next(&square_frame(), &mut ctx).unwrap();
    assert_eq!(a, b);
}

#[test]
fn missing_checkpoint_file_is_a_checkpoint_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_from_path(dir.path().join("absent.drp")).unwrap_err();
    assert!(matches!(err, DrapeError::Checkpoint { .. }));
}

#[test]
fn rollout_pins_handles_and_feeds_predictions_back() {
    let model = ClothModel::new(EncodeProcessDecode::new_random(small_config(), 4).unwrap());
    let frame = square_frame();
    let mut ctx = ExecutionContext::default();
    let result = rollout(&model, &frame, 3, &mut ctx).unwrap();

    assert_eq!(result.len(), 3);
    for step in &result.positions {
        assert_eq!(step.len(), 4);
        assert_eq!(step[0], frame.world_pos[0]);
        assert!(step.iter().flatten().all(|x| x.is_finite()));
    }

    // The first step equals a single prediction from the initial frame.
    let mut single = model.predict_next(&frame, &mut ctx).unwrap();
    single[0] = frame.world_pos[0];
    assert_eq!(result.positions[0], single);

    // The second step is predicted from the advanced frame.
    let advanced = frame.advance(result.positions[0].clone()).unwrap();
    let mut second = model.predict_next(&advanced, &mut ctx).unwrap();
    second[0] = advanced.world_pos[0];
    assert_eq!(result.positions[1], second);
}

#[test]
fn zero_step_rollout_is_empty() {
    let model = ClothModel::new(EncodeProcessDecode::new_random(small_config(), 4).unwrap());
    let mut ctx = ExecutionContext::default();
    let result = rollout(&model, &square_frame(), 0, &mut ctx).unwrap();
    assert!(result.is_empty());
    assert!(result.last().is_none());
}
