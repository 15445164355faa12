//! Checkpoint and weights I/O tests

use super::*;
use crate::nn::{shared, Linear, Module, Sequential, SharedModule};
use crate::optim::{Adam, OptimizerBinding, SGD};
use crate::train::TrainerContext;
use crate::Error;
use std::cell::RefCell;
use std::rc::Rc;

fn two_layer(scale: f32) -> (Rc<RefCell<Linear>>, Rc<RefCell<Linear>>, SharedModule) {
    let first = shared(
        Linear::from_parts(vec![1.0 * scale, 2.0 * scale], vec![0.5 * scale], 2, 1).unwrap(),
    );
    let second = shared(Linear::from_parts(vec![3.0 * scale], vec![-1.0 * scale], 1, 1).unwrap());
    let model: SharedModule = shared(
        Sequential::new()
            .add("first", first.clone())
            .add("second", second.clone()),
    );
    (first, second, model)
}

fn context(scale: f32) -> TrainerContext {
    let (first, second, model) = two_layer(scale);
    let mut ctx = TrainerContext::new(0);
    ctx.model = Some(model);
    ctx.optimizers = vec![
        OptimizerBinding::new(first, SGD::new(0.1, 0.9)),
        OptimizerBinding::new(second, Adam::default_params(0.01)).with_active(false),
    ];
    ctx
}

fn params(ctx: &TrainerContext) -> Vec<Vec<f32>> {
    ctx.model
        .as_ref()
        .unwrap()
        .borrow()
        .parameters()
        .iter()
        .map(|(_, t)| t.to_vec())
        .collect()
}

fn train_step(ctx: &mut TrainerContext) {
    for binding in &ctx.optimizers {
        for param in binding.params() {
            param.set_grad(ndarray::Array1::ones(param.len()));
        }
    }
    for binding in &mut ctx.optimizers {
        binding.step();
    }
}

#[test]
fn test_capture_records_counters_parameters_and_optimizers() {
    let mut ctx = context(1.0);
    ctx.epoch = 3;
    ctx.global_iteration = 30;

    let checkpoint = Checkpoint::capture(&ctx);
    assert_eq!(checkpoint.epoch, 3);
    assert_eq!(checkpoint.global_iteration, 30);
    let names: Vec<&str> = checkpoint.model_state.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["first.weight", "first.bias", "second.weight", "second.bias"]
    );
    assert_eq!(checkpoint.model_state[0].shape, vec![2]);
    assert_eq!(checkpoint.optimizers_flags, vec![true, false]);
    assert_eq!(checkpoint.optimizers_states[0].kind(), "sgd");
    assert_eq!(checkpoint.optimizers_states[1].kind(), "adam");
    assert!(checkpoint.metrics.is_none());
}

#[test]
fn test_json_round_trip_restores_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ckpt.json");

    let mut source = context(1.0);
    train_step(&mut source);
    source.epoch = 2;
    source.global_iteration = 20;
    source
        .metrics
        .entry("valid".into())
        .or_default()
        .insert("mse".into(), 0.5);
    source.best_metric = Some(0.5);
    save_checkpoint(&Checkpoint::capture(&source), &path, &SaveConfig::default()).unwrap();

    let mut target = context(2.0);
    load_checkpoint(&path).unwrap().restore(&mut target).unwrap();

    assert_eq!(params(&target), params(&source));
    assert_eq!(target.epoch, 2);
    assert_eq!(target.global_iteration, 20);
    assert_eq!(target.metric("valid", "mse"), Some(0.5));
    assert_eq!(target.best_metric, Some(0.5));
    assert_eq!(
        target.optimizers[0].state(),
        source.optimizers[0].state()
    );
    assert!(!target.optimizers[1].is_active());
    assert_eq!(
        target.status.get("iteration").and_then(|v| v.as_i64()),
        Some(20)
    );
}

#[test]
fn test_yaml_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ckpt.yaml");

    let source = context(1.0);
    let checkpoint = Checkpoint::capture(&source);
    save_checkpoint(&checkpoint, &path, &SaveConfig::new(ModelFormat::Yaml)).unwrap();

    assert_eq!(load_checkpoint(&path).unwrap(), checkpoint);
}

#[test]
fn test_save_leaves_no_temporary_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ckpt.json");
    save_checkpoint(&Checkpoint::capture(&context(1.0)), &path, &SaveConfig::default()).unwrap();
    save_checkpoint(&Checkpoint::capture(&context(1.0)), &path, &SaveConfig::default()).unwrap();

    let entries: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("ckpt.json")]);
}

#[test]
fn test_compact_json_is_single_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ckpt.json");
    let config = SaveConfig::new(ModelFormat::Json).with_pretty(false);
    save_checkpoint(&Checkpoint::capture(&context(1.0)), &path, &config).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), 1);
}

#[test]
fn test_mismatched_parameter_leaves_context_untouched() {
    let source = context(1.0);
    let mut checkpoint = Checkpoint::capture(&source);
    checkpoint.model_state[3].data.push(0.0);
    checkpoint.model_state[3].shape = vec![2];
    checkpoint.epoch = 9;

    let mut target = context(2.0);
    let before = params(&target);
    let err = checkpoint.restore(&mut target).unwrap_err();

    assert!(matches!(err, Error::CheckpointMismatch(_)));
    assert_eq!(params(&target), before);
    assert_eq!(target.epoch, 0);
}

#[test]
fn test_renamed_parameter_is_rejected() {
    let mut checkpoint = Checkpoint::capture(&context(1.0));
    checkpoint.model_state[0].name = "encoder.weight".into();
    assert!(matches!(
        checkpoint.validate(&context(1.0)),
        Err(Error::CheckpointMismatch(_))
    ));
}

#[test]
fn test_optimizer_count_mismatch() {
    let checkpoint = Checkpoint::capture(&context(1.0));
    let mut target = context(1.0);
    target.optimizers.pop();
    assert!(matches!(
        checkpoint.restore(&mut target),
        Err(Error::CheckpointMismatch(_))
    ));
}

#[test]
fn test_optimizer_kind_mismatch_applies_nothing() {
    let mut source = context(1.0);
    source.optimizers.swap(0, 1);
    let checkpoint = Checkpoint::capture(&source);

    let mut target = context(2.0);
    let before = params(&target);
    assert!(checkpoint.restore(&mut target).is_err());
    assert_eq!(params(&target), before);
    assert!(target.optimizers[0].is_active());
}

#[test]
fn test_model_state_without_model() {
    let checkpoint = Checkpoint::capture(&context(1.0));
    let mut bare = TrainerContext::new(0);
    assert!(matches!(
        checkpoint.restore(&mut bare),
        Err(Error::CheckpointMismatch(_))
    ));
}

#[test]
fn test_load_checkpoint_rejects_unknown_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ckpt.pt");
    std::fs::write(&path, "{}").unwrap();
    assert!(matches!(load_checkpoint(&path), Err(Error::Serialization(_))));
    assert!(matches!(
        load_checkpoint(dir.path().join("ckpt")),
        Err(Error::Serialization(_))
    ));
}

#[test]
fn test_safetensors_is_not_a_checkpoint_format() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ckpt.safetensors");
    let config = SaveConfig::new(ModelFormat::SafeTensors);
    assert!(save_checkpoint(&Checkpoint::capture(&context(1.0)), &path, &config).is_err());
    assert!(!path.exists());
}

#[test]
fn test_weights_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.safetensors");

    let (_, _, source) = two_layer(1.0);
    save_weights(&*source.borrow(), &path).unwrap();

    let (first, _, target) = two_layer(5.0);
    load_weights(&*target.borrow(), &path).unwrap();

    assert_eq!(first.borrow().weight().to_vec(), vec![1.0, 2.0]);
    let a: Vec<Vec<f32>> = source.borrow().parameters().iter().map(|(_, t)| t.to_vec()).collect();
    let b: Vec<Vec<f32>> = target.borrow().parameters().iter().map(|(_, t)| t.to_vec()).collect();
    assert_eq!(a, b);
}

#[test]
fn test_weights_missing_parameter() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("layer.safetensors");

    let layer = Linear::from_parts(vec![1.0, 2.0], vec![0.0], 2, 1).unwrap();
    save_weights(&layer, &path).unwrap();

    let (_, _, model) = two_layer(1.0);
    let err = load_weights(&*model.borrow(), &path).unwrap_err();
    assert!(matches!(err, Error::CheckpointMismatch(_)));
}

#[test]
fn test_weights_length_mismatch_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("layer.safetensors");

    let wide = Linear::from_parts(vec![1.0, 2.0, 3.0], vec![0.0], 3, 1).unwrap();
    save_weights(&wide, &path).unwrap();

    let narrow = Linear::from_parts(vec![7.0, 8.0], vec![9.0], 2, 1).unwrap();
    assert!(load_weights(&narrow, &path).is_err());
    assert_eq!(narrow.weight().to_vec(), vec![7.0, 8.0]);
    assert_eq!(narrow.bias().to_vec(), vec![9.0]);
}
