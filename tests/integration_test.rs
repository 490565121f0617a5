//! End-to-end checks of the assembled ResNet models on the NdArray backend.

use burn::backend::NdArray;
use burn::module::Module;
use burn::tensor::{Distribution, Tensor};
use resnet34_burn::{LayerBlockConfig, ResNet, ResNetConfig, ResNetError, MIN_INPUT_SIZE};

type B = NdArray<f32>;

const NUM_CLASSES: usize = 1000;

// Stem + two norms per block + one per projected shortcut
const RESNET34_BN_CHANNELS: usize = 64
    + 3 * 2 * 64
    + (4 * 2 + 1) * 128
    + (6 * 2 + 1) * 256
    + (3 * 2 + 1) * 512;
const RESNET18_BN_CHANNELS: usize = 64
    + 2 * 2 * 64
    + (2 * 2 + 1) * 128
    + (2 * 2 + 1) * 256
    + (2 * 2 + 1) * 512;

#[test]
fn test_resnet34_imagenet_input() {
    let device = Default::default();
    let model = ResNet::<B>::resnet34(NUM_CLASSES, &device).unwrap();

    let input = Tensor::<B, 4>::random([1, 3, 224, 224], Distribution::Default, &device);
    let out = model.forward(input).unwrap();

    assert_eq!(out.dims(), [1, NUM_CLASSES]);
}

#[test]
fn test_resnet34_small_input() {
    let device = Default::default();
    let model = ResNet::<B>::resnet34(NUM_CLASSES, &device).unwrap();

    // 32x32 is reduced to 1x1 before the classifier head
    let input = Tensor::<B, 4>::random([2, 3, 32, 32], Distribution::Default, &device);
    let out = model.forward(input).unwrap();

    assert_eq!(out.dims(), [2, NUM_CLASSES]);
}

#[test]
fn test_output_independent_of_input_size() {
    let device = Default::default();
    let model = ResNet::<B>::resnet18(10, &device).unwrap();

    for [h, w] in [[32, 32], [64, 48], [45, 71]] {
        let input = Tensor::<B, 4>::random([3, 3, h, w], Distribution::Default, &device);
        assert_eq!(model.forward(input).unwrap().dims(), [3, 10]);
    }
}

#[test]
fn test_forward_is_deterministic() {
    let device = Default::default();
    let model = ResNet::<B>::resnet34(NUM_CLASSES, &device).unwrap();

    let input = Tensor::<B, 4>::random([2, 3, 64, 64], Distribution::Default, &device);
    let first = model.forward(input.clone()).unwrap().into_data();
    let second = model.forward(input).unwrap().into_data();

    first.assert_eq(&second, true);
}

#[test]
fn test_resnet34_layers() {
    let device = Default::default();
    let model = ResNet::<B>::resnet34(NUM_CLASSES, &device).unwrap();

    let lens: Vec<usize> = model.layers().iter().map(|layer| layer.len()).collect();
    assert_eq!(lens, vec![3, 4, 6, 3]);

    for (i, layer) in model.layers().iter().enumerate() {
        for (j, block) in layer.blocks().iter().enumerate() {
            // Layer 1 keeps the stem resolution and width
            let projected = i > 0 && j == 0;
            assert_eq!(block.shortcut().is_projection(), projected, "layer{} block {j}", i + 1);
        }
    }
}

#[test]
fn test_parameter_counts() {
    let device = Default::default();

    // `num_params` includes the batch norm running mean and variance, two values per
    // normalized channel on top of the torchvision trainable parameter count.
    let resnet34 = ResNet::<B>::resnet34(NUM_CLASSES, &device).unwrap();
    assert_eq!(resnet34.num_params(), 21_814_696);
    assert_eq!(resnet34.num_params() - 2 * RESNET34_BN_CHANNELS, 21_797_672);

    let resnet18 = ResNet::<B>::resnet18(NUM_CLASSES, &device).unwrap();
    assert_eq!(resnet18.num_params(), 11_699_112);
    assert_eq!(resnet18.num_params() - 2 * RESNET18_BN_CHANNELS, 11_689_512);
}

#[test]
fn test_config_presets() {
    let config = ResNetConfig::resnet34(NUM_CLASSES);

    assert_eq!(config.blocks, vec![3, 4, 6, 3]);
    assert_eq!(config.num_classes, NUM_CLASSES);
    assert!(config.validate().is_ok());
}

#[test]
fn test_wrong_input_channels() {
    let device = Default::default();
    let model = ResNet::<B>::resnet18(10, &device).unwrap();

    let input = Tensor::<B, 4>::zeros([1, 1, 32, 32], &device);
    let err = model.forward(input).unwrap_err();

    assert!(matches!(err, ResNetError::ShapeMismatch(_)));
}

#[test]
fn test_min_input_size() {
    let device = Default::default();
    let model = ResNet::<B>::resnet34(NUM_CLASSES, &device).unwrap();

    let input = Tensor::<B, 4>::random(
        [1, 3, MIN_INPUT_SIZE, MIN_INPUT_SIZE],
        Distribution::Default,
        &device,
    );
    assert_eq!(model.forward(input).unwrap().dims(), [1, NUM_CLASSES]);

    let input = Tensor::<B, 4>::zeros([1, 3, MIN_INPUT_SIZE - 1, MIN_INPUT_SIZE], &device);
    let err = model.forward(input).unwrap_err();
    assert!(matches!(err, ResNetError::ShapeMismatch(_)));
}

#[test]
fn test_config_save_load() {
    use burn::config::Config;

    let config = ResNetConfig::resnet34(10);
    let path = std::env::temp_dir().join(format!("resnet34-burn-config-{}.json", std::process::id()));

    config.save(&path).unwrap();
    let loaded = ResNetConfig::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(loaded.blocks, vec![3, 4, 6, 3]);
    assert_eq!(loaded.num_classes, 10);

    let model = loaded.init::<B>(&Default::default()).unwrap();
    assert_eq!(model.num_classes(), 10);
}

#[test]
fn test_zero_channel_layer_rejected() {
    let err = LayerBlockConfig::new(2, 0, 64, 1).validate().unwrap_err();
    assert!(matches!(err, ResNetError::ConfigurationError(_)));

    let err = LayerBlockConfig::new(2, 64, 0, 2).validate().unwrap_err();
    assert!(matches!(err, ResNetError::ConfigurationError(_)));
}
