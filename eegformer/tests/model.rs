#![allow(clippy::unwrap_used, clippy::expect_used)]

use arrgen::normal_array;
use burn::backend::NdArray;
use burn::config::Config;
use burn::tensor::ops::FloatElem;
use burn::tensor::{Tensor, Tolerance};
use eegformer::error::ModelError;
use eegformer::records::{EegSample, EegWindow};
use eegformer::tensor_conversions::IntoTensorData;
use eegformer::{EegFormerConfig, Stage};

type TestBackend = NdArray<f32>;
type FT = FloatElem<TestBackend>;

fn small_config() -> EegFormerConfig {
    EegFormerConfig::new()
        .with_sequence_length(40)
        .with_convolution_dimension_length(6)
        .with_kernel_size(3)
        .with_n_conv_layers(3)
        .with_n_channels(4)
        .with_input_dim(16)
        .with_num_heads(4)
        .with_ff_dim(32)
        .with_num_layers(1)
        .with_dropout(0.1)
        .with_hidden_dim(8)
        .with_output_dim(3)
}

fn window(seed: u64, batch: usize) -> Tensor<TestBackend, 3> {
    let data = normal_array(seed, &[batch, 4, 40], 0.0, 1.0).to_tensor_data().unwrap();
    Tensor::from_data(data, &Default::default())
}

#[test]
fn test_eegformer_regresses_per_window() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let device = Default::default();
    let model = small_config().init::<TestBackend>(&device).unwrap();
    assert_eq!(small_config().reduced_sequence_length().unwrap(), 34);

    for batch in [1, 5] {
        let output = model.forward(window(batch as u64, batch)).unwrap();
        assert_eq!(output.dims(), [batch, 3]);
    }
}

#[test]
fn test_eegformer_matches_manual_pipeline() {
    let device = Default::default();
    let model = small_config().init::<TestBackend>(&device).unwrap();
    let input = window(3, 2);

    let features = model.convolution.forward(input.clone()).unwrap();
    let encoded = model.encoder.forward(features).unwrap();
    let pooled = encoded.mean_dim(1).reshape([2, 16]);
    let expected = Stage::<TestBackend, 2, 2>::forward(&model.decoder, pooled).unwrap();

    let output = model.forward(input).unwrap();
    output.to_data().assert_approx_eq::<FT>(&expected.to_data(), Tolerance::default());
}

#[test]
fn test_eegformer_batch_items_are_independent() {
    let device = Default::default();
    let model = small_config().init::<TestBackend>(&device).unwrap();
    let a = window(10, 1);
    let b = window(11, 1);

    let alone = model.forward(a.clone()).unwrap();
    let together = model.forward(Tensor::cat(vec![a, b], 0)).unwrap();
    alone
        .to_data()
        .assert_approx_eq::<FT>(&together.slice([0..1, 0..3]).to_data(), Tolerance::default());
}

#[test]
fn test_eegformer_rejects_wrong_input() {
    let device = Default::default();
    let model = small_config().init::<TestBackend>(&device).unwrap();

    let wrong_channels = Tensor::<TestBackend, 3>::zeros([2, 5, 40], &device);
    let err = model.forward(wrong_channels).unwrap_err();
    assert_eq!(
        err,
        ModelError::ShapeMismatch {
            stage: "eegformer",
            expected: "[*, 4, 40]".into(),
            actual: vec![2, 5, 40],
        }
    );

    let wrong_time = Tensor::<TestBackend, 3>::zeros([2, 4, 41], &device);
    assert!(matches!(model.forward(wrong_time), Err(ModelError::ShapeMismatch { .. })));
}

#[test]
fn test_dropout_of_one_rejected() {
    let device = Default::default();
    for dropout in [1.0, 1.1] {
        let result = small_config().with_dropout(dropout).init::<TestBackend>(&device);
        assert!(matches!(result, Err(ModelError::InvalidConfig(_))), "dropout {dropout}");
    }
}

#[test]
fn test_construction_contracts() {
    let device = Default::default();
    let cases = [
        small_config().with_n_conv_layers(0),
        small_config().with_num_layers(0),
        small_config().with_n_channels(0),
        small_config().with_sequence_length(6),
        small_config().with_num_heads(5),
    ];
    for config in cases {
        let result = config.init::<TestBackend>(&device);
        assert!(matches!(result, Err(ModelError::InvalidConfig(_))), "{config:?}");
    }
}

#[test]
fn test_config_round_trips_through_json() {
    let config = small_config();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("eegformer.json");
    config.save(&path).unwrap();

    let loaded = EegFormerConfig::load(&path).unwrap();
    assert_eq!(loaded.sequence_length, 40);
    assert_eq!(loaded.input_dim, 16);
    assert_eq!(loaded.dropout, 0.1);

    let json = serde_json::to_value(&config).unwrap();
    assert_eq!(json["n_conv_layers"], 3);
}

#[test]
fn test_default_configuration_matches_device() {
    let config = EegFormerConfig::new();
    assert_eq!(config.n_channels, 8);
    assert_eq!(config.sequence_length, 1000);
    assert_eq!(config.reduced_sequence_length().unwrap(), 994);
    assert_eq!(config.output_dim, 3);
}

#[test]
fn test_recorded_windows_feed_the_model() {
    let device = Default::default();
    let model = small_config().init::<TestBackend>(&device).unwrap();

    let samples = (0..40)
        .map(|t| EegSample { timestamp_ns: t * 4_000_000, values: vec![t as f32 * 0.01; 4] })
        .collect::<Vec<_>>();
    let windows = [
        EegWindow::from_samples(4, &samples).unwrap(),
        EegWindow::from_samples(4, &samples).unwrap(),
    ];
    let batch = EegWindow::batch::<TestBackend>(&windows, &device).unwrap();

    let output = model.forward(batch).unwrap();
    assert_eq!(output.dims(), [2, 3]);
    output
        .clone()
        .slice([0..1, 0..3])
        .to_data()
        .assert_approx_eq::<FT>(&output.slice([1..2, 0..3]).to_data(), Tolerance::default());
}
