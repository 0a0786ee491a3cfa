#![allow(clippy::unwrap_used, clippy::expect_used)]

use arrgen::normal_array;
use burn::backend::NdArray;
use burn::tensor::Tensor;
use eegformer::Stage;
use eegformer::error::ModelError;
use eegformer::modules::temporal::TemporalTransformerConfig;
use eegformer::tensor_conversions::IntoTensorData;

type TestBackend = NdArray<f32>;

fn input(seed: u64, shape: [usize; 4]) -> Tensor<TestBackend, 4> {
    let data = normal_array(seed, &shape, 0.0, 1.0).to_tensor_data().unwrap();
    Tensor::from_data(data, &Default::default())
}

#[test]
fn test_temporal_outputs_latent_features_per_depth() {
    let device = Default::default();
    let model = TemporalTransformerConfig::new()
        .with_n_channels(32)
        .with_sequence_length(20)
        .with_input_length(30)
        .with_latent_dim(128)
        .with_num_heads(4)
        .with_ff_dim(64)
        .with_num_layers(3)
        .with_dropout(0.1)
        .init::<TestBackend>(&device)
        .unwrap();

    let output = model.forward(input(42, [10, 20, 32, 30])).unwrap();
    assert_eq!(output.dims(), [10, 20, 128]);
    assert_eq!(model.projection.weight.val().dims(), [32 * 30, 128]);
    assert_eq!(model.positional_encoding.val().dims(), [1, 20, 128]);
}

#[test]
fn test_temporal_rejects_mismatched_axes() {
    let device = Default::default();
    let model = TemporalTransformerConfig::new()
        .with_n_channels(2)
        .with_sequence_length(3)
        .with_input_length(4)
        .with_latent_dim(4)
        .with_num_heads(2)
        .init::<TestBackend>(&device)
        .unwrap();

    assert!(model.forward(input(1, [2, 3, 2, 4])).is_ok());
    for bad in [[2, 4, 2, 4], [2, 3, 3, 4], [2, 3, 2, 5], [2, 2, 3, 4]] {
        let result = model.forward(input(1, bad));
        assert!(
            matches!(result, Err(ModelError::ShapeMismatch { stage: "temporal", .. })),
            "{bad:?}"
        );
    }
}
