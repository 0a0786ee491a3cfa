// Copyright (c) Soma Contributors
// SPDX-License-Identifier: Apache-2.0

use burn::{
    config::Config,
    module::Module,
    nn::{Dropout, DropoutConfig, Initializer, LayerNorm, LayerNormConfig},
    tensor::{Tensor, backend::Backend},
};

use super::{
    attention::{MultiHeadAttention, MultiHeadAttentionConfig},
    check_dropout,
    check_positive,
    pwff::{FeedForward, FeedForwardConfig},
};
use crate::{
    DEFAULT_DROPOUT, DEFAULT_FF_DIM, DEFAULT_LATENT_DIM, DEFAULT_NUM_HEADS, DEFAULT_NUM_LAYERS,
    error::ModelResult,
};

/// The stack of self-attention blocks shared by the regional, synchronous and
/// temporal transformers. Operates on `[batch, seq, d_model]`.
#[derive(Config, Debug)]
pub struct TransformerStackConfig {
    /// The size of the input and output features.
    #[config(default = "DEFAULT_LATENT_DIM")]
    pub d_model: usize,
    /// The number of attention heads.
    #[config(default = "DEFAULT_NUM_HEADS")]
    pub num_heads: usize,
    /// The size of the hidden feed-forward features.
    #[config(default = "DEFAULT_FF_DIM")]
    pub ff_dim: usize,
    /// The number of transformer blocks.
    #[config(default = "DEFAULT_NUM_LAYERS")]
    pub num_layers: usize,
    /// The probability that dropout occurs
    #[config(default = "DEFAULT_DROPOUT")]
    pub dropout: f64,
    /// Normalise before each sublayer instead of after the residual add.
    #[config(default = false)]
    pub norm_first: bool,
    /// The type of function used to initialize neural network parameters
    #[config(
        default = "Initializer::KaimingUniform{gain:1.0/num_traits::Float::sqrt(3.0), fan_out_only:false}"
    )]
    pub initializer: Initializer,
}

#[derive(Module, Debug)]
pub struct TransformerStack<B: Backend> {
    pub layers: Vec<TransformerBlock<B>>,
}

impl TransformerStackConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ModelResult<TransformerStack<B>> {
        check_positive("num_layers", self.num_layers)?;
        check_positive("ff_dim", self.ff_dim)?;
        check_dropout("dropout", self.dropout)?;
        let layers = (0..self.num_layers)
            .map(|_| TransformerBlock::<B>::new(self, device))
            .collect::<ModelResult<Vec<_>>>()?;
        Ok(TransformerStack { layers })
    }
}

impl<B: Backend> TransformerStack<B> {
    pub fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        let mut x = input;
        for layer in self.layers.iter() {
            x = layer.forward(x);
        }
        x
    }
}

#[derive(Module, Debug)]
pub struct TransformerBlock<B: Backend> {
    attention: MultiHeadAttention<B>,
    norm_1: LayerNorm<B>,
    pwff: FeedForward<B>,
    norm_2: LayerNorm<B>,
    dropout: Dropout,
    norm_first: bool,
}

impl<B: Backend> TransformerBlock<B> {
    pub(crate) fn new(config: &TransformerStackConfig, device: &B::Device) -> ModelResult<Self> {
        Ok(TransformerBlock {
            attention: MultiHeadAttentionConfig::new()
                .with_num_features(config.d_model)
                .with_num_heads(config.num_heads)
                .with_dropout(config.dropout)
                .with_initializer(config.initializer.clone())
                .init(device)?,
            norm_1: LayerNormConfig::new(config.d_model).init(device),
            pwff: FeedForwardConfig::new()
                .with_d_model(config.d_model)
                .with_ff_dim(config.ff_dim)
                .with_dropout(config.dropout)
                .with_initializer(config.initializer.clone())
                .init(device)?,
            norm_2: LayerNormConfig::new(config.d_model).init(device),
            dropout: DropoutConfig::new(config.dropout).init(),
            norm_first: config.norm_first,
        })
    }

    pub(crate) fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = input;
        if self.norm_first {
            let residual_path = self.attention.forward(self.norm_1.forward(x.clone()));
            let x = x + self.dropout.forward(residual_path);
            let residual_path = self.pwff.forward(self.norm_2.forward(x.clone()));
            return x + self.dropout.forward(residual_path);
        }

        let residual_path = self.attention.forward(x.clone());
        let x = self.norm_1.forward(x + self.dropout.forward(residual_path));
        let residual_path = self.pwff.forward(x.clone());
        self.norm_2.forward(x + self.dropout.forward(residual_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    fn config() -> TransformerStackConfig {
        TransformerStackConfig::new().with_d_model(8).with_num_heads(2).with_ff_dim(16)
    }

    #[test]
    fn builds_requested_depth() {
        let device = Default::default();
        let stack = config().with_num_layers(3).init::<TestBackend>(&device).unwrap();
        assert_eq!(stack.layers.len(), 3);
    }

    #[test]
    fn zero_layers_rejected() {
        let device = Default::default();
        let result = config().with_num_layers(0).init::<TestBackend>(&device);
        assert!(matches!(result, Err(ModelError::InvalidConfig(_))));
    }

    #[test]
    fn degenerate_dropout_rejected() {
        let device = Default::default();
        for dropout in [1.0, 1.1] {
            let result = config().with_dropout(dropout).init::<TestBackend>(&device);
            assert!(matches!(result, Err(ModelError::InvalidConfig(_))), "dropout {dropout}");
        }
    }

    #[test]
    fn dropout_reaches_every_sublayer() {
        let device = Default::default();
        let stack =
            config().with_num_layers(2).with_dropout(0.3).init::<TestBackend>(&device).unwrap();
        for layer in stack.layers.iter() {
            assert_eq!(layer.dropout.prob, 0.3);
            assert_eq!(layer.pwff.dropout.prob, 0.3);
        }
    }

    #[test]
    fn post_norm_output_is_normalised() {
        // Freshly initialised LayerNorm has unit gamma and zero beta, so every
        // position of a post-norm block output has zero mean.
        let device = Default::default();
        let stack = config().with_num_layers(1).init::<TestBackend>(&device).unwrap();
        let input = Tensor::<TestBackend, 3>::random([2, 4, 8], Distribution::Default, &device);
        let output = stack.forward(input);
        assert_eq!(output.dims(), [2, 4, 8]);

        let means = output.mean_dim(2).into_data().to_vec::<f32>().unwrap();
        assert!(means.iter().all(|m| m.abs() < 1e-4), "{means:?}");
    }

    #[test]
    fn pre_norm_preserves_shape() {
        let device = Default::default();
        let stack = config().with_norm_first(true).init::<TestBackend>(&device).unwrap();
        let input = Tensor::<TestBackend, 3>::random([1, 6, 8], Distribution::Default, &device);
        assert_eq!(stack.forward(input).dims(), [1, 6, 8]);
    }
}
