// Copyright (c) Soma Contributors
// SPDX-License-Identifier: Apache-2.0

use burn::config::Config;
use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, Initializer, Linear, LinearConfig};
use burn::prelude::Backend;
use burn::tensor::Tensor;
use burn::tensor::activation::softmax;

use crate::{
    DEFAULT_LATENT_DIM,
    DEFAULT_NUM_HEADS,
    error::{ModelError, ModelResult},
    modules::{check_dropout, check_positive},
};

/// Configuration to create a [Multi Head Attention](MultiHeadAttention) layer using the [init function](MultiHeadAttentionConfig::init).
#[derive(Config, Debug)]
pub struct MultiHeadAttentionConfig {
    /// Feature size (same size for input, keys, query, out, etc.)
    #[config(default = "DEFAULT_LATENT_DIM")]
    pub num_features: usize,
    /// The number of heads.
    #[config(default = "DEFAULT_NUM_HEADS")]
    pub num_heads: usize,
    /// Dropout applied to the attention weights.
    #[config(default = 0.0)]
    pub dropout: f64,
    /// The type of function used to initialize neural network parameters
    #[config(
        default = "Initializer::KaimingUniform{gain:1.0/num_traits::Float::sqrt(3.0), fan_out_only:false}"
    )]
    pub initializer: Initializer,
}

/// Unmasked self-attention: every position attends to every other position
/// along the sequence axis.
#[derive(Module, Debug)]
pub struct MultiHeadAttention<B: Backend> {
    /// Linear layer to transform the input features into the query space.
    pub query: Linear<B>,
    /// Linear layer to transform the input features into the key space.
    pub key: Linear<B>,
    /// Linear layer to transform the input features into the value space.
    pub value: Linear<B>,
    /// Linear layer to transform the output features back to the original space.
    pub output: Linear<B>,
    pub dropout: Dropout,
    /// The size of each linear layer.
    pub num_features: usize,
    /// The number of heads.
    pub num_heads: usize,
    /// The dimension per head.
    pub head_dim: usize,
}

impl MultiHeadAttentionConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ModelResult<MultiHeadAttention<B>> {
        check_positive("num_features", self.num_features)?;
        check_positive("num_heads", self.num_heads)?;
        check_dropout("attention dropout", self.dropout)?;
        if self.num_features % self.num_heads != 0 {
            return Err(ModelError::invalid_config(format!(
                "num_features ({}) must be divisible by num_heads ({})",
                self.num_features, self.num_heads
            )));
        }

        let linear = |config: &Self| {
            LinearConfig::new(config.num_features, config.num_features)
                .with_initializer(self.initializer.clone())
                .init(device)
        };

        Ok(MultiHeadAttention {
            query: linear(self),
            key: linear(self),
            value: linear(self),
            output: linear(self),
            dropout: DropoutConfig::new(self.dropout).init(),
            num_features: self.num_features,
            num_heads: self.num_heads,
            head_dim: self.num_features / self.num_heads,
        })
    }
}

impl<B: Backend> MultiHeadAttention<B> {
    /// `[batch_size, seq_length, num_features]` in and out; query, key and
    /// value are all `input`.
    pub fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch_size, seq_length, d_model] = input.dims();

        let query = self.attention_linear(input.clone(), &self.query);
        let key = self.attention_linear(input.clone(), &self.key);
        let value = self.attention_linear(input, &self.value);

        let attn_scores = self.attn_scores(query, key);
        let weights = self.dropout.forward(softmax(attn_scores, 3));
        let context = weights.matmul(value);
        let context = context.swap_dims(1, 2).reshape([batch_size, seq_length, d_model]);
        self.output.forward(context)
    }

    fn attn_scores(&self, query: Tensor<B, 4>, key: Tensor<B, 4>) -> Tensor<B, 4> {
        query.matmul(key.transpose()).div_scalar((self.head_dim as f32).sqrt())
    }

    fn attention_linear(&self, x: Tensor<B, 3>, linear: &Linear<B>) -> Tensor<B, 4> {
        let [batch_size, seq_length, _d_model] = x.dims();
        linear
            .forward(x)
            .reshape([batch_size, seq_length, self.num_heads, self.head_dim])
            .swap_dims(1, 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::{Distribution, Tolerance};

    type TestBackend = NdArray<f32>;

    #[test]
    fn rejects_indivisible_heads() {
        let device = Default::default();
        let result = MultiHeadAttentionConfig::new()
            .with_num_features(10)
            .with_num_heads(4)
            .init::<TestBackend>(&device);
        assert!(matches!(result, Err(ModelError::InvalidConfig(_))));
    }

    #[test]
    fn preserves_shape() {
        let device = Default::default();
        let mha = MultiHeadAttentionConfig::new()
            .with_num_features(8)
            .with_num_heads(2)
            .init::<TestBackend>(&device)
            .unwrap();
        let input = Tensor::<TestBackend, 3>::random([3, 5, 8], Distribution::Default, &device);
        assert_eq!(mha.forward(input).dims(), [3, 5, 8]);
    }

    #[test]
    fn permutation_equivariant_over_sequence() {
        // Without a mask or positional signal, reordering the sequence only
        // reorders the output.
        let device = Default::default();
        let mha = MultiHeadAttentionConfig::new()
            .with_num_features(4)
            .with_num_heads(2)
            .init::<TestBackend>(&device)
            .unwrap();
        let input = Tensor::<TestBackend, 3>::random([1, 3, 4], Distribution::Default, &device);
        let reversed = input.clone().flip([1]);

        let output = mha.forward(input).flip([1]);
        let output_reversed = mha.forward(reversed);
        output.to_data().assert_approx_eq::<f32>(&output_reversed.to_data(), Tolerance::default());
    }
}
