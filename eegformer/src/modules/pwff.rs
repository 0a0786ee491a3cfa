// Copyright (c) Soma Contributors
// SPDX-License-Identifier: Apache-2.0

use burn::{
    config::Config,
    module::Module,
    nn::{Dropout, DropoutConfig, Initializer, Linear, LinearConfig, Relu},
    tensor::{Tensor, backend::Backend},
};

use crate::{
    DEFAULT_DROPOUT, DEFAULT_FF_DIM, DEFAULT_LATENT_DIM,
    error::ModelResult,
    modules::{check_dropout, check_positive},
};

/// Per-token feed-forward sublayer of a transformer block.
#[derive(Config, Debug)]
pub struct FeedForwardConfig {
    #[config(default = "DEFAULT_LATENT_DIM")]
    pub d_model: usize,
    #[config(default = "DEFAULT_FF_DIM")]
    pub ff_dim: usize,
    /// Applied to the hidden activations, after the ReLU.
    #[config(default = "DEFAULT_DROPOUT")]
    pub dropout: f64,
    /// The type of function used to initialize neural network parameters
    #[config(
        default = "Initializer::KaimingUniform{gain:1.0/num_traits::Float::sqrt(3.0), fan_out_only:false}"
    )]
    pub initializer: Initializer,
}

#[derive(Module, Debug)]
pub struct FeedForward<B: Backend> {
    pub expand: Linear<B>,
    pub contract: Linear<B>,
    pub(crate) dropout: Dropout,
    activation: Relu,
}

impl FeedForwardConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ModelResult<FeedForward<B>> {
        check_positive("d_model", self.d_model)?;
        check_positive("ff_dim", self.ff_dim)?;
        check_dropout("feed-forward dropout", self.dropout)?;

        let linear = |d_input, d_output| {
            LinearConfig::new(d_input, d_output)
                .with_initializer(self.initializer.clone())
                .init(device)
        };
        Ok(FeedForward {
            expand: linear(self.d_model, self.ff_dim),
            contract: linear(self.ff_dim, self.d_model),
            dropout: DropoutConfig::new(self.dropout).init(),
            activation: Relu::new(),
        })
    }
}

impl<B: Backend> FeedForward<B> {
    /// `[..., d_model]` → `[..., d_model]`.
    pub fn forward<const D: usize>(&self, input: Tensor<B, D>) -> Tensor<B, D> {
        let hidden = self.activation.forward(self.expand.forward(input));
        self.contract.forward(self.dropout.forward(hidden))
    }
}
