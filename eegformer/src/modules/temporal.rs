// Copyright (c) Soma Contributors
// SPDX-License-Identifier: Apache-2.0

use burn::{
    config::Config,
    module::{Module, Param},
    nn::{Initializer, Linear, LinearConfig},
    tensor::{Tensor, backend::Backend},
};
use tracing::{debug, trace};

use super::{
    block::{TransformerStack, TransformerStackConfig},
    check_positive,
};
use crate::{
    DEFAULT_CHANNELS,
    DEFAULT_CONVOLUTION_DIMENSION,
    DEFAULT_DROPOUT,
    DEFAULT_FF_DIM,
    DEFAULT_LATENT_DIM,
    DEFAULT_NUM_HEADS,
    DEFAULT_NUM_LAYERS,
    Stage,
    error::ModelResult,
    shape::{Axis, expect_shape},
};

const STAGE: &str = "temporal";

#[derive(Config, Debug)]
pub struct TemporalTransformerConfig {
    #[config(default = "DEFAULT_CHANNELS")]
    pub n_channels: usize,
    /// Number of sequence positions attended over (the feature-depth axis).
    #[config(default = "DEFAULT_CONVOLUTION_DIMENSION")]
    pub sequence_length: usize,
    /// Per-channel feature length flattened together with the channels.
    #[config(default = "DEFAULT_LATENT_DIM")]
    pub input_length: usize,
    #[config(default = "DEFAULT_LATENT_DIM")]
    pub latent_dim: usize,
    #[config(default = "DEFAULT_NUM_HEADS")]
    pub num_heads: usize,
    #[config(default = "DEFAULT_FF_DIM")]
    pub ff_dim: usize,
    #[config(default = "DEFAULT_NUM_LAYERS")]
    pub num_layers: usize,
    #[config(default = "DEFAULT_DROPOUT")]
    pub dropout: f64,
    #[config(default = false)]
    pub norm_first: bool,
    /// The type of function used to initialize neural network parameters
    #[config(
        default = "Initializer::KaimingUniform{gain:1.0/num_traits::Float::sqrt(3.0), fan_out_only:false}"
    )]
    pub initializer: Initializer,
    #[config(default = "Initializer::Normal{mean:0.0, std:1.0}")]
    pub latent_initializer: Initializer,
}

/// Collapses each feature map's channel × feature block into one latent
/// vector and attends along the feature-depth axis.
#[derive(Module, Debug)]
pub struct TemporalTransformer<B: Backend> {
    /// `n_channels * input_length` → `latent_dim`
    pub projection: Linear<B>,
    /// `[1, sequence_length, latent_dim]`
    pub positional_encoding: Param<Tensor<B, 3>>,
    pub transformer: TransformerStack<B>,
    n_channels: usize,
    sequence_length: usize,
    input_length: usize,
    latent_dim: usize,
}

impl TemporalTransformerConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ModelResult<TemporalTransformer<B>> {
        check_positive("n_channels", self.n_channels)?;
        check_positive("sequence_length", self.sequence_length)?;
        check_positive("input_length", self.input_length)?;
        check_positive("latent_dim", self.latent_dim)?;

        let transformer = TransformerStackConfig::new()
            .with_d_model(self.latent_dim)
            .with_num_heads(self.num_heads)
            .with_ff_dim(self.ff_dim)
            .with_num_layers(self.num_layers)
            .with_dropout(self.dropout)
            .with_norm_first(self.norm_first)
            .with_initializer(self.initializer.clone())
            .init(device)?;

        debug!(config = ?self, "initialising temporal transformer");
        Ok(TemporalTransformer {
            projection: LinearConfig::new(self.n_channels * self.input_length, self.latent_dim)
                .with_initializer(self.initializer.clone())
                .init(device),
            positional_encoding: self
                .latent_initializer
                .init([1, self.sequence_length, self.latent_dim], device),
            transformer,
            n_channels: self.n_channels,
            sequence_length: self.sequence_length,
            input_length: self.input_length,
            latent_dim: self.latent_dim,
        })
    }
}

impl<B: Backend> TemporalTransformer<B> {
    pub fn n_channels(&self) -> usize {
        self.n_channels
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    pub fn input_length(&self) -> usize {
        self.input_length
    }

    pub fn latent_dim(&self) -> usize {
        self.latent_dim
    }
}

impl<B: Backend> Stage<B, 4, 3> for TemporalTransformer<B> {
    /// `[batch, depth, channel, input_length]` → `[batch, depth, latent]`.
    fn forward(&self, input: Tensor<B, 4>) -> ModelResult<Tensor<B, 3>> {
        let [batch_size, depth, channels, length] = input.dims();
        expect_shape(
            STAGE,
            [batch_size, depth, channels, length],
            [
                Axis::Any,
                Axis::Exactly(self.sequence_length),
                Axis::Exactly(self.n_channels),
                Axis::Exactly(self.input_length),
            ],
        )?;

        let x = self.projection.forward(input.reshape([batch_size, depth, channels * length]));
        let x = x + self.positional_encoding.val();
        trace!(stage = STAGE, shape = ?x.dims(), "projected to latent space");

        Ok(self.transformer.forward(x))
    }
}
