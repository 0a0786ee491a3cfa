// Copyright (c) Soma Contributors
// SPDX-License-Identifier: Apache-2.0

use burn::{
    config::Config,
    module::{Module, Param},
    nn::Initializer,
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

const STAGE: &str = "regional";

/// Maps each electrode's convolved time series into the latent space and
/// attends across every (channel, feature map) pair.
#[derive(Config, Debug)]
pub struct RegionalTransformerConfig {
    /// Length of the convolved time axis this stage projects from.
    pub sequence_length: usize,
    #[config(default = "DEFAULT_CHANNELS")]
    pub n_channels: usize,
    #[config(default = "DEFAULT_CONVOLUTION_DIMENSION")]
    pub convolution_dimension_length: usize,
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
    /// Initialiser for the latent mapping matrix and positional bias.
    #[config(default = "Initializer::Normal{mean:0.0, std:1.0}")]
    pub latent_initializer: Initializer,
}

#[derive(Module, Debug)]
pub struct RegionalTransformer<B: Backend> {
    /// `[latent_dim, sequence_length]`
    pub latent_mapping: Param<Tensor<B, 2>>,
    /// `[latent_dim]`
    pub positional_encoding: Param<Tensor<B, 1>>,
    pub transformer: TransformerStack<B>,
    n_channels: usize,
    convolution_dimension_length: usize,
    sequence_length: usize,
    latent_dim: usize,
}

impl RegionalTransformerConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ModelResult<RegionalTransformer<B>> {
        check_positive("sequence_length", self.sequence_length)?;
        check_positive("n_channels", self.n_channels)?;
        check_positive("convolution_dimension_length", self.convolution_dimension_length)?;
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

        debug!(config = ?self, "initialising regional transformer");
        Ok(RegionalTransformer {
            latent_mapping: self
                .latent_initializer
                .init([self.latent_dim, self.sequence_length], device),
            positional_encoding: self.latent_initializer.init([self.latent_dim], device),
            transformer,
            n_channels: self.n_channels,
            convolution_dimension_length: self.convolution_dimension_length,
            sequence_length: self.sequence_length,
            latent_dim: self.latent_dim,
        })
    }
}

impl<B: Backend> RegionalTransformer<B> {
    pub fn n_channels(&self) -> usize {
        self.n_channels
    }

    pub fn convolution_dimension_length(&self) -> usize {
        self.convolution_dimension_length
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    pub fn latent_dim(&self) -> usize {
        self.latent_dim
    }
}

impl<B: Backend> Stage<B, 4, 4> for RegionalTransformer<B> {
    /// `[batch, channel, sequence, depth]` → `[batch, channel, depth, latent]`.
    fn forward(&self, input: Tensor<B, 4>) -> ModelResult<Tensor<B, 4>> {
        let [batch_size, channels, sequence, depth] = input.dims();
        expect_shape(
            STAGE,
            [batch_size, channels, sequence, depth],
            [
                Axis::Any,
                Axis::Exactly(self.n_channels),
                Axis::Exactly(self.sequence_length),
                Axis::Exactly(self.convolution_dimension_length),
            ],
        )?;

        let rows = batch_size * channels * depth;
        let x = input.permute([0, 1, 3, 2]).reshape([rows, sequence]);
        let x = x.matmul(self.latent_mapping.val().transpose());
        let x = x.reshape([batch_size, channels, depth, self.latent_dim])
            + self.positional_encoding.val().unsqueeze::<4>();
        trace!(stage = STAGE, shape = ?x.dims(), "projected to latent space");

        let x = self
            .transformer
            .forward(x.reshape([batch_size, channels * depth, self.latent_dim]));
        Ok(x.reshape([batch_size, channels, depth, self.latent_dim]))
    }
}
