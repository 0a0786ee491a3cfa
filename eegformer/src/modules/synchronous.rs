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

const STAGE: &str = "synchronous";

#[derive(Config, Debug)]
pub struct SynchronousTransformerConfig {
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
    #[config(default = "Initializer::Normal{mean:0.0, std:1.0}")]
    pub latent_initializer: Initializer,
}

/// Attends across electrodes: the sequence is every (feature map, channel)
/// pair, ordered feature-map-major so the output comes out depth-first.
#[derive(Module, Debug)]
pub struct SynchronousTransformer<B: Backend> {
    /// `[latent_dim, latent_dim]`
    pub latent_mapping: Param<Tensor<B, 2>>,
    /// `[latent_dim]`
    pub positional_encoding: Param<Tensor<B, 1>>,
    pub transformer: TransformerStack<B>,
    n_channels: usize,
    convolution_dimension_length: usize,
    latent_dim: usize,
}

impl SynchronousTransformerConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ModelResult<SynchronousTransformer<B>> {
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

        debug!(config = ?self, "initialising synchronous transformer");
        Ok(SynchronousTransformer {
            latent_mapping: self
                .latent_initializer
                .init([self.latent_dim, self.latent_dim], device),
            positional_encoding: self.latent_initializer.init([self.latent_dim], device),
            transformer,
            n_channels: self.n_channels,
            convolution_dimension_length: self.convolution_dimension_length,
            latent_dim: self.latent_dim,
        })
    }
}

impl<B: Backend> SynchronousTransformer<B> {
    pub fn n_channels(&self) -> usize {
        self.n_channels
    }

    pub fn convolution_dimension_length(&self) -> usize {
        self.convolution_dimension_length
    }

    pub fn latent_dim(&self) -> usize {
        self.latent_dim
    }
}

impl<B: Backend> Stage<B, 4, 4> for SynchronousTransformer<B> {
    /// `[batch, channel, depth, latent]` → `[batch, depth, channel, latent]`.
    fn forward(&self, input: Tensor<B, 4>) -> ModelResult<Tensor<B, 4>> {
        let [batch_size, channels, depth, latent] = input.dims();
        expect_shape(
            STAGE,
            [batch_size, channels, depth, latent],
            [
                Axis::Any,
                Axis::Exactly(self.n_channels),
                Axis::Exactly(self.convolution_dimension_length),
                Axis::Exactly(self.latent_dim),
            ],
        )?;

        let x = input.reshape([batch_size * channels * depth, latent]);
        let x = x.matmul(self.latent_mapping.val().transpose());
        let x = x.reshape([batch_size, channels, depth, latent])
            + self.positional_encoding.val().unsqueeze::<4>();

        let x = x.swap_dims(1, 2);
        trace!(stage = STAGE, shape = ?x.dims(), "depth-major layout");

        let x = self.transformer.forward(x.reshape([batch_size, depth * channels, latent]));
        Ok(x.reshape([batch_size, depth, channels, latent]))
    }
}
