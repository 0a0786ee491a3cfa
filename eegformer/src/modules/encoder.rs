// Copyright (c) Soma Contributors
// SPDX-License-Identifier: Apache-2.0

use burn::{
    config::Config,
    module::Module,
    nn::Initializer,
    tensor::{Tensor, backend::Backend},
};

use super::{
    regional::{RegionalTransformer, RegionalTransformerConfig},
    synchronous::{SynchronousTransformer, SynchronousTransformerConfig},
    temporal::{TemporalTransformer, TemporalTransformerConfig},
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
    error::{ModelError, ModelResult},
};

#[derive(Config, Debug)]
pub struct EncoderConfig {
    /// Length of the convolved time axis fed to the regional stage.
    pub sequence_length: usize,
    #[config(default = "DEFAULT_CHANNELS")]
    pub n_channels: usize,
    #[config(default = "DEFAULT_CONVOLUTION_DIMENSION")]
    pub convolution_dimension_length: usize,
    /// Latent width shared by all three transformers.
    #[config(default = "DEFAULT_LATENT_DIM")]
    pub latent_dim: usize,
    #[config(default = "DEFAULT_NUM_HEADS")]
    pub num_heads: usize,
    #[config(default = "DEFAULT_FF_DIM")]
    pub ff_dim: usize,
    /// Transformer blocks per stage.
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

/// Regional → synchronous → temporal.
#[derive(Module, Debug)]
pub struct Encoder<B: Backend> {
    pub regional: RegionalTransformer<B>,
    pub synchronous: SynchronousTransformer<B>,
    pub temporal: TemporalTransformer<B>,
}

impl EncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ModelResult<Encoder<B>> {
        let regional = RegionalTransformerConfig::new(self.sequence_length)
            .with_n_channels(self.n_channels)
            .with_convolution_dimension_length(self.convolution_dimension_length)
            .with_latent_dim(self.latent_dim)
            .with_num_heads(self.num_heads)
            .with_ff_dim(self.ff_dim)
            .with_num_layers(self.num_layers)
            .with_dropout(self.dropout)
            .with_norm_first(self.norm_first)
            .with_initializer(self.initializer.clone())
            .with_latent_initializer(self.latent_initializer.clone())
            .init(device)?;
        let synchronous = SynchronousTransformerConfig::new()
            .with_n_channels(self.n_channels)
            .with_convolution_dimension_length(self.convolution_dimension_length)
            .with_latent_dim(self.latent_dim)
            .with_num_heads(self.num_heads)
            .with_ff_dim(self.ff_dim)
            .with_num_layers(self.num_layers)
            .with_dropout(self.dropout)
            .with_norm_first(self.norm_first)
            .with_initializer(self.initializer.clone())
            .with_latent_initializer(self.latent_initializer.clone())
            .init(device)?;
        let temporal = TemporalTransformerConfig::new()
            .with_n_channels(self.n_channels)
            .with_sequence_length(self.convolution_dimension_length)
            .with_input_length(self.latent_dim)
            .with_latent_dim(self.latent_dim)
            .with_num_heads(self.num_heads)
            .with_ff_dim(self.ff_dim)
            .with_num_layers(self.num_layers)
            .with_dropout(self.dropout)
            .with_norm_first(self.norm_first)
            .with_initializer(self.initializer.clone())
            .with_latent_initializer(self.latent_initializer.clone())
            .init(device)?;
        Encoder::from_stages(regional, synchronous, temporal)
    }
}

impl<B: Backend> Encoder<B> {
    /// Chains independently built stages, checking that each one's output
    /// layout is what the next one was built to accept.
    pub fn from_stages(
        regional: RegionalTransformer<B>,
        synchronous: SynchronousTransformer<B>,
        temporal: TemporalTransformer<B>,
    ) -> ModelResult<Self> {
        let mismatch = |what: &str, upstream: usize, downstream: usize| {
            ModelError::invalid_config(format!(
                "{what} differs between stages: {upstream} upstream, {downstream} downstream"
            ))
        };

        if regional.n_channels() != synchronous.n_channels() {
            return Err(mismatch("n_channels", regional.n_channels(), synchronous.n_channels()));
        }
        if regional.convolution_dimension_length() != synchronous.convolution_dimension_length() {
            return Err(mismatch(
                "convolution_dimension_length",
                regional.convolution_dimension_length(),
                synchronous.convolution_dimension_length(),
            ));
        }
        if regional.latent_dim() != synchronous.latent_dim() {
            return Err(mismatch("latent_dim", regional.latent_dim(), synchronous.latent_dim()));
        }
        if synchronous.n_channels() != temporal.n_channels() {
            return Err(mismatch("n_channels", synchronous.n_channels(), temporal.n_channels()));
        }
        if synchronous.convolution_dimension_length() != temporal.sequence_length() {
            return Err(mismatch(
                "convolution_dimension_length",
                synchronous.convolution_dimension_length(),
                temporal.sequence_length(),
            ));
        }
        if synchronous.latent_dim() != temporal.input_length() {
            return Err(mismatch("latent_dim", synchronous.latent_dim(), temporal.input_length()));
        }

        Ok(Encoder { regional, synchronous, temporal })
    }

    pub fn latent_dim(&self) -> usize {
        self.temporal.latent_dim()
    }
}

impl<B: Backend> Stage<B, 4, 3> for Encoder<B> {
    /// `[batch, channel, sequence, depth]` → `[batch, depth, latent]`.
    fn forward(&self, input: Tensor<B, 4>) -> ModelResult<Tensor<B, 3>> {
        let x = self.regional.forward(input)?;
        let x = self.synchronous.forward(x)?;
        self.temporal.forward(x)
    }
}
