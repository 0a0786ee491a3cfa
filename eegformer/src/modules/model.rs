// Copyright (c) Soma Contributors
// SPDX-License-Identifier: Apache-2.0

use burn::{
    config::Config,
    module::Module,
    nn::Initializer,
    store::SafetensorsStore,
    tensor::{Tensor, backend::Backend},
};
use tracing::{debug, trace};

use super::{
    check_dropout,
    convolution::{ConvolutionStack, ConvolutionStackConfig},
    decoder::{RegressionDecoder, RegressionDecoderConfig},
    encoder::{Encoder, EncoderConfig},
};
use crate::{
    DEFAULT_CHANNELS,
    DEFAULT_CONVOLUTION_DIMENSION,
    DEFAULT_CONV_LAYERS,
    DEFAULT_DROPOUT,
    DEFAULT_FF_DIM,
    DEFAULT_HIDDEN_DIM,
    DEFAULT_KERNEL_SIZE,
    DEFAULT_LATENT_DIM,
    DEFAULT_NUM_HEADS,
    DEFAULT_NUM_LAYERS,
    DEFAULT_OUTPUT_DIM,
    DEFAULT_SEQUENCE_LENGTH,
    Stage,
    error::{ModelError, ModelResult},
    shape::{Axis, expect_shape},
    weights::load_weights,
};

const STAGE: &str = "eegformer";

#[derive(Config, Debug)]
pub struct EegFormerConfig {
    /// Samples per EEG window.
    #[config(default = "DEFAULT_SEQUENCE_LENGTH")]
    pub sequence_length: usize,
    /// Feature maps per electrode produced by the convolution stack.
    #[config(default = "DEFAULT_CONVOLUTION_DIMENSION")]
    pub convolution_dimension_length: usize,
    #[config(default = "DEFAULT_KERNEL_SIZE")]
    pub kernel_size: usize,
    #[config(default = "DEFAULT_CONV_LAYERS")]
    pub n_conv_layers: usize,
    #[config(default = "DEFAULT_CHANNELS")]
    pub n_channels: usize,
    /// Latent width of every transformer and the decoder input width.
    #[config(default = "DEFAULT_LATENT_DIM")]
    pub input_dim: usize,
    #[config(default = "DEFAULT_NUM_HEADS")]
    pub num_heads: usize,
    #[config(default = "DEFAULT_FF_DIM")]
    pub ff_dim: usize,
    /// Transformer blocks per encoder stage.
    #[config(default = "DEFAULT_NUM_LAYERS")]
    pub num_layers: usize,
    /// Shared by the convolution stack and every transformer block.
    #[config(default = "DEFAULT_DROPOUT")]
    pub dropout: f64,
    #[config(default = "DEFAULT_HIDDEN_DIM")]
    pub hidden_dim: usize,
    #[config(default = "DEFAULT_OUTPUT_DIM")]
    pub output_dim: usize,
    #[config(default = false)]
    pub norm_first: bool,
    /// The type of function used to initialize neural network parameters
    #[config(
        default = "Initializer::KaimingUniform{gain:1.0/num_traits::Float::sqrt(3.0), fan_out_only:false}"
    )]
    pub weight_initializer: Initializer,
    /// Initialiser for latent mapping matrices and positional encodings.
    #[config(default = "Initializer::Normal{mean:0.0, std:1.0}")]
    pub latent_initializer: Initializer,
}

impl EegFormerConfig {
    fn convolution(&self) -> ConvolutionStackConfig {
        ConvolutionStackConfig::new()
            .with_n_channels(self.n_channels)
            .with_convolution_dimension_length(self.convolution_dimension_length)
            .with_kernel_size(self.kernel_size)
            .with_n_conv_layers(self.n_conv_layers)
            .with_dropout(self.dropout)
            .with_initializer(self.weight_initializer.clone())
    }

    /// Time-axis length the encoder sees after the convolution stack.
    pub fn reduced_sequence_length(&self) -> ModelResult<usize> {
        let trim = self.convolution().time_trim();
        self.sequence_length.checked_sub(trim).filter(|len| *len > 0).ok_or_else(|| {
            ModelError::invalid_config(format!(
                "sequence_length {} does not survive {} convolution layers of kernel {} (trim {trim})",
                self.sequence_length, self.n_conv_layers, self.kernel_size
            ))
        })
    }

    /// Initialize a new module.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ModelResult<EegFormer<B>> {
        check_dropout("dropout", self.dropout)?;
        let reduced = self.reduced_sequence_length()?;

        let convolution = self.convolution().init(device)?;
        let encoder = EncoderConfig::new(reduced)
            .with_n_channels(self.n_channels)
            .with_convolution_dimension_length(self.convolution_dimension_length)
            .with_latent_dim(self.input_dim)
            .with_num_heads(self.num_heads)
            .with_ff_dim(self.ff_dim)
            .with_num_layers(self.num_layers)
            .with_dropout(self.dropout)
            .with_norm_first(self.norm_first)
            .with_initializer(self.weight_initializer.clone())
            .with_latent_initializer(self.latent_initializer.clone())
            .init(device)?;
        let decoder = RegressionDecoderConfig::new()
            .with_input_dim(self.input_dim)
            .with_hidden_dim(self.hidden_dim)
            .with_output_dim(self.output_dim)
            .with_initializer(self.weight_initializer.clone())
            .init(device)?;

        let model = EegFormer::new(convolution, encoder, decoder, self.sequence_length)?;
        debug!(num_params = model.num_params(), reduced, "initialised eegformer");
        Ok(model)
    }
}

/// Convolution stack → encoder → mean over feature maps → regression decoder.
#[derive(Module, Debug)]
pub struct EegFormer<B: Backend> {
    pub convolution: ConvolutionStack<B>,
    pub encoder: Encoder<B>,
    pub decoder: RegressionDecoder<B>,
    sequence_length: usize,
}

impl<B: Backend> EegFormer<B> {
    pub fn new(
        convolution: ConvolutionStack<B>,
        encoder: Encoder<B>,
        decoder: RegressionDecoder<B>,
        sequence_length: usize,
    ) -> ModelResult<Self> {
        let regional = &encoder.regional;
        if convolution.n_channels() != regional.n_channels()
            || convolution.convolution_dimension_length() != regional.convolution_dimension_length()
        {
            return Err(ModelError::invalid_config(format!(
                "convolution stack emits {} channels x {} maps, encoder expects {} x {}",
                convolution.n_channels(),
                convolution.convolution_dimension_length(),
                regional.n_channels(),
                regional.convolution_dimension_length()
            )));
        }
        if convolution.reduced_length(sequence_length) != Some(regional.sequence_length()) {
            return Err(ModelError::invalid_config(format!(
                "windows of {sequence_length} samples do not reduce to the encoder's {}",
                regional.sequence_length()
            )));
        }
        if encoder.latent_dim() != decoder.input_dim() {
            return Err(ModelError::invalid_config(format!(
                "encoder latent_dim {} does not match decoder input_dim {}",
                encoder.latent_dim(),
                decoder.input_dim()
            )));
        }
        Ok(Self { convolution, encoder, decoder, sequence_length })
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    pub fn output_dim(&self) -> usize {
        self.decoder.output_dim()
    }

    /// Loads pretrained weights; see [`load_weights`].
    pub fn load_weights(&mut self, store: &mut SafetensorsStore) -> ModelResult<()> {
        load_weights::<B, _>(self, store)
    }
}

impl<B: Backend> Stage<B, 3, 2> for EegFormer<B> {
    /// `[batch, channel, time]` → `[batch, output_dim]`.
    fn forward(&self, input: Tensor<B, 3>) -> ModelResult<Tensor<B, 2>> {
        let [batch_size, channels, time] = input.dims();
        expect_shape(
            STAGE,
            [batch_size, channels, time],
            [
                Axis::Any,
                Axis::Exactly(self.convolution.n_channels()),
                Axis::Exactly(self.sequence_length),
            ],
        )?;

        let features = self.convolution.forward(input)?;
        let encoded = self.encoder.forward(features)?;
        let [_, _, latent] = encoded.dims();
        let pooled = encoded.mean_dim(1).reshape([batch_size, latent]);
        trace!(stage = STAGE, shape = ?pooled.dims(), "pooled over feature maps");

        Stage::<B, 2, 2>::forward(&self.decoder, pooled)
    }
}
