// Copyright (c) Soma Contributors
// SPDX-License-Identifier: Apache-2.0

//! Depth-wise temporal convolution front end.
//!
//! The first layer expands each EEG channel into `convolution_dimension_length`
//! feature maps (grouped convolution with one group per channel). Every later
//! layer is grouped the same way, so feature maps only ever mix with maps of
//! the same electrode. All layers use valid padding and trim
//! `kernel_size - 1` samples from the time axis; there is no activation
//! between layers.

use burn::{
    config::Config,
    module::Module,
    nn::{
        Dropout,
        DropoutConfig,
        Initializer,
        PaddingConfig1d,
        conv::{Conv1d, Conv1dConfig},
    },
    tensor::{Tensor, backend::Backend},
};
use tracing::{debug, trace};

use super::{check_dropout, check_positive};
use crate::{
    DEFAULT_CHANNELS,
    DEFAULT_CONVOLUTION_DIMENSION,
    DEFAULT_CONV_LAYERS,
    DEFAULT_DROPOUT,
    DEFAULT_KERNEL_SIZE,
    Stage,
    error::{ModelError, ModelResult},
    shape::{Axis, expect_shape},
};

const STAGE: &str = "convolution";

#[derive(Config, Debug)]
pub struct ConvolutionStackConfig {
    /// Number of EEG electrodes.
    #[config(default = "DEFAULT_CHANNELS")]
    pub n_channels: usize,
    /// Feature maps produced per electrode (the feature-depth axis).
    #[config(default = "DEFAULT_CONVOLUTION_DIMENSION")]
    pub convolution_dimension_length: usize,
    #[config(default = "DEFAULT_KERNEL_SIZE")]
    pub kernel_size: usize,
    #[config(default = "DEFAULT_CONV_LAYERS")]
    pub n_conv_layers: usize,
    /// Dropout applied before every convolution after the first.
    #[config(default = "DEFAULT_DROPOUT")]
    pub dropout: f64,
    /// The type of function used to initialize neural network parameters
    #[config(
        default = "Initializer::KaimingUniform{gain:1.0/num_traits::Float::sqrt(3.0), fan_out_only:false}"
    )]
    pub initializer: Initializer,
}

impl ConvolutionStackConfig {
    /// Samples removed from the time axis by the whole stack.
    pub fn time_trim(&self) -> usize {
        self.n_conv_layers * self.kernel_size.saturating_sub(1)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> ModelResult<ConvolutionStack<B>> {
        check_positive("n_channels", self.n_channels)?;
        check_positive("convolution_dimension_length", self.convolution_dimension_length)?;
        check_positive("kernel_size", self.kernel_size)?;
        if self.n_conv_layers < 1 {
            return Err(ModelError::invalid_config(
                "n_conv_layers must be at least 1 (the channel-expanding layer)",
            ));
        }
        check_dropout("convolution dropout", self.dropout)?;

        let width = self.n_channels * self.convolution_dimension_length;
        let conv = |channels_in: usize| {
            Conv1dConfig::new(channels_in, width, self.kernel_size)
                .with_groups(self.n_channels)
                .with_padding(PaddingConfig1d::Valid)
                .with_initializer(self.initializer.clone())
                .init(device)
        };

        debug!(config = ?self, "initialising convolution stack");
        Ok(ConvolutionStack {
            initial: conv(self.n_channels),
            subsequent: (1..self.n_conv_layers).map(|_| conv(width)).collect(),
            dropout: DropoutConfig::new(self.dropout).init(),
            n_channels: self.n_channels,
            convolution_dimension_length: self.convolution_dimension_length,
            time_trim: self.time_trim(),
        })
    }
}

#[derive(Module, Debug)]
pub struct ConvolutionStack<B: Backend> {
    initial: Conv1d<B>,
    subsequent: Vec<Conv1d<B>>,
    dropout: Dropout,
    n_channels: usize,
    convolution_dimension_length: usize,
    time_trim: usize,
}

impl<B: Backend> ConvolutionStack<B> {
    pub fn n_channels(&self) -> usize {
        self.n_channels
    }

    pub fn convolution_dimension_length(&self) -> usize {
        self.convolution_dimension_length
    }

    /// Time-axis length after the stack for an input of `time` samples, or
    /// `None` if the stack would consume the whole window.
    pub fn reduced_length(&self, time: usize) -> Option<usize> {
        time.checked_sub(self.time_trim).filter(|len| *len > 0)
    }

    /// `[batch, channel, time]` → `[batch, channel, feature_depth, reduced_time]`.
    pub fn feature_maps(&self, input: Tensor<B, 3>) -> ModelResult<Tensor<B, 4>> {
        let [batch_size, channels, time] = input.dims();
        expect_shape(
            STAGE,
            [batch_size, channels, time],
            [Axis::Any, Axis::Exactly(self.n_channels), Axis::Above(self.time_trim)],
        )?;

        let mut x = self.initial.forward(input);
        for conv in self.subsequent.iter() {
            x = conv.forward(self.dropout.forward(x));
        }
        let [_, _, reduced] = x.dims();
        trace!(stage = STAGE, input = ?[batch_size, channels, time], reduced, "convolved");

        Ok(x.reshape([batch_size, self.n_channels, self.convolution_dimension_length, reduced]))
    }
}

impl<B: Backend> Stage<B, 3, 4> for ConvolutionStack<B> {
    /// `[batch, channel, time]` → `[batch, channel, reduced_time, feature_depth]`.
    fn forward(&self, input: Tensor<B, 3>) -> ModelResult<Tensor<B, 4>> {
        Ok(self.feature_maps(input)?.permute([0, 1, 3, 2]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn single_layer_is_valid() {
        let device = Default::default();
        let stack = ConvolutionStackConfig::new()
            .with_n_conv_layers(1)
            .init::<TestBackend>(&device)
            .unwrap();
        assert!(stack.subsequent.is_empty());
        assert_eq!(stack.reduced_length(10), Some(8));
    }

    #[test]
    fn zero_layers_rejected() {
        let device = Default::default();
        let result =
            ConvolutionStackConfig::new().with_n_conv_layers(0).init::<TestBackend>(&device);
        assert!(matches!(result, Err(ModelError::InvalidConfig(_))));
    }

    #[test]
    fn reduced_length_accounts_for_kernel() {
        let config = ConvolutionStackConfig::new().with_kernel_size(5).with_n_conv_layers(2);
        assert_eq!(config.time_trim(), 8);

        let device = Default::default();
        let stack = config.init::<TestBackend>(&device).unwrap();
        assert_eq!(stack.reduced_length(9), Some(1));
        assert_eq!(stack.reduced_length(8), None);
        assert_eq!(stack.reduced_length(3), None);
    }

    #[test]
    fn parameter_count() {
        // Grouped conv: each output map sees `in / groups` inputs.
        let device = Default::default();
        let stack = ConvolutionStackConfig::new()
            .with_n_channels(2)
            .with_convolution_dimension_length(4)
            .with_kernel_size(3)
            .with_n_conv_layers(2)
            .init::<TestBackend>(&device)
            .unwrap();
        let initial = 8 * 1 * 3 + 8;
        let subsequent = 8 * 4 * 3 + 8;
        assert_eq!(stack.num_parameters(), initial + subsequent);
    }
}
