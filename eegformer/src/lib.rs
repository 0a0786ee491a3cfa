// Copyright (c) Soma Contributors
// SPDX-License-Identifier: Apache-2.0

//! EEGformer: raw multi-channel EEG in, continuous regression targets out.
//!
//! The pipeline runs strictly forward through
//! [`ConvolutionStack`](modules::convolution::ConvolutionStack) →
//! [`RegionalTransformer`](modules::regional::RegionalTransformer) →
//! [`SynchronousTransformer`](modules::synchronous::SynchronousTransformer) →
//! [`TemporalTransformer`](modules::temporal::TemporalTransformer) →
//! [`RegressionDecoder`](modules::decoder::RegressionDecoder), with
//! [`EegFormer`](modules::model::EegFormer) wiring the whole chain.

use burn::{
    module::Module,
    tensor::{Tensor, backend::Backend},
};

use crate::error::ModelResult;

pub mod error;
pub mod modules;
pub mod records;
pub(crate) mod shape;
pub mod tensor_conversions;
pub mod weights;

pub const DEFAULT_SEQUENCE_LENGTH: usize = 1000;
pub const DEFAULT_CONVOLUTION_DIMENSION: usize = 64;
pub const DEFAULT_KERNEL_SIZE: usize = 3;
pub const DEFAULT_CONV_LAYERS: usize = 3;
pub const DEFAULT_CHANNELS: usize = 8;
pub const DEFAULT_LATENT_DIM: usize = 128;
pub const DEFAULT_NUM_HEADS: usize = 8;
pub const DEFAULT_FF_DIM: usize = DEFAULT_LATENT_DIM * 2;
pub const DEFAULT_NUM_LAYERS: usize = 2;
pub const DEFAULT_DROPOUT: f64 = 0.1;
pub const DEFAULT_HIDDEN_DIM: usize = 64;
/// Accelerometer x, y, z.
pub const DEFAULT_OUTPUT_DIM: usize = 3;

/// A pipeline stage: a pure function of its learned parameters and one input
/// tensor of rank `I`, producing a tensor of rank `O`.
///
/// Parameter ownership, enumeration and persistence come from the [`Module`]
/// supertrait. Implementations check the incoming shape against their
/// construction-time contract and return
/// [`ModelError::ShapeMismatch`](error::ModelError::ShapeMismatch) rather than
/// broadcasting across unrelated axes.
pub trait Stage<B: Backend, const I: usize, const O: usize>: Module<B> {
    fn forward(&self, input: Tensor<B, I>) -> ModelResult<Tensor<B, O>>;

    /// Number of learned scalars owned by this stage.
    fn num_parameters(&self) -> usize {
        self.num_params()
    }
}

pub use modules::model::{EegFormer, EegFormerConfig};
