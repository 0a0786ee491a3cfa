// Copyright (c) Soma Contributors
// SPDX-License-Identifier: Apache-2.0

use burn::{
    config::Config,
    module::Module,
    nn::{Initializer, Linear, LinearConfig, Relu},
    tensor::{Tensor, backend::Backend},
};

use super::check_positive;
use crate::{
    DEFAULT_HIDDEN_DIM,
    DEFAULT_LATENT_DIM,
    DEFAULT_OUTPUT_DIM,
    Stage,
    error::{ModelError, ModelResult},
};

const STAGE: &str = "decoder";

#[derive(Config, Debug)]
pub struct RegressionDecoderConfig {
    #[config(default = "DEFAULT_LATENT_DIM")]
    pub input_dim: usize,
    #[config(default = "DEFAULT_HIDDEN_DIM")]
    pub hidden_dim: usize,
    #[config(default = "DEFAULT_OUTPUT_DIM")]
    pub output_dim: usize,
    /// The type of function used to initialize neural network parameters
    #[config(
        default = "Initializer::KaimingUniform{gain:1.0/num_traits::Float::sqrt(3.0), fan_out_only:false}"
    )]
    pub initializer: Initializer,
}

/// Two fully-connected layers with a ReLU between them. The output is left
/// unactivated: values are unconstrained regression targets.
#[derive(Module, Debug)]
pub struct RegressionDecoder<B: Backend> {
    pub fc1: Linear<B>,
    pub fc2: Linear<B>,
    activation: Relu,
    input_dim: usize,
    output_dim: usize,
}

impl RegressionDecoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ModelResult<RegressionDecoder<B>> {
        check_positive("input_dim", self.input_dim)?;
        check_positive("hidden_dim", self.hidden_dim)?;
        check_positive("output_dim", self.output_dim)?;

        Ok(RegressionDecoder {
            fc1: LinearConfig::new(self.input_dim, self.hidden_dim)
                .with_initializer(self.initializer.clone())
                .init(device),
            fc2: LinearConfig::new(self.hidden_dim, self.output_dim)
                .with_initializer(self.initializer.clone())
                .init(device),
            activation: Relu::new(),
            input_dim: self.input_dim,
            output_dim: self.output_dim,
        })
    }
}

impl<B: Backend> RegressionDecoder<B> {
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn output_dim(&self) -> usize {
        self.output_dim
    }
}

/// Applies to the trailing axis of a tensor of any rank.
impl<B: Backend, const D: usize> Stage<B, D, D> for RegressionDecoder<B> {
    fn forward(&self, input: Tensor<B, D>) -> ModelResult<Tensor<B, D>> {
        let dims = input.dims();
        if dims.iter().any(|len| *len == 0) || dims.last() != Some(&self.input_dim) {
            return Err(ModelError::ShapeMismatch {
                stage: STAGE,
                expected: format!("[..., {}]", self.input_dim),
                actual: dims.to_vec(),
            });
        }

        let x = self.activation.forward(self.fc1.forward(input));
        Ok(self.fc2.forward(x))
    }
}
