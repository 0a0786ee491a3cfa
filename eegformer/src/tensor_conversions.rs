// Copyright (c) Soma Contributors
// SPDX-License-Identifier: Apache-2.0

use std::borrow::Cow;

use burn::tensor::TensorData;
use ndarray::ArrayD;

use crate::error::{ModelError, ModelResult};

pub trait IntoTensorData {
    fn to_tensor_data(self) -> ModelResult<TensorData>;
}

impl IntoTensorData for ArrayD<f32> {
    fn to_tensor_data(self) -> ModelResult<TensorData> {
        let shape = self.shape().to_vec();
        if shape.iter().any(|len| *len == 0) {
            return Err(ModelError::EmptyData(format!("array of shape {shape:?} has no elements")));
        }
        let values = self.iter().copied().collect::<Vec<f32>>();
        Ok(TensorData::new(values, shape))
    }
}

/// Exposes an `f32` array to `safetensors::serialize` so fixtures and exported
/// weights can be written without a copy into an intermediate tensor type.
pub struct ArrayWrapper(pub ArrayD<f32>);

impl safetensors::View for ArrayWrapper {
    fn dtype(&self) -> safetensors::Dtype {
        safetensors::Dtype::F32
    }

    fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    fn data(&self) -> Cow<'_, [u8]> {
        // Logical (row-major) order, independent of the array's memory layout.
        Cow::Owned(self.0.iter().flat_map(|v| v.to_le_bytes()).collect())
    }

    fn data_len(&self) -> usize {
        self.0.len() * std::mem::size_of::<f32>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;
    use safetensors::View;

    #[test]
    fn tensor_data_keeps_logical_order() {
        let array = ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![1.0f32, 2.0, 3.0, 4.0]).unwrap();
        let transposed = array.reversed_axes();
        let data = transposed.to_tensor_data().unwrap();
        assert_eq!(data.to_vec::<f32>().unwrap(), vec![1.0, 3.0, 2.0, 4.0]);
    }

    #[test]
    fn empty_array_is_rejected() {
        let array = ArrayD::<f32>::zeros(IxDyn(&[0, 3]));
        assert!(matches!(array.to_tensor_data(), Err(ModelError::EmptyData(_))));
    }

    #[test]
    fn wrapper_serialises_little_endian() {
        let wrapper = ArrayWrapper(ArrayD::from_elem(IxDyn(&[2]), 1.0f32));
        assert_eq!(wrapper.data_len(), 8);
        assert_eq!(wrapper.data().as_ref(), [0, 0, 128, 63, 0, 0, 128, 63]);
    }
}
