// Copyright (c) Soma Contributors
// SPDX-License-Identifier: Apache-2.0

use strum_macros::IntoStaticStr;
use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Clone, Debug, Error, IntoStaticStr, PartialEq)]
pub enum ModelError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Shape mismatch in {stage}: expected {expected}, got {actual:?}")]
    ShapeMismatch { stage: &'static str, expected: String, actual: Vec<usize> },
    #[error("SafeTensor store error: {0}")]
    SafeTensorStoreError(String),
    #[error("Weights could not be applied to the module")]
    ApplyError,
    #[error("Empty data: {0}")]
    EmptyData(String),
}

impl ModelError {
    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_names_are_static() {
        let err = ModelError::ShapeMismatch {
            stage: "regional",
            expected: "[*, 8, 994, 64]".into(),
            actual: vec![2, 8, 994, 32],
        };
        let name: &'static str = (&err).into();
        assert_eq!(name, "ShapeMismatch");
        assert_eq!(
            err.to_string(),
            "Shape mismatch in regional: expected [*, 8, 994, 64], got [2, 8, 994, 32]"
        );
    }
}
