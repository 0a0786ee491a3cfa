// Copyright (c) Soma Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::error::{ModelError, ModelResult};

pub mod attention;
pub mod block;
pub mod convolution;
pub mod decoder;
pub mod encoder;
pub mod model;
pub mod pwff;
pub mod regional;
pub mod synchronous;
pub mod temporal;

/// Dropout must leave something to propagate: `[0, 1)`.
pub(crate) fn check_dropout(name: &str, dropout: f64) -> ModelResult<()> {
    if (0.0..1.0).contains(&dropout) {
        Ok(())
    } else {
        Err(ModelError::invalid_config(format!("{name} must be in [0, 1), got {dropout}")))
    }
}

pub(crate) fn check_positive(name: &str, value: usize) -> ModelResult<()> {
    if value == 0 {
        return Err(ModelError::invalid_config(format!("{name} must be at least 1")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropout_range() {
        assert!(check_dropout("dropout", 0.0).is_ok());
        assert!(check_dropout("dropout", 0.99).is_ok());
        assert!(check_dropout("dropout", 1.0).is_err());
        assert!(check_dropout("dropout", 1.1).is_err());
        assert!(check_dropout("dropout", -0.1).is_err());
        assert!(check_dropout("dropout", f64::NAN).is_err());
    }

    #[test]
    fn zero_is_not_positive() {
        assert_eq!(
            check_positive("num_layers", 0),
            Err(ModelError::InvalidConfig("num_layers must be at least 1".into()))
        );
        assert!(check_positive("num_layers", 1).is_ok());
    }
}
