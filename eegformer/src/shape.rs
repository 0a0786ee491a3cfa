// Copyright (c) Soma Contributors
// SPDX-License-Identifier: Apache-2.0

//! Stage-boundary shape assertions.
//!
//! Every stage reinterprets the same feature tensor along a different axis, so
//! a tensor with the right element count but the wrong axis order would flow
//! through the reshapes silently. Each forward pass states the layout it
//! accepts as a list of [`Axis`] constraints and rejects anything else before
//! the first tensor operation.

use std::fmt;

use crate::error::{ModelError, ModelResult};

/// Constraint on a single axis of a stage input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Axis {
    /// Any non-zero length (used for the batch axis).
    Any,
    Exactly(usize),
    /// Strictly longer than the given length.
    Above(usize),
}

impl Axis {
    fn admits(self, len: usize) -> bool {
        match self {
            Axis::Any => len > 0,
            Axis::Exactly(expected) => len == expected,
            Axis::Above(min) => len > min,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Any => write!(f, "*"),
            Axis::Exactly(len) => write!(f, "{len}"),
            Axis::Above(min) => write!(f, ">{min}"),
        }
    }
}

struct Layout<'a>(&'a [Axis]);

impl fmt::Display for Layout<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, axis) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{axis}")?;
        }
        write!(f, "]")
    }
}

pub(crate) fn expect_shape<const D: usize>(
    stage: &'static str,
    actual: [usize; D],
    expected: [Axis; D],
) -> ModelResult<()> {
    if actual.iter().zip(expected.iter()).all(|(len, axis)| axis.admits(*len)) {
        return Ok(());
    }
    Err(ModelError::ShapeMismatch {
        stage,
        expected: Layout(&expected).to_string(),
        actual: actual.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_matching_layout() {
        let expected = [Axis::Any, Axis::Exactly(8), Axis::Above(6)];
        assert!(expect_shape("conv", [11, 8, 1000], expected).is_ok());
    }

    #[test]
    fn rejects_and_describes_mismatch() {
        let expected = [Axis::Any, Axis::Exactly(8), Axis::Above(6)];
        let err = expect_shape("conv", [11, 8, 6], expected).unwrap_err();
        assert_eq!(
            err,
            ModelError::ShapeMismatch {
                stage: "conv",
                expected: "[*, 8, >6]".to_string(),
                actual: vec![11, 8, 6],
            }
        );
    }

    #[test]
    fn empty_batch_is_rejected() {
        assert!(expect_shape("decoder", [0, 4], [Axis::Any, Axis::Exactly(4)]).is_err());
    }
}
