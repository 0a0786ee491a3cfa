// Copyright (c) Soma Contributors
// SPDX-License-Identifier: Apache-2.0

//! Deterministic array generators for model fixtures.
//!
//! Every generator is keyed by a `u64` seed so the same call always yields the
//! same values, which lets tests pin weights and inputs without shipping data
//! files.

use ndarray::{ArrayD, IxDyn};
use ndarray_rand::{
    RandomExt,
    rand_distr::{Normal, Uniform},
};
use rand::{SeedableRng, rngs::StdRng};

pub fn uniform_array(seed: u64, shape: &[usize], min: f32, max: f32) -> ArrayD<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let dist = Uniform::new(min, max);
    ArrayD::random_using(IxDyn(shape), dist, &mut rng)
}

/// Panics if `std_dev` is negative or not finite.
pub fn normal_array(seed: u64, shape: &[usize], mean: f32, std_dev: f32) -> ArrayD<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let dist = Normal::new(mean, std_dev)
        .unwrap_or_else(|e| panic!("invalid normal distribution (std_dev={std_dev}): {e}"));
    ArrayD::random_using(IxDyn(shape), dist, &mut rng)
}

pub fn constant_array(shape: &[usize], value: f32) -> ArrayD<f32> {
    ArrayD::from_elem(IxDyn(shape), value)
}

/// Row-major `0, 1, 2, ...` scaled by `step`. Handy when a test needs to track
/// where each element ends up after a reshape.
pub fn ramp_array(shape: &[usize], step: f32) -> ArrayD<f32> {
    let len = shape.iter().product::<usize>();
    let values = (0..len).map(|i| i as f32 * step).collect::<Vec<_>>();
    ArrayD::from_shape_vec(IxDyn(shape), values)
        .unwrap_or_else(|e| panic!("ramp of {len} elements does not fit {shape:?}: {e}"))
}
