// Copyright (c) Soma Contributors
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use burn::{
    module::Module,
    store::{ModuleSnapshot, SafetensorsStore},
    tensor::backend::Backend,
};
use tracing::debug;

use crate::error::{ModelError, ModelResult};

/// Applies a safetensors snapshot to `module`, keyed by field path
/// (`encoder.regional.latent_mapping`, `decoder.fc1.weight`, ...).
///
/// The snapshot must cover every parameter of `module`; a snapshot with
/// missing or mismatched tensors yields [`ModelError::ApplyError`].
pub fn load_weights<B, M>(module: &mut M, store: &mut SafetensorsStore) -> ModelResult<()>
where
    B: Backend,
    M: Module<B>,
{
    let apply_results = ModuleSnapshot::<B>::load_from(module, store)
        .map_err(|e| ModelError::SafeTensorStoreError(e.to_string()))?;

    if !apply_results.is_success() || !apply_results.missing.is_empty() {
        debug!(missing = ?apply_results.missing, "snapshot does not cover the module");
        return Err(ModelError::ApplyError);
    }
    debug!(num_params = module.num_params(), "applied safetensors weights");
    Ok(())
}

/// Builds a store over an in-memory safetensors buffer. Coverage is checked
/// by [`load_weights`] rather than by the store.
pub fn store_from_bytes(bytes: Vec<u8>) -> SafetensorsStore {
    SafetensorsStore::from_bytes(Some(bytes)).allow_partial(true)
}

/// Builds a store over a safetensors file on disk.
pub fn store_from_file(path: impl Into<PathBuf>) -> SafetensorsStore {
    SafetensorsStore::from_file(path).allow_partial(true)
}
