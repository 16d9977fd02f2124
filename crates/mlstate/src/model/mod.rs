//! # Model Execution Interface
//!
//! This module defines what an ML state needs from the model that actually
//! trains and predicts. The state never looks inside the model; it only
//! calls four operations on it:
//!
//! - `fit(batch) -> value`
//! - `predict(value) -> value`
//! - `save(writer)`
//! - `load(reader) -> model`, through a [`ModelFactory`]
//!
//! Any backend can sit behind these traits: an embedded interpreter, a
//! subprocess, a remote service, or a native Rust model.
//!
//! ## Scratch files
//!
//! Backends that cannot stream their persisted form can implement
//! [`FileModel`] and [`FileModelFactory`] instead and be wrapped with
//! [`ScratchFileFactory`], which moves bytes through a temporary file that
//! is always cleaned up.

mod core_trait;
mod scratch;

pub use core_trait::{Model, ModelFactory};

pub use scratch::{
    FileModel,
    FileModelFactory,
    ScratchConfig,
    ScratchFileFactory,
    ScratchFileModel,
};

#[cfg(test)]
/// Mock model implementation.
///
/// Records fit batches and lifecycle calls for assertions
pub(crate) mod mock_model;
