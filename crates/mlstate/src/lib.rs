//! # mlstate
//!
//! A shared model state for streaming engines: it batches incoming records,
//! trains an external model on each full batch, answers predictions, and
//! persists itself to a versioned binary container.
//!
//! ## Overview
//!
//! A host engine creates one [`MlState`](state::MlState) per named model and
//! feeds it records. Each record carries the value to train on in its `data`
//! field. Once `batch_train_size` values are pending, the whole batch is
//! passed to the model's `fit` and the buffer starts over. Prediction
//! requests skip the buffer and go straight to the model.
//!
//! Key components include:
//!
//! - A batch buffer that preserves arrival order
//! - A model interface the actual training backend plugs into
//! - A container codec for saving and restoring states
//! - A name-to-state registry for the `fit`/`predict`/`flush` entry points
//!
//! ## Architecture
//!
//! ### Model traits
//!
//! The [`Model`](model::Model) and [`ModelFactory`](model::ModelFactory)
//! traits are the only contact between this crate and the code that really
//! trains. Backends that can only persist to a file implement
//! [`FileModel`](model::FileModel) and are bridged with
//! [`ScratchFileFactory`](model::ScratchFileFactory).
//!
//! ### Concurrency
//!
//! Each state owns one reader/writer lock. Writes, flushes, loads and
//! termination take it exclusively; fits, predictions and saves share it.
//! Models therefore have to accept concurrent `fit`/`predict` calls.
//!
//! ### Persistence
//!
//! ```text
//! [version: u8 = 1][metadata length: u32 LE][metadata: MessagePack][model payload ...]
//! ```
//!
//! The metadata holds the model identity and the batch size; the payload is
//! produced and consumed by the model alone. A load builds the new model
//! completely before swapping it in, so a failed load leaves the state as it
//! was.
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events and never installs a subscriber.
//!

pub mod buffer;
pub mod codec;
pub mod config;
pub mod error;
pub mod model;
pub mod state;

pub use error::{MlStateError, ModelError, Result};
