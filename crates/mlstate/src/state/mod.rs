//! # ML State
//!
//! The state object itself, how it is created, and how a host engine finds
//! it by name.
//!
//! * [`MlState`] - the batching, training, persisting state
//! * [`MlStateCreator`] - builds states from creation parameters or from a
//!   saved container
//! * [`SharedStates`] - the name-to-state registry passed to [`fit`],
//!   [`predict`] and [`flush`]

mod creator;
mod diagnostics;
mod functions;
mod ml_state;
mod registry;

pub use creator::MlStateCreator;
pub use functions::{fit, flush, predict};
pub use ml_state::{MlState, Record, DATA_FIELD};
pub use registry::{SharedState, SharedStates};
