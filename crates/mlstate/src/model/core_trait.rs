use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use crate::config::ModelIdentity;
use crate::error::ModelError;

/// A live handle to a model implementation.
///
/// An [`MlState`](crate::state::MlState) owns exactly one handle and is the
/// only caller of these methods.
///
/// # Concurrency
///
/// `fit`, `predict` and `save` take `&self` and are invoked while the state
/// holds only its shared lock, so several of them can run at the same time.
/// Implementations must make that safe themselves, typically with interior
/// mutability or a lock around whatever the training step mutates.
///
/// # Example
///
/// ```ignore
/// use mlstate::model::Model;
/// use mlstate::error::ModelError;
/// use async_trait::async_trait;
///
/// struct Counter {
///     seen: std::sync::atomic::AtomicUsize,
/// }
///
/// #[async_trait]
/// impl Model for Counter {
///     async fn fit(&self, batch: Vec<Value>) -> Result<Value, ModelError> {
///         self.seen.fetch_add(batch.len(), Ordering::SeqCst);
///         Ok(Value::Null)
///     }
///     // ...
/// }
/// ```
#[async_trait]
pub trait Model: Send + Sync {
    /// Trains on one batch, in arrival order.
    ///
    /// The returned value is handed back to the caller as-is. When it is an
    /// object with numeric `loss` and `accuracy` fields, a state writing
    /// through [`MlState::write`](crate::state::MlState::write) logs them.
    async fn fit(&self, batch: Vec<Value>) -> Result<Value, ModelError>;

    /// Applies the model to a single value.
    async fn predict(&self, value: Value) -> Result<Value, ModelError>;

    /// Streams the model's opaque payload into `writer`.
    ///
    /// The container header has already been written. Whatever is written
    /// here is exactly what [`ModelFactory::load`] receives later.
    async fn save(
        &self,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
        params: &Map<String, Value>,
    ) -> Result<(), ModelError>;

    /// Frees whatever the model holds outside of Rust's ownership.
    ///
    /// Called exactly once, right before the handle is dropped.
    async fn release(&mut self) -> Result<(), ModelError> {
        Ok(())
    }
}

/// Builds model handles, either from scratch or from a persisted payload.
#[async_trait]
pub trait ModelFactory: Send + Sync {
    /// Creates a fresh, untrained model.
    async fn create(
        &self,
        identity: &ModelIdentity,
        params: &Map<String, Value>,
    ) -> Result<Box<dyn Model>, ModelError>;

    /// Rebuilds a model from the payload produced by [`Model::save`].
    ///
    /// `reader` is positioned at the first payload byte and ends where the
    /// container ends.
    async fn load(
        &self,
        identity: &ModelIdentity,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        params: &Map<String, Value>,
    ) -> Result<Box<dyn Model>, ModelError>;
}
