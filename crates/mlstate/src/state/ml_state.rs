use std::sync::Arc;
use serde_json::{Map, Value};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::RwLock;
use tracing::{debug, error, warn};
use crate::buffer::BatchBuffer;
use crate::codec::{self, StateMetadata};
use crate::config::{MlParams, MlStateConfig, ModelIdentity};
use crate::error::{MlStateError, Result};
use crate::model::{Model, ModelFactory};
use super::diagnostics::FitMetrics;

/// Name of the record field holding the value(s) to train on.
pub const DATA_FIELD: &str = "data";

/// A record as delivered by the host engine.
pub type Record = Map<String, Value>;

/// Everything guarded by the state's lock.
struct Inner {
    identity: ModelIdentity,
    params: MlParams,
    buffer: BatchBuffer<Value>,

    /// `None` once terminated; the handle is moved out exactly once
    model: Option<Box<dyn Model>>,
}

impl Inner {
    fn new(identity: ModelIdentity, params: MlParams, model: Box<dyn Model>) -> Self {
        Self {
            buffer: BatchBuffer::with_threshold(params.batch_train_size()),
            identity,
            params,
            model: Some(model),
        }
    }

    fn model(&self) -> Result<&dyn Model> {
        self.model.as_deref().ok_or(MlStateError::AlreadyTerminated)
    }
}

/// # MlState
///
/// A shared model state that trains in batches and persists itself.
///
/// Records written to the state are accumulated until `batch_train_size` of
/// them are pending, at which point the whole batch is handed to the model's
/// `fit`. Predictions go straight to the model. The state can be saved to a
/// byte stream and restored from one, and it is released for good by
/// [`terminate`](Self::terminate).
///
/// ## Locking
///
/// One reader/writer lock guards the buffer, the parameters, and the model
/// handle:
///
/// * exclusive: [`write`](Self::write), [`flush`](Self::flush),
///   [`load`](Self::load), [`terminate`](Self::terminate)
/// * shared: [`fit`](Self::fit), [`predict`](Self::predict),
///   [`save`](Self::save)
///
/// Shared operations may run concurrently against the same model, which is
/// why [`Model`] implementations have to tolerate concurrent calls.
///
/// ## Batching modes
///
/// * `batch_train_size > 1`: values are buffered; the write that fills the
///   buffer fits on all of them and empties the buffer, whether or not the
///   fit succeeds. A failed batch is not retried.
/// * `batch_train_size == 1`: every write fits immediately. An array value
///   is used as the batch as-is; any other value becomes a one-element batch.
pub struct MlState {
    factory: Arc<dyn ModelFactory>,
    inner: RwLock<Inner>,
}

impl MlState {
    /// Creates a state around a freshly created model.
    ///
    /// # Errors
    ///
    /// Model creation failures are returned as [`MlStateError::Model`].
    pub async fn create(factory: Arc<dyn ModelFactory>, config: MlStateConfig) -> Result<Self> {
        let model = factory.create(&config.identity, &config.init_params).await?;
        debug!(
            module_name = %config.identity.module_name,
            class_name = %config.identity.class_name,
            batch_train_size = config.params.batch_train_size(),
            "created ML state"
        );
        Ok(Self {
            inner: RwLock::new(Inner::new(config.identity, config.params, model)),
            factory,
        })
    }

    /// Builds a state from a container produced by [`save`](Self::save).
    ///
    /// `params` is forwarded to the factory's `load`.
    pub async fn restore<R>(
        factory: Arc<dyn ModelFactory>,
        reader: &mut R,
        params: &Map<String, Value>,
    ) -> Result<Self>
    where
        R: AsyncRead + Send + Unpin,
    {
        let (identity, ml_params, model) = Self::read_container(factory.as_ref(), reader, params).await?;
        Ok(Self {
            inner: RwLock::new(Inner::new(identity, ml_params, model)),
            factory,
        })
    }

    /// Adds a record's `data` field to the pending batch, training once the
    /// batch is complete.
    ///
    /// # Errors
    ///
    /// * [`MlStateError::AlreadyTerminated`] after [`terminate`](Self::terminate)
    /// * [`MlStateError::FieldMissing`] when the record has no `data` field;
    ///   the buffer is left untouched
    /// * [`MlStateError::Model`] when the fit fails; the batch is dropped
    pub async fn write(&self, record: &Record) -> Result<()> {
        let mut inner = self.inner.write().await;
        let Inner { params, buffer, model, .. } = &mut *inner;
        let model = model.as_deref().ok_or(MlStateError::AlreadyTerminated)?;

        let value = record
            .get(DATA_FIELD)
            .cloned()
            .ok_or_else(|| MlStateError::FieldMissing(DATA_FIELD.to_string()))?;

        let batch = if params.batch_train_size() > 1 {
            buffer.push(value);
            if !buffer.is_full() {
                return Ok(());
            }
            buffer.drain()
        } else {
            match value {
                Value::Array(values) => values,
                single => vec![single],
            }
        };

        let batch_size = batch.len();
        match model.fit(batch).await {
            Ok(result) => {
                if let Some(metrics) = FitMetrics::from_fit_result(&result, batch_size) {
                    debug!(
                        loss = metrics.loss,
                        accuracy = metrics.accuracy,
                        batch_size,
                        "trained via write"
                    );
                }
                Ok(())
            }
            Err(err) => {
                error!(batch_size, error = %err, "training via write failed");
                Err(err.into())
            }
        }
    }

    /// Trains on `batch` right away, bypassing the buffer.
    pub async fn fit(&self, batch: Vec<Value>) -> Result<Value> {
        let inner = self.inner.read().await;
        Ok(inner.model()?.fit(batch).await?)
    }

    /// Trains on a list of records, each passed to the model as an object.
    pub async fn fit_records(&self, records: Vec<Record>) -> Result<Value> {
        self.fit(records.into_iter().map(Value::Object).collect()).await
    }

    /// Applies the model to `value` and returns its answer unchanged.
    pub async fn predict(&self, value: Value) -> Result<Value> {
        let inner = self.inner.read().await;
        Ok(inner.model()?.predict(value).await?)
    }

    /// Drops the pending batch without training on it.
    pub async fn flush(&self) {
        let mut inner = self.inner.write().await;
        let discarded = inner.buffer.len();
        inner.buffer.clear();
        if discarded > 0 {
            debug!(discarded, "flushed pending batch");
        }
    }

    /// Writes the container header followed by the model's payload.
    ///
    /// The payload is streamed by the model directly into `writer`. `params`
    /// is forwarded to the model's `save`.
    pub async fn save<W>(&self, writer: &mut W, params: &Map<String, Value>) -> Result<()>
    where
        W: AsyncWrite + Send + Unpin,
    {
        let inner = self.inner.read().await;
        let model = inner.model()?;

        let metadata = StateMetadata::new(&inner.identity, &inner.params);
        codec::write_header(writer, &metadata).await?;
        model.save(&mut *writer, params).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Replaces the model and parameters with those stored in a container.
    ///
    /// The new model is fully built before anything is swapped, so on error
    /// the state keeps its previous model, parameters, and pending batch. On
    /// success the pending batch is discarded and the previous model released.
    pub async fn load<R>(&self, reader: &mut R, params: &Map<String, Value>) -> Result<()>
    where
        R: AsyncRead + Send + Unpin,
    {
        let mut inner = self.inner.write().await;
        if inner.model.is_none() {
            return Err(MlStateError::AlreadyTerminated);
        }

        let (identity, ml_params, model) = Self::read_container(self.factory.as_ref(), reader, params).await?;
        let buffer = BatchBuffer::with_threshold(ml_params.batch_train_size());

        let previous = inner.model.replace(model);
        inner.buffer = buffer;
        inner.identity = identity;
        inner.params = ml_params;
        drop(inner);

        if let Some(mut previous) = previous {
            if let Err(err) = previous.release().await {
                warn!(error = %err, "cannot release the model replaced by load");
            }
        }
        Ok(())
    }

    /// Releases the model and rejects every later operation.
    ///
    /// Terminating twice is not an error. When the model fails to release,
    /// the failure is returned but the state stays terminated.
    pub async fn terminate(&self) -> Result<()> {
        let mut inner = self.inner.write().await;
        let Some(mut model) = inner.model.take() else {
            return Ok(());
        };
        inner.buffer.clear();

        model.release().await.map_err(|err| {
            error!(error = %err, "cannot release the model of a terminated ML state");
            MlStateError::from(err)
        })
    }

    pub async fn is_terminated(&self) -> bool {
        self.inner.read().await.model.is_none()
    }

    /// Number of values waiting for the next batch.
    pub async fn pending(&self) -> usize {
        self.inner.read().await.buffer.len()
    }

    pub async fn batch_train_size(&self) -> usize {
        self.inner.read().await.params.batch_train_size()
    }

    pub async fn identity(&self) -> ModelIdentity {
        self.inner.read().await.identity.clone()
    }

    async fn read_container<R>(
        factory: &dyn ModelFactory,
        reader: &mut R,
        params: &Map<String, Value>,
    ) -> Result<(ModelIdentity, MlParams, Box<dyn Model>)>
    where
        R: AsyncRead + Send + Unpin,
    {
        let metadata = codec::read_header(reader).await?;
        let ml_params = metadata.params()?;
        let identity = metadata.identity();
        let model = factory.load(&identity, &mut *reader, params).await?;
        debug!(
            module_name = %identity.module_name,
            class_name = %identity.class_name,
            batch_train_size = ml_params.batch_train_size(),
            "loaded ML state"
        );
        Ok((identity, ml_params, model))
    }
}
