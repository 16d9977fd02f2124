//! # Scratch-file bridging
//!
//! Many model libraries can only persist themselves to a filesystem path.
//! The types here adapt such a model to the streaming [`Model`] and
//! [`ModelFactory`] interfaces:
//!
//! * on save, the model writes into a fresh temporary file whose bytes are
//!   then copied into the output stream;
//! * on load, the remaining input stream is copied into a fresh temporary
//!   file and the model reads from its path.
//!
//! Each temporary file is owned by a [`NamedTempFile`], so it is removed on
//! every exit path, including early returns on error and unwinding.

use std::io;
use std::path::{Path, PathBuf};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};
use crate::config::ModelIdentity;
use crate::error::ModelError;
use super::core_trait::{Model, ModelFactory};

const DEFAULT_SCRATCH_PREFIX: &str = "mlstate_scratch";

/// Where scratch files are created.
#[derive(Debug, Clone)]
pub struct ScratchConfig {
    /// Directory for scratch files; the system temp directory when `None`
    pub dir: Option<PathBuf>,

    /// File name prefix, useful to spot leftovers after a crash
    pub prefix: String,
}

impl ScratchConfig {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            ..Self::default()
        }
    }

    fn create_file(&self) -> io::Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(&self.prefix);
        match &self.dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
    }
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            dir: None,
            prefix: DEFAULT_SCRATCH_PREFIX.to_string(),
        }
    }
}

/// A model that persists itself through a filesystem path.
///
/// Same concurrency contract as [`Model`].
#[async_trait]
pub trait FileModel: Send + Sync {
    async fn fit(&self, batch: Vec<Value>) -> Result<Value, ModelError>;

    async fn predict(&self, value: Value) -> Result<Value, ModelError>;

    /// Writes the model to `path`. The file already exists and is empty.
    async fn save_to(&self, path: &Path, params: &Map<String, Value>) -> Result<(), ModelError>;

    async fn release(&mut self) -> Result<(), ModelError> {
        Ok(())
    }
}

/// Builds [`FileModel`]s, loading persisted ones from a filesystem path.
#[async_trait]
pub trait FileModelFactory: Send + Sync {
    type Model: FileModel + 'static;

    async fn create(
        &self,
        identity: &ModelIdentity,
        params: &Map<String, Value>,
    ) -> Result<Self::Model, ModelError>;

    async fn load_from(
        &self,
        identity: &ModelIdentity,
        path: &Path,
        params: &Map<String, Value>,
    ) -> Result<Self::Model, ModelError>;
}

/// Exposes a [`FileModel`] as a streaming [`Model`].
pub struct ScratchFileModel<M> {
    inner: M,
    scratch: ScratchConfig,
}

impl<M> ScratchFileModel<M> {
    pub fn new(inner: M, scratch: ScratchConfig) -> Self {
        Self { inner, scratch }
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }
}

#[async_trait]
impl<M> Model for ScratchFileModel<M>
where
    M: FileModel,
{
    async fn fit(&self, batch: Vec<Value>) -> Result<Value, ModelError> {
        self.inner.fit(batch).await
    }

    async fn predict(&self, value: Value) -> Result<Value, ModelError> {
        self.inner.predict(value).await
    }

    async fn save(
        &self,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
        params: &Map<String, Value>,
    ) -> Result<(), ModelError> {
        let scratch = self.scratch.create_file().map_err(|err| {
            ModelError::with_source("cannot create a scratch file for saving the model", err)
        })?;
        let path = scratch.path().to_path_buf();

        self.inner.save_to(&path, params).await?;

        let mut saved = tokio::fs::File::open(&path).await.map_err(|err| {
            ModelError::with_source("cannot open the scratch file holding the saved model", err)
        })?;
        let copied = tokio::io::copy(&mut saved, writer).await?;
        drop(saved);
        debug!(path = %path.display(), bytes = copied, "copied saved model out of scratch file");

        discard(scratch);
        Ok(())
    }

    async fn release(&mut self) -> Result<(), ModelError> {
        self.inner.release().await
    }
}

/// Exposes a [`FileModelFactory`] as a streaming [`ModelFactory`].
pub struct ScratchFileFactory<F> {
    inner: F,
    scratch: ScratchConfig,
}

impl<F> ScratchFileFactory<F> {
    pub fn new(inner: F) -> Self {
        Self::with_scratch(inner, ScratchConfig::default())
    }

    pub fn with_scratch(inner: F, scratch: ScratchConfig) -> Self {
        Self { inner, scratch }
    }
}

#[async_trait]
impl<F> ModelFactory for ScratchFileFactory<F>
where
    F: FileModelFactory,
{
    async fn create(
        &self,
        identity: &ModelIdentity,
        params: &Map<String, Value>,
    ) -> Result<Box<dyn Model>, ModelError> {
        let model = self.inner.create(identity, params).await?;
        Ok(Box::new(ScratchFileModel::new(model, self.scratch.clone())))
    }

    async fn load(
        &self,
        identity: &ModelIdentity,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        params: &Map<String, Value>,
    ) -> Result<Box<dyn Model>, ModelError> {
        let scratch = self.scratch.create_file().map_err(|err| {
            ModelError::with_source("cannot create a scratch file for loading the model", err)
        })?;
        let path = scratch.path().to_path_buf();

        let mut spill = tokio::fs::File::from_std(scratch.reopen()?);
        let copied = tokio::io::copy(reader, &mut spill).await?;
        spill.flush().await?;
        drop(spill);
        debug!(path = %path.display(), bytes = copied, "spilled model payload into scratch file");

        let loaded = self.inner.load_from(identity, &path, params).await;
        discard(scratch);

        Ok(Box::new(ScratchFileModel::new(loaded?, self.scratch.clone())))
    }
}

fn discard(scratch: NamedTempFile) {
    let path = scratch.path().to_path_buf();
    if let Err(err) = scratch.close() {
        warn!(path = %path.display(), error = %err, "cannot remove the scratch file");
    }
}
