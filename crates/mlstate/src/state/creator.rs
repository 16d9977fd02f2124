use std::sync::Arc;
use serde_json::{Map, Value};
use tokio::io::AsyncRead;
use crate::config::MlStateConfig;
use crate::error::Result;
use crate::model::ModelFactory;
use super::ml_state::MlState;

/// Creates or restores [`MlState`]s on behalf of a host engine.
///
/// The creator is bound to one [`ModelFactory`]; every state it produces
/// uses that factory for its model and for later loads.
#[derive(Clone)]
pub struct MlStateCreator {
    factory: Arc<dyn ModelFactory>,
}

impl MlStateCreator {
    pub fn new(factory: Arc<dyn ModelFactory>) -> Self {
        Self { factory }
    }

    /// Creates a state from raw creation parameters.
    ///
    /// See [`crate::config`] for the recognized keys; the rest is passed to
    /// the factory as the model's init parameters.
    pub async fn create_state(&self, params: Map<String, Value>) -> Result<Arc<MlState>> {
        let config = MlStateConfig::from_params(params)?;
        let state = MlState::create(self.factory.clone(), config).await?;
        Ok(Arc::new(state))
    }

    /// Restores a state from a saved container.
    pub async fn load_state<R>(&self, reader: &mut R, params: &Map<String, Value>) -> Result<Arc<MlState>>
    where
        R: AsyncRead + Send + Unpin,
    {
        let state = MlState::restore(self.factory.clone(), reader, params).await?;
        Ok(Arc::new(state))
    }
}
