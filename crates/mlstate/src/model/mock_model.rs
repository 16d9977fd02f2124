use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use crate::config::ModelIdentity;
use crate::error::ModelError;
use super::core_trait::{Model, ModelFactory};

// Records every call made against the mock models a factory hands out
#[derive(Debug, Default)]
pub struct MockProbe {
    fits: Mutex<Vec<Vec<Value>>>,
    predicts: AtomicUsize,
    creates: AtomicUsize,
    loads: AtomicUsize,
    releases: AtomicUsize,
}

impl MockProbe {
    pub fn fits(&self) -> Vec<Vec<Value>> {
        self.fits.lock().unwrap().clone()
    }

    pub fn fit_count(&self) -> usize {
        self.fits.lock().unwrap().len()
    }

    pub fn predicts(&self) -> usize {
        self.predicts.load(Ordering::SeqCst)
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    pub fail_fit: bool,
    pub fail_release: bool,
    pub fail_load: bool,
    pub fit_result: Value,
}

// A model whose payload is just its tag, so loads can be told apart
pub struct MockModel {
    tag: String,
    behavior: MockBehavior,
    probe: Arc<MockProbe>,
}

#[async_trait]
impl Model for MockModel {
    async fn fit(&self, batch: Vec<Value>) -> Result<Value, ModelError> {
        self.probe.fits.lock().unwrap().push(batch);
        if self.behavior.fail_fit {
            return Err(ModelError::new("mock fit failed"));
        }
        Ok(self.behavior.fit_result.clone())
    }

    async fn predict(&self, value: Value) -> Result<Value, ModelError> {
        self.probe.predicts.fetch_add(1, Ordering::SeqCst);
        Ok(json!({ "tag": self.tag, "input": value }))
    }

    async fn save(
        &self,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
        _params: &Map<String, Value>,
    ) -> Result<(), ModelError> {
        writer.write_all(self.tag.as_bytes()).await?;
        Ok(())
    }

    async fn release(&mut self) -> Result<(), ModelError> {
        self.probe.releases.fetch_add(1, Ordering::SeqCst);
        if self.behavior.fail_release {
            return Err(ModelError::new("mock release failed"));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MockFactory {
    behavior: MockBehavior,
    probe: Arc<MockProbe>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            probe: Arc::default(),
        }
    }

    pub fn probe(&self) -> Arc<MockProbe> {
        self.probe.clone()
    }

    fn model(&self, tag: String) -> Box<dyn Model> {
        Box::new(MockModel {
            tag,
            behavior: self.behavior.clone(),
            probe: self.probe.clone(),
        })
    }
}

#[async_trait]
impl ModelFactory for MockFactory {
    async fn create(
        &self,
        _identity: &ModelIdentity,
        params: &Map<String, Value>,
    ) -> Result<Box<dyn Model>, ModelError> {
        self.probe.creates.fetch_add(1, Ordering::SeqCst);
        let tag = params
            .get("tag")
            .and_then(Value::as_str)
            .unwrap_or("initial")
            .to_string();
        Ok(self.model(tag))
    }

    async fn load(
        &self,
        _identity: &ModelIdentity,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        _params: &Map<String, Value>,
    ) -> Result<Box<dyn Model>, ModelError> {
        self.probe.loads.fetch_add(1, Ordering::SeqCst);
        if self.behavior.fail_load {
            return Err(ModelError::new("mock load failed"));
        }
        let mut tag = String::new();
        reader.read_to_string(&mut tag).await?;
        Ok(self.model(tag))
    }
}
