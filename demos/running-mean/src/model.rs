use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use async_trait::async_trait;
use mlstate::config::ModelIdentity;
use mlstate::model::{FileModel, FileModelFactory};
use mlstate::ModelError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const CLASS_NAME: &str = "NearestCentroid";

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Centroid {
    sum: Vec<f64>,
    count: u64,
}

impl Centroid {
    fn add(&mut self, features: &[f64]) {
        if self.sum.len() < features.len() {
            self.sum.resize(features.len(), 0.0);
        }
        for (total, x) in self.sum.iter_mut().zip(features) {
            *total += x;
        }
        self.count += 1;
    }

    fn distance(&self, features: &[f64]) -> f64 {
        let n = self.count.max(1) as f64;
        self.sum
            .iter()
            .zip(features)
            .map(|(total, x)| (total / n - x).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Centroids {
    by_label: BTreeMap<String, Centroid>,
}

impl Centroids {
    fn nearest(&self, features: &[f64]) -> Option<(&str, f64)> {
        self.by_label
            .iter()
            .map(|(label, centroid)| (label.as_str(), centroid.distance(features)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}

#[derive(Debug, Deserialize)]
struct Sample {
    features: Vec<f64>,
    label: String,
}

#[derive(Debug, Deserialize)]
struct Query {
    features: Vec<f64>,
}

/// Classifies a point by the closest per-label running mean.
///
/// Training only updates sums and counts, so a fit never forgets earlier
/// batches.
pub struct NearestCentroid {
    centroids: Mutex<Centroids>,
}

impl NearestCentroid {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Centroids>, ModelError> {
        self.centroids
            .lock()
            .map_err(|_| ModelError::new("centroid lock poisoned"))
    }
}

#[async_trait]
impl FileModel for NearestCentroid {
    async fn fit(&self, batch: Vec<Value>) -> Result<Value, ModelError> {
        let samples = batch
            .into_iter()
            .map(serde_json::from_value::<Sample>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| ModelError::with_source("malformed training sample", err))?;

        let mut centroids = self.lock()?;
        let mut loss = 0.0;
        let mut correct = 0u64;
        for sample in &samples {
            if let Some((label, distance)) = centroids.nearest(&sample.features) {
                if label == sample.label {
                    correct += 1;
                }
                loss += distance;
            }
            centroids
                .by_label
                .entry(sample.label.clone())
                .or_default()
                .add(&sample.features);
        }
        Ok(json!({ "loss": loss, "accuracy": correct }))
    }

    async fn predict(&self, value: Value) -> Result<Value, ModelError> {
        let query: Query = serde_json::from_value(value)
            .map_err(|err| ModelError::with_source("malformed prediction query", err))?;
        let centroids = self.lock()?;
        Ok(match centroids.nearest(&query.features) {
            Some((label, distance)) => json!({ "label": label, "distance": distance }),
            None => Value::Null,
        })
    }

    async fn save_to(&self, path: &Path, _params: &Map<String, Value>) -> Result<(), ModelError> {
        let encoded = {
            let centroids = self.lock()?;
            serde_json::to_vec(&*centroids)
                .map_err(|err| ModelError::with_source("cannot encode centroids", err))?
        };
        tokio::fs::write(path, encoded).await?;
        Ok(())
    }
}

pub struct NearestCentroidFactory;

impl NearestCentroidFactory {
    fn check(identity: &ModelIdentity) -> Result<(), ModelError> {
        if identity.class_name != CLASS_NAME {
            return Err(ModelError::new(format!(
                "unknown model class {}",
                identity.class_name
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl FileModelFactory for NearestCentroidFactory {
    type Model = NearestCentroid;

    async fn create(
        &self,
        identity: &ModelIdentity,
        _params: &Map<String, Value>,
    ) -> Result<NearestCentroid, ModelError> {
        Self::check(identity)?;
        Ok(NearestCentroid {
            centroids: Mutex::default(),
        })
    }

    async fn load_from(
        &self,
        identity: &ModelIdentity,
        path: &Path,
        _params: &Map<String, Value>,
    ) -> Result<NearestCentroid, ModelError> {
        Self::check(identity)?;
        let bytes = tokio::fs::read(path).await?;
        let centroids = serde_json::from_slice(&bytes)
            .map_err(|err| ModelError::with_source("cannot decode centroids", err))?;
        Ok(NearestCentroid {
            centroids: Mutex::new(centroids),
        })
    }
}
