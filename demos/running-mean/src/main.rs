mod model;

use std::error::Error;
use std::sync::Arc;
use mlstate::model::ScratchFileFactory;
use mlstate::state::{self, MlStateCreator, Record, SharedStates, DATA_FIELD};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Map, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;
use crate::model::{NearestCentroidFactory, CLASS_NAME};

const STATE_NAME: &str = "centroids";
const PRODUCERS: u64 = 4;
const SAMPLES_PER_PRODUCER: usize = 37;

fn sample(rng: &mut StdRng) -> Record {
    let (label, center) = if rng.gen_bool(0.5) { ("low", 0.0) } else { ("high", 5.0) };
    let features = vec![
        center + rng.gen_range(-1.0..1.0),
        center + rng.gen_range(-1.0..1.0),
    ];
    let mut record = Record::new();
    record.insert(DATA_FIELD.to_string(), json!({ "features": features, "label": label }));
    record
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .init();

    let creator = MlStateCreator::new(Arc::new(ScratchFileFactory::new(NearestCentroidFactory)));
    let states = SharedStates::new();

    let params = json!({
        "module_name": "running_mean",
        "class_name": CLASS_NAME,
        "batch_train_size": 16,
    });
    let trained = creator
        .create_state(params.as_object().cloned().unwrap_or_default())
        .await?;
    states.add(STATE_NAME, trained.clone()).await?;

    let producers = (0..PRODUCERS).map(|producer| {
        let trained = trained.clone();
        tokio::spawn(async move {
            let mut rng = StdRng::seed_from_u64(producer);
            for _ in 0..SAMPLES_PER_PRODUCER {
                let record = sample(&mut rng);
                trained.write(&record).await?;
            }
            Ok::<_, mlstate::MlStateError>(())
        })
    });
    for handle in futures::future::join_all(producers).await {
        handle??;
    }

    info!(pending = trained.pending().await, "dropping partial batch");
    state::flush(&states, STATE_NAME).await?;

    let queries = [json!({ "features": [0.2, -0.1] }), json!({ "features": [4.8, 5.3] })];
    for query in &queries {
        let answer = state::predict(&states, STATE_NAME, query.clone()).await?;
        info!(%query, %answer, "prediction before save");
    }

    let mut container = Vec::new();
    trained.save(&mut container, &Map::new()).await?;
    info!(bytes = container.len(), "saved state");

    let restored = creator.load_state(&mut container.as_slice(), &Map::new()).await?;
    for query in queries {
        let before: Value = trained.predict(query.clone()).await?;
        let after = restored.predict(query.clone()).await?;
        info!(%query, %after, matches = before == after, "prediction after load");
    }

    trained.terminate().await?;
    restored.terminate().await?;
    Ok(())
}
