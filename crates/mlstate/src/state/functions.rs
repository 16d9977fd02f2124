use serde_json::Value;
use crate::error::Result;
use super::registry::SharedStates;

/// Trains the state registered as `name` on `batch`, bypassing its buffer.
///
/// The return value is whatever the model's fit returns.
pub async fn fit(states: &SharedStates, name: &str, batch: Vec<Value>) -> Result<Value> {
    states.lookup_ml_state(name).await?.fit(batch).await
}

/// Asks the state registered as `name` for a prediction on `value`.
pub async fn predict(states: &SharedStates, name: &str, value: Value) -> Result<Value> {
    states.lookup_ml_state(name).await?.predict(value).await
}

/// Discards the pending batch of the state registered as `name`.
pub async fn flush(states: &SharedStates, name: &str) -> Result<()> {
    states.lookup_ml_state(name).await?.flush().await;
    Ok(())
}
