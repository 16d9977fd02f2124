use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use tokio::sync::RwLock;
use crate::error::{MlStateError, Result};
use super::ml_state::MlState;

/// A named, shared state owned by the host engine.
#[async_trait]
pub trait SharedState: Send + Sync + 'static {
    /// Releases the state's resources.
    async fn terminate(&self) -> Result<()>;

    /// Allows a registry lookup to recover the concrete state type.
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

#[async_trait]
impl SharedState for MlState {
    async fn terminate(&self) -> Result<()> {
        MlState::terminate(self).await
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// # SharedStates
///
/// A name-to-state table.
///
/// The registry is handed explicitly to the free functions in
/// [`crate::state`] instead of being reached through a global. It holds at
/// most one state per name and does not order operations across names.
///
/// Cloning is cheap; clones share the same table.
#[derive(Clone, Default)]
pub struct SharedStates {
    states: Arc<RwLock<HashMap<String, Arc<dyn SharedState>>>>,
}

impl SharedStates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `state` under `name`.
    ///
    /// # Errors
    ///
    /// [`MlStateError::DuplicateState`] when the name is already taken.
    pub async fn add(&self, name: impl Into<String>, state: Arc<dyn SharedState>) -> Result<()> {
        let name = name.into();
        let mut states = self.states.write().await;
        if states.contains_key(&name) {
            return Err(MlStateError::DuplicateState(name));
        }
        states.insert(name, state);
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Result<Arc<dyn SharedState>> {
        self.states
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| MlStateError::StateNotFound(name.to_string()))
    }

    /// Unregisters a state without terminating it.
    pub async fn remove(&self, name: &str) -> Option<Arc<dyn SharedState>> {
        self.states.write().await.remove(name)
    }

    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.states.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Resolves `name` to an [`MlState`].
    ///
    /// # Errors
    ///
    /// [`MlStateError::StateNotFound`] for unknown names and
    /// [`MlStateError::NotAnMlState`] when the name belongs to another kind
    /// of state.
    pub async fn lookup_ml_state(&self, name: &str) -> Result<Arc<MlState>> {
        self.get(name)
            .await?
            .into_any()
            .downcast::<MlState>()
            .map_err(|_| MlStateError::NotAnMlState(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use crate::config::{MlParams, MlStateConfig, ModelIdentity};
    use crate::model::mock_model::MockFactory;

    #[derive(Default)]
    struct CounterState {
        terminated: AtomicBool,
    }

    #[async_trait]
    impl SharedState for CounterState {
        async fn terminate(&self) -> Result<()> {
            self.terminated.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    async fn ml_state() -> Arc<MlState> {
        let config = MlStateConfig::new(
            ModelIdentity::new("", "mock", "MockModel"),
            MlParams::default(),
        );
        Arc::new(MlState::create(Arc::new(MockFactory::new()), config).await.unwrap())
    }

    #[tokio::test]
    async fn test_lookup_ml_state() {
        let states = SharedStates::new();
        states.add("model", ml_state().await).await.unwrap();

        let state = states.lookup_ml_state("model").await.unwrap();
        assert_eq!(state.batch_train_size().await, 10);
    }

    #[tokio::test]
    async fn test_lookup_unknown_name() {
        let states = SharedStates::new();
        let err = states
            .lookup_ml_state("missing")
            .await
            .err()
            .expect("unknown name must not resolve");
        assert!(matches!(err, MlStateError::StateNotFound(ref name) if name == "missing"));
    }

    #[tokio::test]
    async fn test_lookup_other_state_type() {
        let states = SharedStates::new();
        states.add("counter", Arc::new(CounterState::default())).await.unwrap();

        let err = states
            .lookup_ml_state("counter")
            .await
            .err()
            .expect("counter state must not resolve as an ML state");
        assert!(matches!(err, MlStateError::NotAnMlState(_)));
    }

    #[tokio::test]
    async fn test_duplicate_names_are_rejected() {
        let states = SharedStates::new();
        states.add("model", ml_state().await).await.unwrap();

        let err = states.add("model", ml_state().await).await.unwrap_err();
        assert!(matches!(err, MlStateError::DuplicateState(_)));
        assert_eq!(states.names().await, vec!["model".to_string()]);
    }

    #[tokio::test]
    async fn test_terminate_through_trait_object() {
        let states = SharedStates::new();
        let state = ml_state().await;
        states.add("model", state.clone()).await.unwrap();

        let shared = states.remove("model").await.unwrap();
        shared.terminate().await.unwrap();

        assert!(state.is_terminated().await);
        assert!(states.get("model").await.is_err());
    }
}
