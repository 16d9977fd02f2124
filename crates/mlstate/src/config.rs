//! # Configuration
//!
//! Parameters recognized when an ML state is created.
//!
//! A host engine hands the creator a flat JSON object (for example the
//! contents of a `WITH` clause). The keys below are consumed by this crate;
//! every other key is left for the model factory as init parameters.
//!
//! | key                | type             | default | meaning                         |
//! |--------------------|------------------|---------|---------------------------------|
//! | `module_path`      | string           | `""`    | where the model implementation lives |
//! | `module_name`      | string           | required | module holding the model class  |
//! | `class_name`       | string           | required | model class to instantiate      |
//! | `batch_train_size` | positive integer | `10`    | values per training batch       |

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use crate::error::{MlStateError, Result};

/// Batch size used when `batch_train_size` is not supplied.
pub const DEFAULT_BATCH_TRAIN_SIZE: usize = 10;

/// Identifies which model implementation backs a state.
///
/// The identity is persisted alongside the model payload so that a load can
/// construct the right model before reading its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelIdentity {
    pub module_path: String,
    pub module_name: String,
    pub class_name: String,
}

impl ModelIdentity {
    pub fn new(
        module_path: impl Into<String>,
        module_name: impl Into<String>,
        class_name: impl Into<String>,
    ) -> Self {
        Self {
            module_path: module_path.into(),
            module_name: module_name.into(),
            class_name: class_name.into(),
        }
    }
}

/// Parameters the state itself owns, on top of the model identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MlParams {
    batch_train_size: usize,
}

impl MlParams {
    /// Validates and wraps a batch size.
    ///
    /// # Errors
    ///
    /// [`MlStateError::Configuration`] when `batch_train_size` is zero.
    pub fn new(batch_train_size: usize) -> Result<Self> {
        if batch_train_size == 0 {
            return Err(MlStateError::Configuration(
                "batch_train_size must be greater than 0".to_string(),
            ));
        }
        Ok(Self { batch_train_size })
    }

    pub fn batch_train_size(&self) -> usize {
        self.batch_train_size
    }
}

impl Default for MlParams {
    fn default() -> Self {
        Self {
            batch_train_size: DEFAULT_BATCH_TRAIN_SIZE,
        }
    }
}

/// Everything needed to create a fresh ML state.
#[derive(Debug, Clone, PartialEq)]
pub struct MlStateConfig {
    pub identity: ModelIdentity,
    pub params: MlParams,

    /// Parameters not recognized by this crate, forwarded to the model factory
    pub init_params: Map<String, Value>,
}

impl MlStateConfig {
    pub fn new(identity: ModelIdentity, params: MlParams) -> Self {
        Self {
            identity,
            params,
            init_params: Map::new(),
        }
    }

    pub fn with_init_params(mut self, init_params: Map<String, Value>) -> Self {
        self.init_params = init_params;
        self
    }

    /// Extracts the recognized keys from a creation parameter map.
    ///
    /// Recognized keys are removed; whatever remains becomes
    /// [`init_params`](Self::init_params).
    ///
    /// # Errors
    ///
    /// [`MlStateError::Configuration`] when `module_name` or `class_name` is
    /// missing, when a recognized key has the wrong type, or when
    /// `batch_train_size` is not a positive integer.
    pub fn from_params(params: Map<String, Value>) -> Result<Self> {
        let raw: RawConfig = serde_json::from_value(Value::Object(params))
            .map_err(|err| MlStateError::Configuration(err.to_string()))?;
        let batch_train_size = usize::try_from(raw.batch_train_size).map_err(|_| {
            MlStateError::Configuration(format!(
                "batch_train_size {} is too large",
                raw.batch_train_size
            ))
        })?;

        Ok(Self {
            identity: ModelIdentity::new(raw.module_path, raw.module_name, raw.class_name),
            params: MlParams::new(batch_train_size)?,
            init_params: raw.init_params,
        })
    }
}

/// Creation parameters as handed over by the host engine.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    module_path: String,
    module_name: String,
    class_name: String,
    #[serde(default = "default_batch_train_size")]
    batch_train_size: u64,

    #[serde(flatten)]
    init_params: Map<String, Value>,
}

fn default_batch_train_size() -> u64 {
    DEFAULT_BATCH_TRAIN_SIZE as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test params must be an object"),
        }
    }

    #[test]
    fn test_empty_params_are_rejected() {
        let err = MlStateConfig::from_params(Map::new()).unwrap_err();
        assert!(matches!(err, MlStateError::Configuration(_)));
    }

    #[test]
    fn test_identity_only_uses_default_batch_size() {
        let config = MlStateConfig::from_params(params(json!({
            "module_path": "./",
            "module_name": "mnist",
            "class_name": "MNIST",
        })))
        .unwrap();

        assert_eq!(config.identity, ModelIdentity::new("./", "mnist", "MNIST"));
        assert_eq!(config.params.batch_train_size(), DEFAULT_BATCH_TRAIN_SIZE);
        assert!(config.init_params.is_empty());
    }

    #[test]
    fn test_custom_batch_size_and_leftover_init_params() {
        let config = MlStateConfig::from_params(params(json!({
            "module_name": "mnist",
            "class_name": "MNIST",
            "batch_train_size": 50,
            "n_units": 1000,
            "gpu": -1,
        })))
        .unwrap();

        assert_eq!(config.identity.module_path, "");
        assert_eq!(config.params.batch_train_size(), 50);
        assert_eq!(config.init_params.len(), 2);
        assert_eq!(config.init_params["n_units"], json!(1000));
        assert!(!config.init_params.contains_key("batch_train_size"));
    }

    #[test]
    fn test_non_positive_batch_size_is_rejected() {
        for bad in [json!(0), json!(-3)] {
            let err = MlStateConfig::from_params(params(json!({
                "module_name": "m",
                "class_name": "C",
                "batch_train_size": bad,
            })))
            .unwrap_err();
            assert!(matches!(err, MlStateError::Configuration(_)));
        }
    }

    #[test]
    fn test_non_integer_batch_size_is_rejected() {
        for bad in [json!(2.5), json!("10"), json!(null), json!([4])] {
            let err = MlStateConfig::from_params(params(json!({
                "module_name": "m",
                "class_name": "C",
                "batch_train_size": bad,
            })))
            .unwrap_err();
            assert!(matches!(err, MlStateError::Configuration(_)));
        }
    }

    #[test]
    fn test_non_string_identity_is_rejected() {
        let err = MlStateConfig::from_params(params(json!({
            "module_name": 7,
            "class_name": "C",
        })))
        .unwrap_err();
        assert!(matches!(err, MlStateError::Configuration(_)));
    }

    #[test]
    fn test_batch_size_above_i64_range_is_accepted() {
        let config = MlStateConfig::from_params(params(json!({
            "module_name": "m",
            "class_name": "C",
            "batch_train_size": u64::MAX,
        })))
        .unwrap();

        assert_eq!(config.params.batch_train_size() as u64, u64::MAX);
        assert!(config.init_params.is_empty());
    }

    #[test]
    fn test_missing_class_name_is_reported() {
        let err = MlStateConfig::from_params(params(json!({
            "module_name": "m",
            "batch_train_size": 4,
        })))
        .unwrap_err();

        assert!(matches!(err, MlStateError::Configuration(ref msg) if msg.contains("class_name")));
    }

    #[test]
    fn test_ml_params_reject_zero() {
        assert!(MlParams::new(0).is_err());
        assert_eq!(MlParams::new(1).unwrap().batch_train_size(), 1);
        assert_eq!(MlParams::default().batch_train_size(), 10);
    }
}
