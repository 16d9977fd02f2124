use serde_json::Value;

const LOSS_FIELD: &str = "loss";
const ACCURACY_FIELD: &str = "accuracy";

/// Per-sample training metrics pulled out of a fit result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct FitMetrics {
    pub loss: f64,
    pub accuracy: f64,
}

impl FitMetrics {
    /// Reads `loss` and `accuracy` from a fit result and divides them by the
    /// number of values trained on.
    ///
    /// Returns `None` when the result is not an object, when either field is
    /// absent or not numeric, or when the batch was empty.
    pub fn from_fit_result(result: &Value, batch_size: usize) -> Option<Self> {
        if batch_size == 0 {
            return None;
        }
        let fields = result.as_object()?;
        let loss = fields.get(LOSS_FIELD)?.as_f64()?;
        let accuracy = fields.get(ACCURACY_FIELD)?.as_f64()?;
        let size = batch_size as f64;
        Some(Self {
            loss: loss / size,
            accuracy: accuracy / size,
        })
    }
}
