/// Upper bound on the number of values allocated up front.
///
/// Larger thresholds still work; the storage grows as values arrive.
pub const BUFFER_PREALLOC_LIMIT: usize = 4096;

/// # BatchBuffer
///
/// An ordered accumulator for values waiting to be trained on.
///
/// The buffer keeps arrival order and reports when it holds as many values as
/// its configured threshold. Draining hands the contents out while the
/// allocation stays with the buffer, so a steady stream of batches reuses the
/// same storage.
///
/// ## Thread Safety
///
/// The buffer performs no synchronization of its own. Its owner is expected
/// to guard it, the way [`MlState`](crate::state::MlState) keeps it behind its
/// reader/writer lock.
#[derive(Debug, Clone)]
pub struct BatchBuffer<T> {
    /// Pending values in arrival order
    values: Vec<T>,

    /// Number of values that makes up one batch
    threshold: usize,
}

impl<T> BatchBuffer<T> {
    /// Creates an empty buffer whose storage is sized for `threshold` values,
    /// up to [`BUFFER_PREALLOC_LIMIT`].
    pub fn with_threshold(threshold: usize) -> Self {
        Self {
            values: Vec::with_capacity(threshold.min(BUFFER_PREALLOC_LIMIT)),
            threshold,
        }
    }

    /// Appends a value at the end of the pending batch.
    pub fn push(&mut self, value: T) {
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns `true` once the buffer holds at least a full batch.
    pub fn is_full(&self) -> bool {
        self.values.len() >= self.threshold
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn capacity(&self) -> usize {
        self.values.capacity()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.values
    }

    /// Takes every pending value out of the buffer.
    ///
    /// The returned vector preserves arrival order. The buffer is left empty
    /// but keeps its allocated capacity.
    pub fn drain(&mut self) -> Vec<T> {
        self.values.drain(..).collect()
    }

    /// Discards every pending value, keeping the allocated capacity.
    pub fn clear(&mut self) {
        self.values.clear();
    }
}
