use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::{VectorizeError, VectorizeResult};

/// Cooperative cancellation flag shared between a caller and a running pipeline.
///
/// Clones observe the same flag. The pipeline checks it between stages and
/// between regions.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// `Err(Cancelled)` once [`CancelToken::cancel`] has been called.
    pub fn check(&self) -> VectorizeResult<()> {
        if self.is_cancelled() {
            Err(VectorizeError::Cancelled)
        } else {
            Ok(())
        }
    }
}
