use std::sync::Arc;

use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// Fixed-size pool bounding how many compiler processes run at once across all jobs.
///
/// Clones share the same permits.
#[derive(Clone, Debug)]
pub struct CompilePool {
    semaphore: Arc<Semaphore>,
    size: usize,
}

impl CompilePool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, AcquireError> {
        self.semaphore.clone().acquire_owned().await
    }
}
