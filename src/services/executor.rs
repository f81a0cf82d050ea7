//! Shared bounded-concurrency executor.
//!
//! One semaphore caps how many network operations run at once. Every clone
//! of a [`BoundedExecutor`] draws from the same permits, so handing the
//! executor to another collaborator never widens the pool.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

#[derive(Debug, Clone)]
pub struct BoundedExecutor {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl BoundedExecutor {
    /// Create a pool of `capacity` slots (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Run `fut` while holding one slot.
    pub async fn run<F: Future>(&self, fut: F) -> F::Output {
        // The semaphore is never closed, so acquire only fails if that changes
        let _permit = self.semaphore.acquire().await.ok();
        fut.await
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots not currently held.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_never_exceeds_capacity() {
        let executor = BoundedExecutor::new(3);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..12)
            .map(|_| {
                let executor = executor.clone();
                let running = running.clone();
                let peak = peak.clone();
                tokio::spawn(async move {
                    executor
                        .run(async {
                            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(5)).await;
                            running.fetch_sub(1, Ordering::SeqCst);
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(executor.available(), 3);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        assert_eq!(BoundedExecutor::new(0).capacity(), 1);
    }
}
