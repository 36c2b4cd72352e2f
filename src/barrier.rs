//! Countdown gate released once every client reached a terminal outcome

use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// How a wait on the barrier ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BarrierOutcome {
    Completed,
    TimedOut,
}

/// Counter initialised to the population size, counted down once per client
#[derive(Debug)]
pub struct CompletionBarrier {
    remaining: AtomicUsize,
    released: Notify,
}

impl CompletionBarrier {
    pub fn new(count: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(count),
            released: Notify::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// Decrement by one. Returns false, without effect, once already at zero.
    pub fn count_down(&self) -> bool {
        let previous = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));

        match previous {
            Ok(1) => {
                self.released.notify_waiters();
                true
            }
            Ok(_) => true,
            Err(_) => false,
        }
    }

    /// Single-use handle allowing its owner to count down exactly once
    pub fn token(self: &Arc<Self>) -> CompletionToken {
        CompletionToken {
            barrier: Arc::clone(self),
        }
    }

    /// Block until the count reaches zero or `timeout` elapses
    pub async fn wait(&self, timeout: Duration) -> BarrierOutcome {
        let released = async {
            loop {
                let notified = self.released.notified();
                tokio::pin!(notified);
                // Register before checking so a release in between is not missed
                notified.as_mut().enable();
                if self.remaining() == 0 {
                    return;
                }
                notified.await;
            }
        };

        match tokio::time::timeout(timeout, released).await {
            Ok(()) => BarrierOutcome::Completed,
            Err(_) => BarrierOutcome::TimedOut,
        }
    }
}

/// Consumed by the first terminal event of one client
#[derive(Debug)]
pub struct CompletionToken {
    barrier: Arc<CompletionBarrier>,
}

impl CompletionToken {
    pub fn complete(self) -> bool {
        self.barrier.count_down()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_zero_count_is_already_released() {
        let barrier = CompletionBarrier::new(0);
        assert_eq!(
            barrier.wait(Duration::from_millis(10)).await,
            BarrierOutcome::Completed
        );
    }

    #[test]
    fn test_count_down_never_goes_negative() {
        let barrier = CompletionBarrier::new(2);
        assert!(barrier.count_down());
        assert!(barrier.count_down());
        assert!(!barrier.count_down());
        assert_eq!(barrier.remaining(), 0);
    }

    #[tokio::test]
    async fn test_wait_times_out_with_pending_clients() {
        let barrier = Arc::new(CompletionBarrier::new(3));
        barrier.token().complete();

        assert_eq!(
            barrier.wait(Duration::from_millis(30)).await,
            BarrierOutcome::TimedOut
        );
        assert_eq!(barrier.remaining(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_wait_released_by_concurrent_tokens() {
        let barrier = Arc::new(CompletionBarrier::new(64));
        let tokens: Vec<_> = (0..64).map(|_| barrier.token()).collect();

        let waiter = {
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move { barrier.wait(Duration::from_secs(5)).await })
        };

        for token in tokens {
            tokio::spawn(async move {
                token.complete();
            });
        }

        assert_eq!(waiter.await.unwrap(), BarrierOutcome::Completed);
        assert_eq!(barrier.remaining(), 0);
    }

    #[test]
    fn test_concurrent_count_down_saturates() {
        let barrier = Arc::new(CompletionBarrier::new(100));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || (0..50).filter(|_| barrier.count_down()).count())
            })
            .collect();

        let decrements: usize = threads.into_iter().map(|t| t.join().unwrap()).sum();
        assert_eq!(decrements, 100);
        assert_eq!(barrier.remaining(), 0);
    }
}
