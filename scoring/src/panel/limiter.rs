//! Admission control for endpoint calls.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{AcquireError, Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep_until, Instant};

/// Bounds in-flight calls and spaces out dispatch starts.
///
/// A call may start only once it holds a semaphore permit *and* at least
/// `spacing` has elapsed since the previous dispatch start.
#[derive(Debug)]
pub struct DispatchLimiter {
    permits: Arc<Semaphore>,
    spacing: Duration,
    last_dispatch: Mutex<Option<Instant>>,
}

impl DispatchLimiter {
    pub fn new(max_concurrent: usize, spacing: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            spacing,
            last_dispatch: Mutex::new(None),
        }
    }

    /// Wait for admission. Dropping the permit frees the slot.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, AcquireError> {
        let permit = Arc::clone(&self.permits).acquire_owned().await?;

        let mut last = self.last_dispatch.lock().await;
        if let Some(previous) = *last {
            sleep_until(previous + self.spacing).await;
        }
        *last = Some(Instant::now());

        Ok(permit)
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn starts_are_spaced() {
        let limiter = DispatchLimiter::new(10, Duration::from_millis(1200));
        let origin = Instant::now();

        let _a = limiter.acquire().await.unwrap();
        let _b = limiter.acquire().await.unwrap();
        let _c = limiter.acquire().await.unwrap();

        assert_eq!(origin.elapsed(), Duration::from_millis(2400));
    }

    #[tokio::test(start_paused = true)]
    async fn never_exceeds_ceiling() {
        let limiter = Arc::new(DispatchLimiter::new(2, Duration::ZERO));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut set = tokio::task::JoinSet::new();
        for _ in 0..6 {
            let limiter = limiter.clone();
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            set.spawn(async move {
                let _permit = limiter.acquire().await.unwrap();
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(1)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            });
        }
        while set.join_next().await.is_some() {}

        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(limiter.available_permits(), 2);
    }
}
