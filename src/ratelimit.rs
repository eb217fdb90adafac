//! Counting-window request limiter shared by the source clients.
//!
//! Each client owns its own instance; quotas are per remote service and must
//! not bleed across sources. The batch pipelines are strictly sequential, so
//! blocking the caller with a sleep is the whole contract: `acquire()` never
//! fails, it only adds latency.

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct WindowState {
    count: u32,
    window_start: Option<Instant>,
}

#[derive(Debug)]
pub struct RequestWindow {
    max_requests: u32,
    window: Duration,
    state: Mutex<WindowState>,
}

impl RequestWindow {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            state: Mutex::new(WindowState {
                count: 0,
                window_start: None,
            }),
        }
    }

    /// Account for one request, sleeping out the remainder of the window when
    /// the budget is exhausted. The lock is never held across the sleep.
    pub async fn acquire(&self) {
        let wait = {
            let mut s = self.state.lock().expect("rate limiter state poisoned");
            let now = Instant::now();
            let start = *s.window_start.get_or_insert(now);
            s.count += 1;
            if s.count >= self.max_requests {
                s.count = 0;
                let elapsed = now.duration_since(start);
                if elapsed < self.window {
                    Some(self.window - elapsed)
                } else {
                    s.window_start = Some(now);
                    None
                }
            } else {
                None
            }
        };
        if let Some(d) = wait {
            tokio::time::sleep(d).await;
            let mut s = self.state.lock().expect("rate limiter state poisoned");
            s.window_start = Some(Instant::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn forces_a_wait_when_window_budget_is_exhausted() {
        let limiter = RequestWindow::new(2, Duration::from_secs(1));
        let t0 = Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        // Two full windows are consumed by five calls at 2 per second.
        assert!(t0.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn under_budget_calls_do_not_sleep() {
        let limiter = RequestWindow::new(10, Duration::from_secs(5));
        let t0 = Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        assert!(t0.elapsed() < Duration::from_millis(200));
    }
}
