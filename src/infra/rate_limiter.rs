use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Requests-per-minute token bucket shared by all calls to one provider.
#[derive(Debug)]
pub struct RateLimiter {
    requests_per_min: u64,
    burst: f64,
    // tokens currently available and the time of the last refill
    bucket: Mutex<(f64, Instant)>,
}

impl RateLimiter {
    /// `requests_per_min == 0` disables limiting.
    pub fn new(requests_per_min: u64) -> Self {
        Self::with_burst(requests_per_min, 1)
    }

    pub fn with_burst(requests_per_min: u64, burst: u32) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            requests_per_min,
            burst,
            bucket: Mutex::new((burst, Instant::now())),
        }
    }

    /// Wait until one request may be sent.
    pub async fn acquire(&self) {
        if self.requests_per_min == 0 {
            return;
        }
        let refill_rate = self.requests_per_min as f64 / 60.0; // tokens per second

        loop {
            let mut guard = self.bucket.lock().await;
            let (ref mut tokens, ref mut last) = *guard;
            let now = Instant::now();
            let elapsed = now.duration_since(*last).as_secs_f64();
            *tokens = (*tokens + elapsed * refill_rate).min(self.burst);
            *last = now;
            if *tokens >= 1.0 {
                *tokens -= 1.0;
                break;
            }
            let secs = (1.0 - *tokens) / refill_rate;
            drop(guard);
            tokio::time::sleep(Duration::from_secs_f64(secs.max(0.001))).await;
        }
    }
}
