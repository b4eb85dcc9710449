// Token-bucket rate limiter for provider calls.
//
// Capacity is `requests_per_minute` tokens and the bucket refills
// continuously at rpm/60 tokens per second, starting full. Each request
// takes one token; when the bucket is empty the caller sleeps until the
// next token arrives. One limiter belongs to one GovernedProvider.

use std::sync::Mutex;

use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::ExtractError;

/// A continuously refilling token bucket.
///
/// Thread-safe via interior mutability; share it with `Arc` or by reference.
/// The lock is only held for arithmetic, never across an await.
pub struct RateLimiter {
    bucket: Mutex<Bucket>,
    /// Maximum tokens (0 = unlimited).
    capacity: f64,
    /// Tokens added per second.
    refill_per_sec: f64,
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// A bucket allowing `requests_per_minute` requests per minute.
    /// Zero disables throttling entirely.
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let capacity = requests_per_minute as f64;
        Self {
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            capacity,
            refill_per_sec: capacity / 60.0,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.capacity == 0.0
    }

    /// Tokens currently in the bucket, after refilling.
    pub fn available(&self) -> f64 {
        if self.is_unlimited() {
            return f64::INFINITY;
        }
        let mut bucket = self.bucket.lock().unwrap();
        self.refill(&mut bucket, Instant::now());
        bucket.tokens
    }

    /// Take a token if one is available, otherwise report how long until one is.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        if self.is_unlimited() {
            return Ok(());
        }
        let mut bucket = self.bucket.lock().unwrap();
        self.refill(&mut bucket, Instant::now());

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            let missing = 1.0 - bucket.tokens;
            Err(Duration::from_secs_f64(missing / self.refill_per_sec))
        }
    }

    /// Wait until a token is available, then take it.
    ///
    /// Returns `Cancelled` if `cancel` fires while waiting. No token is
    /// consumed in that case.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), ExtractError> {
        loop {
            if cancel.is_cancelled() {
                return Err(ExtractError::Cancelled);
            }
            let wait = match self.try_acquire() {
                Ok(()) => return Ok(()),
                Err(wait) => wait,
            };

            info!(
                delay_ms = wait.as_millis() as u64,
                "Rate limit: waiting {}ms for a request token",
                wait.as_millis()
            );

            tokio::select! {
                _ = cancel.cancelled() => return Err(ExtractError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    fn refill(&self, bucket: &mut Bucket, now: Instant) {
        let elapsed = now.saturating_duration_since(bucket.last_refill);
        bucket.tokens = (bucket.tokens + elapsed.as_secs_f64() * self.refill_per_sec).min(self.capacity);
        bucket.last_refill = now;
    }
}
