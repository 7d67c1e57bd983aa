use crate::error::{ConfigError, RateLimitAbort};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Time source for the limiter.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep_until(&self, deadline: Instant);
}

/// Wall clock backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, deadline: Instant) {
        tokio::time::sleep_until(deadline.into()).await;
    }
}

/// Time between permits at `requests_per_second`.
///
/// Rejects rates that are not positive and finite, and rates so low the
/// interval does not fit in a `Duration`.
pub fn permit_interval(requests_per_second: f64) -> Result<Duration, ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid {
        key: "REQUESTS_PER_SECOND",
        reason: format!("{reason}, got {requests_per_second}"),
    };

    if !requests_per_second.is_finite() || requests_per_second <= 0.0 {
        return Err(invalid("must be a positive number"));
    }
    let interval = Duration::try_from_secs_f64(1.0 / requests_per_second)
        .map_err(|_| invalid("is too low"))?;
    if interval.is_zero() {
        return Err(invalid("is too high"));
    }
    Ok(interval)
}

/// Token bucket with a burst of one. Waiters are served in arrival order.
pub struct RateLimiter {
    interval: Duration,
    clock: Box<dyn Clock>,
    /// Earliest instant the next permit may be granted.
    next_permit: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(requests_per_second: f64) -> Result<Self, ConfigError> {
        Self::with_clock(requests_per_second, Box::new(TokioClock))
    }

    pub fn with_clock(
        requests_per_second: f64,
        clock: Box<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        Ok(RateLimiter {
            interval: permit_interval(requests_per_second)?,
            clock,
            next_permit: Mutex::new(None),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits for one permit and returns the instant it was granted.
    ///
    /// Fails without consuming a permit if `cancel` fires first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<Instant, RateLimitAbort> {
        if cancel.is_cancelled() {
            return Err(RateLimitAbort);
        }

        let mut next_permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RateLimitAbort),
            guard = self.next_permit.lock() => guard,
        };

        let now = self.clock.now();
        let granted_at = match *next_permit {
            Some(ready_at) if ready_at > now => {
                debug!("Waiting {:?} for a request permit", ready_at - now);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(RateLimitAbort),
                    _ = self.clock.sleep_until(ready_at) => {}
                }
                ready_at
            }
            _ => now,
        };

        *next_permit = Some(granted_at + self.interval);
        Ok(granted_at)
    }
}
