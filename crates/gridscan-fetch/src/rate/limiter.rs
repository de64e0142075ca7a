use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::data::RateLimitConfig;

const MIN_WAIT: Duration = Duration::from_millis(1);

/// What a caller learned from the source after using a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseHint {
    /// Nothing to report.
    Done,
    /// The source signalled overload. Drains the bucket and slows refill for
    /// the given duration, or the configured cooldown when `None`.
    Cooldown(Option<Duration>),
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
    cooldown_until: Option<Instant>,
}

impl Bucket {
    fn refill(&mut self, now: Instant, config: &RateLimitConfig) {
        let mut from = self.last_refill;
        let mut gained = 0.0;

        if let Some(until) = self.cooldown_until {
            let slow_end = until.min(now);
            if slow_end > from {
                gained += slow_end.saturating_duration_since(from).as_secs_f64()
                    * config.refill_per_sec
                    * config.cooldown_factor;
                from = slow_end;
            }
            if now >= until {
                self.cooldown_until = None;
            }
        }

        gained += now.saturating_duration_since(from).as_secs_f64() * config.refill_per_sec;
        self.tokens = (self.tokens + gained).min(f64::from(config.capacity));
        self.last_refill = now.max(self.last_refill);
    }

    /// Time until one whole token is available, assuming nothing else drains it.
    fn wait_for_token(&self, now: Instant, config: &RateLimitConfig) -> Duration {
        let needed = (1.0 - self.tokens).max(0.0);
        let full = config.refill_per_sec;
        let slow = full * config.cooldown_factor;

        let secs = match self.cooldown_until {
            Some(until) if until > now => {
                let slow_window = until.saturating_duration_since(now).as_secs_f64();
                let slow_gain = slow_window * slow;
                if slow_gain >= needed {
                    needed / slow
                } else {
                    slow_window + (needed - slow_gain) / full
                }
            }
            _ => needed / full,
        };

        Duration::try_from_secs_f64(secs)
            .unwrap_or(Duration::MAX)
            .max(MIN_WAIT)
    }
}

/// Process-wide token bucket guarding the listing source's request budget.
///
/// Share one instance (behind an `Arc`) between every worker of a run.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    bucket: Option<Mutex<Bucket>>,
}

impl RateLimiter {
    /// Create a limiter with a full bucket.
    ///
    /// Non-positive or non-finite rates fall back to the defaults; the
    /// capacity is at least one token and the cooldown factor at most 1.
    pub fn new(config: RateLimitConfig) -> Self {
        let config = sanitize(config);
        let bucket = Bucket {
            tokens: f64::from(config.capacity),
            last_refill: Instant::now(),
            cooldown_until: None,
        };
        Self {
            config,
            bucket: Some(Mutex::new(bucket)),
        }
    }

    /// A limiter that never waits.
    pub fn unlimited() -> Self {
        Self {
            config: RateLimitConfig::default(),
            bucket: None,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn is_unlimited(&self) -> bool {
        self.bucket.is_none()
    }

    /// Wait until a token is available and take it.
    pub async fn acquire(&self) {
        let Some(bucket) = &self.bucket else {
            return;
        };

        loop {
            let wait = {
                let mut bucket = bucket.lock();
                let now = Instant::now();
                bucket.refill(now, &self.config);
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return;
                }
                bucket.wait_for_token(now, &self.config)
            };
            tokio::time::sleep(wait).await;
        }
    }

    /// Like [`acquire`](Self::acquire), but gives up when `cancel` fires.
    ///
    /// Returns `false` without taking a token if cancelled first.
    pub async fn acquire_or_cancel(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = self.acquire() => true,
        }
    }

    /// Take a token if one is available right now.
    pub fn try_acquire(&self) -> bool {
        let Some(bucket) = &self.bucket else {
            return true;
        };

        let mut bucket = bucket.lock();
        bucket.refill(Instant::now(), &self.config);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    pub fn release(&self, hint: ReleaseHint) {
        let ReleaseHint::Cooldown(hint) = hint else {
            return;
        };
        let Some(bucket) = &self.bucket else {
            debug!("cooldown requested on unlimited limiter, ignoring");
            return;
        };

        let duration = hint.unwrap_or(self.config.cooldown);
        let mut bucket = bucket.lock();
        let now = Instant::now();
        bucket.refill(now, &self.config);
        bucket.tokens = 0.0;

        let until = now + duration;
        bucket.cooldown_until = Some(bucket.cooldown_until.map_or(until, |current| current.max(until)));
        warn!(
            cooldown_secs = duration.as_secs_f64(),
            factor = self.config.cooldown_factor,
            "source rate limit hit, slowing requests"
        );
    }

    pub fn is_cooling_down(&self) -> bool {
        let Some(bucket) = &self.bucket else {
            return false;
        };
        bucket
            .lock()
            .cooldown_until
            .is_some_and(|until| until > Instant::now())
    }
}

fn sanitize(mut config: RateLimitConfig) -> RateLimitConfig {
    let defaults = RateLimitConfig::default();

    config.capacity = config.capacity.max(1);
    if !(config.refill_per_sec.is_finite() && config.refill_per_sec > 0.0) {
        warn!(value = config.refill_per_sec, "invalid refill rate, using default");
        config.refill_per_sec = defaults.refill_per_sec;
    }
    if !(config.cooldown_factor.is_finite() && config.cooldown_factor > 0.0) {
        warn!(value = config.cooldown_factor, "invalid cooldown factor, using default");
        config.cooldown_factor = defaults.cooldown_factor;
    }
    config.cooldown_factor = config.cooldown_factor.min(1.0);
    config
}
