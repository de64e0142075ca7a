use std::time::Duration;

/// Per-cell pagination settings.
///
/// # Examples
///
/// ```
/// use gridscan_fetch::FetchOptions;
/// use std::time::Duration;
///
/// let options = FetchOptions::default()
///     .page_timeout(Duration::from_secs(30))
///     .per_cell_cap(200);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOptions {
    /// Upper bound on a single page request. Expiry is a transient error.
    ///
    /// Default: 120s
    pub page_timeout: Duration,

    /// Largest number of results the source returns for one query. Reaching it
    /// means the cell is saturated and some listings may be missing.
    ///
    /// Default: 500
    pub per_cell_cap: usize,

    /// Safety stop for sources that never end pagination.
    ///
    /// Default: 100
    pub max_pages: u32,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            page_timeout: Duration::from_secs(120),
            per_cell_cap: 500,
            max_pages: 100,
        }
    }
}

impl FetchOptions {
    #[must_use]
    pub fn page_timeout(mut self, page_timeout: Duration) -> Self {
        self.page_timeout = page_timeout;
        self
    }

    #[must_use]
    pub fn per_cell_cap(mut self, per_cell_cap: usize) -> Self {
        self.per_cell_cap = per_cell_cap;
        self
    }

    #[must_use]
    pub fn max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Total attempts = 1 + max_retries.
    ///
    /// Default: 3
    pub max_retries: u32,

    /// Delay before the first retry; doubles on each further retry.
    ///
    /// Default: 2s
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Token bucket parameters for the shared [`RateLimiter`](crate::RateLimiter).
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    /// Burst size in requests.
    ///
    /// Default: 1
    pub capacity: u32,

    /// Steady-state requests per second.
    ///
    /// Default: 0.5 (one request every two seconds)
    pub refill_per_sec: f64,

    /// Multiplier applied to the refill rate while cooling down.
    ///
    /// Default: 0.25
    pub cooldown_factor: f64,

    /// Cooldown length when the source gives no explicit hint.
    ///
    /// Default: 60s
    pub cooldown: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: 1,
            refill_per_sec: 0.5,
            cooldown_factor: 0.25,
            cooldown: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    #[must_use]
    pub fn capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    #[must_use]
    pub fn refill_per_sec(mut self, refill_per_sec: f64) -> Self {
        self.refill_per_sec = refill_per_sec;
        self
    }

    #[must_use]
    pub fn cooldown_factor(mut self, cooldown_factor: f64) -> Self {
        self.cooldown_factor = cooldown_factor;
        self
    }

    #[must_use]
    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_source_limits() {
        let fetch = FetchOptions::default();
        assert_eq!(fetch.per_cell_cap, 500);
        assert_eq!(fetch.page_timeout, Duration::from_secs(120));

        let retry = RetryPolicy::default();
        assert_eq!(retry.max_attempts(), 4);
        assert_eq!(retry.base_delay, Duration::from_secs(2));
    }

    #[test]
    fn builders_chain() {
        let rate = RateLimitConfig::default()
            .capacity(5)
            .refill_per_sec(2.0)
            .cooldown_factor(0.5)
            .cooldown(Duration::from_secs(10));
        assert_eq!(rate.capacity, 5);
        assert_eq!(rate.refill_per_sec, 2.0);
        assert_eq!(rate.cooldown, Duration::from_secs(10));
    }
}
