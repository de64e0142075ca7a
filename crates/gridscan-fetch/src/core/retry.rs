use std::time::Duration;

/// Delay before a retry attempt using exponential backoff.
///
/// The delay formula is: `base * 2^retry_count`
///
/// # Arguments
///
/// * `retry_count` - The current retry number (0-indexed: 0 = first retry)
/// * `base` - The base delay duration
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use gridscan_fetch::retry_delay;
///
/// // 2s, 4s, 8s for the three default retries
/// assert_eq!(retry_delay(0, Duration::from_secs(2)), Duration::from_secs(2));
/// assert_eq!(retry_delay(1, Duration::from_secs(2)), Duration::from_secs(4));
/// assert_eq!(retry_delay(2, Duration::from_secs(2)), Duration::from_secs(8));
/// ```
pub fn retry_delay(retry_count: u32, base: Duration) -> Duration {
    let multiplier = 2_u32.saturating_pow(retry_count);
    base.saturating_mul(multiplier)
}
