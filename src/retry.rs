//! Backoff and transient-error helpers shared by the HTTP clients.

use std::time::Duration;

/// Default retry attempts for rate-limited requests.
pub const DEFAULT_RATE_LIMIT_RETRIES: u32 = 5;

/// Default retry attempts for transient network errors.
pub const DEFAULT_NETWORK_RETRIES: u32 = 3;

/// Base delay for exponential backoff.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Cap for any single backoff delay.
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(60);

/// Whether a reqwest error is transient and worth retrying.
///
/// Connection failures, timeouts, interrupted body transfers and gateway
/// errors (502/503/504) qualify; everything else does not.
pub fn is_transient_network_error(error: &reqwest::Error) -> bool {
    if error.is_connect() || error.is_timeout() || error.is_body() {
        return true;
    }

    if let Some(status) = error.status() {
        return matches!(status.as_u16(), 502 | 503 | 504);
    }

    false
}

/// Parse a Retry-After header as integer seconds, if present.
pub fn parse_retry_after(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
}

/// Exponential backoff delay with a fixed half-base jitter.
///
/// `min(base * 2^attempt + jitter, max)`.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let exponential = base.saturating_mul(2u32.saturating_pow(attempt));
    let jitter_ms = (base.as_millis() as u64).min(1000);
    let jitter = Duration::from_millis(jitter_ms / 2);
    exponential.saturating_add(jitter).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_per_attempt() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(60);

        assert!(backoff_delay(0, base, max) >= Duration::from_secs(1));
        assert!(backoff_delay(1, base, max) >= Duration::from_secs(2));
        assert!(backoff_delay(2, base, max) >= Duration::from_secs(4));
    }

    #[test]
    fn test_backoff_respects_max() {
        let delay = backoff_delay(12, Duration::from_secs(1), Duration::from_secs(60));
        assert!(delay <= Duration::from_secs(60));
    }

    #[test]
    fn test_backoff_small_base() {
        let delay = backoff_delay(0, Duration::from_millis(100), Duration::from_secs(10));
        assert!(delay >= Duration::from_millis(100));
        assert!(delay <= Duration::from_millis(150));
    }

    #[test]
    fn test_default_constants() {
        assert_eq!(DEFAULT_RATE_LIMIT_RETRIES, 5);
        assert_eq!(DEFAULT_NETWORK_RETRIES, 3);
        assert_eq!(DEFAULT_BACKOFF_BASE, Duration::from_secs(1));
        assert_eq!(DEFAULT_BACKOFF_MAX, Duration::from_secs(60));
    }
}
