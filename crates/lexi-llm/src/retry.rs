//! Backoff schedule and server retry hints for rate-limited calls.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

static RETRY_IN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)retry in (\d+(?:\.\d+)?)s").unwrap());
/// Longest server hint honoured; larger hints are clamped to this.
pub const MAX_HINT: Duration = Duration::from_secs(3600);

static RETRY_DELAY_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""retryDelay"\s*:\s*"(\d+(?:\.\d+)?)s""#).unwrap());

/// Retry settings for rate limits and timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles each time.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff after the 0-based `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Backoff, or the server hint when that is longer.
    pub fn delay(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let backoff = self.backoff(attempt);
        match hint {
            Some(h) if h > backoff => h,
            _ => backoff,
        }
    }

    /// Whether another attempt follows the 0-based `attempt`.
    pub fn has_next(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }
}

/// Server-suggested wait found in a response body.
pub fn retry_hint_from_body(body: &str) -> Option<Duration> {
    RETRY_IN
        .captures(body)
        .or_else(|| RETRY_DELAY_FIELD.captures(body))
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .and_then(seconds)
}

/// `Retry-After` header value in seconds.
pub fn retry_hint_from_header(value: &str) -> Option<Duration> {
    value.trim().parse::<f64>().ok().and_then(seconds)
}

fn seconds(secs: f64) -> Option<Duration> {
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    let wait = Duration::try_from_secs_f64(secs).unwrap_or(MAX_HINT);
    Some(wait.min(MAX_HINT))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(5));
        assert_eq!(policy.backoff(1), Duration::from_secs(10));
        assert_eq!(policy.backoff(2), Duration::from_secs(20));
        assert!(policy.has_next(1));
        assert!(!policy.has_next(2));
    }

    #[test]
    fn test_larger_hint_wins() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.delay(0, Some(Duration::from_secs(30))),
            Duration::from_secs(30)
        );
        assert_eq!(
            policy.delay(1, Some(Duration::from_secs(3))),
            Duration::from_secs(10)
        );
        assert_eq!(policy.delay(0, None), Duration::from_secs(5));
    }

    #[test]
    fn test_body_hints() {
        assert_eq!(
            retry_hint_from_body("Quota exceeded. Please retry in 17.5s."),
            Some(Duration::from_millis(17_500))
        );
        assert_eq!(
            retry_hint_from_body(r#"{"details":[{"retryDelay": "42s"}]}"#),
            Some(Duration::from_secs(42))
        );
        assert_eq!(retry_hint_from_body("slow down"), None);
        assert_eq!(retry_hint_from_header(" 8 "), Some(Duration::from_secs(8)));
        assert_eq!(retry_hint_from_header("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }

    #[test]
    fn test_oversized_hints_are_clamped() {
        assert_eq!(retry_hint_from_header("1e30"), Some(MAX_HINT));
        assert_eq!(retry_hint_from_header("7200"), Some(MAX_HINT));
        assert_eq!(
            retry_hint_from_body("Please retry in 99999999999999999999999s."),
            Some(MAX_HINT)
        );
        assert_eq!(retry_hint_from_header("-3"), None);
        assert_eq!(retry_hint_from_header("NaN"), None);
    }
}
