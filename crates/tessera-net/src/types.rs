use std::{collections::HashMap, time::Duration};

use rand::Rng;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Headers {
    inner: HashMap<String, String>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl From<HashMap<String, String>> for Headers {
    fn from(map: HashMap<String, String>) -> Self {
        Self { inner: map }
    }
}

/// Byte range of a request, `bytes=start-end?`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RangeSpec {
    pub start: u64,
    pub end: Option<u64>,
}

impl RangeSpec {
    pub fn new(start: u64, end: Option<u64>) -> Self {
        Self { start, end }
    }

    pub fn to_header_value(&self) -> String {
        match self.end {
            Some(end) => format!("bytes={}-{}", self.start, end),
            None => format!("bytes={}-", self.start),
        }
    }
}

#[derive(Clone, Debug)]
pub struct NetOptions {
    /// Deadline applied to every request.
    pub request_timeout: Duration,
    pub pool_max_idle_per_host: usize,
}

impl Default for NetOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            pool_max_idle_per_host: 4,
        }
    }
}

/// Truncated exponential backoff with jitter.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Retries after the first attempt. 0 disables retry.
    pub max_retry: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Uniform jitter added on top of the truncated delay.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_millis(3_000),
            jitter: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub fn without_retry() -> Self {
        Self {
            max_retry: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based):
    /// `min(base * 2^attempt, max) + jitter in [0, jitter)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2_u32.saturating_pow(attempt));
        let truncated = exp.min(self.max_delay);
        if self.jitter.is_zero() {
            return truncated;
        }
        let jitter_ms = rand::rng().random_range(0..self.jitter.as_millis() as u64);
        truncated + Duration::from_millis(jitter_ms)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0, 200, 400)]
    #[case(1, 400, 600)]
    #[case(2, 800, 1000)]
    #[case(3, 1600, 1800)]
    #[case(4, 3000, 3200)] // truncated at max_delay
    #[case(10, 3000, 3200)] // overflow-safe far past truncation
    fn backoff_windows(#[case] attempt: u32, #[case] lo_ms: u64, #[case] hi_ms: u64) {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let d = policy.delay_for_attempt(attempt);
            assert!(
                d >= Duration::from_millis(lo_ms) && d < Duration::from_millis(hi_ms),
                "attempt {attempt}: {d:?} outside [{lo_ms}, {hi_ms}) ms"
            );
        }
    }

    #[test]
    fn zero_jitter_is_deterministic() {
        let policy = RetryPolicy {
            jitter: Duration::ZERO,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(400));
    }

    #[test]
    fn range_header_formatting() {
        assert_eq!(RangeSpec::new(0, Some(499)).to_header_value(), "bytes=0-499");
        assert_eq!(RangeSpec::new(500, None).to_header_value(), "bytes=500-");
    }

    #[test]
    fn headers_lookup_is_case_insensitive() {
        let mut h = Headers::new();
        h.insert("Content-Length", "123");
        assert_eq!(h.get("content-length"), Some("123"));
    }
}
