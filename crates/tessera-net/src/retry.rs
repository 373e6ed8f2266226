use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::sleep;
use tracing::warn;
use url::Url;

use crate::{
    error::NetError,
    traits::{ByteStream, Net},
    types::{Headers, RangeSpec, RetryPolicy},
};

/// Decides whether an error is worth another attempt.
pub trait RetryClassifier: Send + Sync {
    fn should_retry(&self, error: &NetError) -> bool;
}

/// Default classifier: defer to [`NetError::is_retryable`].
pub struct StatusRetryClassifier;

impl RetryClassifier for StatusRetryClassifier {
    fn should_retry(&self, error: &NetError) -> bool {
        error.is_retryable()
    }
}

/// Retry decorator with truncated exponential backoff.
///
/// Attempt `n` failing retryably sleeps `policy.delay_for_attempt(n)` before
/// the next attempt, up to `policy.max_retry` retries.
pub struct RetryNet<N, C> {
    inner: N,
    policy: RetryPolicy,
    classifier: C,
}

impl<N: Net, C: RetryClassifier> RetryNet<N, C> {
    pub fn new(inner: N, policy: RetryPolicy, classifier: C) -> Self {
        Self {
            inner,
            policy,
            classifier,
        }
    }

    async fn run<T, F, Fut>(&self, url: &Url, op: F) -> Result<T, NetError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, NetError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if !self.classifier.should_retry(&error) {
                        return Err(error);
                    }
                    if attempt >= self.policy.max_retry {
                        return Err(NetError::RetryExhausted {
                            attempts: attempt + 1,
                            source: Box::new(error),
                        });
                    }
                    let delay = self.policy.delay_for_attempt(attempt);
                    warn!(
                        url = %url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "net: retryable failure, backing off"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait]
impl<N: Net, C: RetryClassifier> Net for RetryNet<N, C> {
    async fn get_bytes(&self, url: Url, headers: Option<Headers>) -> Result<Bytes, NetError> {
        self.run(&url, || self.inner.get_bytes(url.clone(), headers.clone()))
            .await
    }

    async fn stream(&self, url: Url, headers: Option<Headers>) -> Result<ByteStream, NetError> {
        self.run(&url, || self.inner.stream(url.clone(), headers.clone()))
            .await
    }

    async fn get_range(
        &self,
        url: Url,
        range: RangeSpec,
        headers: Option<Headers>,
    ) -> Result<ByteStream, NetError> {
        self.run(&url, || {
            self.inner
                .get_range(url.clone(), range.clone(), headers.clone())
        })
        .await
    }

    async fn head(&self, url: Url, headers: Option<Headers>) -> Result<Headers, NetError> {
        self.run(&url, || self.inner.head(url.clone(), headers.clone()))
            .await
    }
}
