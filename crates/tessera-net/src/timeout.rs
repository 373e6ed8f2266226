use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::timeout;
use url::Url;

use crate::{
    error::NetError,
    traits::{ByteStream, Net},
    types::{Headers, RangeSpec},
};

/// Deadline decorator.
///
/// Bounds the time to obtain a response (or a response stream); reading an
/// already-open stream is bounded by the inner client's own request timeout.
pub struct TimeoutNet<N> {
    inner: N,
    timeout: Duration,
}

impl<N: Net> TimeoutNet<N> {
    pub fn new(inner: N, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<N: Net> Net for TimeoutNet<N> {
    async fn get_bytes(&self, url: Url, headers: Option<Headers>) -> Result<Bytes, NetError> {
        timeout(self.timeout, self.inner.get_bytes(url, headers))
            .await
            .map_err(|_| NetError::Timeout)?
    }

    async fn stream(&self, url: Url, headers: Option<Headers>) -> Result<ByteStream, NetError> {
        timeout(self.timeout, self.inner.stream(url, headers))
            .await
            .map_err(|_| NetError::Timeout)?
    }

    async fn get_range(
        &self,
        url: Url,
        range: RangeSpec,
        headers: Option<Headers>,
    ) -> Result<ByteStream, NetError> {
        timeout(self.timeout, self.inner.get_range(url, range, headers))
            .await
            .map_err(|_| NetError::Timeout)?
    }

    async fn head(&self, url: Url, headers: Option<Headers>) -> Result<Headers, NetError> {
        timeout(self.timeout, self.inner.head(url, headers))
            .await
            .map_err(|_| NetError::Timeout)?
    }
}
