use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use url::Url;

use crate::{
    error::NetError,
    types::{Headers, RangeSpec},
};

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, NetError>> + Send>>;

/// Minimal transport surface the engine fetches through.
#[async_trait]
pub trait Net: Send + Sync {
    /// Fetch a full response body.
    async fn get_bytes(&self, url: Url, headers: Option<Headers>) -> Result<Bytes, NetError>;

    /// Stream a response body chunk by chunk.
    async fn stream(&self, url: Url, headers: Option<Headers>) -> Result<ByteStream, NetError>;

    /// Stream a byte range of a response body.
    async fn get_range(
        &self,
        url: Url,
        range: RangeSpec,
        headers: Option<Headers>,
    ) -> Result<ByteStream, NetError>;

    /// HEAD request, returning the response headers.
    async fn head(&self, url: Url, headers: Option<Headers>) -> Result<Headers, NetError>;
}

#[async_trait]
impl<T: Net + ?Sized> Net for std::sync::Arc<T> {
    async fn get_bytes(&self, url: Url, headers: Option<Headers>) -> Result<Bytes, NetError> {
        (**self).get_bytes(url, headers).await
    }

    async fn stream(&self, url: Url, headers: Option<Headers>) -> Result<ByteStream, NetError> {
        (**self).stream(url, headers).await
    }

    async fn get_range(
        &self,
        url: Url,
        range: RangeSpec,
        headers: Option<Headers>,
    ) -> Result<ByteStream, NetError> {
        (**self).get_range(url, range, headers).await
    }

    async fn head(&self, url: Url, headers: Option<Headers>) -> Result<Headers, NetError> {
        (**self).head(url, headers).await
    }
}

/// Decorator constructors.
pub trait NetExt: Net + Sized {
    fn with_timeout(self, timeout: std::time::Duration) -> crate::timeout::TimeoutNet<Self>;

    fn with_retry(
        self,
        policy: crate::types::RetryPolicy,
    ) -> crate::retry::RetryNet<Self, crate::retry::StatusRetryClassifier>;
}

impl<T: Net> NetExt for T {
    fn with_timeout(self, timeout: std::time::Duration) -> crate::timeout::TimeoutNet<Self> {
        crate::timeout::TimeoutNet::new(self, timeout)
    }

    fn with_retry(
        self,
        policy: crate::types::RetryPolicy,
    ) -> crate::retry::RetryNet<Self, crate::retry::StatusRetryClassifier> {
        crate::retry::RetryNet::new(self, policy, crate::retry::StatusRetryClassifier)
    }
}
