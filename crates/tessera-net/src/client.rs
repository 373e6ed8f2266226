use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use reqwest::Client;
use url::Url;

use crate::{
    error::NetError,
    traits::{ByteStream, Net},
    types::{Headers, NetOptions, RangeSpec},
};

/// `reqwest`-backed transport.
#[derive(Clone, Debug)]
pub struct HttpClient {
    inner: Client,
    options: NetOptions,
}

impl HttpClient {
    /// Panics only if the TLS backend cannot initialize, which is a
    /// process-fatal misconfiguration.
    pub fn new(options: NetOptions) -> Self {
        let inner = Client::builder()
            .pool_max_idle_per_host(options.pool_max_idle_per_host)
            .build()
            .expect("failed to build reqwest client");
        Self { inner, options }
    }

    fn apply_headers(
        mut req: reqwest::RequestBuilder,
        headers: Option<Headers>,
    ) -> reqwest::RequestBuilder {
        if let Some(headers) = headers {
            for (k, v) in headers.iter() {
                req = req.header(k, v);
            }
        }
        req
    }

    async fn send(
        &self,
        req: reqwest::RequestBuilder,
        url: &Url,
        accept_partial: bool,
    ) -> Result<reqwest::Response, NetError> {
        let resp = req
            .timeout(self.options.request_timeout)
            .send()
            .await
            .map_err(NetError::from)?;
        let status = resp.status();
        let ok = status.is_success() || (accept_partial && status.as_u16() == 206);
        if !ok {
            return Err(NetError::Status {
                status: status.as_u16(),
                url: url.clone(),
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl Net for HttpClient {
    async fn get_bytes(&self, url: Url, headers: Option<Headers>) -> Result<Bytes, NetError> {
        let req = Self::apply_headers(self.inner.get(url.clone()), headers);
        let resp = self.send(req, &url, false).await?;
        resp.bytes().await.map_err(NetError::from)
    }

    async fn stream(&self, url: Url, headers: Option<Headers>) -> Result<ByteStream, NetError> {
        let req = Self::apply_headers(self.inner.get(url.clone()), headers);
        let resp = self.send(req, &url, false).await?;
        Ok(Box::pin(resp.bytes_stream().map_err(NetError::from)))
    }

    async fn get_range(
        &self,
        url: Url,
        range: RangeSpec,
        headers: Option<Headers>,
    ) -> Result<ByteStream, NetError> {
        let req = self
            .inner
            .get(url.clone())
            .header("Range", range.to_header_value());
        let req = Self::apply_headers(req, headers);
        let resp = self.send(req, &url, true).await?;
        Ok(Box::pin(resp.bytes_stream().map_err(NetError::from)))
    }

    async fn head(&self, url: Url, headers: Option<Headers>) -> Result<Headers, NetError> {
        let req = Self::apply_headers(self.inner.head(url.clone()), headers);
        let resp = self.send(req, &url, false).await?;

        let mut out = Headers::new();
        for (name, value) in resp.headers() {
            if let Ok(v) = value.to_str() {
                out.insert(name.as_str(), v);
            }
        }
        Ok(out)
    }
}
