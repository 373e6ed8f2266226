use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use tessera_net::{
    ByteStream, Headers, Net, NetError, NetExt, RangeSpec, RetryNet, RetryPolicy,
    StatusRetryClassifier,
};
use url::Url;

/// Scripted transport: fails with the scripted errors, then succeeds.
struct ScriptedNet {
    attempts: AtomicU32,
    script: Mutex<Vec<NetError>>,
}

impl ScriptedNet {
    fn failing_times(error: NetError, times: usize) -> Self {
        Self {
            attempts: AtomicU32::new(0),
            script: Mutex::new(vec![error; times]),
        }
    }

    fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Net for ScriptedNet {
    async fn get_bytes(&self, _url: Url, _headers: Option<Headers>) -> Result<Bytes, NetError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop();
        match next {
            Some(error) => Err(error),
            None => Ok(Bytes::from_static(b"payload")),
        }
    }

    async fn stream(&self, url: Url, headers: Option<Headers>) -> Result<ByteStream, NetError> {
        let bytes = self.get_bytes(url, headers).await?;
        Ok(Box::pin(futures::stream::iter(vec![
            Ok::<_, NetError>(bytes),
        ])))
    }

    async fn get_range(
        &self,
        url: Url,
        _range: RangeSpec,
        headers: Option<Headers>,
    ) -> Result<ByteStream, NetError> {
        self.stream(url, headers).await
    }

    async fn head(&self, _url: Url, _headers: Option<Headers>) -> Result<Headers, NetError> {
        Ok(Headers::new())
    }
}

fn status(status: u16) -> NetError {
    NetError::Status {
        status,
        url: test_url(),
    }
}

fn test_url() -> Url {
    Url::parse("http://example.com/seg.m4s").unwrap()
}

fn policy(max_retry: u32) -> RetryPolicy {
    RetryPolicy {
        max_retry,
        ..RetryPolicy::default()
    }
}

#[tokio::test(start_paused = true)]
async fn retries_until_success_with_backoff_in_windows() {
    let inner = Arc::new(ScriptedNet::failing_times(status(503), 3));
    let net = RetryNet::new(inner.clone(), policy(3), StatusRetryClassifier);

    let t0 = tokio::time::Instant::now();
    let bytes = net.get_bytes(test_url(), None).await.unwrap();
    let elapsed = t0.elapsed();

    assert_eq!(&bytes[..], b"payload");
    assert_eq!(inner.attempts(), 4, "three failures then success");

    // Backoffs: [200,400) + [400,600) + [800,1000) ms.
    assert!(
        elapsed >= Duration::from_millis(1_400) && elapsed < Duration::from_millis(2_000),
        "total backoff {elapsed:?} outside the expected window"
    );
}

#[tokio::test(start_paused = true)]
async fn exhausted_budget_reports_attempt_count() {
    let inner = Arc::new(ScriptedNet::failing_times(status(503), 10));
    let net = RetryNet::new(inner.clone(), policy(3), StatusRetryClassifier);

    let err = net.get_bytes(test_url(), None).await.unwrap_err();
    assert_eq!(inner.attempts(), 4);
    match err {
        NetError::RetryExhausted { attempts, source } => {
            assert_eq!(attempts, 4);
            assert!(matches!(*source, NetError::Status { status: 503, .. }));
        }
        other => panic!("expected RetryExhausted, got {other}"),
    }
}

#[tokio::test]
async fn fatal_status_is_not_retried() {
    let inner = Arc::new(ScriptedNet::failing_times(status(404), 1));
    let net = RetryNet::new(inner.clone(), policy(3), StatusRetryClassifier);

    let err = net.get_bytes(test_url(), None).await.unwrap_err();
    assert_eq!(inner.attempts(), 1, "404 must fail on first attempt");
    assert!(matches!(err, NetError::Status { status: 404, .. }));
}

#[tokio::test]
async fn zero_max_retry_disables_retry() {
    let inner = Arc::new(ScriptedNet::failing_times(status(503), 1));
    let net = RetryNet::new(inner.clone(), policy(0), StatusRetryClassifier);

    let err = net.get_bytes(test_url(), None).await.unwrap_err();
    assert_eq!(inner.attempts(), 1);
    assert!(matches!(err, NetError::RetryExhausted { attempts: 1, .. }));
}

#[tokio::test(start_paused = true)]
async fn timeout_is_classified_retryable() {
    let inner = Arc::new(ScriptedNet::failing_times(NetError::Timeout, 1));
    let net = RetryNet::new(inner.clone(), policy(3), StatusRetryClassifier);

    let bytes = net.get_bytes(test_url(), None).await.unwrap();
    assert_eq!(&bytes[..], b"payload");
    assert_eq!(inner.attempts(), 2);
}

#[tokio::test]
async fn ext_composition_builds_layered_client() {
    // Compile-and-run check of the decorator chain on a scripted transport.
    let net = ScriptedNet::failing_times(status(500), 1)
        .with_timeout(Duration::from_secs(5))
        .with_retry(policy(2));
    let bytes = net.get_bytes(test_url(), None).await.unwrap();
    assert_eq!(&bytes[..], b"payload");
}
