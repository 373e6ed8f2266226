use std::{pin::Pin, sync::Arc, time::Duration};

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use web_time::Instant;

use tessera_abr::{Sample, SampleSource};
use tessera_core::{Representation, SegmentDescriptor, SegmentPosition, TrackType};
use tessera_events::{EventBus, MetricsBus, PipelineEvent};
use tessera_net::{Headers, Net, NetError, RangeSpec, RetryPolicy};

use crate::{
    error::{PipelineError, PipelineResult},
    init_cache::InitCache,
    parser::{ParsedInit, ParsedSegment, SegmentParser},
};

#[derive(Clone, Debug)]
pub struct PipelineOptions {
    pub retry: RetryPolicy,
    /// Minimum interval between intermediate progress samples.
    pub progress_interval: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            progress_interval: Duration::from_millis(200),
        }
    }
}

/// Items yielded by [`SegmentPipeline::load_segment`].
///
/// Zero or more `Progress` items (chunked transfers only), then exactly one
/// terminal `Parsed`. A cancelled load yields nothing further at all.
#[derive(Clone, Debug)]
pub enum SegmentEvent {
    Progress { bytes: u64, elapsed: Duration },
    Parsed(ParsedSegment),
}

pub type SegmentEventStream = Pin<Box<dyn Stream<Item = PipelineResult<SegmentEvent>> + Send>>;

/// One segment pipeline per track type.
///
/// Owns nothing shared except the per-content [`InitCache`]; peers arrive by
/// constructor injection.
#[derive(Clone)]
pub struct SegmentPipeline {
    track_type: TrackType,
    net: Arc<dyn Net>,
    parser: Arc<dyn SegmentParser>,
    metrics: MetricsBus,
    events: EventBus,
    init_cache: InitCache,
    cancel: CancellationToken,
    opts: PipelineOptions,
}

impl SegmentPipeline {
    #[expect(clippy::too_many_arguments)]
    pub fn new(
        track_type: TrackType,
        net: Arc<dyn Net>,
        parser: Arc<dyn SegmentParser>,
        metrics: MetricsBus,
        events: EventBus,
        init_cache: InitCache,
        cancel: CancellationToken,
        opts: PipelineOptions,
    ) -> Self {
        Self {
            track_type,
            net,
            parser,
            metrics,
            events,
            init_cache,
            cancel,
            opts,
        }
    }

    pub fn track_type(&self) -> TrackType {
        self.track_type
    }

    /// Load one segment.
    ///
    /// Retryable failures are consumed internally (surfaced as
    /// [`PipelineEvent::RetryWarning`]); the stream errors only on fatal or
    /// budget-exhausted failures. Initialization segments go through the
    /// init cache and emit no throughput samples.
    pub fn load_segment(
        &self,
        repr: Representation,
        desc: SegmentDescriptor,
    ) -> SegmentEventStream {
        match desc.position {
            SegmentPosition::Init => self.load_init(repr, desc),
            SegmentPosition::Media(_) => self.load_media(repr, desc),
        }
    }

    fn load_init(&self, repr: Representation, desc: SegmentDescriptor) -> SegmentEventStream {
        let this = self.clone();
        Box::pin(async_stream::stream! {
            this.events.publish(PipelineEvent::SegmentStart {
                track_type: this.track_type,
                representation: repr.id.clone(),
                media_index: None,
            });

            let key = repr.id.clone();
            let result = this
                .init_cache
                .get_or_fetch(&key, || {
                    let this = this.clone();
                    let repr = repr.clone();
                    let desc = desc.clone();
                    async move { this.fetch_and_parse_init(&repr, &desc).await }
                })
                .await;

            match result {
                Ok(init) => yield Ok(SegmentEvent::Parsed(ParsedSegment::Init(init))),
                // Cancelled loads end silently, without a terminal event.
                Err(PipelineError::Cancelled) => {}
                Err(e) => yield Err(e),
            }
        })
    }

    fn load_media(&self, repr: Representation, desc: SegmentDescriptor) -> SegmentEventStream {
        let this = self.clone();
        Box::pin(async_stream::stream! {
            let media_index = match desc.position {
                SegmentPosition::Media(n) => Some(n),
                SegmentPosition::Init => None,
            };
            this.events.publish(PipelineEvent::SegmentStart {
                track_type: this.track_type,
                representation: repr.id.clone(),
                media_index,
            });

            let mut attempt: u32 = 0;
            let mut parse_retried = false;
            let mut bypass_cache = false;

            'attempts: loop {
                let started = Instant::now();
                let opened = tokio::select! {
                    () = this.cancel.cancelled() => return,
                    r = this.open_body(&desc, bypass_cache) => r,
                };

                let mut body = match opened {
                    Ok(body) => body,
                    Err(error) => {
                        match this.classify(error, &mut attempt).await {
                            RetryOutcome::Retry => continue 'attempts,
                            RetryOutcome::Cancelled => return,
                            RetryOutcome::Fatal(e) => {
                                yield Err(e);
                                return;
                            }
                        }
                    }
                };

                let mut buf = BytesMut::new();
                let mut chunk_count: u32 = 0;
                let mut last_progress = started;
                let mut read_error: Option<NetError> = None;

                loop {
                    let next = tokio::select! {
                        () = this.cancel.cancelled() => return,
                        chunk = body.next() => chunk,
                    };
                    match next {
                        Some(Ok(chunk)) => {
                            buf.extend_from_slice(&chunk);
                            chunk_count += 1;
                            // Chunked transfer: report partial progress, at
                            // most once per progress interval.
                            if chunk_count > 1
                                && last_progress.elapsed() >= this.opts.progress_interval
                            {
                                last_progress = Instant::now();
                                let elapsed = started.elapsed();
                                this.metrics.emit(this.track_type, Sample {
                                    duration: elapsed,
                                    bytes: buf.len() as u64,
                                    is_chunk: true,
                                    source: SampleSource::Network,
                                    at: Instant::now(),
                                });
                                yield Ok(SegmentEvent::Progress {
                                    bytes: buf.len() as u64,
                                    elapsed,
                                });
                            }
                        }
                        Some(Err(error)) => {
                            read_error = Some(error);
                            break;
                        }
                        None => break,
                    }
                }

                if let Some(error) = read_error {
                    match this.classify(error, &mut attempt).await {
                        RetryOutcome::Retry => continue 'attempts,
                        RetryOutcome::Cancelled => return,
                        RetryOutcome::Fatal(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }

                let elapsed = started.elapsed();
                let payload = buf.freeze();
                let init = this.init_cache.get(&repr.id);

                match this
                    .parser
                    .parse_media(&repr, &desc, payload.clone(), init.as_ref())
                {
                    Ok(media) => {
                        this.metrics.emit(this.track_type, Sample {
                            duration: elapsed,
                            bytes: payload.len() as u64,
                            is_chunk: false,
                            source: SampleSource::Network,
                            at: Instant::now(),
                        });
                        this.events.publish(PipelineEvent::SegmentComplete {
                            track_type: this.track_type,
                            representation: repr.id.clone(),
                            bytes: payload.len() as u64,
                            duration: elapsed,
                        });
                        debug!(
                            track = %this.track_type,
                            repr = %repr.id,
                            bytes = payload.len(),
                            elapsed_ms = elapsed.as_millis() as u64,
                            "pipeline: segment loaded"
                        );
                        yield Ok(SegmentEvent::Parsed(ParsedSegment::Media(media)));
                        return;
                    }
                    Err(message) if !parse_retried => {
                        // One fresh fetch bypassing intermediate caches.
                        parse_retried = true;
                        bypass_cache = true;
                        warn!(
                            track = %this.track_type,
                            repr = %repr.id,
                            %message,
                            "pipeline: parse failed, refetching once"
                        );
                        this.events.publish(PipelineEvent::RetryWarning {
                            track_type: this.track_type,
                            attempt,
                            message,
                        });
                        continue 'attempts;
                    }
                    Err(message) => {
                        yield Err(PipelineError::Parse(message));
                        return;
                    }
                }
            }
        })
    }

    async fn fetch_and_parse_init(
        &self,
        repr: &Representation,
        desc: &SegmentDescriptor,
    ) -> PipelineResult<ParsedInit> {
        let mut attempt: u32 = 0;
        let mut parse_retried = false;
        let mut bypass_cache = false;

        loop {
            let fetched = tokio::select! {
                () = self.cancel.cancelled() => return Err(PipelineError::Cancelled),
                r = self.get_all(desc, bypass_cache) => r,
            };

            let bytes = match fetched {
                Ok(bytes) => bytes,
                Err(error) => match self.classify(error, &mut attempt).await {
                    RetryOutcome::Retry => continue,
                    RetryOutcome::Cancelled => return Err(PipelineError::Cancelled),
                    RetryOutcome::Fatal(e) => return Err(e),
                },
            };

            match self.parser.parse_init(repr, bytes) {
                Ok(init) => return Ok(init),
                Err(message) if !parse_retried => {
                    parse_retried = true;
                    bypass_cache = true;
                    self.events.publish(PipelineEvent::RetryWarning {
                        track_type: self.track_type,
                        attempt,
                        message,
                    });
                }
                Err(message) => return Err(PipelineError::Parse(message)),
            }
        }
    }

    /// Classify a transport failure: back off and retry, or report fatal.
    async fn classify(&self, error: NetError, attempt: &mut u32) -> RetryOutcome {
        if !error.is_retryable() {
            return RetryOutcome::Fatal(error.into());
        }
        if *attempt >= self.opts.retry.max_retry {
            return RetryOutcome::Fatal(
                NetError::RetryExhausted {
                    attempts: *attempt + 1,
                    source: Box::new(error),
                }
                .into(),
            );
        }
        let delay = self.opts.retry.delay_for_attempt(*attempt);
        warn!(
            track = %self.track_type,
            attempt = *attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "pipeline: retryable failure, backing off"
        );
        self.events.publish(PipelineEvent::RetryWarning {
            track_type: self.track_type,
            attempt: *attempt,
            message: error.to_string(),
        });
        tokio::select! {
            () = self.cancel.cancelled() => return RetryOutcome::Cancelled,
            () = tokio::time::sleep(delay) => {}
        }
        *attempt += 1;
        RetryOutcome::Retry
    }

    fn bypass_headers(bypass_cache: bool) -> Option<Headers> {
        bypass_cache.then(|| {
            let mut headers = Headers::new();
            headers.insert("Cache-Control", "no-cache");
            headers
        })
    }

    async fn open_body(
        &self,
        desc: &SegmentDescriptor,
        bypass_cache: bool,
    ) -> Result<tessera_net::ByteStream, NetError> {
        let headers = Self::bypass_headers(bypass_cache);
        match desc.byte_range {
            Some((start, end)) => {
                self.net
                    .get_range(desc.url.clone(), RangeSpec::new(start, end), headers)
                    .await
            }
            None => self.net.stream(desc.url.clone(), headers).await,
        }
    }

    async fn get_all(
        &self,
        desc: &SegmentDescriptor,
        bypass_cache: bool,
    ) -> Result<Bytes, NetError> {
        let headers = Self::bypass_headers(bypass_cache);
        match desc.byte_range {
            Some((start, end)) => {
                let mut stream = self
                    .net
                    .get_range(desc.url.clone(), RangeSpec::new(start, end), headers)
                    .await?;
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(buf.freeze())
            }
            None => self.net.get_bytes(desc.url.clone(), headers).await,
        }
    }
}

enum RetryOutcome {
    Retry,
    Cancelled,
    Fatal(PipelineError),
}
