//! Segment pipeline: transport fetches wrapped with bounded retry, an
//! init-segment cache, progress reporting for chunked transfers, and a
//! metrics feedback loop into the bandwidth estimator.
//!
//! One [`SegmentPipeline`] instance serves one track type.

#![forbid(unsafe_code)]

mod error;
mod init_cache;
mod loader;
mod parser;

pub use error::{PipelineError, PipelineResult};
pub use init_cache::InitCache;
pub use loader::{PipelineOptions, SegmentEvent, SegmentEventStream, SegmentPipeline};
pub use parser::{ParsedInit, ParsedMedia, ParsedSegment, PassthroughParser, SegmentParser};
