use std::time::Duration;

use web_time::Instant;

/// Where the bytes of a sample came from.
///
/// Cache-served bytes say nothing about the link and never reach the EWMAs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SampleSource {
    Network,
    Cache,
}

/// One throughput observation from a completed or in-flight transfer.
#[derive(Clone, Copy, Debug)]
pub struct Sample {
    /// Transfer wall time. Must be positive; sub-millisecond values are
    /// clamped before the bandwidth division.
    pub duration: Duration,
    pub bytes: u64,
    /// True for partial (chunked-transfer) progress samples.
    pub is_chunk: bool,
    pub source: SampleSource,
    pub at: Instant,
}

/// Bandwidth estimator configuration.
#[derive(Clone, Debug)]
pub struct EstimatorOptions {
    /// Half-life of the fast EWMA, seconds.
    pub fast_half_life: f64,
    /// Half-life of the slow EWMA, seconds.
    pub slow_half_life: f64,
    /// No estimate is produced until this many bytes have been sampled.
    pub min_total_bytes: u64,
    /// Samples smaller than this are dropped as unrepresentative.
    pub min_chunk_bytes: u64,
    /// Enables the chunk filter and the low-latency secondary estimate.
    pub low_latency_mode: bool,
}

impl Default for EstimatorOptions {
    fn default() -> Self {
        Self {
            fast_half_life: 2.0,
            slow_half_life: 10.0,
            min_total_bytes: 128_000,
            min_chunk_bytes: 16_000,
            low_latency_mode: false,
        }
    }
}
