use std::{collections::VecDeque, sync::Arc};

use parking_lot::Mutex;

use crate::{
    ewma::Ewma,
    types::{EstimatorOptions, Sample, SampleSource},
};

/// Trait for throughput estimation strategies.
///
/// Lets the chooser be tested against mock estimators.
#[cfg_attr(test, unimock::unimock(api = EstimatorMock))]
pub trait Estimator {
    /// Estimated throughput in bits per second, `None` while warming up.
    ///
    /// `server_may_limit` is true when the observed transfers may be paced by
    /// the origin (chunked media segments); it enables the low-latency
    /// correction.
    fn estimate_bps(&self, server_may_limit: bool) -> Option<u64>;

    /// Push a new throughput sample.
    fn push_sample(&mut self, sample: Sample);

    /// Drop all accumulated state.
    fn reset(&mut self);
}

/// Capacity of the chunk-bandwidth ring used by the low-latency filter.
const CHUNK_RING_LEN: usize = 3;

/// Guard against division by zero on sub-millisecond transfers.
const MIN_DURATION_MS: f64 = 0.5;

/// Two-timescale bandwidth estimator.
///
/// A fast EWMA reacts to sudden drops, a slow EWMA smooths steady state; the
/// published estimate is the minimum of the two. In low-latency mode a ring of
/// the last three chunk bandwidths filters out server-paced samples and
/// provides a secondary estimate for paced origins.
#[derive(Clone, Debug)]
pub struct BandwidthEstimator {
    opts: EstimatorOptions,
    fast: Ewma,
    slow: Ewma,
    bytes_sampled: u64,
    chunk_ring: VecDeque<f64>,
}

impl BandwidthEstimator {
    pub fn new(opts: EstimatorOptions) -> Self {
        let fast = Ewma::from_half_life(opts.fast_half_life);
        let slow = Ewma::from_half_life(opts.slow_half_life);
        Self {
            opts,
            fast,
            slow,
            bytes_sampled: 0,
            chunk_ring: VecDeque::with_capacity(CHUNK_RING_LEN),
        }
    }

    /// Mean of the chunk ring, defined only once the ring is full.
    fn chunk_ring_mean(&self) -> Option<f64> {
        if self.chunk_ring.len() < CHUNK_RING_LEN {
            return None;
        }
        Some(self.chunk_ring.iter().sum::<f64>() / self.chunk_ring.len() as f64)
    }

    pub fn add_sample(&mut self, sample: Sample) {
        if !matches!(sample.source, SampleSource::Network) {
            return;
        }

        let dur_ms = (sample.duration.as_secs_f64() * 1000.0).max(MIN_DURATION_MS);
        let bw = sample.bytes as f64 * 8000.0 / dur_ms;

        if sample.is_chunk && self.opts.low_latency_mode {
            // A chunk landing just under the recent plateau indicates origin
            // pacing, not link capacity. Such samples are discarded entirely.
            if let Some(last) = self.chunk_ring_mean() {
                if last * 0.8 < bw && bw <= last {
                    tracing::trace!(bw, plateau = last, "estimator: paced chunk rejected");
                    return;
                }
            }
            if self.chunk_ring.len() == CHUNK_RING_LEN {
                self.chunk_ring.pop_front();
            }
            self.chunk_ring.push_back(bw);
        }

        if sample.bytes < self.opts.min_chunk_bytes {
            return;
        }

        let weight_secs = dur_ms / 1000.0;
        self.fast.add_sample(weight_secs, bw);
        self.slow.add_sample(weight_secs, bw);
        self.bytes_sampled = self.bytes_sampled.saturating_add(sample.bytes);
    }

    pub fn estimate(&self, server_may_limit: bool) -> Option<u64> {
        let regular = if self.bytes_sampled < self.opts.min_total_bytes {
            None
        } else {
            match (self.fast.estimate(), self.slow.estimate()) {
                (Some(f), Some(s)) => Some(f.min(s)),
                (est, None) | (None, est) => est,
            }
        };

        if !self.opts.low_latency_mode || !server_may_limit {
            return regular.map(|e| e.round() as u64);
        }

        // A paced origin keeps the regular estimate pinned at the pacing rate;
        // the chunk-ring mean tracks what the link actually delivered.
        let low_latency = self.chunk_ring_mean();
        let combined = match (regular, low_latency) {
            (Some(r), Some(l)) => Some(r.max(l)),
            (est, None) | (None, est) => est,
        };
        combined.map(|e| e.round() as u64)
    }

    /// Bytes accumulated since creation or last reset.
    pub fn bytes_sampled(&self) -> u64 {
        self.bytes_sampled
    }

    /// Rebuild both EWMAs and clear the chunk ring.
    ///
    /// The ring is cleared so a pre-reset pacing plateau cannot bound
    /// post-reset estimates.
    pub fn reset(&mut self) {
        self.fast = Ewma::from_half_life(self.opts.fast_half_life);
        self.slow = Ewma::from_half_life(self.opts.slow_half_life);
        self.bytes_sampled = 0;
        self.chunk_ring.clear();
    }
}

impl Estimator for BandwidthEstimator {
    fn estimate_bps(&self, server_may_limit: bool) -> Option<u64> {
        self.estimate(server_may_limit)
    }

    fn push_sample(&mut self, sample: Sample) {
        self.add_sample(sample);
    }

    fn reset(&mut self) {
        self.reset();
    }
}

/// Clonable handle to one estimator shared by several choosers.
///
/// All access is serialized through the inner lock; the engine task is the
/// only writer.
#[derive(Clone, Debug)]
pub struct SharedEstimator {
    inner: Arc<Mutex<BandwidthEstimator>>,
}

impl SharedEstimator {
    pub fn new(opts: EstimatorOptions) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BandwidthEstimator::new(opts))),
        }
    }
}

impl Estimator for SharedEstimator {
    fn estimate_bps(&self, server_may_limit: bool) -> Option<u64> {
        self.inner.lock().estimate(server_may_limit)
    }

    fn push_sample(&mut self, sample: Sample) {
        self.inner.lock().add_sample(sample);
    }

    fn reset(&mut self) {
        self.inner.lock().reset();
    }
}
