use tokio::sync::mpsc;

use tessera_abr::Sample;
use tessera_core::TrackType;

/// One throughput observation, tagged with the track that produced it.
#[derive(Clone, Copy, Debug)]
pub struct TrackSample {
    pub track_type: TrackType,
    pub sample: Sample,
}

/// Fan-in of per-request samples from the pipelines to the estimator.
///
/// Multi-producer, single-consumer: every pipeline clones the bus, the engine
/// task drains the receiver. Per-producer emission order is preserved, and the
/// single consumer serializes application to the estimator.
#[derive(Clone, Debug)]
pub struct MetricsBus {
    tx: mpsc::UnboundedSender<TrackSample>,
}

pub type MetricsReceiver = mpsc::UnboundedReceiver<TrackSample>;

impl MetricsBus {
    #[must_use]
    pub fn new() -> (Self, MetricsReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Emit one sample. A dropped receiver (content stopped) makes this a
    /// no-op.
    pub fn emit(&self, track_type: TrackType, sample: Sample) {
        let _ = self.tx.send(TrackSample { track_type, sample });
    }
}
