use std::time::Duration;

use tessera_abr::SwitchReason;
use tessera_core::{RepresentationId, TrackType};

/// Unified event for the whole engine.
///
/// Hierarchical: each subsystem has its own variant with a sub-enum.
#[derive(Clone, Debug)]
pub enum Event {
    Player(PlayerEvent),
    Abr(AbrEvent),
    Pipeline(PipelineEvent),
}

/// Controller-level events exposed to the embedding API.
#[derive(Clone, Debug)]
pub enum PlayerEvent {
    /// Player state machine transition.
    StateChange { from: &'static str, to: &'static str },
    PositionUpdate { position: f64, duration: Option<f64> },
    /// Recoverable trouble; observational only, never changes state.
    Warning { message: String },
    /// Fatal error; the player has transitioned to stopped.
    Error { message: String },
    ManifestChange { is_live: bool },
}

/// Adaptation events.
#[derive(Clone, Debug)]
pub enum AbrEvent {
    /// The selected representation of a track changed.
    RepresentationChange {
        track_type: TrackType,
        from: Option<RepresentationId>,
        to: RepresentationId,
        bitrate: u64,
        reason: SwitchReason,
    },
    VideoBitrateChange { bitrate: u64 },
    AudioBitrateChange { bitrate: u64 },
}

/// Segment pipeline events.
#[derive(Clone, Debug)]
pub enum PipelineEvent {
    SegmentStart {
        track_type: TrackType,
        representation: RepresentationId,
        media_index: Option<u64>,
    },
    SegmentComplete {
        track_type: TrackType,
        representation: RepresentationId,
        bytes: u64,
        duration: Duration,
    },
    /// A retryable failure was consumed internally.
    RetryWarning {
        track_type: TrackType,
        attempt: u32,
        message: String,
    },
    EndOfStream { track_type: TrackType },
}

impl From<PlayerEvent> for Event {
    fn from(e: PlayerEvent) -> Self {
        Self::Player(e)
    }
}

impl From<AbrEvent> for Event {
    fn from(e: AbrEvent) -> Self {
        Self::Abr(e)
    }
}

impl From<PipelineEvent> for Event {
    fn from(e: PipelineEvent) -> Self {
        Self::Pipeline(e)
    }
}
