use tessera_pipeline::ParsedSegment;

/// Events from the platform media element adapter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PlaybackEvent {
    Play,
    Pause,
    Seeking { position: f64 },
    Waiting,
    Playing,
    Ended,
    TimeUpdate { position: f64 },
    RateChange { rate: f64 },
}

/// Destination for parsed segments: the platform source buffer.
///
/// Implementations live in the media element adapter; a rejected append is a
/// media error, fatal for the current content.
pub trait SourceBufferSink: Send + Sync {
    fn append(&self, segment: &ParsedSegment) -> Result<(), String>;

    /// Drop buffered media in `[start, end)` seconds.
    fn remove(&self, start: f64, end: f64) -> Result<(), String>;
}
