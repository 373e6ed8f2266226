use tokio::sync::watch;

use crate::ranges::BufferedRanges;

/// Gap below which playback cannot be sustained while intending to play.
const MIN_PLAYABLE_GAP: f64 = 0.5;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StallReason {
    Buffering,
    Seeking,
}

/// Snapshot consumed by the chooser and the controller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BufferHealth {
    /// Seconds of contiguous media ahead of the playhead.
    pub gap: f64,
    pub stalled: bool,
    pub reason: Option<StallReason>,
}

impl Default for BufferHealth {
    fn default() -> Self {
        Self {
            gap: 0.0,
            stalled: false,
            reason: None,
        }
    }
}

/// Tracks buffered ranges and stall state; publishes a [`BufferHealth`]
/// stream over a watch edge.
///
/// Stalled iff the platform reported `waiting`/`stalled` and no `playing` has
/// followed, or the gap dropped under half a second while intending to play.
#[derive(Debug)]
pub struct BufferMonitor {
    ranges: BufferedRanges,
    position: f64,
    intent_to_play: bool,
    platform_stall: Option<StallReason>,
    tx: watch::Sender<BufferHealth>,
}

impl BufferMonitor {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(BufferHealth::default());
        Self {
            ranges: BufferedRanges::new(),
            position: 0.0,
            intent_to_play: false,
            platform_stall: None,
            tx,
        }
    }

    /// Subscribe to health updates. The receiver always observes the latest
    /// value; intermediate states may be skipped but never reordered.
    pub fn subscribe(&self) -> watch::Receiver<BufferHealth> {
        self.tx.subscribe()
    }

    pub fn ranges(&self) -> &BufferedRanges {
        &self.ranges
    }

    pub fn health(&self) -> BufferHealth {
        *self.tx.borrow()
    }

    pub fn append(&mut self, start: f64, end: f64) {
        self.ranges.append(start, end);
        self.recompute();
    }

    pub fn remove(&mut self, start: f64, end: f64) {
        self.ranges.remove(start, end);
        self.recompute();
    }

    pub fn set_position(&mut self, position: f64) {
        self.position = position;
        self.recompute();
    }

    pub fn set_intent_to_play(&mut self, intent: bool) {
        self.intent_to_play = intent;
        self.recompute();
    }

    /// Platform reported `waiting` or `stalled`.
    pub fn note_waiting(&mut self, reason: StallReason) {
        self.platform_stall = Some(reason);
        self.recompute();
    }

    /// Platform reported `playing`; clears any platform stall.
    pub fn note_playing(&mut self) {
        self.platform_stall = None;
        self.recompute();
    }

    /// Forget everything (content stop).
    pub fn reset(&mut self) {
        self.ranges = BufferedRanges::new();
        self.position = 0.0;
        self.intent_to_play = false;
        self.platform_stall = None;
        self.recompute();
    }

    fn recompute(&mut self) {
        let gap = self.ranges.gap(self.position);
        let starved = gap < MIN_PLAYABLE_GAP && self.intent_to_play;
        let stalled = self.platform_stall.is_some() || starved;
        let reason = if stalled {
            Some(self.platform_stall.unwrap_or(StallReason::Buffering))
        } else {
            None
        };
        let health = BufferHealth {
            gap,
            stalled,
            reason,
        };
        if health != *self.tx.borrow() {
            tracing::trace!(gap, stalled, "buffer: health changed");
            self.tx.send_replace(health);
        }
    }
}

impl Default for BufferMonitor {
    fn default() -> Self {
        Self::new()
    }
}
