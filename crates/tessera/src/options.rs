use std::time::Duration;

use url::Url;

use tessera_abr::{ChooserOptions, EstimatorOptions};
use tessera_net::{NetOptions, RetryPolicy};

use crate::drm::KeySystemConfig;

/// Engine-wide tuning, fixed at player construction.
#[derive(Clone, Debug)]
pub struct PlayerOptions {
    pub net: NetOptions,
    pub estimator: EstimatorOptions,
    pub chooser: ChooserOptions,
    pub segment_retry: RetryPolicy,
    /// Minimum interval between intermediate progress samples.
    pub progress_interval: Duration,
    /// Video bitrate cap applied while the document is hidden;
    /// `u64::MAX` disables throttling.
    pub throttle_bitrate_when_hidden: u64,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
    /// Initial buffer policy, adjustable later through the setters.
    pub wanted_buffer_ahead: f64,
    pub max_buffer_ahead: f64,
    pub max_buffer_behind: f64,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            net: NetOptions::default(),
            estimator: EstimatorOptions::default(),
            chooser: ChooserOptions::default(),
            segment_retry: RetryPolicy::default(),
            progress_interval: Duration::from_millis(200),
            throttle_bitrate_when_hidden: u64::MAX,
            event_capacity: 64,
            wanted_buffer_ahead: 30.0,
            max_buffer_ahead: f64::INFINITY,
            max_buffer_behind: f64::INFINITY,
        }
    }
}

impl PlayerOptions {
    pub fn with_net(mut self, net: NetOptions) -> Self {
        self.net = net;
        self
    }

    pub fn with_estimator(mut self, estimator: EstimatorOptions) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn with_chooser(mut self, chooser: ChooserOptions) -> Self {
        self.chooser = chooser;
        self
    }

    pub fn with_segment_retry(mut self, retry: RetryPolicy) -> Self {
        self.segment_retry = retry;
        self
    }

    pub fn with_throttle_bitrate_when_hidden(mut self, bitrate: u64) -> Self {
        self.throttle_bitrate_when_hidden = bitrate;
        self
    }
}

/// One content load.
#[derive(Clone, Debug)]
pub struct LoadOptions {
    pub url: Url,
    pub key_systems: Vec<KeySystemConfig>,
    /// Initial position in seconds; content start when absent.
    pub start_at: Option<f64>,
    pub auto_play: bool,
    pub default_audio_track: Option<String>,
    pub default_text_track: Option<String>,
    pub supplementary_text_tracks: Vec<Url>,
    pub supplementary_image_tracks: Vec<Url>,
    pub low_latency_mode: bool,
}

impl LoadOptions {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            key_systems: Vec::new(),
            start_at: None,
            auto_play: false,
            default_audio_track: None,
            default_text_track: None,
            supplementary_text_tracks: Vec::new(),
            supplementary_image_tracks: Vec::new(),
            low_latency_mode: false,
        }
    }

    pub fn with_auto_play(mut self, auto_play: bool) -> Self {
        self.auto_play = auto_play;
        self
    }

    pub fn with_start_at(mut self, position: f64) -> Self {
        self.start_at = Some(position);
        self
    }

    pub fn with_key_systems(mut self, key_systems: Vec<KeySystemConfig>) -> Self {
        self.key_systems = key_systems;
        self
    }

    pub fn with_default_audio_track(mut self, language: impl Into<String>) -> Self {
        self.default_audio_track = Some(language.into());
        self
    }

    pub fn with_low_latency_mode(mut self, low_latency: bool) -> Self {
        self.low_latency_mode = low_latency;
        self
    }
}

/// Seek destination; exactly one interpretation per call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SeekTarget {
    /// Absolute media position, seconds.
    Position(f64),
    /// Offset from the current position, seconds.
    Relative(f64),
    /// Unix wall-clock time, seconds; only meaningful when the manifest
    /// declares an availability start.
    WallClock(f64),
}
