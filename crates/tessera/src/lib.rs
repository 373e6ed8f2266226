//! tessera: adaptive bitrate streaming engine.
//!
//! The [`Player`] wires the subsystem crates into one content lifecycle:
//! bandwidth estimation ([`tessera_abr`]), segment pipelines
//! ([`tessera_pipeline`]), buffer health ([`tessera_buffer`]) and the unified
//! event bus ([`tessera_events`]). Manifest parsing, DRM, and the platform
//! media element are collaborator seams the embedder implements.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tessera::{LoadOptions, Player, PlayerOptions};
//! # use tessera::{ManifestLoader, SourceBufferSink};
//! # fn demo(loader: Arc<dyn ManifestLoader>, sink: Arc<dyn SourceBufferSink>) {
//! let player = Player::new(PlayerOptions::default(), loader, sink);
//! let mut events = player.events();
//! player
//!     .load_content(LoadOptions::new("https://cdn.example/manifest.mpd".parse().unwrap()))
//!     .unwrap();
//! # }
//! ```

#![forbid(unsafe_code)]

mod device;
mod drm;
mod engine;
mod error;
mod manifest;
mod options;
mod platform;
mod player;
mod state;

pub use device::DeviceMonitor;
pub use drm::{DrmProvider, DrmSession, KeyStatus, KeySystemConfig, NoopDrmProvider};
pub use error::{PlayerError, PlayerResult};
pub use manifest::{LoadedManifest, ManifestLoader};
pub use options::{LoadOptions, PlayerOptions, SeekTarget};
pub use platform::{PlaybackEvent, SourceBufferSink};
pub use player::Player;
pub use state::PlayerState;

pub use tessera_core::{
    Adaptation, Manifest, Representation, RepresentationId, SegmentDescriptor, SegmentIndex,
    SegmentPosition, TrackType,
};
pub use tessera_abr::SwitchReason;
pub use tessera_events::{AbrEvent, Event, PipelineEvent, PlayerEvent};
pub use tessera_pipeline::{ParsedInit, ParsedMedia, ParsedSegment};
