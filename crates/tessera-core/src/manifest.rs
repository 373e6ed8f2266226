use std::{sync::Arc, time::Duration};

use url::Url;

use crate::track::{Adaptation, Representation, TrackType};

/// Parsed manifest as delivered by the manifest-parser collaborator.
///
/// The engine never parses manifests itself; it consumes this shape and the
/// [`SegmentIndex`] that comes with it.
#[derive(Clone, Debug)]
pub struct Manifest {
    pub is_live: bool,
    pub adaptations: Vec<Adaptation>,
    /// Earliest seekable position, seconds.
    pub min_position: f64,
    /// Latest seekable position, seconds.
    pub max_position: f64,
    /// Unix time of media position 0, when the manifest declares one.
    /// Needed to map wall-clock seek targets onto media positions.
    pub availability_start: Option<f64>,
}

impl Manifest {
    pub fn adaptations_for(&self, track_type: TrackType) -> impl Iterator<Item = &Adaptation> {
        self.adaptations
            .iter()
            .filter(move |a| a.track_type() == track_type)
    }

    pub fn first_adaptation(&self, track_type: TrackType) -> Option<&Adaptation> {
        self.adaptations_for(track_type).next()
    }
}

/// Position of a segment within its representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SegmentPosition {
    /// Initialization segment (codec/container header).
    Init,
    /// Media segment by index.
    Media(u64),
}

impl SegmentPosition {
    pub fn is_init(&self) -> bool {
        matches!(self, Self::Init)
    }
}

/// Everything the pipeline needs to request one segment.
#[derive(Clone, Debug)]
pub struct SegmentDescriptor {
    pub url: Url,
    pub position: SegmentPosition,
    /// Media duration of the segment, absent for init segments.
    pub duration: Option<Duration>,
    /// Media-time start of the segment, seconds. Absent for init segments.
    pub start: Option<f64>,
    /// Byte range within `url`, when the segment is a sub-range of a file.
    pub byte_range: Option<(u64, Option<u64>)>,
}

/// Per-content segment addressing, provided by the manifest parser.
///
/// Implementations are cheap lookups over already-parsed timing data; the
/// engine calls them on its hot path.
pub trait SegmentIndex: Send + Sync {
    /// Descriptor of the init segment for a representation, if it needs one.
    fn init_segment(&self, repr: &Representation) -> Option<SegmentDescriptor>;

    /// Descriptor of the `n`-th media segment, `None` past the end.
    fn media_segment(&self, repr: &Representation, n: u64) -> Option<SegmentDescriptor>;

    /// Total media segment count, `None` when open-ended (live).
    fn segment_count(&self, repr: &Representation) -> Option<u64>;

    /// Index of the first segment covering `position` seconds.
    fn segment_for_position(&self, repr: &Representation, position: f64) -> Option<u64>;
}

pub type SharedSegmentIndex = Arc<dyn SegmentIndex>;
