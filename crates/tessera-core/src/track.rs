use std::fmt;

use crate::error::{ModelError, ModelResult};

/// Media track kinds the engine selects representations for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TrackType {
    Video,
    Audio,
    Text,
    Image,
}

impl fmt::Display for TrackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Text => "text",
            Self::Image => "image",
        };
        f.write_str(s)
    }
}

/// Stable identifier of one encoding within an adaptation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RepresentationId(pub String);

impl RepresentationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepresentationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RepresentationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RepresentationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One pre-encoded version of a track. Immutable after manifest load.
#[derive(Clone, Debug, PartialEq)]
pub struct Representation {
    pub id: RepresentationId,
    /// Bits per second. Always positive.
    pub bitrate: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub codec: Option<String>,
}

impl Representation {
    pub fn new(id: impl Into<RepresentationId>, bitrate: u64) -> Self {
        Self {
            id: id.into(),
            bitrate,
            width: None,
            height: None,
            codec: None,
        }
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = Some(codec.into());
        self
    }
}

/// An ordered set of interchangeable encodings for one `(track type, language)`
/// pair.
///
/// Invariant: representation bitrates are strictly ascending and unique.
/// `Adaptation::new` sorts its input and rejects duplicates, so the invariant
/// holds for every constructed value.
#[derive(Clone, Debug)]
pub struct Adaptation {
    track_type: TrackType,
    language: Option<String>,
    representations: Vec<Representation>,
}

impl Adaptation {
    pub fn new(
        track_type: TrackType,
        language: Option<String>,
        mut representations: Vec<Representation>,
    ) -> ModelResult<Self> {
        if representations.is_empty() {
            return Err(ModelError::EmptyAdaptation);
        }
        if representations.iter().any(|r| r.bitrate == 0) {
            return Err(ModelError::ZeroBitrate);
        }

        representations.sort_by_key(|r| r.bitrate);
        for pair in representations.windows(2) {
            if pair[0].bitrate == pair[1].bitrate {
                return Err(ModelError::DuplicateBitrate(pair[0].bitrate));
            }
        }

        Ok(Self {
            track_type,
            language,
            representations,
        })
    }

    pub fn track_type(&self) -> TrackType {
        self.track_type
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Representations in ascending bitrate order.
    pub fn representations(&self) -> &[Representation] {
        &self.representations
    }

    pub fn lowest(&self) -> &Representation {
        &self.representations[0]
    }

    pub fn highest(&self) -> &Representation {
        &self.representations[self.representations.len() - 1]
    }

    pub fn by_id(&self, id: &RepresentationId) -> Option<&Representation> {
        self.representations.iter().find(|r| &r.id == id)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn reps(bitrates: &[u64]) -> Vec<Representation> {
        bitrates
            .iter()
            .enumerate()
            .map(|(i, bw)| Representation::new(format!("r{i}"), *bw))
            .collect()
    }

    #[test]
    fn adaptation_sorts_ascending() {
        let a = Adaptation::new(TrackType::Video, None, reps(&[2_000_000, 500_000, 1_000_000]))
            .unwrap();
        let bitrates: Vec<u64> = a.representations().iter().map(|r| r.bitrate).collect();
        assert_eq!(bitrates, vec![500_000, 1_000_000, 2_000_000]);
        assert_eq!(a.lowest().bitrate, 500_000);
        assert_eq!(a.highest().bitrate, 2_000_000);
    }

    #[rstest]
    #[case(&[], false)]
    #[case(&[500_000], true)]
    #[case(&[500_000, 500_000], false)]
    fn adaptation_validation(#[case] bitrates: &[u64], #[case] ok: bool) {
        let result = Adaptation::new(TrackType::Audio, None, reps(bitrates));
        assert_eq!(result.is_ok(), ok);
    }

    #[test]
    fn zero_bitrate_rejected() {
        let result = Adaptation::new(TrackType::Video, None, reps(&[0, 500_000]));
        assert!(matches!(result, Err(ModelError::ZeroBitrate)));
    }

    #[test]
    fn lookup_by_id() {
        let a = Adaptation::new(TrackType::Video, None, reps(&[500_000, 1_000_000])).unwrap();
        assert!(a.by_id(&RepresentationId::from("r0")).is_some());
        assert!(a.by_id(&RepresentationId::from("missing")).is_none());
    }
}
