use std::time::Duration;

use bytes::Bytes;
use tessera_core::{Representation, RepresentationId, SegmentDescriptor};

/// Initialization segment after parsing, ready for the source buffer.
#[derive(Clone, Debug)]
pub struct ParsedInit {
    pub representation: RepresentationId,
    pub bytes: Bytes,
}

/// Media segment after parsing.
#[derive(Clone, Debug)]
pub struct ParsedMedia {
    pub representation: RepresentationId,
    pub bytes: Bytes,
    /// Media-time start in seconds, when the descriptor carries one.
    pub start: Option<f64>,
    pub duration: Option<Duration>,
}

#[derive(Clone, Debug)]
pub enum ParsedSegment {
    Init(ParsedInit),
    Media(ParsedMedia),
}

/// Payload validation/extraction seam.
///
/// Container interpretation is outside the engine; implementations typically
/// wrap a demuxer. Errors are treated as transient once (the pipeline refetches
/// bypassing caches), then fatal.
pub trait SegmentParser: Send + Sync {
    fn parse_init(&self, repr: &Representation, bytes: Bytes) -> Result<ParsedInit, String>;

    fn parse_media(
        &self,
        repr: &Representation,
        descriptor: &SegmentDescriptor,
        bytes: Bytes,
        init: Option<&ParsedInit>,
    ) -> Result<ParsedMedia, String>;
}

/// Parser that passes payloads through untouched. Rejects empty bodies, which
/// covers the truncated-response case real demuxers would flag.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassthroughParser;

impl SegmentParser for PassthroughParser {
    fn parse_init(&self, repr: &Representation, bytes: Bytes) -> Result<ParsedInit, String> {
        if bytes.is_empty() {
            return Err("empty initialization segment".into());
        }
        Ok(ParsedInit {
            representation: repr.id.clone(),
            bytes,
        })
    }

    fn parse_media(
        &self,
        repr: &Representation,
        descriptor: &SegmentDescriptor,
        bytes: Bytes,
        _init: Option<&ParsedInit>,
    ) -> Result<ParsedMedia, String> {
        if bytes.is_empty() {
            return Err("empty media segment".into());
        }
        Ok(ParsedMedia {
            representation: repr.id.clone(),
            bytes,
            start: descriptor.start,
            duration: descriptor.duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use tessera_core::SegmentPosition;

    use super::*;

    fn descriptor() -> SegmentDescriptor {
        SegmentDescriptor {
            url: "http://example.com/seg_0.m4s".parse().unwrap(),
            position: SegmentPosition::Media(0),
            duration: Some(Duration::from_secs(4)),
            start: Some(0.0),
            byte_range: None,
        }
    }

    #[rstest]
    #[case(Bytes::from_static(b"payload"), true)]
    #[case(Bytes::new(), false)]
    fn passthrough_rejects_only_empty_media(#[case] bytes: Bytes, #[case] ok: bool) {
        let repr = Representation::new("hd", 1_000_000);
        let result = PassthroughParser.parse_media(&repr, &descriptor(), bytes, None);
        assert_eq!(result.is_ok(), ok);
    }

    #[rstest]
    #[case(Bytes::from_static(b"init"), true)]
    #[case(Bytes::new(), false)]
    fn passthrough_rejects_only_empty_init(#[case] bytes: Bytes, #[case] ok: bool) {
        let repr = Representation::new("hd", 1_000_000);
        let result = PassthroughParser.parse_init(&repr, bytes);
        assert_eq!(result.is_ok(), ok);
    }

    #[test]
    fn media_carries_descriptor_timing() {
        let repr = Representation::new("hd", 1_000_000);
        let media = PassthroughParser
            .parse_media(&repr, &descriptor(), Bytes::from_static(b"x"), None)
            .unwrap();
        assert_eq!(media.start, Some(0.0));
        assert_eq!(media.duration, Some(Duration::from_secs(4)));
        assert_eq!(media.representation, repr.id);
    }
}
