//! `RtpPacket` (spec §3): a 12-byte RTP header plus a tagged payload union.
//! The tag is matched exhaustively rather than using dynamic dispatch,
//! per spec §9 "Replacing dynamic dispatch for payload tags".

use bytes::Bytes;

use crate::header::RtpHeader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Audio,
    Video,
}

/// One fragment of an H.264/H.265 FU-A/FU-B aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuFragment {
    pub start: bool,
    pub end: bool,
    pub nalu_type: u8,
    pub payload: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadVariant {
    /// A single complete NALU, or an opus/raw audio frame.
    Raw(Bytes),
    /// H.264 aggregation of multiple NALUs (RFC 6184 §5.7.1).
    StapA(Vec<Bytes>),
    FuA(FuFragment),
    /// HEVC aggregation packet, analogous to STAP-A.
    StapHevc(Vec<Bytes>),
    FuHevc(FuFragment),
    Opus(Bytes),
    Red(Bytes),
    Rtx(Bytes),
}

/// The universal RTC-side media carrier (spec §3 `RtpPacket`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    pub header: RtpHeader,
    /// Monotone ms, derived from sender-report NTP correlation; not carried
    /// on the wire.
    pub avsync_time: i64,
    pub frame_type: FrameType,
    /// Only meaningful for H.264/H.265 payloads.
    pub nalu_type: Option<u8>,
    pub payload: PayloadVariant,
}

impl RtpPacket {
    pub fn new(header: RtpHeader, frame_type: FrameType, payload: PayloadVariant) -> Self {
        RtpPacket {
            header,
            avsync_time: 0,
            frame_type,
            nalu_type: None,
            payload,
        }
    }

    /// True for payload variants that terminate a frame by RTP convention
    /// (the caller is still responsible for setting `header.marker`).
    pub fn is_audio(&self) -> bool {
        self.frame_type == FrameType::Audio
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_variant_match_is_exhaustive_over_tags() {
        let variants = [
            PayloadVariant::Raw(Bytes::from_static(&[1])),
            PayloadVariant::StapA(vec![Bytes::from_static(&[2])]),
            PayloadVariant::FuA(FuFragment { start: true, end: false, nalu_type: 5, payload: Bytes::new() }),
            PayloadVariant::StapHevc(vec![]),
            PayloadVariant::FuHevc(FuFragment { start: false, end: true, nalu_type: 1, payload: Bytes::new() }),
            PayloadVariant::Opus(Bytes::new()),
            PayloadVariant::Red(Bytes::new()),
            PayloadVariant::Rtx(Bytes::new()),
        ];
        for v in variants {
            let tag = match v {
                PayloadVariant::Raw(_) => "raw",
                PayloadVariant::StapA(_) => "stap-a",
                PayloadVariant::FuA(_) => "fu-a",
                PayloadVariant::StapHevc(_) => "stap-hevc",
                PayloadVariant::FuHevc(_) => "fu-hevc",
                PayloadVariant::Opus(_) => "opus",
                PayloadVariant::Red(_) => "red",
                PayloadVariant::Rtx(_) => "rtx",
            };
            assert!(!tag.is_empty());
        }
    }
}
