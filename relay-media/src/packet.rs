//! `MediaPacket` (spec §3): the universal in-process carrier fanned out by a
//! `StreamSource` to consumers, the origin hub, and any bridges.

use bytes::Bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Audio,
    Video,
    Script,
    Aggregate,
}

/// `payload` is a `Bytes`, so `clone()` shares the underlying buffer and only
/// duplicates the small header fields — the "reference-counted, cheap copy"
/// contract spec §3/§5 describes for pointer-graph-free ownership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPacket {
    pub timestamp: i64,
    pub message_type: MessageType,
    pub payload: Bytes,
    pub is_sequence_header: bool,
    pub is_keyframe: bool,
}

const SOUND_FORMAT_AAC: u8 = 10;
const AAC_PACKET_TYPE_SEQUENCE_HEADER: u8 = 0;

const FRAME_TYPE_KEY: u8 = 1;
const AVC_PACKET_TYPE_SEQUENCE_HEADER: u8 = 0;

impl MediaPacket {
    /// Build an audio packet, deriving `is_sequence_header` from the FLV
    /// audio tag convention (sound format nibble + AACPacketType byte).
    pub fn audio(timestamp: i64, payload: Bytes) -> Self {
        let is_sequence_header = payload.len() >= 2
            && (payload[0] >> 4) == SOUND_FORMAT_AAC
            && payload[1] == AAC_PACKET_TYPE_SEQUENCE_HEADER;
        MediaPacket {
            timestamp,
            message_type: MessageType::Audio,
            payload,
            is_sequence_header,
            is_keyframe: false,
        }
    }

    /// Build a video packet, deriving `is_keyframe`/`is_sequence_header`
    /// from the FLV video tag convention (frame-type nibble + AVCPacketType
    /// byte; HEVC reuses the same two-byte layout in enhanced-RTMP).
    pub fn video(timestamp: i64, payload: Bytes) -> Self {
        let frame_type = payload.first().map(|b| b >> 4).unwrap_or(0);
        let is_keyframe = frame_type == FRAME_TYPE_KEY;
        let is_sequence_header =
            payload.len() >= 2 && is_keyframe && payload[1] == AVC_PACKET_TYPE_SEQUENCE_HEADER;
        MediaPacket {
            timestamp,
            message_type: MessageType::Video,
            payload,
            is_sequence_header,
            is_keyframe,
        }
    }

    pub fn script(timestamp: i64, payload: Bytes) -> Self {
        MediaPacket {
            timestamp,
            message_type: MessageType::Script,
            payload,
            is_sequence_header: false,
            is_keyframe: false,
        }
    }

    pub fn is_audio(&self) -> bool {
        matches!(self.message_type, MessageType::Audio)
    }

    pub fn is_video(&self) -> bool {
        matches!(self.message_type, MessageType::Video)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_sequence_header_is_detected() {
        let sh = MediaPacket::audio(0, Bytes::from_static(&[0xAF, 0x00, 0x12, 0x10]));
        assert!(sh.is_sequence_header);

        let raw = MediaPacket::audio(40, Bytes::from_static(&[0xAF, 0x01, 0xAB, 0xCD]));
        assert!(!raw.is_sequence_header);
    }

    #[test]
    fn video_keyframe_and_sequence_header_are_detected() {
        let sh = MediaPacket::video(0, Bytes::from_static(&[0x17, 0x00, 0, 0, 0]));
        assert!(sh.is_keyframe);
        assert!(sh.is_sequence_header);

        let idr = MediaPacket::video(40, Bytes::from_static(&[0x17, 0x01, 0, 0, 0]));
        assert!(idr.is_keyframe);
        assert!(!idr.is_sequence_header);

        let inter = MediaPacket::video(80, Bytes::from_static(&[0x27, 0x01, 0, 0, 0]));
        assert!(!inter.is_keyframe);
    }

    #[test]
    fn clone_shares_payload_buffer() {
        let original = MediaPacket::audio(0, Bytes::from_static(&[0xAF, 0x01]));
        let copy = original.clone();
        assert_eq!(copy.payload.as_ptr(), original.payload.as_ptr());
    }
}
