/// Video codecs the TS muxer understands; everything else (VP6, Sorenson,
/// screen video, AV1, ...) maps to [`VideoCodec::Disabled`] and is treated
/// as "no video" for PAT/PMT purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    H264,
    H265,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCodec {
    Aac,
    Mp3,
    Disabled,
}

/// ISO/IEC 13818-1 Table 2-34 stream_type values.
pub const STREAM_TYPE_H264: u8 = 0x1B;
pub const STREAM_TYPE_H265: u8 = 0x24;
pub const STREAM_TYPE_AAC: u8 = 0x0F;
pub const STREAM_TYPE_MP3: u8 = 0x03;

impl VideoCodec {
    pub fn stream_type(self) -> Option<u8> {
        match self {
            VideoCodec::H264 => Some(STREAM_TYPE_H264),
            VideoCodec::H265 => Some(STREAM_TYPE_H265),
            VideoCodec::Disabled => None,
        }
    }
}

impl AudioCodec {
    pub fn stream_type(self) -> Option<u8> {
        match self {
            AudioCodec::Aac => Some(STREAM_TYPE_AAC),
            AudioCodec::Mp3 => Some(STREAM_TYPE_MP3),
            AudioCodec::Disabled => None,
        }
    }
}

/// Whether a PMT `stream_type` byte names a video codec this muxer knows
/// about; used by the decoder to classify elementary PIDs it discovers from
/// the PMT rather than by PID convention alone.
pub fn is_video_stream_type(stream_type: u8) -> bool {
    matches!(stream_type, STREAM_TYPE_H264 | STREAM_TYPE_H265)
}
