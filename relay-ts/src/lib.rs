#![warn(rust_2018_idioms)]

//! MPEG-TS codec layer (spec §4.11): the PAT/PMT/PES muxer and demuxer used
//! by HLS segmenting and SRT ingest, AAC ADTS framing, and AVC/HEVC annexb
//! emission. Pure functions over byte buffers; no I/O.

pub mod aac;
pub mod annexb;
pub mod codec;
pub mod context;
pub mod crc32;
pub mod packet;
pub mod pes;
pub mod psi;

pub use codec::{AudioCodec, VideoCodec};
pub use context::{TsChannel, TsContext, TsMessage};

/// Every TS packet is exactly this many bytes (spec §4.11, §8 invariant 2).
pub const TS_PACKET_SIZE: usize = 188;
pub const TS_SYNC_BYTE: u8 = 0x47;

pub const TS_PID_PAT: u16 = 0x0000;
pub const TS_PID_PMT: u16 = 0x1001;
pub const TS_PMT_PROGRAM_NUMBER: u16 = 1;
pub const TS_PID_VIDEO: u16 = 0x0100;
pub const TS_PID_AUDIO_AAC: u16 = 0x0101;
pub const TS_PID_AUDIO_MP3: u16 = 0x0102;

/// ISO/IEC 13818-1 stream_id values for the first audio/video elementary
/// stream ("0xC0..0xDF" for audio, "0xE0..0xEF" for video); the encoder
/// always uses the first of each range.
pub const PES_STREAM_ID_AUDIO: u8 = 0xC0;
pub const PES_STREAM_ID_VIDEO: u8 = 0xE0;
