#![warn(rust_2018_idioms)]

//! RTP header marshal/unmarshal (RFC 3550) and the `RtpPacket` tagged
//! payload union (spec §3), plus H.264/H.265 STAP-A/FU-A (de)packetization
//! helpers (RFC 6184 / the HEVC equivalent).

pub mod fua;
pub mod header;
pub mod packet;
pub mod stap;

pub use header::RtpHeader;
pub use packet::{FrameType, PayloadVariant, RtpPacket};

/// RTP payload fragments larger than this are split into FU-A units (spec
/// §4.6 "size ≤ 1200B → single-NALU RTP; larger → FU-A fragments of ≤ 1200B").
pub const MAX_SINGLE_NALU_SIZE: usize = 1200;
