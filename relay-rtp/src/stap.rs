//! STAP-A aggregation (RFC 6184 §5.7.1): bundles SPS+PPS(+VPS) with the
//! following IDR samples into one RTP packet (spec §4.6).

use bytes::Bytes;
use relay_shared::error::{Error, Result};

/// STAP-A payload type value used when this aggregation is the NALU type
/// byte of the RTP payload (H.264; RFC 6184 §4).
pub const STAP_A_NALU_TYPE: u8 = 24;

/// Pack `nalus` (each a complete NALU including its header byte) into one
/// STAP-A payload: a single NALU-type-24 header byte, then
/// `(u16 length, NALU bytes)*`.
pub fn packetize_stap_a(nalus: &[Bytes]) -> Bytes {
    let mut out = Vec::with_capacity(1 + nalus.iter().map(|n| 2 + n.len()).sum::<usize>());
    out.push(STAP_A_NALU_TYPE);
    for nalu in nalus {
        out.extend_from_slice(&(nalu.len() as u16).to_be_bytes());
        out.extend_from_slice(nalu);
    }
    Bytes::from(out)
}

/// Inverse of [`packetize_stap_a`]; `payload` must still include the
/// leading NALU-type-24 header byte.
pub fn depacketize_stap_a(payload: &Bytes) -> Result<Vec<Bytes>> {
    if payload.is_empty() {
        return Err(Error::RtpMuxer("stap-a payload empty".into()));
    }
    let mut nalus = Vec::new();
    let mut pos = 1;
    while pos + 2 <= payload.len() {
        let len = u16::from_be_bytes([payload[pos], payload[pos + 1]]) as usize;
        pos += 2;
        if pos + len > payload.len() {
            return Err(Error::RtpMuxer("stap-a nalu length exceeds payload".into()));
        }
        nalus.push(payload.slice(pos..pos + len));
        pos += len;
    }
    Ok(nalus)
}
