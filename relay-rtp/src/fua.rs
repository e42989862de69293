//! FU-A fragmentation (RFC 6184 §5.8): splits one oversize NALU into
//! fragments of at most [`crate::MAX_SINGLE_NALU_SIZE`] bytes each.

use bytes::Bytes;
use relay_shared::error::{Error, Result};

use crate::packet::FuFragment;

const FU_A_NALU_TYPE: u8 = 28;

/// Split `nalu` (including its 1-byte header) into FU-A fragments. Returns
/// one fragment if `nalu` already fits within `max_fragment_size`.
pub fn fragment_fu_a(nalu: &Bytes, max_fragment_size: usize) -> Result<Vec<Bytes>> {
    if nalu.is_empty() {
        return Err(Error::RtpMuxer("fu-a: empty nalu".into()));
    }
    if nalu.len() <= max_fragment_size {
        return Ok(vec![nalu.clone()]);
    }

    let header_byte = nalu[0];
    let nal_ref_idc = header_byte & 0x60;
    let nalu_type = header_byte & 0x1F;
    let payload = nalu.slice(1..);

    let fu_header_room = max_fragment_size.saturating_sub(2);
    if fu_header_room == 0 {
        return Err(Error::RtpMuxer("fu-a: max_fragment_size too small".into()));
    }

    let mut fragments = Vec::new();
    let mut offset = 0;
    while offset < payload.len() {
        let end = (offset + fu_header_room).min(payload.len());
        let is_start = offset == 0;
        let is_end = end == payload.len();

        let mut out = Vec::with_capacity(2 + (end - offset));
        // FU indicator: forbidden_zero_bit(0) + nal_ref_idc + type=28.
        out.push((header_byte & 0x80) | nal_ref_idc | FU_A_NALU_TYPE);
        let mut fu_header = nalu_type;
        if is_start {
            fu_header |= 0x80;
        }
        if is_end {
            fu_header |= 0x40;
        }
        out.push(fu_header);
        out.extend_from_slice(&payload[offset..end]);
        fragments.push(Bytes::from(out));
        offset = end;
    }
    Ok(fragments)
}

/// Parse one FU-A RTP payload into its start/end/type markers plus the
/// fragment body (spec §4.4 "FU-A start count equals the FU-A end count").
pub fn depacketize_fu_a(payload: &Bytes) -> Result<FuFragment> {
    if payload.len() < 2 {
        return Err(Error::RtpMuxer("fu-a payload too short".into()));
    }
    let fu_header = payload[1];
    let start = fu_header & 0x80 != 0;
    let end = fu_header & 0x40 != 0;
    let nalu_type = fu_header & 0x1F;
    Ok(FuFragment {
        start,
        end,
        nalu_type,
        payload: payload.slice(2..),
    })
}

/// Reconstruct the original NALU (with its header byte restored) from an
/// ordered, complete sequence of FU-A fragment payloads.
pub fn reassemble_fu_a(nal_ref_idc: u8, fragments: &[FuFragment]) -> Result<Bytes> {
    if fragments.is_empty() {
        return Err(Error::RtpMuxer("fu-a: no fragments to reassemble".into()));
    }
    if !fragments[0].start || !fragments[fragments.len() - 1].end {
        return Err(Error::RtpMuxer("fu-a: fragment sequence missing start or end marker".into()));
    }
    let nalu_type = fragments[0].nalu_type;
    let mut out = Vec::with_capacity(1 + fragments.iter().map(|f| f.payload.len()).sum::<usize>());
    out.push((nal_ref_idc & 0x60) | (nalu_type & 0x1F));
    for f in fragments {
        out.extend_from_slice(&f.payload);
    }
    Ok(Bytes::from(out))
}
