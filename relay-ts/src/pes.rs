//! PES (Packetized Elementary Stream) header codec, including the 33-bit
//! PTS/DTS encoding defined by ISO/IEC 13818-1 §2.4.3.7.

use relay_shared::error::{Error, Result};

const PTS_DTS_PREFIX_PTS_ONLY: u8 = 0x2;
const PTS_DTS_PREFIX_PTS: u8 = 0x3;
const PTS_DTS_PREFIX_DTS: u8 = 0x1;

/// Encode a 33-bit PTS or DTS value into the 5-byte representation with the
/// given 4-bit prefix nibble (2 for PTS-only, 3 for PTS-with-DTS, 1 for DTS).
pub fn encode_33bit_timestamp(prefix: u8, value: i64) -> [u8; 5] {
    let val = (value as u64) & 0x1_FFFF_FFFF;
    let mut buf = [0u8; 5];
    buf[0] = (prefix << 4) | (((val >> 30) & 0x07) as u8) << 1 | 1;
    let mid = ((val >> 15) & 0x7FFF) as u16;
    buf[1] = (mid >> 7) as u8;
    buf[2] = (((mid & 0x7F) << 1) | 1) as u8;
    let low = (val & 0x7FFF) as u16;
    buf[3] = (low >> 7) as u8;
    buf[4] = (((low & 0x7F) << 1) | 1) as u8;
    buf
}

/// Decode a 5-byte PTS/DTS group, validating the mandatory marker bits at
/// positions 0, 16, and 32 (spec §4.11 PTS/DTS codec).
pub fn decode_33bit_timestamp(buf: &[u8; 5]) -> Result<(u8, i64)> {
    if buf[0] & 1 != 1 || buf[2] & 1 != 1 || buf[4] & 1 != 1 {
        return Err(Error::TsPesBoundary("pts/dts marker bit missing".into()));
    }
    let prefix = buf[0] >> 4;
    let high = ((buf[0] >> 1) & 0x07) as u64;
    let mid = (((buf[1] as u64) << 7) | ((buf[2] as u64) >> 1)) & 0x7FFF;
    let low = (((buf[3] as u64) << 7) | ((buf[4] as u64) >> 1)) & 0x7FFF;
    let value = (high << 30) | (mid << 15) | low;
    Ok((prefix, value as i64))
}

#[derive(Debug, Clone, Copy)]
pub struct PesHeaderParams {
    pub stream_id: u8,
    pub dts: i64,
    pub pts: i64,
    /// When false, the PES carries DTS only via the PTS field (dts == pts).
    pub has_distinct_dts: bool,
    pub payload_len: usize,
}

/// Encode the optional PES header (everything after the 6-byte
/// start-code/stream-id/packet-length prefix) through the PTS/DTS fields.
pub fn encode_pes_optional_header(params: &PesHeaderParams) -> Vec<u8> {
    let mut out = Vec::with_capacity(14);
    out.push(0b1000_0000); // '10' marker, no scrambling/priority/alignment/copyright/original
    let (pts_dts_flags, header_data_len) = if params.has_distinct_dts && params.dts != params.pts
    {
        (0b11, 10u8)
    } else {
        (0b10, 5u8)
    };
    out.push((pts_dts_flags << 6) as u8);
    out.push(header_data_len);

    if pts_dts_flags == 0b11 {
        out.extend_from_slice(&encode_33bit_timestamp(PTS_DTS_PREFIX_PTS, params.pts));
        out.extend_from_slice(&encode_33bit_timestamp(PTS_DTS_PREFIX_DTS, params.dts));
    } else {
        out.extend_from_slice(&encode_33bit_timestamp(PTS_DTS_PREFIX_PTS_ONLY, params.pts));
    }
    out
}

/// Build the full 6-byte PES prefix: start code, stream id, and
/// PES_packet_length (0 means "unbounded", used for video per spec §4.11).
pub fn encode_pes_prefix(stream_id: u8, pes_packet_length: u16) -> [u8; 6] {
    let mut out = [0u8; 6];
    out[0] = 0x00;
    out[1] = 0x00;
    out[2] = 0x01;
    out[3] = stream_id;
    out[4..6].copy_from_slice(&pes_packet_length.to_be_bytes());
    out
}

#[derive(Debug, Clone)]
pub struct DecodedPesHeader {
    pub stream_id: u8,
    pub pes_packet_length: u16,
    pub dts: i64,
    pub pts: i64,
    pub header_len: usize,
}

/// Decode the PES prefix plus optional header, returning the header and the
/// number of bytes consumed before the elementary stream payload begins.
pub fn decode_pes_header(buf: &[u8]) -> Result<DecodedPesHeader> {
    if buf.len() < 6 {
        return Err(Error::TsPesBoundary("pes prefix truncated".into()));
    }
    if buf[0] != 0x00 || buf[1] != 0x00 || buf[2] != 0x01 {
        return Err(Error::TsPesBoundary("pes start code prefix invalid".into()));
    }
    let stream_id = buf[3];
    let pes_packet_length = u16::from_be_bytes([buf[4], buf[5]]);

    if buf.len() < 9 {
        return Err(Error::TsPesBoundary("pes optional header truncated".into()));
    }
    let pts_dts_flags = (buf[7] >> 6) & 0x03;
    let header_data_len = buf[8] as usize;
    let mut pos = 9;
    let mut pts = 0i64;
    let mut dts = 0i64;

    if pts_dts_flags == 0b11 {
        if buf.len() < pos + 10 {
            return Err(Error::TsPesBoundary("pts/dts truncated".into()));
        }
        let mut pts_buf = [0u8; 5];
        pts_buf.copy_from_slice(&buf[pos..pos + 5]);
        let (_, pts_v) = decode_33bit_timestamp(&pts_buf)?;
        pts = pts_v;
        let mut dts_buf = [0u8; 5];
        dts_buf.copy_from_slice(&buf[pos + 5..pos + 10]);
        let (_, dts_v) = decode_33bit_timestamp(&dts_buf)?;
        dts = dts_v;
    } else if pts_dts_flags == 0b10 {
        if buf.len() < pos + 5 {
            return Err(Error::TsPesBoundary("pts truncated".into()));
        }
        let mut pts_buf = [0u8; 5];
        pts_buf.copy_from_slice(&buf[pos..pos + 5]);
        let (_, pts_v) = decode_33bit_timestamp(&pts_buf)?;
        pts = pts_v;
        dts = pts_v;
    }
    pos = 9 + header_data_len;

    Ok(DecodedPesHeader {
        stream_id,
        pes_packet_length,
        dts,
        pts,
        header_len: pos,
    })
}
