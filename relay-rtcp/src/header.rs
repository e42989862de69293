//! The 4-byte RTCP common header shared by every packet type (RFC 3550 §6.1).

use relay_shared::error::{Error, Result};

pub const VERSION: u8 = 2;

pub const PT_RECEIVER_REPORT: u8 = 201;
pub const PT_EXTENDED_REPORT: u8 = 207;
pub const PT_PAYLOAD_SPECIFIC_FEEDBACK: u8 = 206;
pub const PT_TRANSPORT_LAYER_FEEDBACK: u8 = 205;

pub const FMT_PICTURE_LOSS_INDICATION: u8 = 1;
pub const FMT_TRANSPORT_LAYER_NACK: u8 = 1;
pub const FMT_TRANSPORT_CC: u8 = 15;

pub struct DecodedHeader {
    pub count_or_fmt: u8,
    pub packet_type: u8,
    /// Packet length in 32-bit words, minus one, per RFC 3550 §6.1.
    pub length_words: u16,
}

pub fn encode_header(buf: &mut [u8], count_or_fmt: u8, packet_type: u8, length_words: u16) {
    buf[0] = (VERSION << 6) | (count_or_fmt & 0x1F);
    buf[1] = packet_type;
    buf[2..4].copy_from_slice(&length_words.to_be_bytes());
}

pub fn decode_header(buf: &[u8], expect_packet_type: u8) -> Result<DecodedHeader> {
    if buf.len() < 4 {
        return Err(Error::Other("rtcp: header truncated".into()));
    }
    let version = buf[0] >> 6;
    if version != VERSION {
        return Err(Error::Other(format!("rtcp: unsupported version {version}")));
    }
    let count_or_fmt = buf[0] & 0x1F;
    let packet_type = buf[1];
    if packet_type != expect_packet_type {
        return Err(Error::Other(format!(
            "rtcp: unexpected packet_type {packet_type}, want {expect_packet_type}"
        )));
    }
    let length_words = u16::from_be_bytes([buf[2], buf[3]]);
    Ok(DecodedHeader {
        count_or_fmt,
        packet_type,
        length_words,
    })
}

/// Total byte length a header declares, including the 4-byte header itself.
pub fn declared_total_len(length_words: u16) -> usize {
    (length_words as usize + 1) * 4
}
