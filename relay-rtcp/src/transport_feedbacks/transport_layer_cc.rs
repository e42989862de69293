//! Transport-wide Congestion Control feedback (RTPFB, FMT=15), emitted by
//! the 100ms TWCC timer while the circuit breaker (spec §5) isn't critical.
//!
//! Only the always-2-bit-symbol status vector chunk is produced: every
//! chunk packs 7 `TwccSymbol`s into 14 bits, `0b11` in the top two bits
//! marking it as a vector chunk with 2-bit symbols. Run-length chunks
//! aren't emitted, which keeps encode/decode a single code path at the
//! cost of a few extra bytes on sparse feedback.

use bytes::Buf;
use relay_shared::error::{Error, Result};
use relay_shared::marshal::{self, Marshal, MarshalSize, Unmarshal};

use crate::header::{self, FMT_TRANSPORT_CC, PT_TRANSPORT_LAYER_FEEDBACK};

const SYMBOLS_PER_CHUNK: usize = 7;
const CHUNK_RUN_LENGTH: u16 = 0x8000;
const CHUNK_TWO_BIT_SYMBOLS: u16 = 0x4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwccSymbol {
    NotReceived = 0,
    SmallDelta = 1,
    LargeDelta = 2,
}

impl TwccSymbol {
    fn from_bits(bits: u16) -> Result<Self> {
        match bits {
            0 => Ok(TwccSymbol::NotReceived),
            1 => Ok(TwccSymbol::SmallDelta),
            2 => Ok(TwccSymbol::LargeDelta),
            _ => Err(Error::Other(format!("twcc: invalid symbol {bits}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransportLayerCc {
    pub sender_ssrc: u32,
    pub media_ssrc: u32,
    pub base_sequence_number: u16,
    /// 24-bit signed, 64ms units (RFC draft-ietf-avtcore-cc-feedback-message).
    pub reference_time: i32,
    pub fb_pkt_count: u8,
    pub packet_statuses: Vec<TwccSymbol>,
    /// One entry per non-`NotReceived` status, in 250us ticks.
    pub recv_deltas: Vec<i32>,
}

fn pack_chunk(symbols: &[TwccSymbol]) -> u16 {
    let mut packed: u16 = 0;
    for (i, symbol) in symbols.iter().enumerate() {
        let bits = *symbol as u16;
        packed |= bits << (12 - 2 * i);
    }
    CHUNK_RUN_LENGTH | CHUNK_TWO_BIT_SYMBOLS | packed
}

fn unpack_chunk(chunk: u16, remaining: usize) -> Vec<TwccSymbol> {
    let count = remaining.min(SYMBOLS_PER_CHUNK);
    (0..count)
        .map(|i| {
            let bits = (chunk >> (12 - 2 * i)) & 0x3;
            TwccSymbol::from_bits(bits).unwrap_or(TwccSymbol::NotReceived)
        })
        .collect()
}

impl MarshalSize for TransportLayerCc {
    fn marshal_size(&self) -> usize {
        let chunk_count = self.packet_statuses.len().div_ceil(SYMBOLS_PER_CHUNK).max(1);
        let deltas_len: usize = self
            .recv_deltas
            .iter()
            .map(|d| if small_delta_fits(*d) { 1 } else { 2 })
            .sum();
        let body = 4 + 4 + 2 + 2 + 3 + 1 + chunk_count * 2 + deltas_len;
        body.div_ceil(4) * 4
    }
}

fn small_delta_fits(delta: i32) -> bool {
    (0..=255).contains(&delta)
}

impl Marshal for TransportLayerCc {
    fn marshal_to(&self, buf: &mut [u8]) -> Result<usize> {
        let size = self.marshal_size();
        header::encode_header(buf, FMT_TRANSPORT_CC, PT_TRANSPORT_LAYER_FEEDBACK, (size / 4) as u16 - 1);
        buf[4..8].copy_from_slice(&self.sender_ssrc.to_be_bytes());
        buf[8..12].copy_from_slice(&self.media_ssrc.to_be_bytes());
        buf[12..14].copy_from_slice(&self.base_sequence_number.to_be_bytes());
        buf[14..16].copy_from_slice(&(self.packet_statuses.len() as u16).to_be_bytes());
        let rt = self.reference_time.to_be_bytes();
        buf[16..19].copy_from_slice(&rt[1..4]);
        buf[19] = self.fb_pkt_count;

        let mut pos = 20;
        for group in self.packet_statuses.chunks(SYMBOLS_PER_CHUNK) {
            let chunk = pack_chunk(group);
            buf[pos..pos + 2].copy_from_slice(&chunk.to_be_bytes());
            pos += 2;
        }
        if self.packet_statuses.is_empty() {
            buf[pos..pos + 2].copy_from_slice(&pack_chunk(&[]).to_be_bytes());
            pos += 2;
        }

        for delta in &self.recv_deltas {
            if small_delta_fits(*delta) {
                buf[pos] = *delta as u8;
                pos += 1;
            } else {
                buf[pos..pos + 2].copy_from_slice(&(*delta as i16).to_be_bytes());
                pos += 2;
            }
        }
        for byte in buf.iter_mut().take(size).skip(pos) {
            *byte = 0;
        }
        Ok(size)
    }
}

impl Unmarshal for TransportLayerCc {
    fn unmarshal<B>(buf: &mut B) -> Result<Self>
    where
        B: Buf,
    {
        marshal::require(buf.remaining(), 20, "rtcp twcc")?;
        let mut head = [0u8; 4];
        buf.copy_to_slice(&mut head);
        let decoded = header::decode_header(&head, PT_TRANSPORT_LAYER_FEEDBACK)?;
        if decoded.count_or_fmt != FMT_TRANSPORT_CC {
            return Err(Error::Other(format!("rtcp: not a twcc packet, fmt={}", decoded.count_or_fmt)));
        }
        let sender_ssrc = buf.get_u32();
        let media_ssrc = buf.get_u32();
        let base_sequence_number = buf.get_u16();
        let packet_status_count = buf.get_u16() as usize;
        let mut rt_bytes = [0u8; 4];
        buf.copy_to_slice(&mut rt_bytes[1..4]);
        let reference_time = (i32::from_be_bytes(rt_bytes) << 8) >> 8;
        let fb_pkt_count = buf.get_u8();

        let total = header::declared_total_len(decoded.length_words);
        let remaining_bytes = total.saturating_sub(20);
        marshal::require(buf.remaining(), remaining_bytes, "rtcp twcc body")?;
        let mut body = vec![0u8; remaining_bytes];
        buf.copy_to_slice(&mut body);
        let mut cursor = &body[..];

        let mut packet_statuses = Vec::with_capacity(packet_status_count);
        while packet_statuses.len() < packet_status_count {
            if cursor.len() < 2 {
                return Err(Error::Other("twcc: truncated status chunk".into()));
            }
            let chunk = u16::from_be_bytes([cursor[0], cursor[1]]);
            cursor = &cursor[2..];
            let remaining = packet_status_count - packet_statuses.len();
            packet_statuses.extend(unpack_chunk(chunk, remaining));
        }
        packet_statuses.truncate(packet_status_count);

        let mut recv_deltas = Vec::new();
        for symbol in &packet_statuses {
            match symbol {
                TwccSymbol::NotReceived => {}
                TwccSymbol::SmallDelta => {
                    if cursor.is_empty() {
                        return Err(Error::Other("twcc: truncated small delta".into()));
                    }
                    recv_deltas.push(cursor[0] as i32);
                    cursor = &cursor[1..];
                }
                TwccSymbol::LargeDelta => {
                    if cursor.len() < 2 {
                        return Err(Error::Other("twcc: truncated large delta".into()));
                    }
                    recv_deltas.push(i16::from_be_bytes([cursor[0], cursor[1]]) as i32);
                    cursor = &cursor[2..];
                }
            }
        }

        Ok(TransportLayerCc {
            sender_ssrc,
            media_ssrc,
            base_sequence_number,
            reference_time,
            fb_pkt_count,
            packet_statuses,
            recv_deltas,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_mixed_statuses() {
        let twcc = TransportLayerCc {
            sender_ssrc: 0x902f9e2e,
            media_ssrc: 0xbc5e9a40,
            base_sequence_number: 1000,
            reference_time: -12345,
            fb_pkt_count: 3,
            packet_statuses: vec![
                TwccSymbol::SmallDelta,
                TwccSymbol::NotReceived,
                TwccSymbol::LargeDelta,
                TwccSymbol::SmallDelta,
                TwccSymbol::NotReceived,
                TwccSymbol::NotReceived,
                TwccSymbol::SmallDelta,
                TwccSymbol::LargeDelta,
            ],
            recv_deltas: vec![40, 1000, 80, 60, -500],
        };
        let raw = twcc.marshal().unwrap();
        let mut buf = raw.clone();
        let decoded = TransportLayerCc::unmarshal(&mut buf).unwrap();
        assert_eq!(decoded, twcc);
    }

    #[test]
    fn round_trips_empty_statuses() {
        let twcc = TransportLayerCc {
            sender_ssrc: 1,
            media_ssrc: 2,
            base_sequence_number: 0,
            reference_time: 0,
            fb_pkt_count: 0,
            packet_statuses: vec![],
            recv_deltas: vec![],
        };
        let raw = twcc.marshal().unwrap();
        let mut buf = raw.clone();
        assert_eq!(TransportLayerCc::unmarshal(&mut buf).unwrap(), twcc);
    }

    #[test]
    fn reference_time_sign_extends_24_bit() {
        let twcc = TransportLayerCc {
            sender_ssrc: 1,
            media_ssrc: 2,
            base_sequence_number: 0,
            reference_time: -1,
            fb_pkt_count: 0,
            packet_statuses: vec![],
            recv_deltas: vec![],
        };
        let raw = twcc.marshal().unwrap();
        let mut buf = raw.clone();
        let decoded = TransportLayerCc::unmarshal(&mut buf).unwrap();
        assert_eq!(decoded.reference_time, -1);
    }
}
