//! Transport Layer NACK (RFC 4585 §6.2.1): RTPFB, FMT=1. `NackList` (spec
//! §3) drains into one or more of these, `packet_id` the first lost
//! sequence in a run and `lost_packets` a bitmask (BLP) of the following 16.

use bytes::Buf;
use relay_shared::error::{Error, Result};
use relay_shared::marshal::{self, Marshal, MarshalSize, Unmarshal};

use crate::header::{self, FMT_TRANSPORT_LAYER_NACK, PT_TRANSPORT_LAYER_FEEDBACK};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NackPair {
    pub packet_id: u16,
    pub lost_packets: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransportLayerNack {
    pub sender_ssrc: u32,
    pub media_ssrc: u32,
    pub nacks: Vec<NackPair>,
}

impl MarshalSize for TransportLayerNack {
    fn marshal_size(&self) -> usize {
        4 + 4 + 4 + self.nacks.len() * 4
    }
}

impl Marshal for TransportLayerNack {
    fn marshal_to(&self, buf: &mut [u8]) -> Result<usize> {
        let size = self.marshal_size();
        header::encode_header(buf, FMT_TRANSPORT_LAYER_NACK, PT_TRANSPORT_LAYER_FEEDBACK, (size / 4) as u16 - 1);
        buf[4..8].copy_from_slice(&self.sender_ssrc.to_be_bytes());
        buf[8..12].copy_from_slice(&self.media_ssrc.to_be_bytes());
        let mut pos = 12;
        for pair in &self.nacks {
            buf[pos..pos + 2].copy_from_slice(&pair.packet_id.to_be_bytes());
            buf[pos + 2..pos + 4].copy_from_slice(&pair.lost_packets.to_be_bytes());
            pos += 4;
        }
        Ok(size)
    }
}

impl Unmarshal for TransportLayerNack {
    fn unmarshal<B>(buf: &mut B) -> Result<Self>
    where
        B: Buf,
    {
        marshal::require(buf.remaining(), 12, "rtcp nack")?;
        let mut head = [0u8; 4];
        buf.copy_to_slice(&mut head);
        let decoded = header::decode_header(&head, PT_TRANSPORT_LAYER_FEEDBACK)?;
        if decoded.count_or_fmt != FMT_TRANSPORT_LAYER_NACK {
            return Err(Error::Other(format!("rtcp: not a nack packet, fmt={}", decoded.count_or_fmt)));
        }
        let sender_ssrc = buf.get_u32();
        let media_ssrc = buf.get_u32();

        let total = header::declared_total_len(decoded.length_words);
        let pair_bytes = total.saturating_sub(12);
        marshal::require(buf.remaining(), pair_bytes, "rtcp nack pairs")?;
        let mut nacks = Vec::with_capacity(pair_bytes / 4);
        for _ in 0..pair_bytes / 4 {
            nacks.push(NackPair {
                packet_id: buf.get_u16(),
                lost_packets: buf.get_u16(),
            });
        }

        Ok(TransportLayerNack {
            sender_ssrc,
            media_ssrc,
            nacks,
        })
    }
}

/// Build the minimal set of `NackPair` entries covering `missing` sequence
/// numbers, coalescing runs within a 17-wide (packet_id + 16-bit BLP)
/// window the way a `NackList` drain would.
pub fn nack_pairs_from_sequence_numbers(missing: &[u16]) -> Vec<NackPair> {
    let mut sorted = missing.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut pairs = Vec::new();
    let mut iter = sorted.into_iter();
    let Some(mut packet_id) = iter.next() else {
        return pairs;
    };
    let mut blp: u16 = 0;
    for seq in iter {
        let distance = seq.wrapping_sub(packet_id);
        if distance >= 1 && distance <= 16 {
            blp |= 1 << (distance - 1);
        } else {
            pairs.push(NackPair { packet_id, lost_packets: blp });
            packet_id = seq;
            blp = 0;
        }
    }
    pairs.push(NackPair { packet_id, lost_packets: blp });
    pairs
}
