//! `RtpRingBuffer` (spec §3): sender-side retransmission store keyed by the
//! low bits of sequence number, with an exact-sequence-match requirement on
//! fetch — a NACK must never be answered with a packet the low bits happen
//! to collide with (spec §8 scenario 5: SRTP auth would fail on a
//! mismatched retransmit).

use relay_rtp::RtpPacket;
use relay_shared::error::{Error, Result};

pub struct RtpRingBuffer {
    slots: Vec<Option<RtpPacket>>,
    size: u16,
    highest_added: u16,
    started: bool,
}

const UINT16_SIZE_HALF: u16 = 1 << 15;

impl RtpRingBuffer {
    pub fn new(size: u16) -> Result<Self> {
        if !size.is_power_of_two() {
            return Err(Error::Other("rtp ring buffer size must be a power of two".into()));
        }
        Ok(RtpRingBuffer { slots: (0..size).map(|_| None).collect(), size, highest_added: 0, started: false })
    }

    /// Stores `packet`, clearing any slots skipped over on a forward jump so
    /// a later `fetch_rtp_packet` can't return stale data for a sequence
    /// that was never actually written into that slot this time around.
    pub fn add(&mut self, packet: RtpPacket) {
        let seq = packet.header.sequence_number;
        if !self.started {
            self.started = true;
            self.highest_added = seq;
        } else {
            let diff = seq.wrapping_sub(self.highest_added);
            if diff != 0 && diff < UINT16_SIZE_HALF {
                let mut to_clear = self.highest_added.wrapping_add(1);
                while to_clear != seq {
                    self.slots[(to_clear % self.size) as usize] = None;
                    to_clear = to_clear.wrapping_add(1);
                }
                self.highest_added = seq;
            }
        }
        self.slots[(seq % self.size) as usize] = Some(packet);
    }

    /// Returns the stored packet only if its full sequence number exactly
    /// equals `seq` — a slot match on wrapped-around low bits is not enough.
    pub fn fetch_rtp_packet(&self, seq: u16) -> Option<&RtpPacket> {
        self.slots[(seq % self.size) as usize]
            .as_ref()
            .filter(|packet| packet.header.sequence_number == seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use relay_rtp::header::RtpHeader;
    use relay_rtp::packet::{FrameType, PayloadVariant};

    fn packet(seq: u16) -> RtpPacket {
        RtpPacket::new(RtpHeader::new(96, seq, 0, 1, false), FrameType::Video, PayloadVariant::Raw(Bytes::from_static(b"x")))
    }

    #[test]
    fn exact_sequence_match_required_across_wraparound() {
        // 8-slot buffer: seq=500 (payload A via the sequence number itself
        // being the thing compared) then, after a 65536-wrap, a different
        // packet whose low bits % size collide with 500 arrives again.
        let mut ring = RtpRingBuffer::new(1024).unwrap();
        ring.add(packet(500));
        assert_eq!(ring.fetch_rtp_packet(500).unwrap().header.sequence_number, 500);

        // simulate full wraparound: the seq wraps back to 500 exactly after
        // 65536 packets, so this is genuinely the same seq number again —
        // the interesting case is a *different* value that collides only
        // mod `size`.
        ring.add(packet(500 + 1024));
        assert_eq!(ring.fetch_rtp_packet(500), None, "slot now holds a different sequence number");
        assert_eq!(ring.fetch_rtp_packet(500 + 1024).unwrap().header.sequence_number, 500 + 1024);
    }

    #[test]
    fn forward_jump_clears_skipped_slots() {
        let mut ring = RtpRingBuffer::new(8).unwrap();
        ring.add(packet(0));
        ring.add(packet(1));
        ring.add(packet(20));
        assert!(ring.fetch_rtp_packet(1).is_none());
        assert!(ring.fetch_rtp_packet(20).is_some());
    }

    #[test]
    fn rejects_non_power_of_two_size() {
        assert!(RtpRingBuffer::new(100).is_err());
    }
}
