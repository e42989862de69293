//! RTC Publish/Play Streams (spec §4.9): `PublishStream` owns the per-SSRC
//! receive tracks, the TWCC sequence source, and the RTCP RR/XR/TWCC
//! timers; `PlayStream` owns the per-SSRC send tracks, the per-track
//! timestamp jitter rebuild, and RTCP dispatch including NACK-driven
//! retransmission.

use std::collections::HashMap;

use relay_rtcp::{ExtendedReport, PictureLossIndication, ReceptionReport, Rrtr, TransportLayerCc, TransportLayerNack};
use relay_rtp::RtpPacket;
use relay_shared::error::{Error, Result};

use crate::circuit_breaker::CircuitBreaker;
use crate::ring_buffer::RtpRingBuffer;
use crate::stream_description::StreamDescription;
use crate::twcc::TwccRecorder;

/// §8 boundary behavior: "`ZERO` jitter algorithm on first packet sets a
/// base equal to the packet's timestamp; subsequent packets are `ts - base`
/// with no monotonicity enforcement."
#[derive(Default)]
pub struct ZeroJitter {
    base: Option<u32>,
}

impl ZeroJitter {
    pub fn rebuild(&mut self, ts: u32) -> i64 {
        let base = *self.base.get_or_insert(ts);
        ts as i64 - base as i64
    }
}

struct ReceiveTrack {
    ssrc: u32,
    last_sender_report: u32,
    jitter: u32,
}

pub struct PublishStream {
    description: StreamDescription,
    tracks: HashMap<u32, ReceiveTrack>,
    twcc: TwccRecorder,
    twcc_enabled: bool,
    sender_started: bool,
}

impl PublishStream {
    pub fn new(description: StreamDescription, sender_ssrc: u32, twcc_enabled: bool) -> Self {
        let mut tracks = HashMap::new();
        for track in description.audio.iter().chain(description.video.iter()) {
            tracks.insert(track.ssrc, ReceiveTrack { ssrc: track.ssrc, last_sender_report: 0, jitter: 0 });
        }
        PublishStream {
            description,
            tracks,
            twcc: TwccRecorder::new(sender_ssrc, 0),
            twcc_enabled,
            sender_started: false,
        }
    }

    pub fn start_sender(&mut self) {
        self.sender_started = true;
    }

    /// Records the arrival time of one packet's TWCC sequence number.
    pub fn on_twcc(&mut self, seq: u16, arrival_time_us: i64) -> Result<()> {
        self.twcc.on_twcc(seq, arrival_time_us)
    }

    /// RTCP RR timer (100ms): if the sender has started, emit an RR plus an
    /// XR-RRTR for every receive track.
    pub fn tick_rtcp_rr(&self, sender_ssrc: u32, now_ntp: u64) -> Vec<(ReceptionReport, ExtendedReport)> {
        if !self.sender_started {
            return Vec::new();
        }
        self.tracks
            .values()
            .map(|track| {
                let report = ReceptionReport {
                    ssrc: track.ssrc,
                    fraction_lost: 0,
                    total_lost: 0,
                    last_sequence_number: 0,
                    jitter: track.jitter,
                    last_sender_report: track.last_sender_report,
                    delay: 0,
                };
                let xr = ExtendedReport { sender_ssrc, rrtr: Some(Rrtr { ntp_timestamp: now_ntp }) };
                (report, xr)
            })
            .collect()
    }

    /// TWCC timer (100ms), gated by `sender_started AND twcc_enabled AND
    /// NOT circuit_breaker.critical`.
    pub fn tick_twcc(&mut self, breaker: &CircuitBreaker) -> Option<TransportLayerCc> {
        if !self.sender_started || !self.twcc_enabled || breaker.hybrid_critical_water_level() {
            return None;
        }
        self.twcc.build_feedback()
    }

    pub fn description(&self) -> &StreamDescription {
        &self.description
    }
}

struct SendTrack {
    active: bool,
    jitter: ZeroJitter,
    retransmit: RtpRingBuffer,
}

pub enum RtcpDispatch {
    ReceiverReport,
    Nack(TransportLayerNack),
    Pli(PictureLossIndication),
    ExtendedReport(ExtendedReport),
    Bye,
}

pub struct PlayStream {
    description: StreamDescription,
    tracks: HashMap<u32, SendTrack>,
}

impl PlayStream {
    pub fn new(description: StreamDescription, retransmit_ring_size: u16) -> Result<Self> {
        let mut tracks = HashMap::new();
        for track in description.audio.iter().chain(description.video.iter()) {
            tracks.insert(
                track.ssrc,
                SendTrack { active: track.active, jitter: ZeroJitter::default(), retransmit: RtpRingBuffer::new(retransmit_ring_size)? },
            );
        }
        Ok(PlayStream { description, tracks })
    }

    /// Rebuilds one outgoing packet's `avsync_time` via the zero-jitter
    /// algorithm and stores it in the track's retransmission ring.
    pub fn rebuild_and_store(&mut self, mut packet: RtpPacket) -> Result<RtpPacket> {
        let track = self
            .tracks
            .get_mut(&packet.header.ssrc)
            .ok_or_else(|| Error::Other(format!("play stream: unknown ssrc {}", packet.header.ssrc)))?;
        packet.avsync_time = track.jitter.rebuild(packet.header.timestamp);
        track.retransmit.add(packet.clone());
        Ok(packet)
    }

    /// Dispatches one RTCP packet by type to the matching SSRC's track.
    /// A NACK resolves to the matched retransmit packets; every other
    /// variant is a no-op at this layer and resolves to an empty list.
    pub fn dispatch(&mut self, event: &RtcpDispatch) -> Result<Vec<RtpPacket>> {
        match event {
            RtcpDispatch::Nack(nack) => self.on_recv_nack_packets(nack),
            RtcpDispatch::Pli(_) | RtcpDispatch::ReceiverReport | RtcpDispatch::ExtendedReport(_) | RtcpDispatch::Bye => Ok(Vec::new()),
        }
    }

    /// Locates the track whose active SSRC matches `nack.media_ssrc`; if
    /// the track is disabled or absent, fails. Otherwise walks the
    /// retransmission buffer and returns the matched packets for resend.
    pub fn on_recv_nack_packets(&mut self, nack: &TransportLayerNack) -> Result<Vec<RtpPacket>> {
        let track = self
            .tracks
            .get(&nack.media_ssrc)
            .ok_or_else(|| Error::Other(format!("play stream: no track for ssrc {}", nack.media_ssrc)))?;
        if !track.active {
            return Err(Error::Other(format!("play stream: track {} is disabled", nack.media_ssrc)));
        }

        let mut lost_seqs = Vec::new();
        for pair in &nack.nacks {
            lost_seqs.push(pair.packet_id);
            for bit in 0..16u16 {
                if pair.lost_packets & (1 << bit) != 0 {
                    lost_seqs.push(pair.packet_id.wrapping_add(bit + 1));
                }
            }
        }

        let track = self.tracks.get(&nack.media_ssrc).unwrap();
        Ok(lost_seqs.into_iter().filter_map(|seq| track.retransmit.fetch_rtp_packet(seq).cloned()).collect())
    }

    pub fn description(&self) -> &StreamDescription {
        &self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream_description::{PayloadDescription, TrackDescription};
    use bytes::Bytes;
    use relay_rtcp::NackPair;
    use relay_rtp::header::RtpHeader;
    use relay_rtp::packet::{FrameType, PayloadVariant};

    fn payload(pt: u8) -> PayloadDescription {
        PayloadDescription { payload_type: pt, codec: "H264".into(), clock_rate: 90000, channels: 1, fmtp: String::new() }
    }

    fn video_desc(ssrc: u32) -> StreamDescription {
        let mut desc = StreamDescription::new();
        desc.video.push(TrackDescription::new(false, "v0", ssrc, payload(96)));
        desc
    }

    fn rtp(ssrc: u32, seq: u16, ts: u32) -> RtpPacket {
        RtpPacket::new(RtpHeader::new(96, seq, ts, ssrc, false), FrameType::Video, PayloadVariant::Raw(Bytes::from_static(b"x")))
    }

    #[test]
    fn zero_jitter_anchors_on_first_packet() {
        let mut jitter = ZeroJitter::default();
        assert_eq!(jitter.rebuild(1000), 0);
        assert_eq!(jitter.rebuild(1500), 500);
        assert_eq!(jitter.rebuild(900), -100);
    }

    #[test]
    fn twcc_timer_gated_by_circuit_breaker_critical() {
        let desc = video_desc(100);
        let mut publish = PublishStream::new(desc, 1, true);
        publish.start_sender();
        publish.on_twcc(0, 0).unwrap();

        let breaker = CircuitBreaker::new();
        assert!(publish.tick_twcc(&breaker).is_some());

        publish.on_twcc(1, 1000).unwrap();
        breaker.pulse(crate::circuit_breaker::WaterLevel::Critical);
        assert!(publish.tick_twcc(&breaker).is_none());
    }

    #[test]
    fn nack_dispatch_resends_matched_packets_from_ring() {
        let desc = video_desc(100);
        let mut play = PlayStream::new(desc, 1024).unwrap();
        play.rebuild_and_store(rtp(100, 500, 1000)).unwrap();

        let nack = TransportLayerNack { sender_ssrc: 1, media_ssrc: 100, nacks: vec![NackPair { packet_id: 500, lost_packets: 0 }] };
        let resent = play.dispatch(&RtcpDispatch::Nack(nack)).unwrap();
        assert_eq!(resent.len(), 1);
        assert_eq!(resent[0].header.sequence_number, 500);
    }

    #[test]
    fn non_nack_dispatch_is_a_no_op() {
        let desc = video_desc(100);
        let mut play = PlayStream::new(desc, 1024).unwrap();
        let resent = play.dispatch(&RtcpDispatch::Bye).unwrap();
        assert!(resent.is_empty());
    }

    #[test]
    fn nack_for_unknown_ssrc_fails() {
        let desc = video_desc(100);
        let mut play = PlayStream::new(desc, 1024).unwrap();
        let nack = TransportLayerNack { sender_ssrc: 1, media_ssrc: 999, nacks: vec![] };
        assert!(play.on_recv_nack_packets(&nack).is_err());
    }
}
