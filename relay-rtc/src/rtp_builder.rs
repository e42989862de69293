//! RTP Builder, RTMP → RTC path (spec §4.6): wraps each RTMP audio frame as
//! an opus RTP packet (after ADTS framing + transcode) and packetizes each
//! RTMP video frame's NALUs into STAP-A/FU-A (H.264) or their HEVC
//! counterparts, applying the SEI/B-frame filtering policy.

use bytes::Bytes;

use relay_rtp::fua::{depacketize_fu_a, fragment_fu_a};
use relay_rtp::header::RtpHeader;
use relay_rtp::packet::{FrameType, FuFragment, PayloadVariant, RtpPacket};
use relay_rtp::MAX_SINGLE_NALU_SIZE;
use relay_shared::error::{Error, Result};
use relay_ts::aac::encode_adts_header;
use relay_ts::VideoCodec;

const H264_NALU_TYPE_SEI: u8 = 6;
const H264_NALU_TYPE_IDR: u8 = 5;

/// HEVC prefix/suffix SEI NAL unit types (ITU-T H.265 Table 7-1).
const H265_NALU_TYPE_SEI_PREFIX: u8 = 39;
const H265_NALU_TYPE_SEI_SUFFIX: u8 = 40;
/// HEVC IRAP NAL unit type range (BLA_W_LP..=RSV_IRAP_VCL23), covering
/// IDR_W_RADL/IDR_N_LP — the types an aggregation packet's keyframe slice is
/// pulled from.
const H265_IRAP_RANGE: std::ops::RangeInclusive<u8> = 16..=23;

/// Transcodes one AAC access unit into zero or more opus frames; an
/// external collaborator (spec §4.6 "audio transcoder collaborator").
pub trait AudioTranscoder {
    fn transcode_aac_to_opus(&mut self, adts_frame: &[u8]) -> Result<Vec<Bytes>>;
}

#[derive(Debug, Clone, Copy)]
pub struct FilterPolicy {
    pub keep_avc_nalu_sei: bool,
    pub keep_bframe: bool,
    pub merge_nalus: bool,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        FilterPolicy { keep_avc_nalu_sei: false, keep_bframe: false, merge_nalus: false }
    }
}

pub struct RtpBuilder {
    policy: FilterPolicy,
    codec: VideoCodec,
    audio_ssrc: u32,
    audio_payload_type: u8,
    audio_seq: u16,
    video_ssrc: u32,
    video_payload_type: u8,
    video_seq: u16,
}

fn h264_nalu_type(nalu: &Bytes) -> u8 {
    nalu.first().copied().unwrap_or(0) & 0x1F
}

/// H.264 B-frame detection from the slice header's `slice_type` field
/// (first byte of the slice's exp-golomb-coded `first_mb_in_slice`/
/// `slice_type` pair); `slice_type % 5 == 1` denotes a B slice.
fn is_h264_bframe(nalu: &Bytes) -> bool {
    nalu.len() > 1 && (nalu[1] >> 3) % 5 == 1
}

/// HEVC's NAL header is two bytes; `nal_unit_type` is bits 1-6 of the first.
fn h265_nalu_type(nalu: &Bytes) -> u8 {
    nalu.first().copied().map(|b| (b >> 1) & 0x3F).unwrap_or(0)
}

fn is_h265_sei(nalu_type: u8) -> bool {
    matches!(nalu_type, H265_NALU_TYPE_SEI_PREFIX | H265_NALU_TYPE_SEI_SUFFIX)
}

/// Same exp-golomb-offset heuristic as `is_h264_bframe`, shifted past
/// HEVC's extra NAL header byte to reach the slice segment header's
/// `slice_type` field.
fn is_h265_bframe(nalu: &Bytes) -> bool {
    nalu.len() > 3 && (nalu[2] >> 3) % 5 == 1
}

/// Splits one oversize HEVC NALU into FU fragments (RFC 7798 §4.4.3),
/// returned as the same [`FuFragment`] shape `relay_rtp::fua` uses for
/// H.264, since the NAL-unit-type field only needs 6 bits to round-trip
/// here rather than the wire-exact two-byte FU indicator/header pair.
fn fragment_h265(nalu: &Bytes, max_fragment_size: usize) -> Result<Vec<FuFragment>> {
    if nalu.len() < 2 {
        return Err(Error::RtpMuxer("hevc nalu shorter than its 2-byte header".into()));
    }
    let nalu_type = h265_nalu_type(nalu);
    let payload = nalu.slice(2..);
    if nalu.len() <= max_fragment_size {
        return Ok(vec![FuFragment { start: true, end: true, nalu_type, payload }]);
    }

    let room = max_fragment_size.saturating_sub(3);
    if room == 0 {
        return Err(Error::RtpMuxer("fu-hevc: max_fragment_size too small".into()));
    }
    let mut fragments = Vec::new();
    let mut offset = 0;
    while offset < payload.len() {
        let end = (offset + room).min(payload.len());
        fragments.push(FuFragment { start: offset == 0, end: end == payload.len(), nalu_type, payload: payload.slice(offset..end) });
        offset = end;
    }
    Ok(fragments)
}

impl RtpBuilder {
    pub fn new(
        policy: FilterPolicy,
        codec: VideoCodec,
        audio_ssrc: u32,
        audio_payload_type: u8,
        video_ssrc: u32,
        video_payload_type: u8,
    ) -> Self {
        RtpBuilder {
            policy,
            codec,
            audio_ssrc,
            audio_payload_type,
            audio_seq: 0,
            video_ssrc,
            video_payload_type,
            video_seq: 0,
        }
    }

    /// Adds an ADTS header, transcodes via `transcoder`, and wraps each
    /// resulting opus frame in one RTP packet (marker=1, ts = dts * 48 to
    /// move from RTMP's 1kHz clock to opus's 48kHz clock).
    pub fn build_audio(
        &mut self,
        dts: i64,
        aac_profile: u8,
        sample_rate: u32,
        channels: u8,
        raw_aac: &[u8],
        transcoder: &mut dyn AudioTranscoder,
    ) -> Result<Vec<RtpPacket>> {
        let header = encode_adts_header(aac_profile, sample_rate, channels, raw_aac.len())?;
        let mut adts_frame = Vec::with_capacity(7 + raw_aac.len());
        adts_frame.extend_from_slice(&header);
        adts_frame.extend_from_slice(raw_aac);

        let opus_frames = transcoder.transcode_aac_to_opus(&adts_frame)?;
        let mut packets = Vec::with_capacity(opus_frames.len());
        for frame in opus_frames {
            let rtp_header = RtpHeader::new(self.audio_payload_type, self.audio_seq, (dts * 48) as u32, self.audio_ssrc, true);
            self.audio_seq = self.audio_seq.wrapping_add(1);
            let mut packet = RtpPacket::new(rtp_header, FrameType::Audio, PayloadVariant::Opus(frame));
            packet.avsync_time = dts;
            packets.push(packet);
        }
        Ok(packets)
    }

    /// Packetizes one RTMP video frame's NALU samples into RTP, branching on
    /// the builder's codec: H.264 emits STAP-A/FU-A, H.265 emits the
    /// analogous STAP-HEVC/FU-HEVC aggregation (spec §4.6 "parse codec
    /// (AVC/HEVC accepted)"). `is_idr` selects aggregation-packet emission
    /// of `param_sets` (SPS/PPS/+VPS) ahead of the frame's samples; the last
    /// emitted packet has `marker=1`.
    pub fn build_video(&mut self, dts: i64, is_idr: bool, param_sets: &[Bytes], samples: &[Bytes]) -> Result<Vec<RtpPacket>> {
        let rtp_timestamp = dts as u32;
        let mut filtered: Vec<Bytes> = Vec::with_capacity(samples.len());
        for nalu in samples {
            let (is_sei, is_bframe) = match self.codec {
                VideoCodec::H265 => (is_h265_sei(h265_nalu_type(nalu)), is_h265_bframe(nalu)),
                _ => (h264_nalu_type(nalu) == H264_NALU_TYPE_SEI, is_h264_bframe(nalu)),
            };
            if is_sei && !self.policy.keep_avc_nalu_sei {
                continue;
            }
            if !self.policy.keep_bframe && is_bframe {
                continue;
            }
            filtered.push(nalu.clone());
        }

        let mut packets = Vec::new();

        if is_idr && !param_sets.is_empty() {
            let mut aggregate: Vec<Bytes> = param_sets.to_vec();
            let key_pos = match self.codec {
                VideoCodec::H265 => filtered.iter().position(|n| H265_IRAP_RANGE.contains(&h265_nalu_type(n))),
                _ => filtered.iter().position(|n| h264_nalu_type(n) == H264_NALU_TYPE_IDR),
            };
            if let Some(pos) = key_pos {
                aggregate.push(filtered.remove(pos));
            }
            let variant = match self.codec {
                VideoCodec::H265 => PayloadVariant::StapHevc(aggregate),
                _ => PayloadVariant::StapA(aggregate),
            };
            packets.push(self.next_video_packet(rtp_timestamp, variant));
        }

        if self.policy.merge_nalus && filtered.len() > 1 {
            let variant = match self.codec {
                VideoCodec::H265 => PayloadVariant::StapHevc(filtered),
                _ => PayloadVariant::StapA(filtered),
            };
            packets.push(self.next_video_packet(rtp_timestamp, variant));
        } else {
            for nalu in &filtered {
                if nalu.len() <= MAX_SINGLE_NALU_SIZE {
                    packets.push(self.next_video_packet(rtp_timestamp, PayloadVariant::Raw(nalu.clone())));
                } else {
                    match self.codec {
                        VideoCodec::H265 => {
                            for fragment in fragment_h265(nalu, MAX_SINGLE_NALU_SIZE)? {
                                packets.push(self.next_video_packet(rtp_timestamp, PayloadVariant::FuHevc(fragment)));
                            }
                        }
                        _ => {
                            for fragment in fragment_fu_a(nalu, MAX_SINGLE_NALU_SIZE)? {
                                let parsed = depacketize_fu_a(&fragment)?;
                                packets.push(self.next_video_packet(rtp_timestamp, PayloadVariant::FuA(parsed)));
                            }
                        }
                    }
                }
            }
        }

        if let Some(last) = packets.last_mut() {
            last.header.marker = true;
        }
        Ok(packets)
    }

    fn next_video_packet(&mut self, rtp_timestamp: u32, variant: PayloadVariant) -> RtpPacket {
        let header = RtpHeader::new(self.video_payload_type, self.video_seq, rtp_timestamp, self.video_ssrc, false);
        self.video_seq = self.video_seq.wrapping_add(1);
        let mut packet = RtpPacket::new(header, FrameType::Video, variant);
        packet.avsync_time = rtp_timestamp as i64;
        packet
    }
}
