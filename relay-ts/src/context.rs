//! `TsContext`: the stateful PAT/PMT/PES encoder and decoder that ties the
//! codec, PSI, and PES modules together into whole 188-byte TS packets
//! (spec §4.11 "Encoder flow" / "Decoder flow").

use std::collections::HashMap;

use crate::codec::{AudioCodec, VideoCodec};
use crate::packet::{self, AdaptationField, AdaptationFieldControl, TsHeader};
use crate::pes::{self, PesHeaderParams};
use crate::psi::{self, PatProgram, PmtEsInfo, PmtInfo};
use crate::{
    PES_STREAM_ID_AUDIO, PES_STREAM_ID_VIDEO, TS_PID_AUDIO_AAC, TS_PID_AUDIO_MP3, TS_PID_PAT,
    TS_PID_PMT, TS_PID_VIDEO, TS_PMT_PROGRAM_NUMBER,
};
use relay_shared::error::{Error, Result};

/// One audio or video access unit, already elementary-stream framed (ADTS
/// for AAC, annexb for AVC/HEVC) by the caller before it reaches the TS
/// layer.
#[derive(Debug, Clone)]
pub struct TsMessage {
    pub stream_id: u8,
    pub dts: i64,
    pub pts: i64,
    pub payload: Vec<u8>,
    pub is_video: bool,
    /// Only meaningful on the encode path: controls whether this frame's
    /// first TS packet carries a PCR (spec §4.11 rule 3).
    pub is_keyframe: bool,
}

/// Per-PID PES reassembly state on the decode path.
#[derive(Default)]
pub struct TsChannel {
    in_progress: bool,
    continuity: u8,
    buffer: Vec<u8>,
    is_video: bool,
}

impl TsChannel {
    fn new() -> Self {
        Self::default()
    }
}

#[derive(Default)]
pub struct TsContext {
    pat_programs: Vec<PatProgram>,
    pmt: Option<PmtInfo>,
    pmt_written_for: Option<(VideoCodec, AudioCodec)>,
    continuity: HashMap<u16, u8>,
    channels: HashMap<u16, TsChannel>,
}

impl TsContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_continuity(&mut self, pid: u16) -> u8 {
        let slot = self.continuity.entry(pid).or_insert(0);
        let value = *slot;
        *slot = (*slot + 1) % 16;
        value
    }

    fn audio_pid(audio: AudioCodec) -> u16 {
        match audio {
            AudioCodec::Aac => TS_PID_AUDIO_AAC,
            AudioCodec::Mp3 => TS_PID_AUDIO_MP3,
            AudioCodec::Disabled => 0,
        }
    }

    /// Encode one access unit, emitting a fresh PAT+PMT first if the codec
    /// pair differs from the last call (spec §4.11 rule 2).
    pub fn encode(&mut self, video: VideoCodec, audio: AudioCodec, msg: &TsMessage) -> Result<Vec<u8>> {
        if video == VideoCodec::Disabled && audio == AudioCodec::Disabled {
            return Err(Error::HlsNoStream { vcodec: 0, acodec: 0 });
        }

        let video_pid = TS_PID_VIDEO;
        let audio_pid = Self::audio_pid(audio);
        let pcr_pid = if video != VideoCodec::Disabled { video_pid } else { audio_pid };

        let mut out = Vec::new();
        let codecs = (video, audio);
        if self.pmt_written_for != Some(codecs) {
            out.extend(self.encode_pat_packet());
            out.extend(self.encode_pmt_packet(video, audio, pcr_pid)?);
            self.pmt_written_for = Some(codecs);
        }

        let (pid, stream_id, pure_audio) = if msg.is_video {
            (video_pid, PES_STREAM_ID_VIDEO, false)
        } else {
            (audio_pid, PES_STREAM_ID_AUDIO, video == VideoCodec::Disabled)
        };
        let write_pcr = pure_audio || (msg.is_video && msg.is_keyframe);
        let pcr = if write_pcr { Some(msg.dts) } else { None };

        let params = PesHeaderParams {
            stream_id,
            dts: msg.dts,
            pts: msg.pts,
            has_distinct_dts: msg.dts != msg.pts,
            payload_len: msg.payload.len(),
        };
        let optional = pes::encode_pes_optional_header(&params);
        let pes_packet_length: u16 = if msg.is_video {
            0
        } else {
            let len = optional.len() + msg.payload.len();
            if len > 0xFFFF {
                0
            } else {
                len as u16
            }
        };
        let prefix = pes::encode_pes_prefix(stream_id, pes_packet_length);

        let mut full = Vec::with_capacity(prefix.len() + optional.len() + msg.payload.len());
        full.extend_from_slice(&prefix);
        full.extend_from_slice(&optional);
        full.extend_from_slice(&msg.payload);

        out.extend(self.packetize(pid, &full, pcr));
        Ok(out)
    }

    fn encode_pat_packet(&mut self) -> Vec<u8> {
        let section = psi::encode_pat(TS_PMT_PROGRAM_NUMBER, TS_PID_PMT);
        self.build_psi_packet(TS_PID_PAT, &section)
    }

    fn encode_pmt_packet(&mut self, video: VideoCodec, audio: AudioCodec, pcr_pid: u16) -> Result<Vec<u8>> {
        let mut streams = Vec::new();
        if let Some(stream_type) = video.stream_type() {
            streams.push(PmtEsInfo {
                stream_type,
                elementary_pid: TS_PID_VIDEO,
            });
        }
        if let Some(stream_type) = audio.stream_type() {
            streams.push(PmtEsInfo {
                stream_type,
                elementary_pid: Self::audio_pid(audio),
            });
        }
        let section = psi::encode_pmt(TS_PMT_PROGRAM_NUMBER, pcr_pid, &streams);
        Ok(self.build_psi_packet(TS_PID_PMT, &section))
    }

    fn build_psi_packet(&mut self, pid: u16, section: &[u8]) -> Vec<u8> {
        let cc = self.next_continuity(pid);
        let header = TsHeader {
            payload_unit_start_indicator: true,
            pid,
            adaptation_field_control: AdaptationFieldControl::PayloadOnly,
            continuity_counter: cc,
        };
        let mut payload = Vec::with_capacity(1 + section.len());
        payload.push(0x00); // pointer_field
        payload.extend_from_slice(section);
        packet::build_packet(&header, None, &payload)
    }

    /// Split `full` (PES prefix + optional header + elementary payload)
    /// into as many 188-byte TS packets as needed, writing `pcr` (if any)
    /// into the first packet's adaptation field and stuffing the last
    /// packet's adaptation field so every packet is exactly 188 bytes.
    fn packetize(&mut self, pid: u16, full: &[u8], pcr: Option<i64>) -> Vec<u8> {
        const MAX_PAYLOAD: usize = crate::TS_PACKET_SIZE - 4;

        let mut out = Vec::new();
        let mut offset = 0;
        let mut first = true;
        loop {
            let remaining = full.len() - offset;
            let cc = self.next_continuity(pid);
            let pcr_here = if first { pcr } else { None };
            let af_with_pcr_overhead = if pcr_here.is_some() { 8 } else { 0 };
            let cap = MAX_PAYLOAD - af_with_pcr_overhead;

            let (used, adaptation) = if remaining <= cap {
                let slack = cap - remaining;
                let af = if pcr_here.is_some() || slack > 0 {
                    Some(AdaptationField {
                        discontinuity_indicator: false,
                        random_access_indicator: pcr_here.is_some(),
                        pcr: pcr_here,
                        stuffing_len: slack,
                    })
                } else {
                    None
                };
                (remaining, af)
            } else {
                let af = pcr_here.map(|p| AdaptationField {
                    discontinuity_indicator: false,
                    random_access_indicator: true,
                    pcr: Some(p),
                    stuffing_len: 0,
                });
                (cap, af)
            };

            let header = TsHeader {
                payload_unit_start_indicator: first,
                pid,
                adaptation_field_control: if adaptation.is_some() {
                    AdaptationFieldControl::AdaptationAndPayload
                } else {
                    AdaptationFieldControl::PayloadOnly
                },
                continuity_counter: cc,
            };
            out.extend(packet::build_packet(&header, adaptation.as_ref(), &full[offset..offset + used]));
            offset += used;
            first = false;
            if offset >= full.len() {
                break;
            }
        }
        out
    }

    fn is_video_pid(&self, pid: u16) -> bool {
        match &self.pmt {
            Some(info) => info
                .streams
                .iter()
                .any(|s| s.elementary_pid == pid && crate::codec::is_video_stream_type(s.stream_type)),
            None => pid == TS_PID_VIDEO,
        }
    }

    /// Parse one 188-byte TS packet, returning a reassembled [`TsMessage`]
    /// once a full PES unit has been collected (spec §4.11 "Decoder flow").
    pub fn decode(&mut self, ts_packet: &[u8]) -> Result<Option<TsMessage>> {
        let header = packet::decode_header(ts_packet)?;
        let mut pos = 4;
        if matches!(
            header.adaptation_field_control,
            AdaptationFieldControl::AdaptationOnly | AdaptationFieldControl::AdaptationAndPayload
        ) {
            let (_, consumed) = AdaptationField::decode(&ts_packet[pos..])?;
            pos += consumed;
        }
        if header.adaptation_field_control == AdaptationFieldControl::AdaptationOnly {
            return Ok(None);
        }
        let payload = &ts_packet[pos..];

        if header.pid == TS_PID_PAT {
            if !header.payload_unit_start_indicator || payload.is_empty() {
                return Ok(None);
            }
            let pointer = payload[0] as usize;
            if 1 + pointer > payload.len() {
                return Err(Error::TsPsiCrc);
            }
            self.pat_programs = psi::decode_pat(&payload[1 + pointer..])?;
            return Ok(None);
        }

        if self.pat_programs.iter().any(|p| p.pmt_pid == header.pid) {
            if !header.payload_unit_start_indicator || payload.is_empty() {
                return Ok(None);
            }
            let pointer = payload[0] as usize;
            if 1 + pointer > payload.len() {
                return Err(Error::TsPsiCrc);
            }
            self.pmt = Some(psi::decode_pmt(&payload[1 + pointer..])?);
            return Ok(None);
        }

        self.decode_pes_payload(header.pid, header.payload_unit_start_indicator, header.continuity_counter, payload)
    }

    fn decode_pes_payload(&mut self, pid: u16, pusi: bool, cc: u8, payload: &[u8]) -> Result<Option<TsMessage>> {
        let is_video = self.is_video_pid(pid);

        if pusi {
            let mut finished = None;
            if let Some(ch) = self.channels.get(&pid) {
                if ch.in_progress {
                    if let Ok(h) = pes::decode_pes_header(&ch.buffer) {
                        if h.pes_packet_length == 0 {
                            finished = Some(Self::message_from_buffer(&ch.buffer, ch.is_video, ch.buffer.len())?);
                        }
                    }
                }
            }
            let channel = self.channels.entry(pid).or_insert_with(TsChannel::new);
            channel.in_progress = true;
            channel.continuity = cc;
            channel.is_video = is_video;
            channel.buffer.clear();
            channel.buffer.extend_from_slice(payload);
            if finished.is_some() {
                return Ok(finished);
            }
        } else {
            let channel = match self.channels.get_mut(&pid) {
                Some(c) if c.in_progress => c,
                _ => return Ok(None),
            };
            let expected = (channel.continuity + 1) % 16;
            if cc != expected {
                channel.in_progress = false;
                channel.buffer.clear();
                return Ok(None);
            }
            channel.continuity = cc;
            channel.buffer.extend_from_slice(payload);
        }

        let channel = self.channels.get_mut(&pid).expect("channel just inserted or updated above");
        if let Ok(header) = pes::decode_pes_header(&channel.buffer) {
            if header.pes_packet_length != 0 {
                let total = 6 + header.pes_packet_length as usize;
                if channel.buffer.len() >= total {
                    let msg = Self::message_from_buffer(&channel.buffer, channel.is_video, total)?;
                    channel.in_progress = false;
                    channel.buffer.clear();
                    return Ok(Some(msg));
                }
            }
        }
        Ok(None)
    }

    fn message_from_buffer(buffer: &[u8], is_video: bool, end: usize) -> Result<TsMessage> {
        let header = pes::decode_pes_header(&buffer[..end])?;
        Ok(TsMessage {
            stream_id: header.stream_id,
            dts: header.dts,
            pts: header.pts,
            payload: buffer[header.header_len..end].to_vec(),
            is_video,
            is_keyframe: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_when_both_streams_disabled() {
        let mut ctx = TsContext::new();
        let msg = TsMessage {
            stream_id: PES_STREAM_ID_AUDIO,
            dts: 0,
            pts: 0,
            payload: vec![1, 2, 3],
            is_video: false,
            is_keyframe: false,
        };
        let err = ctx.encode(VideoCodec::Disabled, AudioCodec::Disabled, &msg).unwrap_err();
        assert!(matches!(err, Error::HlsNoStream { .. }));
    }

    #[test]
    fn audio_only_round_trips_through_decode() {
        let mut ctx = TsContext::new();
        let msg = TsMessage {
            stream_id: PES_STREAM_ID_AUDIO,
            dts: 90000,
            pts: 90000,
            payload: vec![0xFF, 0xF1, 0x50, 0x80, 0x00, 0x1F, 0xFC, 1, 2, 3, 4],
            is_video: false,
            is_keyframe: false,
        };
        let bytes = ctx.encode(VideoCodec::Disabled, AudioCodec::Aac, &msg).unwrap();
        assert_eq!(bytes.len() % crate::TS_PACKET_SIZE, 0);
        for chunk in bytes.chunks(crate::TS_PACKET_SIZE) {
            assert_eq!(chunk[0], crate::TS_SYNC_BYTE);
        }

        let mut decoder = TsContext::new();
        let mut decoded = None;
        for chunk in bytes.chunks(crate::TS_PACKET_SIZE) {
            if let Some(m) = decoder.decode(chunk).unwrap() {
                decoded = Some(m);
            }
        }
        let decoded = decoded.expect("audio PES should have been reassembled");
        assert_eq!(decoded.stream_id, PES_STREAM_ID_AUDIO);
        assert_eq!(decoded.dts, 90000);
        assert_eq!(decoded.pts, 90000);
        assert_eq!(decoded.payload, msg.payload);
    }

    #[test]
    fn video_pes_completes_on_next_pusi() {
        let mut ctx = TsContext::new();
        let first = TsMessage {
            stream_id: PES_STREAM_ID_VIDEO,
            dts: 0,
            pts: 0,
            payload: vec![0u8; 512],
            is_video: true,
            is_keyframe: true,
        };
        let second = TsMessage {
            stream_id: PES_STREAM_ID_VIDEO,
            dts: 3000,
            pts: 3000,
            payload: vec![1u8; 10],
            is_video: true,
            is_keyframe: false,
        };
        let mut bytes = ctx.encode(VideoCodec::H264, AudioCodec::Disabled, &first).unwrap();
        bytes.extend(ctx.encode(VideoCodec::H264, AudioCodec::Disabled, &second).unwrap());

        let mut decoder = TsContext::new();
        let mut messages = Vec::new();
        for chunk in bytes.chunks(crate::TS_PACKET_SIZE) {
            if let Some(m) = decoder.decode(chunk).unwrap() {
                messages.push(m);
            }
        }
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].payload, first.payload);
    }
}
