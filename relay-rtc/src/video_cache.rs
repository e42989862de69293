//! RTP video frame reassembly, RTC → RTMP/TS path (spec §4.4): two
//! collaborating objects, a fixed-size packet cache and a small state
//! machine that walks it looking for complete frames, concatenates each
//! complete run into one coded-frame payload, and wraps it as a
//! [`relay_media::packet::MediaPacket`] ready to hand to a `StreamSource`.

use bytes::Bytes;

use relay_media::packet::MediaPacket;
use relay_rtp::fua::reassemble_fu_a;
use relay_rtp::packet::FuFragment;
use relay_shared::error::{Error, Result};
use relay_ts::VideoCodec;

const FLV_CODEC_ID_AVC: u8 = 7;
const FLV_CODEC_ID_HEVC: u8 = 12;
const FLV_FRAME_TYPE_KEY: u8 = 1;
const FLV_FRAME_TYPE_INTER: u8 = 2;
const FLV_AVC_PACKET_TYPE_NALU: u8 = 1;

/// What one inserted RTP packet contributed toward a frame: either NALUs
/// already complete on their own (a single NALU, or a depacketized
/// STAP-A/STAP-HEVC aggregate), or one fragment of an FU-A/FU-HEVC run.
#[derive(Debug, Clone)]
pub enum FramePayload {
    Nalus(Vec<Bytes>),
    Fragment { nal_ref_idc: u8, nalu_type: u8, payload: Bytes },
}

#[derive(Debug, Clone)]
struct CacheEntry {
    seq: u16,
    rtp_timestamp: u32,
    avsync_time: i64,
    marker: bool,
    fu_start: bool,
    fu_end: bool,
    payload: FramePayload,
}

/// Fixed-size array indexed by `seq % N`; writes overwrite and free the
/// previous occupant of a slot.
pub struct VideoPacketCache {
    slots: Vec<Option<CacheEntry>>,
    size: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The first missing sequence number found while walking forward.
    Gap(u16),
    /// Marker bit or a timestamp change was seen; `tail` is the frame's last
    /// sequence number.
    FrameEnd(u16),
    /// Walked the entire cache capacity without finding an end.
    Overflow,
}

impl VideoPacketCache {
    pub fn new(size: u16) -> Result<Self> {
        if !size.is_power_of_two() {
            return Err(Error::Other("video packet cache size must be a power of two".into()));
        }
        Ok(VideoPacketCache { slots: vec![None; size as usize], size })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn insert(
        &mut self,
        seq: u16,
        rtp_timestamp: u32,
        avsync_time: i64,
        marker: bool,
        fu_start: bool,
        fu_end: bool,
        payload: FramePayload,
    ) {
        self.slots[(seq % self.size) as usize] =
            Some(CacheEntry { seq, rtp_timestamp, avsync_time, marker, fu_start, fu_end, payload });
    }

    fn get(&self, seq: u16) -> Option<&CacheEntry> {
        self.slots[(seq % self.size) as usize].as_ref().filter(|e| e.seq == seq)
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }

    /// Walks forward from `current` while the slot is in use and carries the
    /// same RTP timestamp as `current`'s own entry.
    pub fn find_next_lost_sn(&self, current: u16) -> Result<ScanOutcome> {
        let Some(anchor) = self.get(current) else {
            return Err(Error::RtpMuxer("find_next_lost_sn: current slot is empty".into()));
        };
        let reference_ts = anchor.rtp_timestamp;
        let mut seq = current;
        for _ in 0..self.size {
            let next = seq.wrapping_add(1);
            match self.get(next) {
                None => return Ok(ScanOutcome::Gap(next)),
                Some(entry) if entry.rtp_timestamp != reference_ts => return Ok(ScanOutcome::FrameEnd(seq)),
                Some(entry) if entry.marker => return Ok(ScanOutcome::FrameEnd(next)),
                Some(_) => seq = next,
            }
        }
        Ok(ScanOutcome::Overflow)
    }

    /// Necessary-and-sufficient integrity check: the number of FU-A start
    /// markers in `[start, end]` equals the number of FU-A end markers.
    pub fn check_frame_complete(&self, start: u16, end: u16) -> bool {
        let mut starts = 0u32;
        let mut ends = 0u32;
        let mut seq = start;
        loop {
            if let Some(entry) = self.get(seq) {
                starts += entry.fu_start as u32;
                ends += entry.fu_end as u32;
            }
            if seq == end {
                break;
            }
            seq = seq.wrapping_add(1);
        }
        starts == ends
    }

    pub fn avsync_time(&self, seq: u16) -> Option<i64> {
        self.get(seq).map(|e| e.avsync_time)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DetectorState {
    NoKey,
    Assembling,
}

/// The RTMP/enhanced-RTMP message produced by concatenating one complete
/// frame's NALUs, ready to feed a `StreamSource::on_video`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameMessage {
    pub is_keyframe: bool,
    pub packet: MediaPacket,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    Gap(u16),
    Ready { header: u16, tail: u16, message: FrameMessage },
    Overflow,
    /// Still waiting; nothing new to report.
    Pending,
}

/// States: `no-key` (awaiting first keyframe), `assembling` (have key,
/// filling gaps).
pub struct FrameDetector {
    state: DetectorState,
    header: u16,
    lost: u16,
    key_timestamp: Option<u32>,
    codec: VideoCodec,
    pending_keyframe: bool,
}

impl FrameDetector {
    pub fn new(codec: VideoCodec) -> Self {
        FrameDetector {
            state: DetectorState::NoKey,
            header: 0,
            lost: 0,
            key_timestamp: None,
            codec,
            pending_keyframe: false,
        }
    }

    /// Called on every keyframe arrival. If there is no key yet, or the RTP
    /// timestamp differs from the stored key timestamp, clears the cache and
    /// anchors assembly at the new key.
    pub fn on_keyframe(&mut self, cache: &mut VideoPacketCache, seq: u16, rtp_timestamp: u32) {
        if self.key_timestamp != Some(rtp_timestamp) {
            cache.clear();
            self.header = seq;
            self.lost = seq;
            self.key_timestamp = Some(rtp_timestamp);
            self.state = DetectorState::Assembling;
            self.pending_keyframe = true;
        }
    }

    pub fn is_assembling(&self) -> bool {
        self.state == DetectorState::Assembling
    }

    /// Runs one detection step for a just-cached packet at `received`,
    /// returning one event per complete frame found. A single call can
    /// surface more than one [`FrameEvent::Ready`]: once a frame completes,
    /// detection immediately re-enters at the next sequence number (spec
    /// §4.4's "frame-emission second pass") in case reordered packets had
    /// already completed the frame after it too.
    pub fn detect_frame(&mut self, cache: &VideoPacketCache, received: u16) -> Result<Vec<FrameEvent>> {
        if self.state == DetectorState::NoKey {
            return Ok(vec![FrameEvent::Pending]);
        }

        // Late start packet: move the frame's header backwards.
        let backwards_distance = self.header.wrapping_sub(received);
        if backwards_distance != 0 && backwards_distance < 0x8000 {
            self.header = received;
        }

        if received != self.lost {
            // Not the packet we were waiting on; keep the current lost
            // pointer and wait for more packets.
            return Ok(vec![FrameEvent::Pending]);
        }

        self.detect_next_frame(cache)
    }

    /// Scans forward from `self.header`, emitting every already-complete
    /// frame in a chain until a gap or overflow stops it.
    fn detect_next_frame(&mut self, cache: &VideoPacketCache) -> Result<Vec<FrameEvent>> {
        let mut events = Vec::new();
        loop {
            match cache.find_next_lost_sn(self.header)? {
                ScanOutcome::Gap(next_missing) => {
                    self.lost = next_missing;
                    events.push(FrameEvent::Gap(next_missing));
                    break;
                }
                ScanOutcome::FrameEnd(tail) => {
                    if !cache.check_frame_complete(self.header, tail) {
                        return Err(Error::RtpMuxer(format!(
                            "incomplete fu-a run in frame [{}, {}]",
                            self.header, tail
                        )));
                    }
                    let header = self.header;
                    let is_keyframe = self.pending_keyframe;
                    self.pending_keyframe = false;
                    let message = build_frame_message(cache, header, tail, is_keyframe, self.codec)?;
                    events.push(FrameEvent::Ready { header, tail, message });
                    self.header = tail.wrapping_add(1);
                    self.lost = self.header;
                }
                ScanOutcome::Overflow => {
                    events.push(FrameEvent::Overflow);
                    break;
                }
            }
        }
        Ok(events)
    }
}

impl Default for FrameDetector {
    fn default() -> Self {
        Self::new(VideoCodec::H264)
    }
}

/// Concatenates the NALUs cached across `[start, end]` in sequence order,
/// reassembling any FU-A/FU-HEVC runs along the way, and wraps the result as
/// an AVCC-framed `MediaPacket` (codec id chosen by whether the detector was
/// constructed for H.264 or H.265, matching `MediaPacket::video`'s reuse of
/// the same two-byte tag layout for plain and enhanced RTMP).
fn build_frame_message(
    cache: &VideoPacketCache,
    start: u16,
    end: u16,
    is_keyframe: bool,
    codec: VideoCodec,
) -> Result<FrameMessage> {
    let mut nalus: Vec<Bytes> = Vec::new();
    let mut fragment_run: Vec<FuFragment> = Vec::new();
    let mut fragment_ref_idc = 0u8;
    let mut avsync_time = 0i64;
    let mut seq = start;
    loop {
        if let Some(entry) = cache.get(seq) {
            if seq == start {
                avsync_time = entry.avsync_time;
            }
            match &entry.payload {
                FramePayload::Nalus(list) => nalus.extend(list.iter().cloned()),
                FramePayload::Fragment { nal_ref_idc, nalu_type, payload } => {
                    fragment_ref_idc = *nal_ref_idc;
                    fragment_run.push(FuFragment {
                        start: entry.fu_start,
                        end: entry.fu_end,
                        nalu_type: *nalu_type,
                        payload: payload.clone(),
                    });
                    if entry.fu_end {
                        nalus.push(reassemble_fu_a(fragment_ref_idc, &fragment_run)?);
                        fragment_run.clear();
                    }
                }
            }
        }
        if seq == end {
            break;
        }
        seq = seq.wrapping_add(1);
    }

    let codec_id = match codec {
        VideoCodec::H265 => FLV_CODEC_ID_HEVC,
        _ => FLV_CODEC_ID_AVC,
    };
    let frame_type = if is_keyframe { FLV_FRAME_TYPE_KEY } else { FLV_FRAME_TYPE_INTER };

    let mut payload = Vec::with_capacity(5 + nalus.iter().map(|n| 4 + n.len()).sum::<usize>());
    payload.push((frame_type << 4) | codec_id);
    payload.push(FLV_AVC_PACKET_TYPE_NALU);
    payload.extend_from_slice(&[0, 0, 0]); // composition time, always zero here
    for nalu in &nalus {
        payload.extend_from_slice(&(nalu.len() as u32).to_be_bytes());
        payload.extend_from_slice(nalu);
    }

    Ok(FrameMessage { is_keyframe, packet: MediaPacket::video(avsync_time, Bytes::from(payload)) })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nalu(seq: u16) -> FramePayload {
        FramePayload::Nalus(vec![Bytes::from(vec![0x65u8, seq as u8])])
    }

    /// Spec §8 scenario 4: seq=100 (FU-A start of keyframe), 101, 103 (gap
    /// at 102); `detect_frame(103)` records `lost_sn=102`. Then 102 (FU-A
    /// middle), then 104 (FU-A end with marker) completes `(100, 104)`.
    #[test]
    fn reassembles_frame_with_gap_per_scenario_4() {
        let mut cache = VideoPacketCache::new(1024).unwrap();
        let mut detector = FrameDetector::new(VideoCodec::H264);

        let fragment = |n: u8| FramePayload::Fragment { nal_ref_idc: 0x60, nalu_type: 5, payload: Bytes::from(vec![n]) };

        cache.insert(100, 90000, 0, false, true, false, fragment(1));
        detector.on_keyframe(&mut cache, 100, 90000);
        assert_eq!(detector.detect_frame(&cache, 100).unwrap(), vec![FrameEvent::Pending]);

        cache.insert(101, 90000, 0, false, false, false, fragment(2));
        assert_eq!(detector.detect_frame(&cache, 101).unwrap(), vec![FrameEvent::Gap(102)]);

        cache.insert(103, 90000, 0, false, false, false, fragment(4));
        assert_eq!(detector.detect_frame(&cache, 103).unwrap(), vec![FrameEvent::Pending]);

        cache.insert(102, 90000, 0, false, false, false, fragment(3));
        let events = detector.detect_frame(&cache, 102).unwrap();
        assert_eq!(events, vec![FrameEvent::Gap(104)]);

        cache.insert(104, 90000, 0, true, false, true, fragment(5));
        let events = detector.detect_frame(&cache, 104).unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            FrameEvent::Ready { header, tail, message } => {
                assert_eq!((*header, *tail), (100, 104));
                assert!(message.is_keyframe);
                assert!(message.packet.is_keyframe);
                // Reassembled NALU (nal_ref_idc 0x60 | nalu_type 5) followed
                // by its AVCC length prefix, inside the FLV video tag.
                let body = &message.packet.payload[5..];
                assert_eq!(&body[4..], &[0x65u8, 1, 2, 3, 4, 5][..]);
            }
            other => panic!("expected Ready, got {other:?}"),
        }

        // Subsequent frame starts at 105.
        cache.insert(105, 94500, 0, false, true, false, nalu(105));
        detector.on_keyframe(&mut cache, 105, 94500);
        assert!(detector.is_assembling());
    }

    #[test]
    fn rejects_frame_with_mismatched_fua_boundaries() {
        let mut cache = VideoPacketCache::new(1024).unwrap();
        let mut detector = FrameDetector::new(VideoCodec::H264);
        cache.insert(0, 1000, 0, false, true, false, FramePayload::Fragment { nal_ref_idc: 0x60, nalu_type: 5, payload: Bytes::from_static(&[1]) });
        detector.on_keyframe(&mut cache, 0, 1000);
        detector.detect_frame(&cache, 0).unwrap();

        // fu_end never arrives; marker bit set without closing the fu-a run.
        cache.insert(1, 1000, 0, true, false, false, FramePayload::Fragment { nal_ref_idc: 0x60, nalu_type: 5, payload: Bytes::from_static(&[2]) });
        assert!(detector.detect_frame(&cache, 1).is_err());
    }

    #[test]
    fn chains_into_an_already_complete_next_frame_in_one_call() {
        // All three frames' sole packets are cached before detection ever
        // runs (each single-packet frame's end is only visible once the
        // *next* frame's differing RTP timestamp arrives), so one
        // `detect_frame` call at the first frame's header must surface both
        // completed frames via the detect_next_frame chain, trailing off
        // into a gap once the scan reaches the not-yet-arrived fourth
        // packet.
        let mut cache = VideoPacketCache::new(1024).unwrap();
        let mut detector = FrameDetector::new(VideoCodec::H264);

        cache.insert(10, 1000, 0, true, false, false, nalu(10));
        detector.on_keyframe(&mut cache, 10, 1000);
        cache.insert(11, 2000, 100, true, false, false, nalu(11));
        cache.insert(12, 3000, 200, true, false, false, nalu(12));

        let events = detector.detect_frame(&cache, 10).unwrap();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], FrameEvent::Ready { header: 10, tail: 10, .. }));
        assert!(matches!(events[1], FrameEvent::Ready { header: 11, tail: 11, .. }));
        assert_eq!(events[2], FrameEvent::Gap(13));
        match &events[0] {
            FrameEvent::Ready { message, .. } => assert!(message.is_keyframe),
            _ => unreachable!(),
        }
        match &events[1] {
            FrameEvent::Ready { message, .. } => assert!(!message.is_keyframe),
            _ => unreachable!(),
        }
    }

    #[test]
    fn emits_enhanced_rtmp_codec_id_for_hevc() {
        let mut cache = VideoPacketCache::new(1024).unwrap();
        let mut detector = FrameDetector::new(VideoCodec::H265);
        cache.insert(0, 1000, 0, true, false, false, nalu(0));
        detector.on_keyframe(&mut cache, 0, 1000);
        // A second packet with a different RTP timestamp is what reveals
        // that the first (single-packet) frame already ended at seq 0.
        cache.insert(1, 2000, 50, true, false, false, nalu(1));

        let events = detector.detect_frame(&cache, 0).unwrap();
        match &events[0] {
            FrameEvent::Ready { message, .. } => {
                let codec_id = message.packet.payload[0] & 0x0F;
                assert_eq!(codec_id, FLV_CODEC_ID_HEVC);
            }
            other => panic!("expected Ready, got {other:?}"),
        }
    }
}
