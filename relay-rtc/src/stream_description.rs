//! `StreamDescription` (spec §3): the negotiated RTC track set for one
//! connection — exactly one optional audio track plus an ordered list of
//! video tracks, each matched by any of its three SSRCs.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    RecvOnly,
    SendOnly,
    SendRecv,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadDescription {
    pub payload_type: u8,
    pub codec: String,
    pub clock_rate: u32,
    pub channels: u8,
    pub fmtp: String,
}

/// RTX references its primary by `apt` (spec §3 invariant: "RTX `apt` must
/// reference the primary PT").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtxPayload {
    pub payload_type: u8,
    pub apt: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackDescription {
    pub is_audio: bool,
    pub id: String,
    pub ssrc: u32,
    pub rtx_ssrc: Option<u32>,
    pub fec_ssrc: Option<u32>,
    pub direction: Direction,
    pub extensions: HashMap<u8, String>,
    pub mid: String,
    pub msid: String,
    pub active: bool,
    pub primary: PayloadDescription,
    pub red: Option<PayloadDescription>,
    pub rtx: Option<RtxPayload>,
    pub ulpfec: Option<PayloadDescription>,
}

impl TrackDescription {
    pub fn new(is_audio: bool, id: impl Into<String>, ssrc: u32, primary: PayloadDescription) -> Self {
        TrackDescription {
            is_audio,
            id: id.into(),
            ssrc,
            rtx_ssrc: None,
            fec_ssrc: None,
            direction: Direction::SendRecv,
            extensions: HashMap::new(),
            mid: String::new(),
            msid: String::new(),
            active: true,
            primary,
            red: None,
            rtx: None,
            ulpfec: None,
        }
    }

    /// A track is matched by any of its three SSRCs (spec §3 invariant).
    pub fn matches_ssrc(&self, ssrc: u32) -> bool {
        self.ssrc == ssrc || self.rtx_ssrc == Some(ssrc) || self.fec_ssrc == Some(ssrc)
    }

    pub fn set_rtx(&mut self, payload_type: u8) {
        self.rtx = Some(RtxPayload { payload_type, apt: self.primary.payload_type });
    }
}

#[derive(Debug, Clone, Default)]
pub struct StreamDescription {
    pub audio: Option<TrackDescription>,
    pub video: Vec<TrackDescription>,
}

impl StreamDescription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_by_ssrc(&self, ssrc: u32) -> Option<&TrackDescription> {
        self.audio
            .iter()
            .chain(self.video.iter())
            .find(|track| track.matches_ssrc(ssrc))
    }

    pub fn find_by_ssrc_mut(&mut self, ssrc: u32) -> Option<&mut TrackDescription> {
        if self.audio.as_ref().is_some_and(|t| t.matches_ssrc(ssrc)) {
            return self.audio.as_mut();
        }
        self.video.iter_mut().find(|track| track.matches_ssrc(ssrc))
    }

    /// Locate the audio track by codec name (spec §4.6 "locate the RTC
    /// audio track description by codec name").
    pub fn find_audio_by_codec(&self, codec: &str) -> Option<&TrackDescription> {
        self.audio.as_ref().filter(|t| t.primary.codec.eq_ignore_ascii_case(codec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(pt: u8, codec: &str) -> PayloadDescription {
        PayloadDescription { payload_type: pt, codec: codec.to_string(), clock_rate: 90000, channels: 1, fmtp: String::new() }
    }

    #[test]
    fn track_matches_any_of_its_three_ssrcs() {
        let mut track = TrackDescription::new(false, "v0", 100, payload(96, "H264"));
        track.rtx_ssrc = Some(101);
        track.fec_ssrc = Some(102);
        assert!(track.matches_ssrc(100));
        assert!(track.matches_ssrc(101));
        assert!(track.matches_ssrc(102));
        assert!(!track.matches_ssrc(103));
    }

    #[test]
    fn rtx_apt_references_primary_payload_type() {
        let mut track = TrackDescription::new(false, "v0", 100, payload(96, "H264"));
        track.set_rtx(97);
        assert_eq!(track.rtx.unwrap().apt, 96);
    }

    #[test]
    fn finds_audio_track_by_codec_name() {
        let mut desc = StreamDescription::new();
        desc.audio = Some(TrackDescription::new(true, "a0", 200, payload(111, "opus")));
        assert!(desc.find_audio_by_codec("opus").is_some());
        assert!(desc.find_audio_by_codec("aac").is_none());
    }
}
