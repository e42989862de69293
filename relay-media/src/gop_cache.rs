//! `GopCache` (spec §3/§8 scenario 3): a ring of packets anchored at the
//! most recent video keyframe, with pure-audio detection via a magic-number
//! threshold kept verbatim per spec §9 Open Questions.

use std::collections::VecDeque;

use crate::packet::MediaPacket;

/// Packet count after which a keyframe-less GOP is treated as pure audio;
/// kept at this value deliberately (see DESIGN.md).
pub const PURE_AUDIO_GUESS_COUNT: u32 = 115;

#[derive(Debug, Clone)]
pub struct GopCache {
    packets: VecDeque<MediaPacket>,
    audio_after_video: u32,
    video_frame_count: u32,
    max_video_frames: u32,
}

impl GopCache {
    pub fn new(max_video_frames: u32) -> Self {
        GopCache {
            packets: VecDeque::new(),
            audio_after_video: 0,
            video_frame_count: 0,
            max_video_frames,
        }
    }

    pub fn packets(&self) -> impl Iterator<Item = &MediaPacket> {
        self.packets.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn is_pure_audio(&self) -> bool {
        self.packets.is_empty() || !self.packets.iter().any(MediaPacket::is_video)
    }

    pub fn clear(&mut self) {
        self.packets.clear();
        self.audio_after_video = 0;
        self.video_frame_count = 0;
    }

    /// Cache one packet, applying the clear-on-keyframe, pure-audio-overflow,
    /// and max-frame-cap rules (spec §3 GopCache invariants a–c).
    pub fn cache(&mut self, packet: &MediaPacket) {
        if packet.is_video() {
            if packet.is_keyframe {
                self.clear();
            }
            self.packets.push_back(packet.clone());
            self.audio_after_video = 0;
            self.video_frame_count += 1;
            if self.video_frame_count > self.max_video_frames {
                self.clear();
            }
        } else if packet.is_audio() {
            self.packets.push_back(packet.clone());
            self.audio_after_video += 1;
            if self.audio_after_video > PURE_AUDIO_GUESS_COUNT {
                self.clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn video(ts: i64, keyframe: bool) -> MediaPacket {
        let first = if keyframe { 0x17 } else { 0x27 };
        MediaPacket::video(ts, Bytes::from(vec![first, 0x01, 0, 0, 0]))
    }

    fn audio(ts: i64) -> MediaPacket {
        MediaPacket::audio(ts, Bytes::from(vec![0xAF, 0x01, 0, 0]))
    }

    #[test]
    fn not_pure_audio_while_video_present() {
        let mut cache = GopCache::new(1000);
        cache.cache(&video(0, true));
        cache.cache(&audio(20));
        cache.cache(&video(40, false));
        cache.cache(&audio(60));
        cache.cache(&video(80, false));

        assert!(!cache.is_empty());
        assert!(!cache.is_pure_audio());
    }

    #[test]
    fn overflows_to_pure_audio_at_116_consecutive_audio_packets() {
        let mut cache = GopCache::new(1000);
        cache.cache(&video(0, true));

        for i in 0..115u32 {
            cache.cache(&audio(120 + i as i64 * 20));
        }
        assert!(!cache.is_empty());
        assert!(!cache.is_pure_audio());

        cache.cache(&audio(120 + 115 * 20));
        assert!(cache.is_empty());
        assert!(cache.is_pure_audio());
    }

    #[test]
    fn keyframe_clears_previous_gop() {
        let mut cache = GopCache::new(1000);
        cache.cache(&video(0, true));
        cache.cache(&video(40, false));
        cache.cache(&video(80, true));
        assert_eq!(cache.packets().count(), 1);
    }

    #[test]
    fn max_frame_cap_clears_cache() {
        let mut cache = GopCache::new(3);
        cache.cache(&video(0, true));
        cache.cache(&video(40, false));
        cache.cache(&video(80, false));
        assert!(!cache.is_empty());
        cache.cache(&video(120, false));
        assert!(cache.is_empty());
    }
}
