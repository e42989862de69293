//! `MetaCache` (spec §3/§9 "Replacing pointer graphs"): the four
//! current/previous slots become plain `Option<MediaPacket>` fields, and the
//! reduce-sequence-header comparison becomes byte-slice equality instead of
//! pointer identity.

use crate::packet::MediaPacket;

#[derive(Debug, Clone, Default)]
pub struct MetaCache {
    pub meta_data: Option<MediaPacket>,
    pub audio_sh: Option<MediaPacket>,
    pub previous_audio_sh: Option<MediaPacket>,
    pub video_sh: Option<MediaPacket>,
    pub previous_video_sh: Option<MediaPacket>,
}

/// Outcome of offering a fresh sequence header to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceHeaderUpdate {
    /// No previous SH existed; always forward regardless of config.
    FirstHeader,
    /// Identical to the previous SH; forward only if not reducing.
    Duplicate,
    /// Differs from the previous SH (or reduction is disabled); forward.
    Changed,
}

impl MetaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the audio SH slots, reporting whether this is a duplicate of
    /// the prior header. The cache is updated unconditionally — even
    /// duplicates refresh `audio_sh`/`previous_audio_sh` — since bridges
    /// read the cache independently of consumer fan-out (spec §4.1).
    pub fn update_audio_sh(&mut self, sh: MediaPacket, reduce_sequence_header: bool) -> SequenceHeaderUpdate {
        let outcome = classify(&self.audio_sh, &sh, reduce_sequence_header);
        self.previous_audio_sh = self.audio_sh.take();
        self.audio_sh = Some(sh);
        outcome
    }

    pub fn update_video_sh(&mut self, sh: MediaPacket, reduce_sequence_header: bool) -> SequenceHeaderUpdate {
        let outcome = classify(&self.video_sh, &sh, reduce_sequence_header);
        self.previous_video_sh = self.video_sh.take();
        self.video_sh = Some(sh);
        outcome
    }

    pub fn update_meta_data(&mut self, meta: MediaPacket) {
        self.meta_data = Some(meta);
    }
}

fn classify(current: &Option<MediaPacket>, incoming: &MediaPacket, reduce: bool) -> SequenceHeaderUpdate {
    match current {
        None => SequenceHeaderUpdate::FirstHeader,
        Some(prev) if reduce && prev.payload == incoming.payload => SequenceHeaderUpdate::Duplicate,
        Some(_) => SequenceHeaderUpdate::Changed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn sh(ts: i64, bytes: &'static [u8]) -> MediaPacket {
        MediaPacket::audio(ts, Bytes::from_static(bytes))
    }

    #[test]
    fn first_header_is_always_forwarded() {
        let mut cache = MetaCache::new();
        let outcome = cache.update_audio_sh(sh(1000, &[0xAF, 0x00, 0x12, 0x10]), true);
        assert_eq!(outcome, SequenceHeaderUpdate::FirstHeader);
        assert!(cache.previous_audio_sh.is_none());
    }

    #[test]
    fn identical_second_header_is_duplicate_when_reducing() {
        let mut cache = MetaCache::new();
        cache.update_audio_sh(sh(1000, &[0xAF, 0x00, 0x12, 0x10]), true);
        let outcome = cache.update_audio_sh(sh(2000, &[0xAF, 0x00, 0x12, 0x10]), true);
        assert_eq!(outcome, SequenceHeaderUpdate::Duplicate);
    }

    #[test]
    fn identical_second_header_forwards_when_not_reducing() {
        let mut cache = MetaCache::new();
        cache.update_audio_sh(sh(1000, &[0xAF, 0x00, 0x12, 0x10]), false);
        let outcome = cache.update_audio_sh(sh(2000, &[0xAF, 0x00, 0x12, 0x10]), false);
        assert_eq!(outcome, SequenceHeaderUpdate::Changed);
    }

    #[test]
    fn differing_header_is_changed() {
        let mut cache = MetaCache::new();
        cache.update_video_sh(sh(0, &[0x17, 0x00, 1, 2, 3]), true);
        let outcome = cache.update_video_sh(sh(1000, &[0x17, 0x00, 9, 9, 9]), true);
        assert_eq!(outcome, SequenceHeaderUpdate::Changed);
    }
}
