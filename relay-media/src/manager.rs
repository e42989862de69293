//! `SourceManager` (spec §2/§5): owns the URL→source map and reclaims dead
//! sources on a periodic sweep.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::source::StreamSource;

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Default)]
pub struct SourceManager {
    sources: HashMap<String, StreamSource>,
}

impl SourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts before returning if absent, so a concurrent `fetch` sees a
    /// fully-initialized object or nothing — never a half-built one.
    pub fn fetch_or_create(&mut self, url: &str, reduce_sequence_header: bool, max_gop_frames: u32) -> &mut StreamSource {
        self.sources
            .entry(url.to_string())
            .or_insert_with(|| StreamSource::initialize(url, reduce_sequence_header, max_gop_frames))
    }

    pub fn get_mut(&mut self, url: &str) -> Option<&mut StreamSource> {
        self.sources.get_mut(url)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Remove every source whose `stream_is_dead()` plus hub cleanup delay
    /// has elapsed. Intended to be driven by an external 3s tick.
    pub fn sweep(&mut self, now: Instant) {
        self.sources.retain(|url, source| {
            let cleanup_delay = source.hub_mut().cleanup_delay();
            let dead = source.stream_is_dead(now.checked_sub(cleanup_delay).unwrap_or(now));
            if dead {
                log::info!("source manager: reclaiming dead stream {url}");
            }
            !dead
        });
    }
}
