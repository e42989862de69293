//! `MessageQueue` (spec §3/§8): a per-consumer queue bounded by wall-clock
//! duration rather than item count, so a slow consumer sheds old video
//! frames instead of accumulating unbounded backlog.

use std::collections::VecDeque;
use std::time::Duration;

use crate::packet::MediaPacket;

pub const DEFAULT_MAX_QUEUE_DURATION: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct MessageQueue {
    packets: VecDeque<MediaPacket>,
    max_duration_ms: i64,
}

impl MessageQueue {
    pub fn new(max_duration: Duration) -> Self {
        MessageQueue {
            packets: VecDeque::new(),
            max_duration_ms: max_duration.as_millis() as i64,
        }
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn duration_ms(&self) -> i64 {
        match (self.packets.front(), self.packets.back()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => 0,
        }
    }

    /// Push one packet, shrinking when the queue's wall-clock span exceeds
    /// the configured budget.
    pub fn enqueue(&mut self, packet: MediaPacket) {
        self.packets.push_back(packet);
        if self.duration_ms() > self.max_duration_ms {
            self.shrink();
        }
    }

    /// Drop everything but sequence headers, which is enough for a newly
    /// attached consumer to resynchronize codec parameters without replaying
    /// the whole shed backlog.
    pub fn shrink(&mut self) {
        let before = self.packets.len();
        self.packets.retain(|packet| packet.is_sequence_header);
        log::debug!("message queue shrink: {} -> {}", before, self.packets.len());
    }

    /// Move up to `max_count` packets out of the queue, preserving order.
    /// Fewer stored than `max_count` empties the queue entirely; more
    /// preserves the remainder.
    pub fn dump_packets(&mut self, max_count: usize) -> Vec<MediaPacket> {
        let take = max_count.min(self.packets.len());
        self.packets.drain(..take).collect()
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_QUEUE_DURATION)
    }
}
