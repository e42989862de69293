//! RTP audio frame reassembly (spec §4.5): a sliding jitter buffer keyed by
//! sequence number with a wait-timeout and a size cap.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use relay_rtp::RtpPacket;

const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_millis(20);
const DEFAULT_WINDOW_SIZE: u16 = 50;
const DEFAULT_CAPACITY: usize = 200;

pub struct AudioJitterBuffer {
    map: BTreeMap<u16, RtpPacket>,
    last_seq: Option<u16>,
    oldest_inserted_at: Option<Instant>,
    wait_timeout: Duration,
    window_size: u16,
    capacity: usize,
}

impl AudioJitterBuffer {
    pub fn new() -> Self {
        AudioJitterBuffer {
            map: BTreeMap::new(),
            last_seq: None,
            oldest_inserted_at: None,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            window_size: DEFAULT_WINDOW_SIZE,
            capacity: DEFAULT_CAPACITY,
        }
    }

    /// Inserts `packet` and returns whatever packets became ready to emit,
    /// in sequence order (spec §4.5 steps 1-4).
    pub fn process_packet(&mut self, packet: RtpPacket, now: Instant) -> Vec<RtpPacket> {
        let seq = packet.header.sequence_number;

        // 1. First packet anchors last_seq = seq - 1.
        if self.last_seq.is_none() {
            self.last_seq = Some(seq.wrapping_sub(1));
        }
        let last_seq = self.last_seq.unwrap();

        // 2. Late packet (strictly behind last_seq by wrap-aware distance):
        // discard.
        let behind = last_seq.wrapping_sub(seq);
        if behind != 0 && behind < 0x8000 {
            return Vec::new();
        }

        // 3. Insert (or replace a duplicate).
        if self.map.is_empty() {
            self.oldest_inserted_at = Some(now);
        }
        self.map.insert(seq, packet);

        self.drain_ready(now)
    }

    fn drain_ready(&mut self, now: Instant) -> Vec<RtpPacket> {
        let mut ready = Vec::new();
        loop {
            let Some((&oldest_seq, _)) = self.map.iter().next() else {
                self.oldest_inserted_at = None;
                break;
            };
            let last_seq = self.last_seq.unwrap();
            let expected = last_seq.wrapping_add(1);
            let no_gap = oldest_seq == expected;
            let within_window = oldest_seq.wrapping_sub(last_seq) <= self.window_size && oldest_seq.wrapping_sub(last_seq) < 0x8000;
            let timed_out = self.oldest_inserted_at.is_some_and(|t| now.duration_since(t) >= self.wait_timeout);
            let over_capacity = self.map.len() >= self.capacity;

            if (within_window && no_gap) || timed_out || over_capacity {
                let packet = self.map.remove(&oldest_seq).expect("oldest key just observed");
                self.last_seq = Some(oldest_seq);
                ready.push(packet);
                self.oldest_inserted_at = if self.map.is_empty() { None } else { Some(now) };
            } else {
                break;
            }
        }
        ready
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for AudioJitterBuffer {
    fn default() -> Self {
        Self::new()
    }
}
