//! TWCC recording (spec §4.9 `on_twcc`/TWCC timer): tracks per-packet
//! arrival times for one receive track and periodically drains them into a
//! `relay_rtcp::TransportLayerCc` feedback packet.

use std::collections::BTreeMap;

use relay_rtcp::{TransportLayerCc, TwccSymbol};
use relay_shared::error::{Error, Result};

const SMALL_DELTA_UNIT_US: i64 = 250;
const SMALL_DELTA_MAX: i64 = 255 * SMALL_DELTA_UNIT_US;
const REFERENCE_TIME_UNIT_US: i64 = 64_000;

pub struct TwccRecorder {
    sender_ssrc: u32,
    media_ssrc: u32,
    fb_pkt_count: u8,
    arrivals: BTreeMap<u16, i64>,
}

impl TwccRecorder {
    pub fn new(sender_ssrc: u32, media_ssrc: u32) -> Self {
        TwccRecorder { sender_ssrc, media_ssrc, fb_pkt_count: 0, arrivals: BTreeMap::new() }
    }

    /// Records the arrival time (microseconds, monotone within the
    /// connection) for `seq`; a duplicate sequence number is rejected
    /// (spec §4.9 "`on_twcc(seq)`... duplicate sequence numbers fail").
    pub fn on_twcc(&mut self, seq: u16, arrival_time_us: i64) -> Result<()> {
        if self.arrivals.contains_key(&seq) {
            return Err(Error::Other(format!("twcc: duplicate sequence number {seq}")));
        }
        self.arrivals.insert(seq, arrival_time_us);
        Ok(())
    }

    pub fn pending_len(&self) -> usize {
        self.arrivals.len()
    }

    /// Drains every recorded arrival since the last build into one feedback
    /// packet, or `None` if nothing has arrived yet.
    pub fn build_feedback(&mut self) -> Option<TransportLayerCc> {
        if self.arrivals.is_empty() {
            return None;
        }
        let base_sequence_number = *self.arrivals.keys().next().unwrap();
        let last_sequence_number = *self.arrivals.keys().next_back().unwrap();
        let reference_time_us = *self.arrivals.values().next().unwrap();
        let reference_time = (reference_time_us / REFERENCE_TIME_UNIT_US) as i32;

        let mut packet_statuses = Vec::new();
        let mut recv_deltas = Vec::new();
        let mut last_arrival = reference_time_us;
        let mut seq = base_sequence_number;
        loop {
            match self.arrivals.get(&seq) {
                None => packet_statuses.push(TwccSymbol::NotReceived),
                Some(&arrival) => {
                    let delta_us = arrival - last_arrival;
                    last_arrival = arrival;
                    if delta_us.abs() <= SMALL_DELTA_MAX {
                        packet_statuses.push(TwccSymbol::SmallDelta);
                        recv_deltas.push((delta_us / SMALL_DELTA_UNIT_US) as i32);
                    } else {
                        packet_statuses.push(TwccSymbol::LargeDelta);
                        recv_deltas.push((delta_us / SMALL_DELTA_UNIT_US) as i32);
                    }
                }
            }
            if seq == last_sequence_number {
                break;
            }
            seq = seq.wrapping_add(1);
        }

        let fb_pkt_count = self.fb_pkt_count;
        self.fb_pkt_count = self.fb_pkt_count.wrapping_add(1);
        self.arrivals.clear();

        Some(TransportLayerCc {
            sender_ssrc: self.sender_ssrc,
            media_ssrc: self.media_ssrc,
            base_sequence_number,
            reference_time,
            fb_pkt_count,
            packet_statuses,
            recv_deltas,
        })
    }
}
