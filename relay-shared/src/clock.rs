use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Anchors a monotonic [`Instant`] to wall-clock time so that NTP-correlated
/// timestamps (sender reports, PCR) can be converted back into the
/// cooperative scheduler's monotonic domain without ever calling
/// `SystemTime::now()` on the hot path.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Clock {
    instant: Instant,
    since_unix_epoch: Duration,
}

impl Clock {
    pub fn now() -> Self {
        Self {
            instant: Instant::now(),
            since_unix_epoch: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or(Duration::ZERO),
        }
    }

    pub fn unix_ms(&self, now: Instant) -> i64 {
        let elapsed = now.duration_since(self.instant);
        (self.since_unix_epoch + elapsed).as_millis() as i64
    }
}

/// A 64-bit NTP short-format timestamp: 32 bits of seconds, 32 bits of
/// fraction, used to correlate RTCP sender-report wallclock time with the
/// `avsync_time` carried on `RtpPacket` (spec §3).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Ntp {
    pub ntp: u64,
}

const NTP_FRACTION_PER_MS: u64 = 1 << 32;

impl Ntp {
    pub fn from_time_ms(ms: u64) -> Self {
        let seconds = ms / 1000;
        let remainder_ms = ms % 1000;
        let fraction = (remainder_ms * NTP_FRACTION_PER_MS) / 1000;
        Ntp {
            ntp: (seconds << 32) | fraction,
        }
    }

    pub fn to_time_ms(&self) -> u64 {
        let seconds = self.ntp >> 32;
        let fraction = self.ntp & 0xFFFF_FFFF;
        let remainder_ms = (fraction * 1000) / NTP_FRACTION_PER_MS;
        seconds * 1000 + remainder_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ntp_round_trips_millisecond_timestamps() {
        for ms in [0u64, 1, 999, 1000, 1001, 123_456_789, 4_294_967_295, 4_294_967_296] {
            let ntp = Ntp::from_time_ms(ms);
            assert_eq!(ntp.to_time_ms(), ms, "round trip failed for {ms}");
        }
    }

    #[test]
    fn clock_unix_ms_advances_with_instant() {
        let clock = Clock::now();
        let later = clock.instant + Duration::from_millis(250);
        assert!(clock.unix_ms(later) - clock.unix_ms(clock.instant) >= 250);
    }
}
