//! `CircuitBreaker` (spec §5, §9 "Replacing singleton globals"): a
//! process-wide water-level signal, injected as a capability rather than
//! read from a global. Production wires one real instance at startup; tests
//! construct their own.

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaterLevel {
    Normal,
    High,
    Critical,
    Dying,
}

impl WaterLevel {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => WaterLevel::High,
            2 => WaterLevel::Critical,
            3 => WaterLevel::Dying,
            _ => WaterLevel::Normal,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            WaterLevel::Normal => 0,
            WaterLevel::High => 1,
            WaterLevel::Critical => 2,
            WaterLevel::Dying => 3,
        }
    }
}

pub struct CircuitBreaker {
    level: AtomicU8,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        CircuitBreaker { level: AtomicU8::new(WaterLevel::Normal.as_u8()) }
    }

    pub fn pulse(&self, level: WaterLevel) {
        self.level.store(level.as_u8(), Ordering::Relaxed);
    }

    pub fn level(&self) -> WaterLevel {
        WaterLevel::from_u8(self.level.load(Ordering::Relaxed))
    }

    /// §5 "When `dying`, RTP from publish sources is dropped before
    /// consumer fanout."
    pub fn hybrid_dying_water_level(&self) -> bool {
        self.level() == WaterLevel::Dying
    }

    /// §5 "When `high`, NACK generation is suppressed."
    pub fn hybrid_high_water_level(&self) -> bool {
        matches!(self.level(), WaterLevel::High | WaterLevel::Critical | WaterLevel::Dying)
    }

    /// §5 "When `critical`, TWCC emission is suppressed."
    pub fn hybrid_critical_water_level(&self) -> bool {
        matches!(self.level(), WaterLevel::Critical | WaterLevel::Dying)
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_escalate_monotonically() {
        let breaker = CircuitBreaker::new();
        assert!(!breaker.hybrid_high_water_level());

        breaker.pulse(WaterLevel::High);
        assert!(breaker.hybrid_high_water_level());
        assert!(!breaker.hybrid_critical_water_level());

        breaker.pulse(WaterLevel::Critical);
        assert!(breaker.hybrid_high_water_level());
        assert!(breaker.hybrid_critical_water_level());
        assert!(!breaker.hybrid_dying_water_level());

        breaker.pulse(WaterLevel::Dying);
        assert!(breaker.hybrid_dying_water_level());
    }
}
