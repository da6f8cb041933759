//! Per-tick results and the state hash used for determinism checks.

use crate::fixed::Ticks;

// ---------------------------------------------------------------------------
// Tick report
// ---------------------------------------------------------------------------

/// What the three phases did during one `Simulation::tick()` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// The tick number that was executed (1-based).
    pub tick: Ticks,
    /// Converters that counted down in the process phase.
    pub processed: u32,
    /// Converters that drew all their inputs.
    pub drawn: u32,
    /// Converters that tried to draw but found a source short.
    pub shortfalls: u32,
    /// Converters refused by their throttle.
    pub throttled: u32,
    /// Converters that delivered to their target.
    pub delivered: u32,
}

impl TickReport {
    /// True when no converter changed any stock this tick.
    pub fn is_quiet(&self) -> bool {
        self.drawn == 0 && self.delivered == 0
    }
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A simple deterministic hash of simulation state.
///
/// Uses FNV-1a (64-bit) for speed and simplicity. Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    /// Start a new hash.
    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    /// Feed bytes into the hash.
    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_i64(&mut self, v: i64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_str(&mut self, s: &str) {
        self.write_u64(s.len() as u64);
        self.write(s.as_bytes());
    }

    /// Finalize and return the hash value.
    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_report_quiet_when_nothing_moved() {
        let mut report = TickReport {
            tick: 3,
            processed: 2,
            shortfalls: 1,
            ..Default::default()
        };
        assert!(report.is_quiet());
        report.delivered = 1;
        assert!(!report.is_quiet());
    }

    #[test]
    fn state_hash_deterministic() {
        let mut h1 = StateHash::new();
        h1.write_u64(42);
        h1.write_str("cashbox");

        let mut h2 = StateHash::new();
        h2.write_u64(42);
        h2.write_str("cashbox");

        assert_eq!(h1.finish(), h2.finish());
    }

    #[test]
    fn state_hash_order_matters() {
        let mut h1 = StateHash::new();
        h1.write_i64(-1);
        h1.write_i64(2);

        let mut h2 = StateHash::new();
        h2.write_i64(2);
        h2.write_i64(-1);

        assert_ne!(h1.finish(), h2.finish());
    }

    #[test]
    fn string_length_prefix_separates_fields() {
        let mut h1 = StateHash::new();
        h1.write_str("ab");
        h1.write_str("c");

        let mut h2 = StateHash::new();
        h2.write_str("a");
        h2.write_str("bc");

        assert_ne!(h1.finish(), h2.finish());
    }
}
