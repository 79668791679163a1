//! Snowflake ID Generator
//!
//! Time-ordered 64-bit ids for rooms, messages and notifications.
//! Ordering by id matches ordering by creation time within one generator.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Default epoch (2024-01-01T00:00:00.000Z)
pub const DEFAULT_EPOCH: u64 = 1_704_067_200_000;

const MACHINE_BITS: u64 = 10;
const SEQUENCE_BITS: u64 = 12;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

/// Snowflake ID generator
///
/// The timestamp and sequence are packed into one atomic word so that
/// concurrent callers never hand out the same id.
pub struct SnowflakeGenerator {
    epoch: u64,
    machine_id: u64,
    /// `(millis_since_epoch << SEQUENCE_BITS) | sequence` of the last id.
    state: AtomicU64,
}

impl SnowflakeGenerator {
    /// Create a new snowflake generator
    pub fn new(machine_id: u64, epoch: u64) -> Self {
        Self {
            epoch,
            machine_id: machine_id & ((1 << MACHINE_BITS) - 1),
            state: AtomicU64::new(0),
        }
    }

    /// Generate a new snowflake ID
    pub fn generate(&self) -> i64 {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let now = self.elapsed_millis();
            let last_millis = current >> SEQUENCE_BITS;
            let next = if now > last_millis {
                now << SEQUENCE_BITS
            } else if current & SEQUENCE_MASK < SEQUENCE_MASK {
                current + 1
            } else {
                // Sequence exhausted for this millisecond; borrow the next one.
                (last_millis + 1) << SEQUENCE_BITS
            };

            match self
                .state
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => {
                    let millis = next >> SEQUENCE_BITS;
                    let sequence = next & SEQUENCE_MASK;
                    let id = (millis << (MACHINE_BITS + SEQUENCE_BITS))
                        | (self.machine_id << SEQUENCE_BITS)
                        | sequence;
                    return id as i64;
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Millisecond timestamp embedded in an id generated by this generator
    pub fn timestamp_of(&self, id: i64) -> u64 {
        ((id as u64) >> (MACHINE_BITS + SEQUENCE_BITS)) + self.epoch
    }

    fn elapsed_millis(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(self.epoch);
        now.saturating_sub(self.epoch)
    }
}

/// Parse an id received as a string (ids travel as strings in JSON)
pub fn parse_id(s: &str) -> Option<i64> {
    s.trim().parse::<i64>().ok().filter(|id| *id > 0)
}
