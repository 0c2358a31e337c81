// Unique ID source (snowflake)
//
// Layout of an ID, from the most significant bit:
// 1 unused bit, 41 bits of milliseconds since the custom epoch,
// 10 bits of worker (server) id, 12 bits of sequence.

use chrono::Utc;
use parking_lot::Mutex;
use thiserror::Error;

/// Custom epoch: 2020-01-01T00:00:00Z, in milliseconds
pub const SNOWFLAKE_EPOCH_MS: i64 = 1_577_836_800_000;

const WORKER_ID_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;

pub const SNOWFLAKE_MAX_WORKER_ID: u32 = (1 << WORKER_ID_BITS) - 1;

const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

/// Clock regression (ms) absorbed without failing
pub const CLOCK_REGRESSION_TOLERANCE_MS: i64 = 5;

/// Error generating an unique ID
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdGenerationError {
    #[error("clock moved backwards: last timestamp {last} ms, now {now} ms")]
    ClockMovedBackwards { last: i64, now: i64 },

    #[error("clock is before the ID epoch")]
    ClockBeforeEpoch,

    #[error("invalid worker id: {0}")]
    InvalidWorkerId(u32),
}

/// Source of unique, weakly increasing 64 bit IDs
pub trait IdSource: Send + Sync {
    /// Generates the next ID
    fn next_id(&self) -> Result<u64, IdGenerationError>;
}

/// Wall clock in milliseconds since the UNIX epoch
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// System clock
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

struct SnowflakeState {
    /// Logical timestamp of the last ID (relative to the epoch)
    last_timestamp: i64,

    /// Sequence of the last ID
    sequence: u64,

    /// Latest clock reading (relative to the epoch).
    /// The logical timestamp may run ahead of it after sequence exhaustion.
    last_clock: i64,
}

/// Snowflake ID generator
pub struct SnowflakeGenerator {
    worker_id: u64,
    clock: Box<dyn Clock>,
    state: Mutex<SnowflakeState>,
}

impl SnowflakeGenerator {
    /// Creates a generator using the system clock
    ///
    /// # Arguments
    ///
    /// * `worker_id` - Identity of this server (0..=1023)
    pub fn new(worker_id: u32) -> Result<SnowflakeGenerator, IdGenerationError> {
        Self::with_clock(worker_id, Box::new(SystemClock))
    }

    /// Creates a generator with a custom clock
    pub fn with_clock(
        worker_id: u32,
        clock: Box<dyn Clock>,
    ) -> Result<SnowflakeGenerator, IdGenerationError> {
        if worker_id > SNOWFLAKE_MAX_WORKER_ID {
            return Err(IdGenerationError::InvalidWorkerId(worker_id));
        }

        Ok(SnowflakeGenerator {
            worker_id: worker_id as u64,
            clock,
            state: Mutex::new(SnowflakeState {
                last_timestamp: -1,
                sequence: 0,
                last_clock: -1,
            }),
        })
    }

    /// Extracts the worker id from an ID
    pub fn worker_of(id: u64) -> u32 {
        ((id >> SEQUENCE_BITS) & (SNOWFLAKE_MAX_WORKER_ID as u64)) as u32
    }
}

impl IdSource for SnowflakeGenerator {
    fn next_id(&self) -> Result<u64, IdGenerationError> {
        let now = self.clock.now_millis() - SNOWFLAKE_EPOCH_MS;

        if now < 0 {
            return Err(IdGenerationError::ClockBeforeEpoch);
        }

        let mut state = self.state.lock();

        if state.last_clock - now > CLOCK_REGRESSION_TOLERANCE_MS {
            return Err(IdGenerationError::ClockMovedBackwards {
                last: state.last_clock + SNOWFLAKE_EPOCH_MS,
                now: now + SNOWFLAKE_EPOCH_MS,
            });
        }

        state.last_clock = state.last_clock.max(now);

        let mut timestamp = now.max(state.last_timestamp);

        if timestamp == state.last_timestamp {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;

            if state.sequence == 0 {
                // Sequence exhausted, borrow the next millisecond
                timestamp += 1;
            }
        } else {
            state.sequence = 0;
        }

        state.last_timestamp = timestamp;

        Ok(((timestamp as u64) << (WORKER_ID_BITS + SEQUENCE_BITS))
            | (self.worker_id << SEQUENCE_BITS)
            | state.sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    };

    struct ManualClock {
        now: Arc<AtomicI64>,
    }

    impl Clock for ManualClock {
        fn now_millis(&self) -> i64 {
            self.now.load(Ordering::SeqCst)
        }
    }

    fn make_generator(worker_id: u32) -> (SnowflakeGenerator, Arc<AtomicI64>) {
        let now = Arc::new(AtomicI64::new(SNOWFLAKE_EPOCH_MS + 1_000_000));
        let generator = SnowflakeGenerator::with_clock(
            worker_id,
            Box::new(ManualClock { now: now.clone() }),
        )
        .unwrap();

        (generator, now)
    }

    #[test]
    fn test_ids_increase_with_held_clock() {
        let (generator, _) = make_generator(7);

        let mut last = 0u64;

        for _ in 0..10_000 {
            let id = generator.next_id().unwrap();

            assert!(id > last);
            assert_eq!(SnowflakeGenerator::worker_of(id), 7);

            last = id;
        }
    }

    #[test]
    fn test_sequence_exhaustion_with_held_clock() {
        let (generator, _) = make_generator(3);

        let mut last = 0u64;

        for _ in 0..(8 * 4096) {
            let id = generator.next_id().unwrap();

            assert!(id > last);

            last = id;
        }
    }

    #[test]
    fn test_small_regression_is_absorbed() {
        let (generator, now) = make_generator(1);

        let first = generator.next_id().unwrap();

        now.fetch_sub(3, Ordering::SeqCst);

        let second = generator.next_id().unwrap();

        assert!(second > first);
    }

    #[test]
    fn test_backward_clock_jump_fails() {
        let (generator, now) = make_generator(1);

        let first = generator.next_id().unwrap();

        now.fetch_sub(10, Ordering::SeqCst);

        assert!(matches!(
            generator.next_id(),
            Err(IdGenerationError::ClockMovedBackwards { .. })
        ));

        // Once the clock catches up, IDs keep increasing
        now.fetch_add(11, Ordering::SeqCst);

        assert!(generator.next_id().unwrap() > first);
    }

    #[test]
    fn test_invalid_worker_id() {
        assert_eq!(
            SnowflakeGenerator::new(1024).err(),
            Some(IdGenerationError::InvalidWorkerId(1024))
        );
    }
}
