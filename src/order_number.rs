//! Order number generation
//!
//! Order numbers are shown to sellers and buyers and must be globally unique
//! and ordered by creation time. Snowflake layout in a positive `i64`:
//!
//! ```text
//! | 0 | ms since 2024-01-01 (41 bits) | node (8 bits) | sequence (14 bits) |
//! ```
//!
//! The generator never hands out the same value twice: within one
//! millisecond the sequence advances, and when the clock stalls, goes
//! backwards or the sequence is exhausted, it keeps counting from the last
//! issued timestamp instead of reusing it.

use crate::core_types::OrderNumber;

/// 2024-01-01T00:00:00Z in unix milliseconds
pub const ORDER_NUMBER_EPOCH_MS: u64 = 1_704_067_200_000;

const NODE_BITS: u32 = 8;
const SEQUENCE_BITS: u32 = 14;
const SEQUENCE_MASK: u32 = (1 << SEQUENCE_BITS) - 1;

/// Snowflake generator for order numbers
pub struct OrderNumberGenerator {
    node_id: u8,
    sequence: u32,
    last_timestamp: u64,
}

impl OrderNumberGenerator {
    pub fn new(node_id: u8) -> Self {
        Self {
            node_id,
            sequence: 0,
            last_timestamp: 0,
        }
    }

    /// Next order number from the wall clock
    pub fn generate(&mut self) -> OrderNumber {
        let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
        self.generate_at(now)
    }

    /// Next order number for a given unix-millisecond timestamp
    pub fn generate_at(&mut self, now_ms: u64) -> OrderNumber {
        let now = now_ms.saturating_sub(ORDER_NUMBER_EPOCH_MS);

        if now > self.last_timestamp {
            self.last_timestamp = now;
            self.sequence = 0;
        } else if self.sequence < SEQUENCE_MASK {
            // Same millisecond, or the clock went backwards
            self.sequence += 1;
        } else {
            // Sequence exhausted: borrow the next millisecond
            self.last_timestamp += 1;
            self.sequence = 0;
        }

        ((self.last_timestamp << (NODE_BITS + SEQUENCE_BITS))
            | ((self.node_id as u64) << SEQUENCE_BITS)
            | self.sequence as u64) as OrderNumber
    }

    /// Creation time encoded in an order number, unix milliseconds
    pub fn timestamp_ms(order_number: OrderNumber) -> u64 {
        ((order_number as u64) >> (NODE_BITS + SEQUENCE_BITS)) + ORDER_NUMBER_EPOCH_MS
    }
}
