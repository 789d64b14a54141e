use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::instrument::Market;

pub type UserId = u64;
pub type OrderId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Limit,
    Market,
}

/// Monotonic counter standing in for a nanosecond clock for order priority.
///
/// Wall-clock `SystemTime` can tie or go backwards under load, which would
/// corrupt price-time priority. A process-wide counter fixes both: every
/// call returns a value strictly greater than the last. The book itself
/// calls this while its exclusive lock is held (see `OrderBook::place_limit`)
/// rather than leaving it to the caller, so the assigned timestamp order
/// always matches the order in which orders actually entered the book's
/// critical section.
static TIMESTAMP_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn next_timestamp() -> u64 {
    TIMESTAMP_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// An order known to the matching core.
///
/// `price` is `Some` only while the order is resting on a book: a resting
/// order's price always equals the level it's filed under. A market order's
/// `price` is always `None`, since it never rests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub side: Side,
    pub order_type: OrderType,
    pub price: Option<f64>,
    pub size: f64,
    pub timestamp: u64,
    pub market: Market,
}

impl Order {
    pub fn is_filled(&self) -> bool {
        self.size <= 0.0
    }
}
