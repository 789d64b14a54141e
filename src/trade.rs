use serde::{Deserialize, Serialize};

use crate::instrument::Market;
use crate::orders::OrderId;

/// A persisted record of one fill.
///
/// - `price` is the maker's (resting order's) level price, never the
///   aggressor's.
/// - `aggressor_is_bid` records which side was the incoming (taker) order,
///   regardless of which order in the `Match` was passed in first.
/// - Append-only: never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub market: Market,
    pub price: f64,
    pub size: f64,
    pub maker_order_id: OrderId,
    pub taker_order_id: OrderId,
    pub aggressor_is_bid: bool,
    pub timestamp: u64,
}

/// One resting order consuming part (or all) of an incoming order's size,
/// produced by [`crate::price_level::PriceLevel::fill`].
#[derive(Debug, Clone, Serialize)]
pub struct Match {
    pub maker_order_id: OrderId,
    pub maker_user_id: u64,
    pub taker_order_id: OrderId,
    pub taker_user_id: u64,
    pub price: f64,
    pub size_filled: f64,
    pub aggressor_is_bid: bool,
}

impl Match {
    /// The user who sold (ask side) in this match.
    pub fn seller(&self) -> u64 {
        if self.aggressor_is_bid {
            self.maker_user_id
        } else {
            self.taker_user_id
        }
    }

    /// The user who bought (bid side) in this match.
    pub fn buyer(&self) -> u64 {
        if self.aggressor_is_bid {
            self.taker_user_id
        } else {
            self.maker_user_id
        }
    }
}
