use std::collections::VecDeque;
use tracing::warn;

use crate::orders::{Order, OrderId};
use crate::trade::Match;

/// FIFO queue of resting orders at a single price, on a single side.
///
/// Mirrors the Go source's `Limit` (`orderbook/orderbook.go`), but fixes a
/// defect in it: the Go source removes an order by swapping it with the
/// last element and truncating, which breaks FIFO order within the vector,
/// then re-sorts by timestamp on every `Fill` to compensate. Here
/// `DeleteOrder` uses `VecDeque::remove`, an order-preserving removal, so
/// the sequence is always already in FIFO order and `Fill` never needs to
/// re-sort.
#[derive(Debug, Clone)]
pub struct PriceLevel {
    pub price: f64,
    orders: VecDeque<Order>,
    total_volume: f64,
}

impl PriceLevel {
    pub fn new(price: f64) -> Self {
        Self {
            price,
            orders: VecDeque::new(),
            total_volume: 0.0,
        }
    }

    pub fn total_volume(&self) -> f64 {
        self.total_volume
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter()
    }

    /// Appends `o` to the back of the FIFO queue. Precondition: `o` is not
    /// already resting anywhere.
    pub fn add_order(&mut self, order: Order) {
        self.total_volume += order.size;
        self.orders.push_back(order);
    }

    /// Removes the order with the given id. Returns it, or `None` if it
    /// isn't in this level — callers are expected to have already located
    /// the correct level via the book's id index, so `None` here signals a
    /// bug rather than a normal-path miss.
    pub fn delete_order(&mut self, order_id: u64) -> Option<Order> {
        let idx = self.orders.iter().position(|o| o.id == order_id)?;
        let removed = self.orders.remove(idx)?;
        self.total_volume -= removed.size;
        Some(removed)
    }

    /// Consumes `incoming` against this level's resting orders in strict
    /// FIFO (ascending timestamp) order, producing one [`Match`] per
    /// resting order touched. Stops as soon as `incoming` is filled or the
    /// level runs out of orders. Fully-filled resting orders are removed
    /// from the queue before returning; a resting order that is only
    /// partially consumed (the incoming order runs out of size first) stays
    /// in the queue and is reported as `Match`-only, not as a removal — the
    /// second return value lists only the ids that were actually popped, so
    /// callers can tell a still-resting partial fill apart from a
    /// fully-filled one.
    pub fn fill(&mut self, incoming: &mut Order) -> (Vec<Match>, Vec<OrderId>) {
        let mut matches = Vec::new();
        let mut filled_order_ids = Vec::new();

        while incoming.size > 0.0 {
            let Some(resting) = self.orders.front_mut() else {
                break;
            };

            let trade_size = incoming.size.min(resting.size);
            resting.size -= trade_size;
            incoming.size -= trade_size;
            self.total_volume -= trade_size;

            matches.push(Match {
                maker_order_id: resting.id,
                maker_user_id: resting.user_id,
                taker_order_id: incoming.id,
                taker_user_id: incoming.user_id,
                price: self.price,
                size_filled: trade_size,
                aggressor_is_bid: incoming.side == crate::orders::Side::Buy,
            });

            if resting.is_filled() {
                let filled = self.orders.pop_front().expect("front just matched");
                debug_assert!(filled.is_filled());
                filled_order_ids.push(filled.id);
            }
        }

        if matches.is_empty() {
            warn!(price = self.price, "fill() called against empty level");
        }

        (matches, filled_order_ids)
    }
}
