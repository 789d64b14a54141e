use ordered_float::OrderedFloat;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

use crate::errors::{EngineError, EngineResult};
use crate::instrument::Market;
use crate::orders::{Order, OrderId, OrderType, Side, next_timestamp};
use crate::price_level::PriceLevel;
use crate::trade::{Match, Trade};

type PriceKey = OrderedFloat<f64>;

/// Per-market order book: two sides of [`PriceLevel`]s keyed by price, an
/// id→location index for O(1) cancel lookup, and an append-only trade log.
///
/// `bids`/`asks` are plain `BTreeMap`s ordered ascending by price; bid-side
/// best-price iteration is therefore `.iter().rev()` and ask-side is
/// `.iter()` — the same shape the teacher's integer-keyed `BTreeMap` uses,
/// generalized to real-valued prices via [`OrderedFloat`].
pub struct OrderBook {
    market: Market,
    bids: BTreeMap<PriceKey, PriceLevel>,
    asks: BTreeMap<PriceKey, PriceLevel>,
    /// order_id -> (side, price) so cancellation can find the level in
    /// O(1) without a raw pointer back-reference to a `PriceLevel`, which
    /// would create an ownership cycle.
    locations: HashMap<OrderId, (Side, PriceKey)>,
    trades: Vec<Trade>,
}

impl OrderBook {
    pub fn new(market: Market) -> Self {
        Self {
            market,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            locations: HashMap::new(),
            trades: Vec::new(),
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut BTreeMap<PriceKey, PriceLevel> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    fn side(&self, side: Side) -> &BTreeMap<PriceKey, PriceLevel> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    /// Inserts a limit order at its submitted price, creating the level if
    /// this is the first order at that price. Limit orders never cross in
    /// this engine — a crossing limit simply rests.
    pub fn place_limit(&mut self, mut order: Order) -> EngineResult<OrderId> {
        let Some(price) = order.price else {
            return Err(EngineError::BadInput(
                "limit order requires a price".into(),
            ));
        };
        if price <= 0.0 {
            return Err(EngineError::BadInput("price must be > 0".into()));
        }
        if order.size <= 0.0 {
            return Err(EngineError::BadInput("size must be > 0".into()));
        }

        let order_id = order.id;
        let side = order.side;
        let key = PriceKey::from(price);
        // Assigned here, while the caller holds this book's exclusive lock,
        // so the relative order of two concurrently-submitted orders'
        // timestamps always matches the order they actually entered the
        // critical section in.
        order.timestamp = next_timestamp();

        info!(market = %self.market, ?side, price, size = order.size, "limit order resting");

        self.side_mut(side)
            .entry(key)
            .or_insert_with(|| PriceLevel::new(price))
            .add_order(order);
        self.locations.insert(order_id, (side, key));

        Ok(order_id)
    }

    /// Sweeps the opposing side, best price first, filling each level in
    /// FIFO order (price-time priority). Fails without mutating any state
    /// if the order is larger than the opposing side's total volume.
    pub fn place_market(&mut self, mut order: Order) -> EngineResult<Vec<Match>> {
        if order.size <= 0.0 {
            return Err(EngineError::BadInput("size must be > 0".into()));
        }
        let opposing = order.side.opposite();
        let available = self.total_volume(opposing);
        if order.size > available {
            return Err(EngineError::InsufficientLiquidity {
                requested: order.size,
                available,
            });
        }
        order.timestamp = next_timestamp();

        let mut matches = Vec::new();
        let mut drained = Vec::new();

        let prices: Vec<PriceKey> = match opposing {
            Side::Sell => self.asks.keys().copied().collect(),
            Side::Buy => self.bids.keys().copied().rev().collect(),
        };

        for key in prices {
            if order.is_filled() {
                break;
            }
            let Some(level) = self.side_mut(opposing).get_mut(&key) else {
                continue;
            };
            let (level_matches, filled_order_ids) = level.fill(&mut order);
            // Only orders `fill` actually popped are gone from the level —
            // a resting order that was merely partially consumed (the
            // incoming order ran out of size first) stays resting and must
            // keep its location entry, or a later cancel would wrongly fail
            // with `UnknownOrder` and it would wrongly vanish from open
            // orders while `size > 0`.
            for id in &filled_order_ids {
                self.locations.remove(id);
            }
            matches.extend(level_matches);
            if level.is_empty() {
                drained.push(key);
            }
        }

        for key in drained {
            self.side_mut(opposing).remove(&key);
        }

        let now = next_timestamp();
        for m in &matches {
            self.trades.push(Trade {
                market: self.market.clone(),
                price: m.price,
                size: m.size_filled,
                maker_order_id: m.maker_order_id,
                taker_order_id: m.taker_order_id,
                aggressor_is_bid: m.aggressor_is_bid,
                timestamp: now,
            });
        }

        Ok(matches)
    }

    /// Removes the given order id from the book. Fails with
    /// `UnknownOrder` if the id isn't resting.
    pub fn cancel(&mut self, order_id: OrderId) -> EngineResult<Order> {
        let (side, key) = self
            .locations
            .remove(&order_id)
            .ok_or(EngineError::UnknownOrder(order_id))?;

        let side_map = self.side_mut(side);
        let level = side_map
            .get_mut(&key)
            .expect("location index points at a live level");
        let removed = level
            .delete_order(order_id)
            .expect("location index points at an order present in its level");
        if level.is_empty() {
            side_map.remove(&key);
        }

        Ok(removed)
    }

    /// Whether an order id is still resting somewhere in the book. Used by
    /// [`crate::exchange::Exchange`] to tell a partially-filled maker
    /// (still open) apart from a fully-filled one (no longer open) after a
    /// sweep, without re-scanning either side.
    pub fn is_resting(&self, order_id: OrderId) -> bool {
        self.locations.contains_key(&order_id)
    }

    pub fn best_bid(&self) -> Option<(f64, f64)> {
        self.bids
            .iter()
            .next_back()
            .map(|(k, lvl)| (k.into_inner(), lvl.total_volume()))
    }

    pub fn best_ask(&self) -> Option<(f64, f64)> {
        self.asks
            .iter()
            .next()
            .map(|(k, lvl)| (k.into_inner(), lvl.total_volume()))
    }

    /// Priority-ordered snapshot: best price first.
    pub fn best_bids(&self) -> Vec<(f64, f64)> {
        self.bids
            .iter()
            .rev()
            .map(|(k, lvl)| (k.into_inner(), lvl.total_volume()))
            .collect()
    }

    pub fn best_asks(&self) -> Vec<(f64, f64)> {
        self.asks
            .iter()
            .map(|(k, lvl)| (k.into_inner(), lvl.total_volume()))
            .collect()
    }

    pub fn total_volume(&self, side: Side) -> f64 {
        self.side(side).values().map(PriceLevel::total_volume).sum()
    }

    pub fn ask_total_volume(&self) -> f64 {
        self.total_volume(Side::Sell)
    }

    pub fn bid_total_volume(&self) -> f64 {
        self.total_volume(Side::Buy)
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn market(&self) -> &Market {
        &self.market
    }

    /// Flat listing of every resting order on one side, level by level in
    /// priority order. Used to build [`BookSnapshot`] and per-user open
    /// order views.
    pub fn orders_on_side(&self, side: Side) -> Vec<OrderProjection> {
        let levels: Box<dyn Iterator<Item = &PriceLevel> + '_> = match side {
            Side::Buy => Box::new(self.bids.values().rev()),
            Side::Sell => Box::new(self.asks.values()),
        };
        levels
            .flat_map(|lvl| lvl.orders())
            .map(OrderProjection::from)
            .collect()
    }

    /// Looks up a single resting order's projection, or `None` if it is not
    /// (or is no longer) resting.
    pub fn order_projection(&self, order_id: OrderId) -> Option<OrderProjection> {
        let (side, key) = self.locations.get(&order_id)?;
        self.side(*side)
            .get(key)?
            .orders()
            .find(|o| o.id == order_id)
            .map(OrderProjection::from)
    }
}

/// A resting order as exposed to transport collaborators.
#[derive(Debug, Clone, Serialize)]
pub struct OrderProjection {
    pub user_id: u64,
    pub id: OrderId,
    pub price: f64,
    pub size: f64,
    pub side: Side,
    pub timestamp: u64,
}

impl From<&Order> for OrderProjection {
    fn from(o: &Order) -> Self {
        OrderProjection {
            user_id: o.user_id,
            id: o.id,
            price: o.price.unwrap_or_default(),
            size: o.size,
            side: o.side,
            timestamp: o.timestamp,
        }
    }
}

/// `GET /book/{market}` response shape.
#[derive(Debug, Clone, Serialize)]
pub struct BookSnapshot {
    pub market: Market,
    pub total_ask_volume: f64,
    pub total_bid_volume: f64,
    pub asks: Vec<OrderProjection>,
    pub bids: Vec<OrderProjection>,
}

impl BookSnapshot {
    pub fn for_book(book: &OrderBook) -> Self {
        BookSnapshot {
            market: book.market.clone(),
            total_ask_volume: book.ask_total_volume(),
            total_bid_volume: book.bid_total_volume(),
            asks: book.orders_on_side(Side::Sell),
            bids: book.orders_on_side(Side::Buy),
        }
    }

    pub fn empty(market: Market) -> Self {
        BookSnapshot {
            market,
            total_ask_volume: 0.0,
            total_bid_volume: 0.0,
            asks: Vec::new(),
            bids: Vec::new(),
        }
    }
}
