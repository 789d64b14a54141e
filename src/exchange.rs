//! The multi-market registry sitting above individual [`OrderBook`]s.
//!
//! The teacher crate's `api.rs` already implies this shape (a map of
//! per-pair books behind locks, a trade broadcast channel, a book
//! broadcast channel) even though `state.rs` as retrieved only shows the
//! single-book predecessor. `Exchange` is that implied shape made
//! explicit: one `OrderBook` per registered [`Market`], a per-user index of
//! open order ids, and the settlement/broadcast collaborators from
//! [`crate::sinks`].
//!
//! Lock ordering: callers always take the book lock for a market before
//! touching `open_orders`, and release
//! the book lock before invoking a sink. `books` itself is only ever held
//! long enough to clone the `Arc<RwLock<OrderBook>>` out — never across an
//! `.await` or while holding a per-book lock.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::error;

use crate::errors::{EngineError, EngineResult};
use crate::instrument::Market;
use crate::orderbook::{BookSnapshot, OrderBook, OrderProjection};
use crate::orders::{Order, OrderId, OrderType, UserId};
use crate::sinks::{BroadcastSink, SettlementSink, Ticker};
use crate::trade::{Match, Trade};

/// A user's resting orders, partitioned by side.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct OpenOrders {
    pub bids: Vec<OrderProjection>,
    pub asks: Vec<OrderProjection>,
}

/// A registered participant. The teacher crate has no user concept at all
/// (orders carry no `user_id`); this engine needs one so that
/// `GET /order/{user_id}` and settlement have someone to credit/debit.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub name: String,
}

pub struct Exchange {
    books: RwLock<HashMap<Market, Arc<RwLock<OrderBook>>>>,
    users: RwLock<HashMap<UserId, User>>,
    /// user -> (order id -> market it rests in), maintained in parallel
    /// with the books and holding only unfilled orders.
    open_orders: RwLock<HashMap<UserId, HashMap<OrderId, Market>>>,
    settlement: Arc<dyn SettlementSink>,
    broadcast: Arc<dyn BroadcastSink>,
}

impl Exchange {
    pub fn new(settlement: Arc<dyn SettlementSink>, broadcast: Arc<dyn BroadcastSink>) -> Self {
        Self {
            books: RwLock::new(HashMap::new()),
            users: RwLock::new(HashMap::new()),
            open_orders: RwLock::new(HashMap::new()),
            settlement,
            broadcast,
        }
    }

    pub async fn register_market(&self, market: Market) {
        let mut books = self.books.write().await;
        books
            .entry(market.clone())
            .or_insert_with(|| Arc::new(RwLock::new(OrderBook::new(market))));
    }

    pub async fn register_user(&self, id: UserId, name: impl Into<String>) {
        self.users.write().await.insert(
            id,
            User {
                id,
                name: name.into(),
            },
        );
    }

    async fn book_for(&self, market: &Market) -> EngineResult<Arc<RwLock<OrderBook>>> {
        self.books
            .read()
            .await
            .get(market)
            .cloned()
            .ok_or_else(|| EngineError::BadInput(format!("unregistered market `{market}`")))
    }

    /// Places a limit or market order. Resting inserts never block on
    /// settlement or broadcast; only a fill does, and only after the book
    /// lock is released.
    pub async fn place_order(&self, order: Order) -> EngineResult<Vec<Match>> {
        if !self.users.read().await.contains_key(&order.user_id) {
            return Err(EngineError::UnknownUser(order.user_id));
        }

        let book = self.book_for(&order.market).await?;
        let order_type = order.order_type;
        let order_id = order.id;
        let user_id = order.user_id;
        let market = order.market.clone();

        let (matches, filled_makers, ticker) = {
            let mut book = book.write().await;
            let matches = match order_type {
                OrderType::Limit => {
                    book.place_limit(order)?;
                    Vec::new()
                }
                OrderType::Market => book.place_market(order)?,
            };
            let filled_makers: Vec<(UserId, OrderId)> = matches
                .iter()
                .map(|m| (m.maker_user_id, m.maker_order_id))
                .filter(|(_, id)| !book.is_resting(*id))
                .collect();
            // Ticker derivation runs on each successful market fill — a
            // resting (unfilled) limit insert publishes nothing.
            let ticker = (!matches.is_empty()).then(|| {
                Ticker::from_fill(
                    market.clone(),
                    &matches,
                    book.best_bid().map(|(p, _)| p),
                    book.best_ask().map(|(p, _)| p),
                    book.bid_total_volume() + book.ask_total_volume(),
                )
            });
            (matches, filled_makers, ticker)
        };

        if matches!(order_type, OrderType::Limit) && matches.is_empty() {
            self.track_open_order(user_id, order_id, market).await;
        }
        if !filled_makers.is_empty() {
            let mut open = self.open_orders.write().await;
            for (maker_user_id, maker_order_id) in filled_makers {
                if let Some(orders) = open.get_mut(&maker_user_id) {
                    orders.remove(&maker_order_id);
                }
            }
        }

        // Settlement and broadcast run after the book lock is released, on a
        // background task, so a caller's request latency never depends on
        // either collaborator.
        if let Some(ticker) = ticker {
            let settlement = self.settlement.clone();
            let broadcast = self.broadcast.clone();
            let matches_for_settlement = matches.clone();
            tokio::spawn(async move {
                broadcast.publish(ticker);
                settle_matches(settlement.as_ref(), &matches_for_settlement).await;
            });
        }

        Ok(matches)
    }

    async fn track_open_order(&self, user_id: UserId, order_id: OrderId, market: Market) {
        self.open_orders
            .write()
            .await
            .entry(user_id)
            .or_default()
            .insert(order_id, market);
    }

    /// Cancels a resting order. Book lock is taken first and released
    /// before `open_orders` is updated, preserving the book-before-index
    /// lock ordering used everywhere else in this type.
    pub async fn cancel_order(&self, market: &Market, order_id: OrderId) -> EngineResult<()> {
        let book = self.book_for(market).await?;
        let cancelled = {
            let mut book = book.write().await;
            book.cancel(order_id)?
        };

        let mut open = self.open_orders.write().await;
        if let Some(orders) = open.get_mut(&cancelled.user_id) {
            orders.remove(&order_id);
        }
        Ok(())
    }

    pub async fn book_snapshot(&self, market: &Market) -> EngineResult<BookSnapshot> {
        let book = self.book_for(market).await?;
        let book = book.read().await;
        Ok(BookSnapshot::for_book(&book))
    }

    pub async fn trades(&self, market: &Market) -> EngineResult<Vec<Trade>> {
        let book = self.book_for(market).await?;
        Ok(book.read().await.trades().to_vec())
    }

    /// Best bid price for `market`, or `None` if the bid side is empty.
    pub async fn best_bid(&self, market: &Market) -> EngineResult<Option<f64>> {
        let book = self.book_for(market).await?;
        Ok(book.read().await.best_bid().map(|(p, _)| p))
    }

    /// Best ask price for `market`, or `None` if the ask side is empty.
    pub async fn best_ask(&self, market: &Market) -> EngineResult<Option<f64>> {
        let book = self.book_for(market).await?;
        Ok(book.read().await.best_ask().map(|(p, _)| p))
    }

    /// Resting orders for a user, partitioned bids/asks, across every
    /// registered market. Orders whose level has since emptied
    /// (filled/cancelled between the index update and this read) are
    /// silently skipped rather than surfaced as an error.
    pub async fn open_orders_for(&self, user_id: UserId) -> EngineResult<OpenOrders> {
        if !self.users.read().await.contains_key(&user_id) {
            return Err(EngineError::UnknownUser(user_id));
        }
        let by_market = self
            .open_orders
            .read()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_default();

        let mut result = OpenOrders::default();
        for (order_id, market) in by_market {
            let Ok(book) = self.book_for(&market).await else {
                continue;
            };
            let Some(projection) = book.read().await.order_projection(order_id) else {
                continue;
            };
            match projection.side {
                crate::orders::Side::Buy => result.bids.push(projection),
                crate::orders::Side::Sell => result.asks.push(projection),
            }
        }
        Ok(result)
    }
}

async fn settle_matches(settlement: &dyn SettlementSink, matches: &[Match]) {
    for m in matches {
        let buyer = m.buyer();
        let seller = m.seller();
        let amount = m.price * m.size_filled;
        if let Err(e) = settlement.settle(seller, buyer, amount).await {
            error!(maker = m.maker_order_id, taker = m.taker_order_id, error = %e, "settlement failed");
        }
    }
}
