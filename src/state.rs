//! Shared application state handed to every axum handler.
//!
//! The teacher's `AppState` wraps a single `OrderBook` behind a `Mutex`
//! (`state.rs`). This crate's `Exchange` (see [`crate::exchange`]) already
//! owns its own per-book locks and its own settlement/broadcast
//! collaborators, so `AppState` only needs to hold the `Exchange` plus the
//! one piece of routing knowledge the HTTP layer adds on top: which market
//! the market-agnostic `/book/bids` and `/book/asks` endpoints report on.

use std::sync::Arc;

use crate::exchange::Exchange;
use crate::instrument::{Market, btc_usd};
use crate::orders::UserId;
use crate::sinks::{BroadcastChannelSink, LoggingSettlementSink, Ticker};
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct AppState {
    pub exchange: Arc<Exchange>,
    /// Kept alongside `exchange` (which only sees it as `Arc<dyn
    /// BroadcastSink>`) so handlers can subscribe a WS client to tickers.
    tickers: Arc<BroadcastChannelSink>,
    /// Market reported by the un-parameterized `/book/bids` and
    /// `/book/asks` routes. The Go source hard-codes these to its single
    /// `MarketETH` book; this crate generalizes to many markets but keeps
    /// the same "one default book" answer for those two routes.
    pub default_market: Market,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_default_market(btc_usd())
    }

    pub fn with_default_market(default_market: Market) -> Self {
        let tickers = Arc::new(BroadcastChannelSink::new(1024));
        let exchange = Arc::new(Exchange::new(
            Arc::new(LoggingSettlementSink),
            tickers.clone(),
        ));
        Self {
            exchange,
            tickers,
            default_market,
        }
    }

    /// Subscribes to the ticker stream driving `WS /ws`.
    pub fn subscribe_tickers(&self) -> broadcast::Receiver<Ticker> {
        self.tickers.subscribe()
    }

    /// Registers a market and a starting roster of users; used by `main.rs`
    /// to bring the exchange up with somewhere to trade before the server
    /// starts accepting requests.
    pub async fn seed(&self, markets: impl IntoIterator<Item = Market>, users: impl IntoIterator<Item = (UserId, &'static str)>) {
        for market in markets {
            self.exchange.register_market(market).await;
        }
        for (id, name) in users {
            self.exchange.register_user(id, name).await;
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        AppState::new()
    }
}
