//! Downstream collaborators the matching core hands finished work off to.
//!
//! The Go source settles trades with a toy `ethclient` transfer and fans
//! book updates out over a hand-rolled `ConnectionManager`
//! (`server/server.go`). The teacher crate already generalizes the second
//! half of that into `trade_tx`/`book_tx` broadcast channels (`api.rs`).
//! `SettlementSink`/`BroadcastSink` pull both behind traits so `Exchange`
//! never depends on a concrete transport, and so tests can swap in a
//! no-op/recording sink — kept best-effort and fire-and-forget, matching
//! the Go source's behavior of never rolling a trade back on transfer
//! failure.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::instrument::Market;
use crate::orders::UserId;
use crate::trade::Match;

/// Best-effort asset transfer triggered by a filled trade. Errors are
/// logged, never surfaced to the HTTP caller and never undo the match —
/// settlement failures are out of band from matching.
#[async_trait]
pub trait SettlementSink: Send + Sync {
    async fn settle(&self, from: UserId, to: UserId, amount: f64) -> Result<(), String>;
}

/// Pushed to `WS /ws` subscribers after every successful market fill.
/// `price` is the mean of the fill's match prices, not a single order's
/// price — a sweep can cross several levels at different prices.
#[derive(Debug, Clone, Serialize)]
pub struct Ticker {
    pub market: Market,
    pub price: f64,
    pub spread: f64,
    pub total_volume: f64,
}

impl Ticker {
    pub fn from_fill(
        market: Market,
        matches: &[Match],
        best_bid: Option<f64>,
        best_ask: Option<f64>,
        total_volume: f64,
    ) -> Self {
        let price = if matches.is_empty() {
            0.0
        } else {
            matches.iter().map(|m| m.price).sum::<f64>() / matches.len() as f64
        };
        let spread = match (best_bid, best_ask) {
            (Some(bid), Some(ask)) => ask - bid,
            _ => 0.0,
        };
        Ticker {
            market,
            price,
            spread,
            total_volume,
        }
    }
}

pub trait BroadcastSink: Send + Sync {
    fn publish(&self, ticker: Ticker);
}

/// Logs the transfer and always succeeds. Stands in for the Go source's
/// `transferETH` when no real settlement backend is wired up (demo /
/// simulator / test runs).
pub struct LoggingSettlementSink;

#[async_trait]
impl SettlementSink for LoggingSettlementSink {
    async fn settle(&self, from: UserId, to: UserId, amount: f64) -> Result<(), String> {
        info!(from, to, amount, "settlement (logged, no real transfer)");
        Ok(())
    }
}

/// Fans ticker updates out over a `tokio::sync::broadcast` channel, mirroring
/// the teacher's `book_tx` (`api.rs`). Subscribers that lag behind simply
/// miss intermediate ticks; `send` errors (no receivers) are swallowed.
pub struct BroadcastChannelSink {
    tx: broadcast::Sender<Ticker>,
}

impl BroadcastChannelSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Ticker> {
        self.tx.subscribe()
    }
}

impl BroadcastSink for BroadcastChannelSink {
    fn publish(&self, ticker: Ticker) {
        if self.tx.send(ticker).is_err() {
            error!("ticker broadcast has no subscribers");
        }
    }
}

pub type SharedSettlementSink = Arc<dyn SettlementSink>;
pub type SharedBroadcastSink = Arc<dyn BroadcastSink>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::btc_usd;

    #[tokio::test]
    async fn logging_sink_always_succeeds() {
        let sink = LoggingSettlementSink;
        assert!(sink.settle(1, 2, 10.0).await.is_ok());
    }

    fn sample_match(price: f64) -> Match {
        Match {
            maker_order_id: 1,
            maker_user_id: 1,
            taker_order_id: 2,
            taker_user_id: 2,
            price,
            size_filled: 1.0,
            aggressor_is_bid: true,
        }
    }

    #[test]
    fn ticker_computes_spread_from_both_sides() {
        let t = Ticker::from_fill(btc_usd(), &[sample_match(100.0)], Some(99.0), Some(101.0), 5.0);
        assert_eq!(t.spread, 2.0);
        assert_eq!(t.price, 100.0);
    }

    #[test]
    fn ticker_spread_is_zero_with_one_sided_book() {
        let t = Ticker::from_fill(btc_usd(), &[sample_match(100.0)], Some(99.0), None, 5.0);
        assert_eq!(t.spread, 0.0);
    }

    #[test]
    fn ticker_price_is_mean_of_matches() {
        let t = Ticker::from_fill(
            btc_usd(),
            &[sample_match(100.0), sample_match(102.0)],
            Some(99.0),
            Some(103.0),
            5.0,
        );
        assert_eq!(t.price, 101.0);
    }

    #[tokio::test]
    async fn broadcast_sink_delivers_to_subscriber() {
        let sink = BroadcastChannelSink::new(16);
        let mut rx = sink.subscribe();
        sink.publish(Ticker::from_fill(btc_usd(), &[sample_match(1.0)], Some(1.0), Some(2.0), 3.0));
        let received = rx.recv().await.unwrap();
        assert_eq!(received.market, btc_usd());
    }
}
