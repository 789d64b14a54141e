//! # Market Maker Bot
//!
//! A bot that always posts both a buy-price and a sell-price for one
//! market. It polls the book, finds the midpoint between best bid and
//! best ask, and refreshes its own two-sided quotes just above and below
//! that midpoint whenever the midpoint moves.
//!
//! ## At a Glance (Non-Technical)
//! - **Always visible:** posts a buy order a little below the market
//!   mid-price, and a sell order a little above it.
//! - **Lightweight:** only updates its quotes when the midpoint actually
//!   moves, avoiding extra cancel/post churn.
//! - **Steady profit:** the gap between its buy and sell prices (the
//!   spread) is what it earns each time someone trades against a quote.
//!
//! ## How It Works (Technical)
//! 1. **Poll** `GET /book/{market}` every `PACE_MS` milliseconds and read
//!    the first (best) bid and ask from the snapshot.
//! 2. **Compute** the mid-price: `mid = (best_bid + best_ask) / 2`.
//! 3. If the midpoint moved since the last tick:
//!    - **Cancel** the previously posted buy & sell orders
//!      (`DELETE /order/{market}/{id}`).
//!    - **Place** two fresh limit orders via `POST /order`: a buy at
//!      `mid - SPREAD`, a sell at `mid + SPREAD`.
//!    - **Remember** their order ids so they can be cancelled next tick.
//!
//! Unlike the book poll, the `WS /ws` ticker feed only carries fills, not
//! resting-book depth, so it can't drive quoting on its own — the bot
//! additionally subscribes to it purely to log fills against its own
//! quotes.

use futures_util::StreamExt;
use reqwest;
use serde::{Deserialize, Serialize};
use tokio::time;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as WsMsg};
use tokio_util::sync::CancellationToken;

use crate::{
    errors::MarketMakerError,
    instrument::Market,
    orders::{OrderId, UserId},
};

const SPREAD: f64 = 2.0;
const PACE_MS: u64 = 500;
const QUOTE_SIZE: f64 = 1.0;

#[derive(Serialize)]
struct NewOrderWire {
    user_id: UserId,
    #[serde(rename = "type")]
    order_type: &'static str,
    side: bool,
    size: f64,
    price: Option<f64>,
    market: String,
}

#[derive(Deserialize)]
struct OrderAck {
    order_id: OrderId,
}

#[derive(Deserialize)]
struct BookLevel {
    price: f64,
}

#[derive(Deserialize)]
struct BookSnapshotWire {
    asks: Vec<BookLevel>,
    bids: Vec<BookLevel>,
}

#[derive(Deserialize)]
struct TickerWire {
    market: String,
    price: f64,
}

async fn fetch_mid(client: &reqwest::Client, api_base: &str, market: &Market) -> Option<f64> {
    let resp = client
        .get(format!("{api_base}/book/{market}"))
        .send()
        .await
        .ok()?;
    let snapshot: BookSnapshotWire = resp.json().await.ok()?;
    let best_bid = snapshot.bids.first()?.price;
    let best_ask = snapshot.asks.first()?.price;
    Some((best_bid + best_ask) / 2.0)
}

async fn place_quote(
    client: &reqwest::Client,
    api_base: &str,
    user_id: UserId,
    market: &Market,
    bid: bool,
    price: f64,
) -> Option<OrderId> {
    let resp = client
        .post(format!("{api_base}/order"))
        .json(&NewOrderWire {
            user_id,
            order_type: "LIMIT",
            side: bid,
            size: QUOTE_SIZE,
            price: Some(price),
            market: market.to_string(),
        })
        .send()
        .await
        .ok()?;
    resp.json::<OrderAck>().await.ok().map(|a| a.order_id)
}

/// Subscribes to `WS /ws` purely to log fills for `market`; quoting
/// decisions are driven by the REST book poll in [`run_market_maker`].
fn spawn_fill_logger(api_base: &str, market: Market) {
    let ws_url = format!("ws://{}/ws", api_base.trim_start_matches("http://"));
    tokio::spawn(async move {
        let ws_stream = match connect_async(&ws_url).await {
            Ok((stream, _)) => stream,
            Err(e) => {
                tracing::warn!("market maker: ws connect failed: {e}; fill logging disabled");
                return;
            }
        };
        let (_write, read) = ws_stream.split();
        let mut frames = read.filter_map(|msg| async move {
            match msg {
                Ok(WsMsg::Text(txt)) => serde_json::from_str::<TickerWire>(&txt).ok(),
                _ => None,
            }
        });
        while let Some(ticker) = frames.next().await {
            if ticker.market == market.to_string() {
                tracing::info!(price = ticker.price, "market maker: observed fill");
            }
        }
    });
}

/// Starts the market maker loop against the REST API at `api_base`, quoting
/// `target_market` on behalf of `user_id` until `token` is cancelled.
pub async fn run_market_maker(
    api_base: &str,
    target_market: Market,
    user_id: UserId,
    token: CancellationToken,
) -> Result<(), MarketMakerError> {
    spawn_fill_logger(api_base, target_market.clone());

    let client = reqwest::Client::new();
    let mut outstanding: Vec<OrderId> = Vec::new();
    let mut interval = time::interval(time::Duration::from_millis(PACE_MS));
    let mut last_mid: Option<f64> = None;

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                tracing::info!("market maker: shutdown requested, tearing down...");
                break;
            }
            _ = interval.tick() => {
                let Some(mid) = fetch_mid(&client, api_base, &target_market).await else {
                    continue;
                };
                if last_mid == Some(mid) {
                    continue;
                }

                for id in outstanding.drain(..) {
                    let _ = client
                        .delete(format!("{api_base}/order/{target_market}/{id}"))
                        .send()
                        .await;
                }

                let bid_price = mid - SPREAD;
                tracing::info!(bid_price, "market maker: placing bid");
                if let Some(id) = place_quote(&client, api_base, user_id, &target_market, true, bid_price).await {
                    outstanding.push(id);
                }

                let ask_price = mid + SPREAD;
                tracing::info!(ask_price, "market maker: placing ask");
                if let Some(id) = place_quote(&client, api_base, user_id, &target_market, false, ask_price).await {
                    outstanding.push(id);
                }

                last_mid = Some(mid);
            }
        }
    }
    Ok(())
}
