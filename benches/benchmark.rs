use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use order_book_engine::instrument::btc_usd;
use order_book_engine::orderbook::OrderBook;
use order_book_engine::orders::{Order, OrderId, OrderType, Side, next_timestamp};

fn limit_order(id: OrderId, side: Side, price: f64) -> Order {
    Order {
        id,
        user_id: 1,
        side,
        order_type: OrderType::Limit,
        price: Some(price),
        size: 1.0,
        timestamp: next_timestamp(),
        market: btc_usd(),
    }
}

fn setup_order_book(depth: u64, orders_per_level: u64) -> OrderBook {
    let mut ob = OrderBook::new(btc_usd());
    for price in 1..=depth {
        for i in 0..orders_per_level {
            let id = price * 1_000 + i;
            ob.place_limit(limit_order(id, Side::Sell, price as f64)).unwrap();
            ob.place_limit(limit_order(depth * 1_000 + id, Side::Buy, price as f64))
                .unwrap();
        }
    }
    ob
}

fn bench_match_order(c: &mut Criterion) {
    let depth = 100;
    let orders_per_level = 10;

    c.bench_function("sweep 1 market order through half the bid depth", |b| {
        b.iter_batched(
            || setup_order_book(depth, orders_per_level),
            |mut ob| {
                let market_buy = Order {
                    id: 0,
                    user_id: 1,
                    side: Side::Buy,
                    order_type: OrderType::Market,
                    price: None,
                    size: (depth * orders_per_level / 2) as f64,
                    timestamp: next_timestamp(),
                    market: btc_usd(),
                };
                ob.place_market(market_buy).unwrap();
            },
            BatchSize::SmallInput,
        )
    });

    c.bench_function("rest 1 limit order into an existing level of a deep book", |b| {
        b.iter_batched(
            || setup_order_book(depth, orders_per_level),
            |mut ob| {
                ob.place_limit(limit_order(u64::MAX, Side::Sell, depth as f64 / 2.0))
                    .unwrap();
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_match_order);
criterion_main!(benches);
