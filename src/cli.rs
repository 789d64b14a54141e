//! Standalone CLI for poking at a single in-process [`OrderBook`], no
//! server required. Kept from the teacher's `cli.rs` almost verbatim in
//! shape (same three subcommands, same `clap::Parser` derive); only the
//! order construction changed to match the new `Order`/`OrderType` fields
//! (`size: f64`, `price: Option<f64>`, a `market`, a monotonic timestamp
//! instead of `SystemTime`).

use clap::{Parser, Subcommand, arg, builder::PossibleValuesParser};
use uuid::Uuid;

use crate::{
    instrument::btc_usd,
    orderbook::OrderBook,
    orders::{Order, OrderId, OrderType, Side, UserId, next_timestamp},
};

/// Simple CLI to interact with the order book
#[derive(Parser)]
#[command(name = "Order Book CLI")]
#[command(
    author = "Your Name",
    version = "0.1",
    about = "A demo of a limit order book"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new order to the book
    Add {
        /// buy or sell
        #[arg(value_parser = PossibleValuesParser::new(["buy", "sell"]))]
        side: String,

        /// limit or market
        #[arg(value_parser = PossibleValuesParser::new(["limit", "market"]))]
        order_type: String,

        /// Price (only used for limit orders)
        price: Option<f64>,

        /// Size (must be > 0)
        size: f64,
    },

    /// Match a new market order
    Match {
        /// buy or sell
        #[arg(value_parser = PossibleValuesParser::new(["buy", "sell"]))]
        side: String,
        /// Size
        size: f64,
    },
    /// Display the current order book
    Book,
}

fn parse_side(side_str: &str) -> Side {
    match side_str {
        "buy" => Side::Buy,
        "sell" => Side::Sell,
        _ => unreachable!("clap restricts this to buy|sell"),
    }
}

fn new_order(user_id: UserId, side: Side, order_type: OrderType, price: Option<f64>, size: f64) -> Order {
    Order {
        id: Uuid::new_v4().as_u128() as OrderId,
        user_id,
        side,
        order_type,
        price: matches!(order_type, OrderType::Limit).then_some(price).flatten(),
        size,
        timestamp: next_timestamp(),
        market: btc_usd(),
    }
}

const CLI_USER: UserId = 0;

fn handle_add(order_book: &mut OrderBook, side_str: String, order_type_str: String, price: Option<f64>, size: f64) {
    let side = parse_side(&side_str);
    let order_type = match order_type_str.as_str() {
        "limit" => OrderType::Limit,
        "market" => OrderType::Market,
        _ => unreachable!("clap restricts this to limit|market"),
    };
    let order = new_order(CLI_USER, side, order_type, price, size);

    match order_type {
        OrderType::Limit => match order_book.place_limit(order.clone()) {
            Ok(id) => println!("Limit order resting: id={id} side={side:?} price={price:?} size={size}"),
            Err(e) => println!("Order rejected: {e}"),
        },
        OrderType::Market => match order_book.place_market(order) {
            Ok(matches) if matches.is_empty() => println!("No trades occurred."),
            Ok(matches) => {
                println!("Trades generated from market order:");
                for m in matches {
                    println!("{m:?}");
                }
            }
            Err(e) => println!("Order rejected: {e}"),
        },
    }
}

pub fn handle_match(order_book: &mut OrderBook, side_str: String, size: f64) {
    let side = parse_side(&side_str);
    let order = new_order(CLI_USER, side, OrderType::Market, None, size);
    match order_book.place_market(order) {
        Ok(matches) if matches.is_empty() => println!("No trades occurred."),
        Ok(matches) => {
            println!("Trades generated:");
            for m in matches {
                println!("{m:?}");
            }
        }
        Err(e) => println!("Order rejected: {e}"),
    }
}

fn print_order_book(order_book: &OrderBook) {
    println!("------ Order Book ------");
    println!("Bids (highest first):");
    for (price, volume) in order_book.best_bids() {
        println!("Price: {price}, Total Size: {volume}");
    }

    println!("Asks (lowest first):");
    for (price, volume) in order_book.best_asks() {
        println!("Price: {price}, Total Size: {volume}");
    }
    println!("--------------------------");
}

pub fn run_cli() {
    let cli = Cli::parse();
    let mut order_book = OrderBook::new(btc_usd());
    match cli.command {
        Commands::Add {
            side,
            order_type,
            price,
            size,
        } => {
            handle_add(&mut order_book, side, order_type, price, size);
        }
        Commands::Match { side, size } => {
            handle_match(&mut order_book, side, size);
        }
        Commands::Book => {
            print_order_book(&order_book);
        }
    }
}
