use axum::Router;
use clap::{Parser, Subcommand};
use order_book_engine::instrument::btc_usd;
use order_book_engine::utils::shutdown_token;
use order_book_engine::{api, market_maker, simulate, state::AppState};
use serde_json::json;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

const DEMO_USER: u64 = 1;
const MARKET_MAKER_USER: u64 = 2;

#[derive(Parser)]
#[command(name = "engine-cli")]
#[command(
    author = "Andrew Odiit",
    version = "0.1",
    about = "A demo of a limit-order-book-engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Simulate { port: u16, secs: u64 },
    Server { port: u16 },
}

async fn wait_for_server(api_base: &str) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    loop {
        match client
            .get(format!("{api_base}/book/{}", btc_usd()))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => break,
            _ => tokio::time::sleep(Duration::from_millis(25)).await,
        };
    }
    Ok(())
}

async fn seed_book(ep: &str) -> anyhow::Result<()> {
    // Seed the book with a resting bid @48 and ask @52
    let client = reqwest::Client::new();
    for (bid, price) in &[(true, 48.0), (false, 52.0)] {
        client
            .post(format!("{ep}/order"))
            .json(&json!({
                "user_id": DEMO_USER,
                "type": "LIMIT",
                "side": bid,
                "price": price,
                "size": 10.0,
                "market": btc_usd().to_string(),
            }))
            .send()
            .await?
            .error_for_status()?;
        tracing::info!(bid, price, "seeded resting orders");
    }
    Ok(())
}

async fn get_app_listener(port: u16, state: AppState) -> anyhow::Result<(TcpListener, Router)> {
    let app = api::router(state);
    let ep = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(ep.clone()).await?;
    Ok((listener, app))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let state = AppState::new();
    state
        .seed(
            [btc_usd()],
            [(DEMO_USER, "demo"), (MARKET_MAKER_USER, "market-maker")],
        )
        .await;
    let token = shutdown_token();
    let server_token = token.clone();
    let mm_token = token.clone();
    let sim_token = token.clone();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::TRACE)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    // Base URL our clients (market maker & simulator) will use.
    let base = "http://127.0.0.1".to_string();
    match cli.command {
        Commands::Simulate { port, secs } => {
            let mut handlers = tokio::task::JoinSet::new();
            let (listener, app) = get_app_listener(port, state.clone()).await?;
            tracing::warn!("spawning the server task, port: {}, {}", port, secs);
            handlers.spawn(async move {
                tracing::info!("HTTP/WS server listening on 0.0.0.0:{port}");
                axum::serve(listener, app)
                    .with_graceful_shutdown(server_token.cancelled_owned())
                    .await
                    .unwrap();
            });
            let ep = format!("{base}:{port}");
            tracing::info!("end_point: {}", ep);
            wait_for_server(&ep).await?;
            seed_book(&ep).await?;

            let mmb = base.clone();
            handlers.spawn(async move {
                if let Err(e) =
                    market_maker::run_market_maker(&mmb, btc_usd(), MARKET_MAKER_USER, mm_token).await
                {
                    tracing::error!("Market maker exited: {:?}", e);
                }
            });
            handlers.spawn(async move {
                if let Err(e) = simulate::run_simulation(
                    simulate::SimConfig {
                        api_base: base,
                        market: btc_usd(),
                        user_id: DEMO_USER,
                        run_secs: if secs == 0 { None } else { Some(secs) },
                        attack_rate_hz: 5.0,
                        noise_sigma: 0.5,
                        mean_size: 2.0,
                    },
                    sim_token,
                )
                .await
                {
                    tracing::error!("Simulation error: {:?}", e);
                }
            });
            handlers.join_all().await;
        }
        Commands::Server { port } => {
            let (listener, app) = get_app_listener(port, state.clone()).await?;
            let svh = tokio::spawn(async move {
                tracing::info!("HTTP/WS server listening on 0.0.0.0:{port}");
                axum::serve(listener, app)
                    .with_graceful_shutdown(server_token.cancelled_owned())
                    .await
                    .unwrap();
            });
            svh.await?;
        }
    };
    Ok(())
}
