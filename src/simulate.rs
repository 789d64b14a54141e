//! Simulation harness for noisy order flow against the engine.

use rand::Rng; // for rng().random_bool()
use rand_distr::{Distribution, Exp, Exp1, Normal};
use reqwest::{Client, ClientBuilder};
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{instrument::Market, orders::UserId};

#[derive(Clone)]
pub struct SimConfig {
    pub api_base: String,
    pub market: Market,
    pub user_id: UserId,
    pub run_secs: Option<u64>,
    pub attack_rate_hz: f64, // Poisson rate λ
    pub noise_sigma: f64,    // N(0, σ) drift applied to mid each tick
    pub mean_size: f64,      // average order size (unit-exp * mean_size)
}

#[derive(Deserialize)]
struct MarketAck {
    matches: Vec<AckMatch>,
}

#[derive(Deserialize)]
struct AckMatch {
    price: f64,
    size_filled: f64,
}

/// Fires a single market order of size 1, updates inventory/P&L.
pub async fn send_one_order(
    client: &Client,
    api_base: &str,
    market: &Market,
    user_id: UserId,
    iv: &mut i64,
    pnl: &mut f64,
) -> anyhow::Result<()> {
    let bid = rand::rng().random_bool(0.5);

    let resp = client
        .post(format!("{api_base}/order"))
        .json(&json!({
            "user_id": user_id,
            "type": "MARKET",
            "side": bid,
            "size": 1.0,
            "price": null,
            "market": market.to_string(),
        }))
        .send()
        .await?
        .error_for_status()?;

    let ack: MarketAck = resp.json().await?;

    for m in ack.matches {
        if bid {
            *iv -= m.size_filled as i64; // maker sold to us
            *pnl += m.price * m.size_filled;
        } else {
            *iv += m.size_filled as i64; // maker bought from us
            *pnl -= m.price * m.size_filled;
        }
    }
    Ok(())
}

/// Noisy limit-order simulation loop.
pub async fn run_simulation(cfg: SimConfig, cancel_token: CancellationToken) -> anyhow::Result<()> {
    let client: Client = ClientBuilder::new()
        .timeout(Duration::from_secs(5))
        .build()?;

    let ia = Exp::new(cfg.attack_rate_hz).expect("attack_rate_hz must be > 0");
    let drift = Normal::new(0.0, cfg.noise_sigma).expect("noise_sigma >= 0");
    let size_dist = Exp1;

    let mut iv: i64 = 0;
    let mut pnl: f64 = 0.0;
    let mut mid: f64 = 50.0;
    let start = Instant::now();

    let spread = 1.0_f64;

    loop {
        if let Some(max_secs) = cfg.run_secs {
            if start.elapsed().as_secs() >= max_secs {
                break;
            }
        }

        let wait_secs: f64 = ia.sample(&mut rand::rng());
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("received shutdown; exiting simulation loop");
                break;
            }
            _ = sleep(Duration::from_secs_f64(wait_secs)) => {}
        }

        let unit: f64 = size_dist.sample(&mut rand::rng());
        let size = (unit * cfg.mean_size).max(1.0);

        mid += drift.sample(&mut rand::rng());

        let (price, bid) = if rand::rng().random_bool(0.5) {
            (mid - spread, true)
        } else {
            (mid + spread, false)
        };
        let price = price.max(1.0);

        match client
            .post(format!("{}/order", cfg.api_base))
            .json(&json!({
                "user_id": cfg.user_id,
                "type": "LIMIT",
                "side": bid,
                "price": price,
                "size": size,
                "market": cfg.market.to_string(),
            }))
            .send()
            .await
        {
            Ok(resp) => {
                if let Err(e) = resp.error_for_status_ref() {
                    warn!(error = %e, "order post returned non-success");
                    continue;
                }
                info!(
                    elapsed = format_args!("{:.1}s", start.elapsed().as_secs_f64()),
                    bid,
                    size,
                    price,
                    mid = format_args!("{:.2}", mid),
                    inventory = iv,
                    pnl = format_args!("{:.2}", pnl),
                    "sim tick"
                );
            }
            Err(e) => {
                warn!(error = %e, "HTTP request failed");
                continue;
            }
        }
    }

    info!(
        inventory = iv,
        pnl = format_args!("{:.2}", pnl),
        "simulation done"
    );
    Ok(())
}
