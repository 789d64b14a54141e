//! The HTTP/WebSocket transport surface sitting in front of [`Exchange`].
//!
//! Routes: `POST /order`, `DELETE /order/{market}/{id}`, `GET
//! /order/{user_id}`, `GET /book/{market}`, `GET /book/asks`, `GET
//! /book/bids`, `GET /trades/{market}`, `WS /ws`.
//! The `LoggedJson` extractor and `TraceLayer` wiring are kept from the
//! teacher's `api.rs` verbatim in spirit: log a rejected payload with full
//! field context before it turns into a 422.

use serde::{
    Deserialize, Deserializer, Serialize,
    de::{self, DeserializeOwned},
};
use serde_json::json;
use std::str::FromStr;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{error, info, warn};
use uuid::Uuid;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        FromRequest, Path, Request, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};

use crate::{
    errors::EngineError,
    exchange::OpenOrders,
    instrument::Market,
    orderbook::BookSnapshot,
    orders::{Order, OrderId, OrderType, Side, UserId, next_timestamp},
    state::AppState,
    trade::Trade,
};

type ApiErr = (StatusCode, Json<serde_json::Value>);

/// Error JSON shape: `{"msg": "..."}`.
fn err(status: StatusCode, msg: &str) -> ApiErr {
    (status, Json(json!({ "msg": msg })))
}

fn map_engine_error(e: EngineError) -> ApiErr {
    match e {
        EngineError::BadInput(msg) => err(StatusCode::BAD_REQUEST, &msg),
        EngineError::InsufficientLiquidity {
            requested,
            available,
        } => err(
            StatusCode::BAD_REQUEST,
            &format!("insufficient liquidity: requested {requested}, available {available}"),
        ),
        EngineError::UnknownOrder(id) => {
            err(StatusCode::BAD_REQUEST, &format!("unknown order {id}"))
        }
        // Should never happen if the open-orders invariant holds; treat as
        // a bug-surface condition rather than a client mistake, so 500.
        EngineError::UnknownUser(id) => {
            err(StatusCode::INTERNAL_SERVER_ERROR, &format!("unknown user {id}"))
        }
        EngineError::SettlementFailure(msg) => err(StatusCode::INTERNAL_SERVER_ERROR, &msg),
    }
}

fn parse_market<'de, D>(deserializer: D) -> Result<Market, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Market::from_str(&s).map_err(|e| de::Error::custom(e))
}

/// Body of `POST /order`: `{user_id, type, side, size, price, market}`.
/// `side` is a bare bool, not the `Side` enum's `"Buy"/"Sell"` —
/// `true` means bid, mirroring the Go source's `PlaceOrderRequest.Bid`.
#[derive(Deserialize)]
pub struct NewOrderRequest {
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub side: bool,
    pub size: f64,
    pub price: Option<f64>,
    #[serde(deserialize_with = "parse_market")]
    pub market: Market,
}

impl NewOrderRequest {
    fn side(&self) -> Side {
        if self.side { Side::Buy } else { Side::Sell }
    }
}

pub struct LoggedJson<T>(pub T);

impl<S, T> FromRequest<S> for LoggedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiErr;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let method = req.method().clone();
        let uri = req.uri().clone();
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| err(StatusCode::BAD_REQUEST, &e.to_string()))?;

        match serde_json::from_slice::<T>(&bytes) {
            Ok(val) => Ok(LoggedJson(val)),
            Err(e) => {
                let preview = String::from_utf8_lossy(&bytes);
                let preview = &preview[..preview.len().min(4096)];
                warn!(
                    error = %e,
                    %method,
                    uri = %uri,
                    body_preview = %preview,
                    "order rejected: JSON deserialization failed"
                );
                Err(err(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string()))
            }
        }
    }
}

/// Row shape for `GET /trades/{market}`: `[{price,size,bid,timestamp}…]`.
#[derive(Debug, Serialize)]
pub struct TradeView {
    pub price: f64,
    pub size: f64,
    pub bid: bool,
    pub timestamp: u64,
}

impl From<&Trade> for TradeView {
    fn from(t: &Trade) -> Self {
        TradeView {
            price: t.price,
            size: t.size,
            bid: t.aggressor_is_bid,
            timestamp: t.timestamp,
        }
    }
}

fn best_price_response(price: Option<f64>) -> Json<serde_json::Value> {
    // Best bid/ask on an empty book returns price 0, not an error.
    Json(json!({ "price": price.unwrap_or(0.0) }))
}

/// `GET /book/{market}`.
pub async fn get_book(
    State(state): State<AppState>,
    Path(market): Path<String>,
) -> Result<Json<BookSnapshot>, ApiErr> {
    let market: Market = market
        .parse()
        .map_err(|e: String| err(StatusCode::BAD_REQUEST, &e))?;
    let snapshot = state
        .exchange
        .book_snapshot(&market)
        .await
        .map_err(map_engine_error)?;
    Ok(Json(snapshot))
}

/// `GET /book/bids` — best bid on the server's default market.
pub async fn get_best_bid(State(state): State<AppState>) -> Json<serde_json::Value> {
    let price = state
        .exchange
        .best_bid(&state.default_market)
        .await
        .unwrap_or(None);
    best_price_response(price)
}

/// `GET /book/asks` — best ask on the server's default market.
pub async fn get_best_ask(State(state): State<AppState>) -> Json<serde_json::Value> {
    let price = state
        .exchange
        .best_ask(&state.default_market)
        .await
        .unwrap_or(None);
    best_price_response(price)
}

/// `GET /trades/{market}`. Full in-memory log, oldest first — no
/// pagination (there's no persistence, and therefore no cursor to
/// paginate over).
pub async fn get_trades(
    State(state): State<AppState>,
    Path(market): Path<String>,
) -> Result<Json<Vec<TradeView>>, ApiErr> {
    let market: Market = market
        .parse()
        .map_err(|e: String| err(StatusCode::BAD_REQUEST, &e))?;
    let trades = state
        .exchange
        .trades(&market)
        .await
        .map_err(map_engine_error)?;
    Ok(Json(trades.iter().map(TradeView::from).collect()))
}

/// `GET /order/{user_id}`: `{asks:[…], bids:[…]}`.
pub async fn get_orders(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<OpenOrders>, ApiErr> {
    let open = state
        .exchange
        .open_orders_for(user_id)
        .await
        .map_err(map_engine_error)?;
    Ok(Json(open))
}

/// `POST /order`. Limit orders respond `{order_id}`; market orders respond
/// `{matches:[…]}`.
pub async fn create_order(
    State(state): State<AppState>,
    LoggedJson(payload): LoggedJson<NewOrderRequest>,
) -> Result<Json<serde_json::Value>, ApiErr> {
    if payload.size <= 0.0 {
        warn!(user_id = payload.user_id, "order rejected: size must be > 0");
        return Err(err(StatusCode::BAD_REQUEST, "size must be > 0"));
    }
    if matches!(payload.order_type, OrderType::Limit) && payload.price.is_none_or(|p| p <= 0.0) {
        warn!(user_id = payload.user_id, "order rejected: price must be > 0 for limit orders");
        return Err(err(StatusCode::BAD_REQUEST, "price must be > 0 for limit orders"));
    }

    let order_type = payload.order_type;
    let order = Order {
        id: Uuid::new_v4().as_u128() as OrderId,
        user_id: payload.user_id,
        side: payload.side(),
        order_type,
        price: matches!(order_type, OrderType::Limit).then_some(payload.price).flatten(),
        size: payload.size,
        timestamp: next_timestamp(),
        market: payload.market.clone(),
    };
    let order_id = order.id;

    let matches = state
        .exchange
        .place_order(order)
        .await
        .map_err(map_engine_error)?;

    info!(order_id, user_id = payload.user_id, ?order_type, "order placed");

    let body = match order_type {
        OrderType::Limit => json!({ "order_id": order_id }),
        OrderType::Market => json!({ "matches": matches }),
    };
    Ok(Json(body))
}

/// `DELETE /order/{market}/{id}`: `{ok}`.
pub async fn cancel_order(
    State(state): State<AppState>,
    Path((market, id)): Path<(String, OrderId)>,
) -> Result<Json<serde_json::Value>, ApiErr> {
    let market: Market = market
        .parse()
        .map_err(|e: String| err(StatusCode::BAD_REQUEST, &e))?;
    state
        .exchange
        .cancel_order(&market, id)
        .await
        .map_err(map_engine_error)?;
    Ok(Json(json!({ "ok": true })))
}

/// `WS /ws`: pushes `{price,spread,total_volume}` on every market fill,
/// across every market (the Go source's single global
/// `ConnectionManager.Broadcast`, generalized from a fixed `MarketETH` to
/// whichever market just filled).
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let mut tickers = state.subscribe_tickers();
    loop {
        match tickers.recv().await {
            Ok(ticker) => {
                let Ok(text) = serde_json::to_string(&ticker) else {
                    continue;
                };
                if let Err(e) = socket.send(Message::Text(text.into())).await {
                    error!("WebSocket send failed: {:?}", e);
                    break;
                }
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "ws client lagged behind ticker broadcast");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Constructs the application's `Router` with all routes and shared state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/order", post(create_order))
        .route("/order/{user_id}", get(get_orders))
        .route("/order/{market}/{id}", delete(cancel_order))
        .route("/book/{market}", get(get_book))
        .route("/book/bids", get(get_best_bid))
        .route("/book/asks", get(get_best_ask))
        .route("/trades/{market}", get(get_trades))
        .route("/ws", get(ws_handler))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(
                    DefaultMakeSpan::new()
                        .include_headers(false)
                        .level(tracing::Level::TRACE),
                )
                .on_response(DefaultOnResponse::new().level(tracing::Level::TRACE)),
        )
        .with_state(state)
}
