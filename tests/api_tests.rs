use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
    response::Response,
};

use order_book_engine::{instrument::btc_usd, state::AppState};
use serde_json::{Value, json};
use tower::ServiceExt;

async fn test_app() -> Router {
    let state = AppState::new();
    state.seed([btc_usd()], [(1, "alice"), (2, "bob")]).await;
    order_book_engine::api::router(state)
}

async fn body_json(res: Response) -> Value {
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn get_book_rejects_unregistered_market() {
    let app = test_app().await;

    let res = app.oneshot(get("/book/ETH-USD")).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let v = body_json(res).await;
    assert!(v["msg"].as_str().unwrap().contains("unregistered"));
}

#[tokio::test]
async fn get_book_rejects_malformed_market_symbol() {
    let app = test_app().await;

    let res = app.oneshot(get("/book/btc-usd")).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let v = body_json(res).await;
    assert!(v["msg"].as_str().unwrap().contains("unsupported"));
}

#[tokio::test]
async fn create_order_rejects_zero_size() {
    let app = test_app().await;

    let body = json!({
        "user_id": 1,
        "type": "LIMIT",
        "side": true,
        "price": 50.0,
        "size": 0.0,
        "market": "BTC-USD",
    });

    let res = app.oneshot(post("/order", body)).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let v = body_json(res).await;
    assert_eq!(v["msg"], "size must be > 0");
}

#[tokio::test]
async fn create_order_invalid_field_yields_422_from_loggedjson() {
    let app = test_app().await;

    let body = json!({
        "user_id": 1,
        "type": "LIMIT",
        "side": true,
        "price": 50.0,
        "size": 1.0,
        "market": "btc-usd",
    });

    let res = app.oneshot(post("/order", body)).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn limit_order_rests_then_cancel_removes_it() {
    let app = test_app().await;

    let create = json!({
        "user_id": 1,
        "type": "LIMIT",
        "side": true,
        "price": 48.0,
        "size": 10.0,
        "market": "BTC-USD",
    });

    let res = app.clone().oneshot(post("/order", create)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let ack = body_json(res).await;
    let order_id = ack["order_id"].as_u64().unwrap();

    let res = app.clone().oneshot(get("/book/BTC-USD")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let snap = body_json(res).await;
    assert_eq!(snap["bids"][0]["price"].as_f64(), Some(48.0));

    let res = app
        .clone()
        .oneshot(delete(&format!("/order/BTC-USD/{order_id}")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app.oneshot(get("/book/BTC-USD")).await.unwrap();
    let snap = body_json(res).await;
    assert!(snap["bids"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn cancel_unknown_order_is_bad_request() {
    let app = test_app().await;

    let res = app.oneshot(delete("/order/BTC-USD/999")).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let v = body_json(res).await;
    assert!(v["msg"].as_str().unwrap().contains("unknown order"));
}

#[tokio::test]
async fn market_order_fills_against_resting_limit_and_logs_trade() {
    let app = test_app().await;

    let seed = json!({
        "user_id": 1,
        "type": "LIMIT",
        "side": false,
        "price": 52.0,
        "size": 3.0,
        "market": "BTC-USD",
    });
    let res = app.clone().oneshot(post("/order", seed)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let taker = json!({
        "user_id": 2,
        "type": "MARKET",
        "side": true,
        "price": null,
        "size": 3.0,
        "market": "BTC-USD",
    });
    let res = app.clone().oneshot(post("/order", taker)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let ack = body_json(res).await;
    let matches = ack["matches"].as_array().unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0]["price"].as_f64(), Some(52.0));

    let res = app.oneshot(get("/trades/BTC-USD")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let trades = body_json(res).await;
    let trades = trades.as_array().unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0]["price"].as_f64(), Some(52.0));
    assert_eq!(trades[0]["size"].as_f64(), Some(3.0));
    assert_eq!(trades[0]["bid"].as_bool(), Some(true));
}

#[tokio::test]
async fn market_order_rejects_insufficient_liquidity_and_book_stays_unchanged() {
    let app = test_app().await;

    let taker = json!({
        "user_id": 1,
        "type": "MARKET",
        "side": true,
        "price": null,
        "size": 1.0,
        "market": "BTC-USD",
    });
    let res = app.clone().oneshot(post("/order", taker)).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let v = body_json(res).await;
    assert!(v["msg"].as_str().unwrap().contains("insufficient liquidity"));

    let res = app.oneshot(get("/trades/BTC-USD")).await.unwrap();
    let trades = body_json(res).await;
    assert!(trades.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn best_bid_ask_report_zero_on_empty_book() {
    let app = test_app().await;

    let res = app.clone().oneshot(get("/book/bids")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["price"].as_f64(), Some(0.0));

    let res = app.oneshot(get("/book/asks")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["price"].as_f64(), Some(0.0));
}

#[tokio::test]
async fn open_orders_for_unknown_user_is_a_bug_surface() {
    // UnknownUser should never happen in practice, so it maps to a 500
    // rather than a 400 — it indicates a caller bypassed registration,
    // not a malformed request.
    let app = test_app().await;

    let res = app.oneshot(get("/order/999")).await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn open_orders_tracks_resting_order_and_drops_it_on_fill() {
    let app = test_app().await;

    let create = json!({
        "user_id": 1,
        "type": "LIMIT",
        "side": true,
        "price": 48.0,
        "size": 5.0,
        "market": "BTC-USD",
    });
    app.clone().oneshot(post("/order", create)).await.unwrap();

    let res = app.clone().oneshot(get("/order/1")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let open = body_json(res).await;
    assert_eq!(open["bids"].as_array().unwrap().len(), 1);

    let taker = json!({
        "user_id": 2,
        "type": "MARKET",
        "side": false,
        "price": null,
        "size": 5.0,
        "market": "BTC-USD",
    });
    app.clone().oneshot(post("/order", taker)).await.unwrap();

    let res = app.oneshot(get("/order/1")).await.unwrap();
    let open = body_json(res).await;
    assert!(open["bids"].as_array().unwrap().is_empty());
}
