use std::sync::Arc;
use std::time::Duration;

use candle_batch::assembler::{BatchAssembler, BatchConfig};
use candle_batch::coinbase::CoinbaseRestClient;
use candle_batch::config::CoinbaseConfig;
use candle_batch::error::{AppError, ExchangeError, InvalidArgument};
use candle_batch::exchange::ExchangeClient;
use candle_batch::rate_limit::RateLimiter;
use candle_batch::window::Timestamp;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use wiremock::{
    matchers::{method, path, query_param, query_param_is_missing},
    Mock, MockServer, ResponseTemplate,
};

async fn setup() -> (MockServer, CoinbaseRestClient) {
    let mock_server = MockServer::start().await;
    let client = CoinbaseRestClient::new(&mock_server.uri(), Duration::from_secs(5)).unwrap();
    (mock_server, client)
}

fn products() -> serde_json::Value {
    json!([
        {"id": "BTC-USD", "base_currency": "BTC", "quote_currency": "USD", "status": "online"},
        {"id": "ETH-USD", "base_currency": "ETH", "quote_currency": "USD", "status": "online"},
        {"id": "XRP-USD", "base_currency": "XRP", "quote_currency": "USD", "status": "delisted"}
    ])
}

/// Newest first, the way Coinbase answers.
fn three_hourly_rows() -> serde_json::Value {
    json!([
        [1609466400, 29600.0, 30500.0, 29800.0, 30100.0, 800.0],
        [1609462800, 29100.0, 30000.0, 29200.0, 29800.0, 1200.0],
        [1609459200, 28800.0, 29500.0, 29000.0, 29200.0, 1000.0]
    ])
}

fn utc(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

#[tokio::test]
async fn historic_rates_sends_granularity_and_iso_bounds() {
    let (mock_server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/products/BTC-USD/candles"))
        .and(query_param("granularity", "3600"))
        .and(query_param("start", "2021-01-01T00:00:00"))
        .and(query_param("end", "2021-01-01T02:00:00"))
        .respond_with(ResponseTemplate::new(200).set_body_json(three_hourly_rows()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let rows = client
        .historic_rates("BTC-USD", utc(1_609_459_200), utc(1_609_466_400), 3_600)
        .await
        .unwrap();

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].0, 1_609_466_400);
    assert!((rows[2].1 - 28_800.0).abs() < 1e-6);
    assert!((rows[2].5 - 1_000.0).abs() < 1e-6);
}

#[tokio::test]
async fn zero_length_window_asks_for_latest_candles() {
    let (mock_server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/products/BTC-USD/candles"))
        .and(query_param("granularity", "60"))
        .and(query_param_is_missing("start"))
        .and(query_param_is_missing("end"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let now = Utc::now();
    let rows = client.historic_rates("BTC-USD", now, now, 60).await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn error_statuses_keep_the_vendor_message() {
    let (mock_server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/products/BTC-USD/candles"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"message": "Unsupported granularity"})),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/products/NOPE-USD/candles"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "NotFound"})))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/products/ETH-USD/candles"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&mock_server)
        .await;

    let err = client
        .historic_rates("BTC-USD", utc(0), utc(60), 60)
        .await
        .unwrap_err();
    match err {
        ExchangeError::InvalidArgument { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Unsupported granularity");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let err = client
        .historic_rates("NOPE-USD", utc(0), utc(60), 60)
        .await
        .unwrap_err();
    assert!(matches!(err, ExchangeError::NotFound { ref message } if message == "NotFound"));

    let err = client
        .historic_rates("ETH-USD", utc(0), utc(60), 60)
        .await
        .unwrap_err();
    match err {
        ExchangeError::Server { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "upstream unavailable");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let (mock_server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/products/BTC-USD/candles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candles": []})))
        .mount(&mock_server)
        .await;

    let err = client
        .historic_rates("BTC-USD", utc(0), utc(60), 60)
        .await
        .unwrap_err();
    assert!(matches!(err, ExchangeError::Decode(_)));
}

#[tokio::test]
async fn connect_keeps_only_online_products() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(products()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = CoinbaseConfig {
        rest_base_url: Some(mock_server.uri()),
        ..CoinbaseConfig::default()
    };
    let client = CoinbaseRestClient::connect(&config).await.unwrap();

    let ids = client.valid_product_ids();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains("BTC-USD"));
    assert!(ids.contains("ETH-USD"));
    assert!(!ids.contains("XRP-USD"));
}

#[tokio::test]
async fn ticker_and_server_time() {
    let (mock_server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/products/BTC-USD/ticker"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "trade_id": 86326522,
            "price": "29200.01",
            "size": "0.0051",
            "bid": "29200.00",
            "ask": "29200.01",
            "volume": "14123.49",
            "time": "2021-01-01T00:00:05.123Z"
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/time"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "iso": "2021-01-01T00:00:05.123Z",
            "epoch": 1609459205.123
        })))
        .mount(&mock_server)
        .await;

    let ticker = client.ticker("BTC-USD").await.unwrap();
    assert_eq!(ticker.trade_id, 86_326_522);
    assert!((ticker.bid - 29_200.0).abs() < 1e-6);

    let server_time = client.server_time().await.unwrap();
    assert_eq!(server_time.timestamp(), 1_609_459_205);
}

#[tokio::test]
async fn assembler_over_rest_client_end_to_end() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(products()))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/products/BTC-USD/candles"))
        .and(query_param("granularity", "3600"))
        .respond_with(ResponseTemplate::new(200).set_body_json(three_hourly_rows()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = CoinbaseConfig {
        rest_base_url: Some(mock_server.uri()),
        ..CoinbaseConfig::default()
    };
    let client = CoinbaseRestClient::connect(&config).await.unwrap();
    let assembler = BatchAssembler::new(
        Arc::new(client),
        RateLimiter::coinbase(),
        BatchConfig::default(),
    );

    let result = assembler
        .assemble(
            "BTC-USD",
            &Timestamp::from("2021-01-01T00:00:00"),
            &Timestamp::from("2021-01-01T02:00:00"),
            3_600,
        )
        .await
        .unwrap();
    let times: Vec<i64> = result.candles().iter().map(|c| c.time()).collect();
    assert_eq!(
        times,
        vec![
            Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap().timestamp(),
            1_609_462_800,
            1_609_466_400,
        ]
    );

    let err = assembler
        .assemble("XRP-USD", &0.into(), &3_600.into(), 3_600)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::InvalidArgument(InvalidArgument::Product(_))
    ));
}
