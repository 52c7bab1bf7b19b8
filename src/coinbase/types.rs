use serde::Deserialize;

use crate::model::candle::RawCandle;

/// Deserialize Coinbase string-encoded numbers to f64.
pub fn string_to_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse::<f64>().map_err(serde::de::Error::custom)
}

pub fn string_or_number_to_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    match v {
        serde_json::Value::String(s) => s.parse::<f64>().map_err(serde::de::Error::custom),
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("invalid number")),
        _ => Err(serde::de::Error::custom("invalid numeric value")),
    }
}

/// One bucket from `GET /products/{id}/candles`:
/// `[time, low, high, open, close, volume]`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CoinbaseCandleRow(
    pub i64,
    #[serde(deserialize_with = "string_or_number_to_f64")] pub f64,
    #[serde(deserialize_with = "string_or_number_to_f64")] pub f64,
    #[serde(deserialize_with = "string_or_number_to_f64")] pub f64,
    #[serde(deserialize_with = "string_or_number_to_f64")] pub f64,
    #[serde(deserialize_with = "string_or_number_to_f64")] pub f64,
);

impl From<CoinbaseCandleRow> for RawCandle {
    fn from(row: CoinbaseCandleRow) -> Self {
        (row.0, row.1, row.2, row.3, row.4, row.5)
    }
}

/// Item of `GET /products`.
#[derive(Debug, Clone, Deserialize)]
pub struct CoinbaseProduct {
    pub id: String,
    #[serde(default)]
    pub base_currency: String,
    #[serde(default)]
    pub quote_currency: String,
    #[serde(default)]
    pub status: String,
}

impl CoinbaseProduct {
    pub fn is_online(&self) -> bool {
        self.status.eq_ignore_ascii_case("online")
    }
}

/// `GET /products/{id}/ticker`.
#[derive(Debug, Clone, Deserialize)]
pub struct CoinbaseTicker {
    pub trade_id: u64,
    #[serde(deserialize_with = "string_to_f64")]
    pub price: f64,
    #[serde(deserialize_with = "string_to_f64")]
    pub size: f64,
    #[serde(deserialize_with = "string_to_f64")]
    pub bid: f64,
    #[serde(deserialize_with = "string_to_f64")]
    pub ask: f64,
    #[serde(deserialize_with = "string_to_f64")]
    pub volume: f64,
    pub time: String,
}

/// `GET /time`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerTimeResponse {
    pub iso: String,
    pub epoch: f64,
}

/// Body of a non-2xx Coinbase response.
#[derive(Debug, Deserialize)]
pub struct CoinbaseApiErrorResponse {
    pub message: String,
}
