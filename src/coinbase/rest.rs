use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

use crate::config::CoinbaseConfig;
use crate::error::ExchangeError;
use crate::exchange::ExchangeClient;
use crate::granularity::GranularityCatalog;
use crate::model::candle::RawCandle;
use crate::window::TimestampFormat;

use super::types::{
    CoinbaseApiErrorResponse, CoinbaseCandleRow, CoinbaseProduct, CoinbaseTicker,
    ServerTimeResponse,
};

pub const COINBASE_REST_URL: &str = "https://api.pro.coinbase.com";
pub const COINBASE_SANDBOX_REST_URL: &str = "https://api-public.sandbox.pro.coinbase.com";

const USER_AGENT: &str = concat!("candle-batch/", env!("CARGO_PKG_VERSION"));

/// Public market-data endpoints of the Coinbase REST API.
pub struct CoinbaseRestClient {
    http: reqwest::Client,
    base_url: String,
    product_ids: HashSet<String>,
    granularities: GranularityCatalog,
}

impl CoinbaseRestClient {
    /// Client with no known products; the product check is skipped until
    /// [`CoinbaseRestClient::refresh_products`] runs.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ExchangeError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            product_ids: HashSet::new(),
            granularities: GranularityCatalog::coinbase(),
        })
    }

    /// Build from config and load the tradable product list.
    pub async fn connect(config: &CoinbaseConfig) -> Result<Self, ExchangeError> {
        let mut client = Self::new(config.rest_base_url(), config.timeout())?;
        client.refresh_products().await?;
        tracing::info!(
            base_url = %client.base_url,
            products = client.product_ids.len(),
            "Connected to Coinbase REST"
        );
        Ok(client)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Replace the cached product ids with the currently online ones.
    pub async fn refresh_products(&mut self) -> Result<usize, ExchangeError> {
        let products = self.products().await?;
        self.product_ids = products
            .into_iter()
            .filter(CoinbaseProduct::is_online)
            .map(|p| p.id)
            .collect();
        Ok(self.product_ids.len())
    }

    pub async fn products(&self) -> Result<Vec<CoinbaseProduct>, ExchangeError> {
        self.get_json("/products", &[]).await
    }

    pub async fn ticker(&self, product_id: &str) -> Result<CoinbaseTicker, ExchangeError> {
        self.get_json(&format!("/products/{}/ticker", product_id), &[])
            .await
    }

    pub async fn server_time(&self) -> Result<DateTime<Utc>, ExchangeError> {
        let resp: ServerTimeResponse = self.get_json("/time", &[]).await?;
        DateTime::parse_from_rfc3339(&resp.iso)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| ExchangeError::Unknown {
                status: 200,
                message: format!("bad server time {:?}: {}", resp.iso, e),
            })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ExchangeError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.http.get(&url).query(query).send().await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            let message = match serde_json::from_str::<CoinbaseApiErrorResponse>(&body) {
                Ok(err) => err.message,
                Err(_) => body.trim().chars().take(200).collect(),
            };
            tracing::debug!(path, status = status.as_u16(), %message, "Coinbase request failed");
            return Err(ExchangeError::from_status(status.as_u16(), message));
        }

        Ok(serde_json::from_str(&body)?)
    }
}

impl ExchangeClient for CoinbaseRestClient {
    fn valid_product_ids(&self) -> &HashSet<String> {
        &self.product_ids
    }

    fn available_granularities(&self) -> &GranularityCatalog {
        &self.granularities
    }

    async fn historic_rates(
        &self,
        product_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity: u32,
    ) -> Result<Vec<RawCandle>, ExchangeError> {
        let query = candles_query(start, end, granularity);
        let rows: Vec<CoinbaseCandleRow> = self
            .get_json(&format!("/products/{}/candles", product_id), &query)
            .await?;
        Ok(rows.into_iter().map(RawCandle::from).collect())
    }
}

/// A zero-length window leaves out `start`/`end` so the exchange answers
/// with its latest candles.
fn candles_query(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    granularity: u32,
) -> Vec<(&'static str, String)> {
    let mut query = vec![("granularity", granularity.to_string())];
    if start != end {
        query.push(("start", TimestampFormat::Iso8601.render(start)));
        query.push(("end", TimestampFormat::Iso8601.render(end)));
    }
    query
}
