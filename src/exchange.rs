use std::collections::HashSet;
use std::future::Future;

use chrono::{DateTime, Utc};

use crate::error::ExchangeError;
use crate::granularity::GranularityCatalog;
use crate::model::candle::RawCandle;

/// Market-data capability of an exchange, injected into the pipeline.
///
/// Implementations own transport, signing and the mapping of vendor errors
/// into [`ExchangeError`]. A zero-length `[start, end]` asks for the most
/// recent candles the exchange is willing to return.
pub trait ExchangeClient: Send + Sync {
    /// Product ids currently tradable. An empty set disables the upfront check.
    fn valid_product_ids(&self) -> &HashSet<String>;

    fn available_granularities(&self) -> &GranularityCatalog;

    /// Raw `(time, low, high, open, close, volume)` rows in the exchange's order.
    fn historic_rates(
        &self,
        product_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity: u32,
    ) -> impl Future<Output = Result<Vec<RawCandle>, ExchangeError>> + Send;
}
