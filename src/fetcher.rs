use std::sync::Arc;

use crate::error::ExchangeError;
use crate::exchange::ExchangeClient;
use crate::model::candle::Candle;
use crate::rate_limit::{EndpointClass, RateLimiter};
use crate::window::TimeWindow;

/// Issues one throttled candle request per window.
pub struct CandleFetcher<C> {
    client: Arc<C>,
    limiter: RateLimiter,
}

impl<C: ExchangeClient> CandleFetcher<C> {
    pub fn new(client: Arc<C>, limiter: RateLimiter) -> Self {
        Self { client, limiter }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Candles for one window, in the order the exchange returned them.
    ///
    /// Exchange failures are returned untouched; nothing is retried here.
    pub async fn fetch(
        &self,
        product_id: &str,
        window: &TimeWindow,
        granularity: u32,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let permit = self.limiter.acquire(EndpointClass::Public).await;

        let rows = match self
            .client
            .historic_rates(product_id, window.start(), window.end(), granularity)
            .await
        {
            Ok(rows) => rows,
            Err(err) => {
                tracing::warn!(product_id, window = %window, error = %err, "Candle request failed");
                return Err(err);
            }
        };

        let candles: Vec<Candle> = rows.into_iter().map(Candle::from).collect();
        tracing::debug!(
            product_id,
            window = %window,
            granularity,
            paused = permit.paused(),
            count = candles.len(),
            "Fetched candle window"
        );
        Ok(candles)
    }
}
