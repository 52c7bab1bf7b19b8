use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::Instrument;

use crate::error::{AppError, InvalidArgument};
use crate::exchange::ExchangeClient;
use crate::fetcher::CandleFetcher;
use crate::granularity::GranularityCatalog;
use crate::model::candle::Candle;
use crate::rate_limit::RateLimiter;
use crate::window::{self, Timestamp, TimestampFormat, WindowSplit};

/// Which empty windows count towards the tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TolerancePolicy {
    /// Only an unbroken run of empty windows counts; data resets the counter.
    #[default]
    Consecutive,
    /// Every empty window in the batch counts.
    Cumulative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Most candles the exchange returns for one request.
    pub max_samples_per_request: u32,
    /// Empty windows tolerated before the batch gives up.
    pub failure_tolerance: u32,
    pub tolerance_policy: TolerancePolicy,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_samples_per_request: 300,
            failure_tolerance: 2,
            tolerance_policy: TolerancePolicy::Consecutive,
        }
    }
}

/// Candles for a requested range in ascending time order.
///
/// When the empty-window tolerance runs out the batch ends early and
/// [`BatchResult::is_complete`] is `false`; the candles gathered up to that
/// point are still returned. Callers that need the full span must check it.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    candles: Vec<Candle>,
    windows_planned: usize,
    windows_fetched: usize,
}

impl BatchResult {
    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn into_candles(self) -> Vec<Candle> {
        self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn windows_planned(&self) -> usize {
        self.windows_planned
    }

    pub fn windows_fetched(&self) -> usize {
        self.windows_fetched
    }

    /// Every planned window was requested.
    pub fn is_complete(&self) -> bool {
        self.windows_fetched == self.windows_planned
    }
}

/// Drives window splitting and fetching across a whole range.
pub struct BatchAssembler<C> {
    fetcher: CandleFetcher<C>,
    catalog: GranularityCatalog,
    config: BatchConfig,
}

impl<C: ExchangeClient> BatchAssembler<C> {
    /// Uses the client's own granularity catalog.
    pub fn new(client: Arc<C>, limiter: RateLimiter, config: BatchConfig) -> Self {
        let catalog = client.available_granularities().clone();
        Self {
            fetcher: CandleFetcher::new(client, limiter),
            catalog,
            config,
        }
    }

    pub fn with_catalog(mut self, catalog: GranularityCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn fetcher(&self) -> &CandleFetcher<C> {
        &self.fetcher
    }

    pub fn catalog(&self) -> &GranularityCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Fetch every candle of `product_id` between `start` and `end`.
    ///
    /// Invalid input fails before any request is sent. Exchange errors end the
    /// batch and are returned as-is; empty windows are tolerated up to
    /// `failure_tolerance`, after which the partial result is returned.
    pub async fn assemble(
        &self,
        product_id: &str,
        start: &Timestamp,
        end: &Timestamp,
        granularity: u32,
    ) -> Result<BatchResult, AppError> {
        self.validate(product_id, granularity)?;
        let windows = window::split(
            start,
            end,
            granularity,
            self.config.max_samples_per_request,
        )?;
        self.run(product_id, windows, granularity).await
    }

    /// Most recent candles, for callers with no range in mind.
    pub async fn assemble_latest(
        &self,
        product_id: &str,
        granularity: u32,
    ) -> Result<BatchResult, AppError> {
        self.validate(product_id, granularity)?;
        let now = Utc::now();
        let windows = window::split_range(
            now,
            now,
            granularity,
            self.config.max_samples_per_request,
            TimestampFormat::Iso8601,
        )?;
        self.run(product_id, windows, granularity).await
    }

    fn validate(&self, product_id: &str, granularity: u32) -> Result<(), AppError> {
        self.catalog.validate(granularity)?;
        let products = self.fetcher.client().valid_product_ids();
        if !products.is_empty() && !products.contains(product_id) {
            return Err(InvalidArgument::Product(product_id.to_string()).into());
        }
        Ok(())
    }

    async fn run(
        &self,
        product_id: &str,
        windows: WindowSplit,
        granularity: u32,
    ) -> Result<BatchResult, AppError> {
        let windows_planned = windows.len();
        let span = tracing::info_span!(
            "assemble",
            product_id,
            granularity,
            windows = windows_planned
        );

        async move {
            tracing::info!("Starting candle batch");

            let mut candles: Vec<Candle> = Vec::new();
            let mut windows_fetched = 0;
            let mut empty_windows = 0u32;

            for window in windows {
                let mut batch = self.fetcher.fetch(product_id, &window, granularity).await?;
                windows_fetched += 1;
                let received = batch.len();

                // Exchanges may answer newest-first or include candles before the
                // window start; keep the batch strictly ascending.
                batch.sort_by_key(Candle::time);
                batch.dedup_by_key(|c| c.time());
                if let Some(last) = candles.last().map(Candle::time) {
                    batch.retain(|c| c.time() > last);
                }

                // A window that only repeats earlier candles counts as empty.
                if batch.is_empty() {
                    empty_windows += 1;
                    tracing::debug!(
                        window = %window,
                        received,
                        empty_windows,
                        "Empty candle window"
                    );
                    if empty_windows > self.config.failure_tolerance {
                        tracing::warn!(
                            window = %window,
                            empty_windows,
                            tolerance = self.config.failure_tolerance,
                            "Empty window tolerance exhausted, returning partial batch"
                        );
                        break;
                    }
                    continue;
                }

                if self.config.tolerance_policy == TolerancePolicy::Consecutive {
                    empty_windows = 0;
                }
                candles.extend(batch);
            }

            let result = BatchResult {
                candles,
                windows_planned,
                windows_fetched,
            };
            tracing::info!(
                count = result.len(),
                windows_fetched,
                complete = result.is_complete(),
                "Finished candle batch"
            );
            Ok::<_, AppError>(result)
        }
        .instrument(span)
        .await
    }
}
