use serde::{Deserialize, Serialize};

/// One exchange row: `(time, low, high, open, close, volume)`.
pub type RawCandle = (i64, f64, f64, f64, f64, f64);

/// One OHLCV bucket. Built from a raw exchange row and never modified afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    time: i64,
    low: f64,
    high: f64,
    open: f64,
    close: f64,
    volume: f64,
}

impl Candle {
    pub fn new(time: i64, low: f64, high: f64, open: f64, close: f64, volume: f64) -> Self {
        Self {
            time,
            low,
            high,
            open,
            close,
            volume,
        }
    }

    /// Bucket start, seconds since epoch.
    pub fn time(&self) -> i64 {
        self.time
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn open(&self) -> f64 {
        self.open
    }

    pub fn close(&self) -> f64 {
        self.close
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }
}

impl From<RawCandle> for Candle {
    fn from((time, low, high, open, close, volume): RawCandle) -> Self {
        Self::new(time, low, high, open, close, volume)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_row_maps_in_exchange_order() {
        let candle = Candle::from((1_609_459_200, 28_800.0, 29_500.0, 29_000.0, 29_200.0, 1_000.0));
        assert_eq!(candle.time(), 1_609_459_200);
        assert!((candle.low() - 28_800.0).abs() < 1e-9);
        assert!((candle.high() - 29_500.0).abs() < 1e-9);
        assert!((candle.open() - 29_000.0).abs() < 1e-9);
        assert!((candle.close() - 29_200.0).abs() < 1e-9);
        assert!((candle.volume() - 1_000.0).abs() < 1e-9);
    }

    #[test]
    fn serializes_with_exchange_labels() {
        let candle = Candle::new(60, 1.0, 3.0, 2.0, 1.5, 10.0);
        let value = serde_json::to_value(candle).unwrap();
        for label in ["time", "low", "high", "open", "close", "volume"] {
            assert!(value.get(label).is_some(), "missing {label}");
        }
        assert_eq!(value["time"], 60);
        assert_eq!(value["close"], 1.5);
    }
}
