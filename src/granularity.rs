use std::collections::BTreeSet;
use std::fmt;

use crate::error::{AppError, InvalidArgument};

/// Coinbase candle widths: 1m, 5m, 15m, 1h, 6h, 1d.
pub const COINBASE_GRANULARITIES: [u32; 6] = [60, 300, 900, 3_600, 21_600, 86_400];

/// Fixed set of candle widths (seconds) an exchange accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GranularityCatalog {
    values: BTreeSet<u32>,
}

impl GranularityCatalog {
    pub fn new(values: impl IntoIterator<Item = u32>) -> Self {
        Self {
            values: values.into_iter().filter(|g| *g > 0).collect(),
        }
    }

    pub fn coinbase() -> Self {
        Self::new(COINBASE_GRANULARITIES)
    }

    /// Returns the granularity unchanged when it belongs to the catalog.
    pub fn validate(&self, granularity: u32) -> Result<u32, AppError> {
        if self.contains(granularity) {
            Ok(granularity)
        } else {
            Err(InvalidArgument::Granularity {
                granularity,
                allowed: self.to_string(),
            }
            .into())
        }
    }

    pub fn contains(&self, granularity: u32) -> bool {
        self.values.contains(&granularity)
    }

    pub fn min(&self) -> Option<u32> {
        self.values.first().copied()
    }

    pub fn max(&self) -> Option<u32> {
        self.values.last().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.values.iter().copied()
    }
}

impl fmt::Display for GranularityCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .values
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "[{}]", joined)
    }
}
