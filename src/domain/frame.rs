//! Price and signal-feature table consumed by the episode engine.

use chrono::NaiveDate;

use crate::domain::error::TradesimError;

/// One row per tick: a price used for reward math plus the feature values
/// exposed through observations. Immutable once built; episodes running in
/// parallel share a frame through `Arc<MarketFrame>`.
#[derive(Debug, Clone)]
pub struct MarketFrame {
    pub symbol: String,
    pub dates: Option<Vec<NaiveDate>>,
    pub prices: Vec<f64>,
    pub features: Vec<Vec<f64>>,
}

impl MarketFrame {
    /// Build a frame, validating row-count agreement, finite prices, and a
    /// rectangular feature table.
    pub fn new(
        symbol: String,
        dates: Option<Vec<NaiveDate>>,
        prices: Vec<f64>,
        features: Vec<Vec<f64>>,
    ) -> Result<MarketFrame, TradesimError> {
        if prices.is_empty() {
            return Err(TradesimError::Data {
                reason: format!("{symbol}: price series is empty"),
            });
        }
        if features.len() != prices.len() {
            return Err(TradesimError::Data {
                reason: format!(
                    "{symbol}: {} feature rows for {} prices",
                    features.len(),
                    prices.len()
                ),
            });
        }
        if let Some(dates) = &dates {
            if dates.len() != prices.len() {
                return Err(TradesimError::Data {
                    reason: format!(
                        "{symbol}: {} dates for {} prices",
                        dates.len(),
                        prices.len()
                    ),
                });
            }
        }
        if let Some(tick) = prices.iter().position(|p| !p.is_finite()) {
            return Err(TradesimError::Data {
                reason: format!("{symbol}: non-finite price at tick {tick}"),
            });
        }
        let width = features[0].len();
        if let Some(tick) = features.iter().position(|row| row.len() != width) {
            return Err(TradesimError::Data {
                reason: format!("{symbol}: ragged feature row at tick {tick}"),
            });
        }

        Ok(MarketFrame {
            symbol,
            dates,
            prices,
            features,
        })
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn feature_width(&self) -> usize {
        self.features[0].len()
    }

    pub fn price(&self, tick: usize) -> f64 {
        self.prices[tick]
    }

    /// The `window_size` feature rows strictly before `end_tick`. Callers
    /// keep `window_size <= end_tick <= len()`.
    pub fn window(&self, end_tick: usize, window_size: usize) -> &[Vec<f64>] {
        &self.features[end_tick - window_size..end_tick]
    }

    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let dates = self.dates.as_ref()?;
        Some((*dates.first()?, *dates.last()?))
    }

    pub fn price_range(&self) -> (f64, f64) {
        let mut low = f64::INFINITY;
        let mut high = f64::NEG_INFINITY;
        for &price in &self.prices {
            low = low.min(price);
            high = high.max(price);
        }
        (low, high)
    }
}
