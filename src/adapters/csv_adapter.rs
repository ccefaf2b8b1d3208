//! CSV file market data adapter.
//!
//! Reads `{data_dir}/{symbol}.csv` with the header
//! `date,open,high,low,close,volume` and assembles a [`MarketFrame`] from a
//! configured price column and feature column list.

use crate::domain::error::TradesimError;
use crate::domain::frame::MarketFrame;
use crate::ports::data_port::MarketDataPort;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

/// Bar columns a frame can be built from. The date column is always parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl Column {
    fn parse(name: &str) -> Option<Column> {
        match name.trim().to_lowercase().as_str() {
            "open" => Some(Column::Open),
            "high" => Some(Column::High),
            "low" => Some(Column::Low),
            "close" => Some(Column::Close),
            "volume" => Some(Column::Volume),
            _ => None,
        }
    }

    fn of(self, row: &CsvRow) -> f64 {
        match self {
            Column::Open => row.open,
            Column::High => row.high,
            Column::Low => row.low,
            Column::Close => row.close,
            Column::Volume => row.volume,
        }
    }
}

struct CsvRow {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

#[derive(Debug)]
pub struct CsvDataAdapter {
    data_dir: PathBuf,
    price_column: Column,
    feature_columns: Vec<Column>,
}

impl CsvDataAdapter {
    /// Column names are resolved here so `load_frame` never sees an unknown
    /// column. The price column must be a price, not volume.
    pub fn new(
        data_dir: PathBuf,
        price_column: &str,
        feature_columns: &[String],
    ) -> Result<Self, TradesimError> {
        let price = Column::parse(price_column).ok_or_else(|| TradesimError::ConfigInvalid {
            section: "data".into(),
            key: "price_column".into(),
            reason: format!("unknown column '{price_column}'"),
        })?;
        if price == Column::Volume {
            return Err(TradesimError::ConfigInvalid {
                section: "data".into(),
                key: "price_column".into(),
                reason: "must be one of open, high, low, close".into(),
            });
        }
        if feature_columns.is_empty() {
            return Err(TradesimError::ConfigInvalid {
                section: "data".into(),
                key: "feature_columns".into(),
                reason: "must name at least one column".into(),
            });
        }
        let features = feature_columns
            .iter()
            .map(|name| {
                Column::parse(name).ok_or_else(|| TradesimError::ConfigInvalid {
                    section: "data".into(),
                    key: "feature_columns".into(),
                    reason: format!("unknown column '{name}'"),
                })
            })
            .collect::<Result<Vec<Column>, TradesimError>>()?;

        Ok(Self {
            data_dir,
            price_column: price,
            feature_columns: features,
        })
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.data_dir.join(format!("{}.csv", symbol))
    }

    fn parse_rows(content: &str) -> Result<Vec<CsvRow>, TradesimError> {
        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut rows = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| TradesimError::Data {
                reason: format!("CSV parse error: {}", e),
            })?;

            let date_str = record.get(0).ok_or_else(|| TradesimError::Data {
                reason: "missing date column".into(),
            })?;
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                TradesimError::Data {
                    reason: format!("invalid date '{}': {}", date_str, e),
                }
            })?;

            let open: f64 = record
                .get(1)
                .ok_or_else(|| TradesimError::Data {
                    reason: "missing open column".into(),
                })?
                .parse()
                .map_err(|e| TradesimError::Data {
                    reason: format!("invalid open value: {}", e),
                })?;

            let high: f64 = record
                .get(2)
                .ok_or_else(|| TradesimError::Data {
                    reason: "missing high column".into(),
                })?
                .parse()
                .map_err(|e| TradesimError::Data {
                    reason: format!("invalid high value: {}", e),
                })?;

            let low: f64 = record
                .get(3)
                .ok_or_else(|| TradesimError::Data {
                    reason: "missing low column".into(),
                })?
                .parse()
                .map_err(|e| TradesimError::Data {
                    reason: format!("invalid low value: {}", e),
                })?;

            let close: f64 = record
                .get(4)
                .ok_or_else(|| TradesimError::Data {
                    reason: "missing close column".into(),
                })?
                .parse()
                .map_err(|e| TradesimError::Data {
                    reason: format!("invalid close value: {}", e),
                })?;

            let volume: f64 = record
                .get(5)
                .ok_or_else(|| TradesimError::Data {
                    reason: "missing volume column".into(),
                })?
                .parse()
                .map_err(|e| TradesimError::Data {
                    reason: format!("invalid volume value: {}", e),
                })?;

            rows.push(CsvRow {
                date,
                open,
                high,
                low,
                close,
                volume,
            });
        }

        rows.sort_by_key(|r| r.date);
        Ok(rows)
    }
}

impl MarketDataPort for CsvDataAdapter {
    fn load_frame(&self, symbol: &str) -> Result<MarketFrame, TradesimError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path).map_err(|e| TradesimError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let rows = Self::parse_rows(&content)?;

        let dates = rows.iter().map(|r| r.date).collect();
        let prices = rows.iter().map(|r| self.price_column.of(r)).collect();
        let features = rows
            .iter()
            .map(|r| self.feature_columns.iter().map(|c| c.of(r)).collect())
            .collect();

        MarketFrame::new(symbol.to_string(), Some(dates), prices, features)
    }
}
