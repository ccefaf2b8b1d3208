//! Market data access port trait.

use crate::domain::error::TradesimError;
use crate::domain::frame::MarketFrame;

/// Port for loading the price/feature frame an episode runs over.
pub trait MarketDataPort {
    fn load_frame(&self, symbol: &str) -> Result<MarketFrame, TradesimError>;
}
