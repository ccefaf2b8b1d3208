#![allow(dead_code)]

use chrono::NaiveDate;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tradesim::domain::episode::{EpisodeConfig, EpisodeEvent};
use tradesim::domain::error::TradesimError;
use tradesim::domain::frame::MarketFrame;
use tradesim::domain::policy::PolicyVariant;
use tradesim::ports::data_port::MarketDataPort;
use tradesim::ports::event_port::EventPort;

pub struct MockDataPort {
    pub frames: HashMap<String, MarketFrame>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            frames: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_frame(mut self, symbol: &str, mut frame: MarketFrame) -> Self {
        // Real ports stamp the requested symbol onto the frame they return;
        // the mock upholds the same contract.
        frame.symbol = symbol.to_string();
        self.frames.insert(symbol.to_string(), frame);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl MarketDataPort for MockDataPort {
    fn load_frame(&self, symbol: &str) -> Result<MarketFrame, TradesimError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(TradesimError::Data {
                reason: reason.clone(),
            });
        }
        self.frames
            .get(symbol)
            .cloned()
            .ok_or_else(|| TradesimError::Data {
                reason: format!("no frame for {symbol}"),
            })
    }
}

/// Event sink that appends everything it sees to a shared log.
pub struct RecordingEventSink {
    pub events: Rc<RefCell<Vec<EpisodeEvent>>>,
}

impl RecordingEventSink {
    pub fn new() -> (Self, Rc<RefCell<Vec<EpisodeEvent>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        (
            Self {
                events: Rc::clone(&log),
            },
            log,
        )
    }
}

impl EventPort for RecordingEventSink {
    fn record(&self, event: &EpisodeEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

/// Frame with one feature column equal to the price series.
pub fn make_frame(prices: &[f64]) -> MarketFrame {
    let features = prices.iter().map(|&p| vec![p]).collect();
    MarketFrame::new("TEST".to_string(), None, prices.to_vec(), features).unwrap()
}

pub fn make_dated_frame(prices: &[f64], start_date: &str) -> MarketFrame {
    let start = NaiveDate::parse_from_str(start_date, "%Y-%m-%d").unwrap();
    let dates = (0..prices.len())
        .map(|i| start + chrono::Duration::days(i as i64))
        .collect();
    let features = prices.iter().map(|&p| vec![p]).collect();
    MarketFrame::new("TEST".to_string(), Some(dates), prices.to_vec(), features).unwrap()
}

/// Window of 1 keeps hand-computed reward arithmetic short.
pub fn sample_episode_config(variant: PolicyVariant) -> EpisodeConfig {
    EpisodeConfig {
        window_size: 1,
        policy_variant: variant,
        ..EpisodeConfig::default()
    }
}

pub fn generate_prices(count: usize, start: f64, step: f64) -> Vec<f64> {
    (0..count).map(|i| start + step * i as f64).collect()
}
