//! tradesim — tick-level trading episode simulator.
//!
//! Replays a recorded price series one tick at a time while an agent submits
//! buy/sell/close/hold decisions, scored under configurable position policies
//! and reward timings.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in
//! [`ports`], concrete implementations in [`adapters`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
