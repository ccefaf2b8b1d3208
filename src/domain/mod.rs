//! Core domain types and logic.

pub mod market;
pub mod policy;
pub mod frame;
pub mod reward;
pub mod episode;
pub mod config_validation;
pub mod error;
