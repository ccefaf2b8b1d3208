//! Concrete adapter implementations for ports.

pub mod console_event_adapter;
pub mod csv_adapter;
pub mod file_config_adapter;
