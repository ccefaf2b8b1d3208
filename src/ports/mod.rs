//! Port traits decoupling the domain from configuration, data, and output.

pub mod config_port;
pub mod data_port;
pub mod event_port;
