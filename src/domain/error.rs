//! Domain error types.

use crate::domain::market::{Action, Position};

/// Top-level error type for tradesim.
#[derive(Debug, thiserror::Error)]
pub enum TradesimError {
    #[error("no transition rule for position {position} with action {action}")]
    UnknownTransition { position: Position, action: Action },

    #[error("unknown action index {index}")]
    UnknownAction { index: usize },

    #[error("invalid configuration for {field}: {reason}")]
    InvalidConfiguration { field: String, reason: String },

    #[error("episode already finished, reset before stepping")]
    EpisodeFinished,

    #[error("profit accounting is not implemented for the configured policy")]
    ProfitNotImplemented,

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&TradesimError> for std::process::ExitCode {
    fn from(err: &TradesimError) -> Self {
        let code: u8 = match err {
            TradesimError::Io(_) => 1,
            TradesimError::ConfigParse { .. }
            | TradesimError::ConfigMissing { .. }
            | TradesimError::ConfigInvalid { .. }
            | TradesimError::InvalidConfiguration { .. } => 2,
            TradesimError::Data { .. } => 3,
            TradesimError::UnknownTransition { .. }
            | TradesimError::UnknownAction { .. }
            | TradesimError::EpisodeFinished
            | TradesimError::ProfitNotImplemented => 4,
        };
        std::process::ExitCode::from(code)
    }
}
