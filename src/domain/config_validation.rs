//! Configuration validation.
//!
//! Checks the full INI surface before anything is loaded or simulated, so a
//! bad config fails with a section/key error instead of partway through a
//! rollout.

use crate::domain::error::TradesimError;
use crate::domain::policy::PolicyVariant;
use crate::domain::reward::{ProfitPolicy, RewardTiming};
use crate::ports::config_port::ConfigPort;

const PRICE_COLUMNS: [&str; 4] = ["open", "high", "low", "close"];
const FEATURE_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    validate_data_config(config)?;
    validate_episode_config(config)?;
    validate_rollout_config(config)?;
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    validate_dir(config)?;
    validate_symbol(config)?;
    validate_price_column(config)?;
    validate_feature_columns(config)?;
    Ok(())
}

pub fn validate_episode_config(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    validate_window_size(config)?;
    validate_policy_variant(config)?;
    validate_reward_timing(config)?;
    validate_profit(config)?;
    validate_leverage(config)?;
    validate_max_loss(config)?;
    validate_hold_penalty_ticks(config)?;
    Ok(())
}

pub fn validate_rollout_config(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    validate_episodes(config)?;
    validate_seed(config)?;
    Ok(())
}

fn validate_dir(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    match config.get_string("data", "dir") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(TradesimError::ConfigMissing {
            section: "data".to_string(),
            key: "dir".to_string(),
        }),
    }
}

fn validate_symbol(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    match config.get_string("data", "symbol") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(TradesimError::ConfigMissing {
            section: "data".to_string(),
            key: "symbol".to_string(),
        }),
    }
}

fn validate_price_column(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    let Some(value) = config.get_string("data", "price_column") else {
        return Ok(());
    };
    if PRICE_COLUMNS.contains(&value.trim().to_lowercase().as_str()) {
        Ok(())
    } else {
        Err(TradesimError::ConfigInvalid {
            section: "data".to_string(),
            key: "price_column".to_string(),
            reason: format!("'{value}' is not one of open, high, low, close"),
        })
    }
}

fn validate_feature_columns(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    let Some(value) = config.get_string("data", "feature_columns") else {
        return Ok(());
    };
    let names: Vec<&str> = value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if names.is_empty() {
        return Err(TradesimError::ConfigInvalid {
            section: "data".to_string(),
            key: "feature_columns".to_string(),
            reason: "must name at least one column".to_string(),
        });
    }
    for name in names {
        if !FEATURE_COLUMNS.contains(&name.to_lowercase().as_str()) {
            return Err(TradesimError::ConfigInvalid {
                section: "data".to_string(),
                key: "feature_columns".to_string(),
                reason: format!("'{name}' is not one of open, high, low, close, volume"),
            });
        }
    }
    Ok(())
}

fn validate_window_size(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    let value = config.get_int_or("episode", "window_size", 10);
    if value < 1 {
        return Err(TradesimError::ConfigInvalid {
            section: "episode".to_string(),
            key: "window_size".to_string(),
            reason: "window_size must be at least 1".to_string(),
        });
    }
    Ok(())
}

fn validate_policy_variant(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    let Some(value) = config.get_string("episode", "policy_variant") else {
        return Ok(());
    };
    value
        .parse::<PolicyVariant>()
        .map(|_| ())
        .map_err(|_| TradesimError::ConfigInvalid {
            section: "episode".to_string(),
            key: "policy_variant".to_string(),
            reason: format!(
                "unknown variant '{value}', expected one of two_state, two_state_hold, \
                 three_state_hold, three_state"
            ),
        })
}

fn validate_reward_timing(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    let Some(value) = config.get_string("episode", "reward_timing") else {
        return Ok(());
    };
    value
        .parse::<RewardTiming>()
        .map(|_| ())
        .map_err(|_| TradesimError::ConfigInvalid {
            section: "episode".to_string(),
            key: "reward_timing".to_string(),
            reason: format!("unknown timing '{value}', expected trade_end or every_tick"),
        })
}

fn validate_profit(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    let Some(value) = config.get_string("episode", "profit") else {
        return Ok(());
    };
    value
        .parse::<ProfitPolicy>()
        .map(|_| ())
        .map_err(|_| TradesimError::ConfigInvalid {
            section: "episode".to_string(),
            key: "profit".to_string(),
            reason: format!("unknown policy '{value}', expected disabled or compounding"),
        })
}

fn validate_leverage(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    let value = config.get_double_or("episode", "leverage", 1.0);
    if !value.is_finite() || value <= 0.0 {
        return Err(TradesimError::ConfigInvalid {
            section: "episode".to_string(),
            key: "leverage".to_string(),
            reason: "leverage must be positive".to_string(),
        });
    }
    Ok(())
}

fn validate_max_loss(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    let Some(value) = config.get_string("episode", "max_loss") else {
        return Ok(());
    };
    let parsed: f64 = value
        .trim()
        .parse()
        .map_err(|_| TradesimError::ConfigInvalid {
            section: "episode".to_string(),
            key: "max_loss".to_string(),
            reason: "max_loss must be a number".to_string(),
        })?;
    if !parsed.is_finite() || parsed <= 0.0 {
        return Err(TradesimError::ConfigInvalid {
            section: "episode".to_string(),
            key: "max_loss".to_string(),
            reason: "max_loss must be positive".to_string(),
        });
    }
    Ok(())
}

fn validate_hold_penalty_ticks(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    let Some(value) = config.get_string("episode", "hold_penalty_ticks") else {
        return Ok(());
    };
    value
        .trim()
        .parse::<u32>()
        .map(|_| ())
        .map_err(|_| TradesimError::ConfigInvalid {
            section: "episode".to_string(),
            key: "hold_penalty_ticks".to_string(),
            reason: "hold_penalty_ticks must be a non-negative integer".to_string(),
        })
}

fn validate_episodes(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    let value = config.get_int_or("rollout", "episodes", 1);
    if value < 1 {
        return Err(TradesimError::ConfigInvalid {
            section: "rollout".to_string(),
            key: "episodes".to_string(),
            reason: "episodes must be at least 1".to_string(),
        });
    }
    Ok(())
}

fn validate_seed(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    let Some(value) = config.get_string("rollout", "seed") else {
        return Ok(());
    };
    value
        .trim()
        .parse::<u64>()
        .map(|_| ())
        .map_err(|_| TradesimError::ConfigInvalid {
            section: "rollout".to_string(),
            key: "seed".to_string(),
            reason: "seed must be an unsigned integer".to_string(),
        })
}
