//! Reward and profit arithmetic for episode accounting.
//!
//! Everything here is a pure function of the price series and tick
//! references. Accumulation into episode totals belongs to the engine.

use std::fmt;
use std::str::FromStr;

use crate::domain::error::TradesimError;
use crate::domain::market::Position;

/// When step rewards are paid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewardTiming {
    /// Pay nothing until a trade ends (or the episode terminates), then pay
    /// the whole-deal mark-to-market at once.
    TradeEnd,
    /// Pay the one-tick mark-to-market increment every open tick, and on
    /// settlement pay the remainder against the deal's start price, so
    /// per-trade and terminal totals match the trade-end timing exactly.
    EveryTick,
}

impl RewardTiming {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardTiming::TradeEnd => "trade_end",
            RewardTiming::EveryTick => "every_tick",
        }
    }
}

impl FromStr for RewardTiming {
    type Err = TradesimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trade_end" => Ok(RewardTiming::TradeEnd),
            "every_tick" => Ok(RewardTiming::EveryTick),
            other => Err(TradesimError::InvalidConfiguration {
                field: "reward_timing".into(),
                reason: format!("unknown timing '{other}', expected trade_end or every_tick"),
            }),
        }
    }
}

impl fmt::Display for RewardTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How `total_profit` is maintained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfitPolicy {
    /// The contract exists but no accounting runs: `total_profit` stays at
    /// the 1.0 unit baseline and the best-profit oracle is unavailable.
    Disabled,
    /// Unit-based multiplicative profit, compounded per realized trade.
    Compounding,
}

impl ProfitPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfitPolicy::Disabled => "disabled",
            ProfitPolicy::Compounding => "compounding",
        }
    }
}

impl FromStr for ProfitPolicy {
    type Err = TradesimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disabled" => Ok(ProfitPolicy::Disabled),
            "compounding" => Ok(ProfitPolicy::Compounding),
            other => Err(TradesimError::InvalidConfiguration {
                field: "profit".into(),
                reason: format!("unknown policy '{other}', expected disabled or compounding"),
            }),
        }
    }
}

impl fmt::Display for ProfitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whole-deal mark-to-market of the position held before a transition: the
/// price move since the trade's start tick, signed by direction and scaled
/// by leverage. Zero for a flat position.
pub fn deal_reward(
    old_position: Position,
    prices: &[f64],
    current_tick: usize,
    last_trade_tick: usize,
    leverage: f64,
) -> f64 {
    let price_diff = prices[current_tick] - prices[last_trade_tick];
    old_position.direction() * price_diff * leverage
}

/// One-tick mark-to-market increment for the every-tick timing.
pub fn tick_reward(
    old_position: Position,
    prices: &[f64],
    current_tick: usize,
    leverage: f64,
) -> f64 {
    let price_diff = prices[current_tick] - prices[current_tick - 1];
    old_position.direction() * price_diff * leverage
}

/// Multiplicative factor a closed trade applies to the unit profit. Entry
/// prices must be strictly positive; enforced at engine construction.
pub fn trade_profit_factor(
    old_position: Position,
    entry_price: f64,
    exit_price: f64,
    leverage: f64,
) -> f64 {
    1.0 + old_position.direction() * leverage * (exit_price - entry_price) / entry_price
}

/// Best achievable multiplicative profit over `[start_tick, end_tick]`,
/// ignoring transaction costs: shorts every maximal falling run and longs
/// every maximal rising run. Pure look-ahead baseline, independent of any
/// episode state. A flat slice yields the 1.0 no-trade baseline.
pub fn max_possible_profit(
    prices: &[f64],
    start_tick: usize,
    end_tick: usize,
    leverage: f64,
) -> f64 {
    let mut profit = 1.0;
    let mut tick = start_tick;
    while tick < end_tick {
        let entry = tick;
        if prices[tick + 1] < prices[tick] {
            while tick < end_tick && prices[tick + 1] < prices[tick] {
                tick += 1;
            }
            profit *= trade_profit_factor(Position::Short, prices[entry], prices[tick], leverage);
        } else {
            while tick < end_tick && prices[tick + 1] >= prices[tick] {
                tick += 1;
            }
            profit *= trade_profit_factor(Position::Long, prices[entry], prices[tick], leverage);
        }
    }
    profit
}
