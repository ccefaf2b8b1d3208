//! Episode engine: the tick-level state machine that drives one simulation.
//!
//! The position state machine lives in `policy`; this is the outer loop that
//! advances ticks, applies transitions, pays rewards, and enforces the
//! termination rules (end of data, loss limit).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::domain::error::TradesimError;
use crate::domain::frame::MarketFrame;
use crate::domain::market::{Action, Position};
use crate::domain::policy::{PolicyVariant, TransitionRecord, TransitionTable};
use crate::domain::reward::{self, ProfitPolicy, RewardTiming};
use crate::ports::event_port::EventPort;

/// Parameters fixed for the lifetime of an engine.
#[derive(Debug, Clone)]
pub struct EpisodeConfig {
    pub window_size: usize,
    pub policy_variant: PolicyVariant,
    pub reward_timing: RewardTiming,
    pub profit_policy: ProfitPolicy,
    pub leverage: f64,
    pub max_loss: Option<f64>,
    pub hold_penalty_ticks: Option<u32>,
    pub augment_observation: bool,
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        EpisodeConfig {
            window_size: 10,
            policy_variant: PolicyVariant::TwoState,
            reward_timing: RewardTiming::TradeEnd,
            profit_policy: ProfitPolicy::Disabled,
            leverage: 1.0,
            max_loss: None,
            hold_penalty_ticks: None,
            augment_observation: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeStatus {
    Running,
    Done,
}

/// A fixed-shape window of feature rows ending just before the current tick,
/// optionally led by a `[position index, last deal reward]` context row.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub context: Option<[f64; 2]>,
    pub rows: Vec<Vec<f64>>,
}

impl Observation {
    /// Row-major flattening, context row first when present.
    pub fn flatten(&self) -> Vec<f64> {
        let mut values = Vec::new();
        if let Some(context) = self.context {
            values.extend_from_slice(&context);
        }
        for row in &self.rows {
            values.extend_from_slice(row);
        }
        values
    }
}

/// Terminal bookkeeping, reported once on the final step.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSummary {
    pub position_history: BTreeMap<usize, Position>,
    pub action_history: Vec<Action>,
    pub trade_count: usize,
}

/// Running totals returned on every step; `summary` is present only on the
/// terminal step.
#[derive(Debug, Clone)]
pub struct StepInfo {
    pub total_reward: f64,
    pub total_profit: f64,
    pub position: Position,
    pub summary: Option<EpisodeSummary>,
}

#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub observation: Observation,
    pub reward: f64,
    pub done: bool,
    pub info: StepInfo,
}

/// Structured events emitted to the configured sink, replacing process-wide
/// logging in the episode loop.
#[derive(Debug, Clone)]
pub enum EpisodeEvent {
    Reset {
        start_tick: usize,
        position: Position,
    },
    Transition {
        tick: usize,
        record: TransitionRecord,
    },
    Reward {
        tick: usize,
        step_reward: f64,
        total_reward: f64,
        deal_reward: f64,
    },
    Finished {
        tick: usize,
        total_reward: f64,
        total_profit: f64,
        trade_count: usize,
    },
}

/// One episode over one market frame.
///
/// Strictly sequential: construction performs the initial reset, `step`
/// mutates exactly once per call, and a finished episode rejects further
/// steps until the next reset. The frame is shared read-only, so parallel
/// rollouts use one engine per episode over the same `Arc<MarketFrame>`.
pub struct EpisodeEngine {
    frame: Arc<MarketFrame>,
    config: EpisodeConfig,
    table: TransitionTable,
    events: Option<Box<dyn EventPort>>,
    start_tick: usize,
    end_tick: usize,
    status: EpisodeStatus,
    current_tick: usize,
    last_trade_tick: usize,
    position: Position,
    total_reward: f64,
    total_profit: f64,
    last_deal_reward: f64,
    deal_accrued: f64,
    trade_count: usize,
    action_history: Vec<Action>,
    position_history: BTreeMap<usize, Position>,
}

// Manual impl because `events` holds a `Box<dyn EventPort>`, which has no
// `Debug` bound.
impl fmt::Debug for EpisodeEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EpisodeEngine")
            .field("config", &self.config)
            .field("start_tick", &self.start_tick)
            .field("end_tick", &self.end_tick)
            .field("status", &self.status)
            .field("current_tick", &self.current_tick)
            .field("last_trade_tick", &self.last_trade_tick)
            .field("position", &self.position)
            .field("total_reward", &self.total_reward)
            .field("total_profit", &self.total_profit)
            .field("last_deal_reward", &self.last_deal_reward)
            .field("deal_accrued", &self.deal_accrued)
            .field("trade_count", &self.trade_count)
            .finish_non_exhaustive()
    }
}

impl EpisodeEngine {
    /// Validate the configuration against the frame and build a running
    /// engine positioned at the start tick.
    pub fn new(frame: Arc<MarketFrame>, config: EpisodeConfig) -> Result<Self, TradesimError> {
        if config.window_size == 0 {
            return Err(TradesimError::InvalidConfiguration {
                field: "window_size".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if !config.leverage.is_finite() || config.leverage <= 0.0 {
            return Err(TradesimError::InvalidConfiguration {
                field: "leverage".into(),
                reason: "must be a positive finite number".into(),
            });
        }
        if let Some(max_loss) = config.max_loss {
            if !max_loss.is_finite() || max_loss <= 0.0 {
                return Err(TradesimError::InvalidConfiguration {
                    field: "max_loss".into(),
                    reason: "must be a positive finite number".into(),
                });
            }
        }
        if frame.len() < config.window_size + 2 {
            return Err(TradesimError::InvalidConfiguration {
                field: "window_size".into(),
                reason: format!(
                    "frame has {} rows, need at least {} for window size {}",
                    frame.len(),
                    config.window_size + 2,
                    config.window_size
                ),
            });
        }
        if config.profit_policy == ProfitPolicy::Compounding
            && frame.prices.iter().any(|&price| price <= 0.0)
        {
            return Err(TradesimError::InvalidConfiguration {
                field: "profit".into(),
                reason: "compounding profit requires strictly positive prices".into(),
            });
        }

        let table = TransitionTable::new(config.policy_variant, config.hold_penalty_ticks)?;
        let start_tick = config.window_size;
        let end_tick = frame.len() - 1;
        let initial_position = config.policy_variant.initial_position();

        let mut engine = EpisodeEngine {
            frame,
            config,
            table,
            events: None,
            start_tick,
            end_tick,
            status: EpisodeStatus::Running,
            current_tick: start_tick,
            last_trade_tick: start_tick - 1,
            position: initial_position,
            total_reward: 0.0,
            total_profit: 1.0,
            last_deal_reward: 0.0,
            deal_accrued: 0.0,
            trade_count: 0,
            action_history: Vec::new(),
            position_history: BTreeMap::new(),
        };
        engine.reset();
        Ok(engine)
    }

    /// Attach a sink for structured step events.
    pub fn with_event_sink(mut self, events: Box<dyn EventPort>) -> Self {
        self.events = Some(events);
        self
    }

    /// Reinitialize all episode state and return the initial observation.
    pub fn reset(&mut self) -> Observation {
        self.status = EpisodeStatus::Running;
        self.current_tick = self.start_tick;
        self.last_trade_tick = self.start_tick - 1;
        self.position = self.config.policy_variant.initial_position();
        self.total_reward = 0.0;
        self.total_profit = 1.0;
        self.last_deal_reward = 0.0;
        self.deal_accrued = 0.0;
        self.trade_count = 0;
        self.action_history =
            vec![self.config.policy_variant.neutral_action(); self.config.window_size + 1];
        self.position_history = BTreeMap::new();
        self.emit(EpisodeEvent::Reset {
            start_tick: self.start_tick,
            position: self.position,
        });
        self.observation()
    }

    /// Advance the episode by one tick.
    ///
    /// 1. Reject unknown (position, action) pairs and finished episodes
    ///    before any state changes.
    /// 2. Advance the tick and log the action.
    /// 3. Mark the episode done at the final tick, or when the loss limit
    ///    was already breached by earlier steps.
    /// 4. Price the open deal and pay the step reward per the timing policy;
    ///    settlement also runs on the terminal step so open positions close
    ///    out. A stagnant position past its threshold returns -1 without
    ///    touching the total.
    /// 5. Apply the transition: record position changes in the sparse
    ///    history, and on a trade start move the trade anchor and bump the
    ///    trade count.
    pub fn step(&mut self, action: Action) -> Result<StepOutcome, TradesimError> {
        if self.status == EpisodeStatus::Done {
            return Err(TradesimError::EpisodeFinished);
        }
        let record = *self.table.lookup(self.position, action)?;

        self.current_tick += 1;
        self.action_history.push(action);

        let mut done = self.current_tick == self.end_tick;
        if let Some(max_loss) = self.config.max_loss {
            if self.total_reward < -max_loss {
                done = true;
            }
        }
        self.emit(EpisodeEvent::Transition {
            tick: self.current_tick,
            record,
        });

        self.last_deal_reward = reward::deal_reward(
            record.old_position,
            &self.frame.prices,
            self.current_tick,
            self.last_trade_tick,
            self.config.leverage,
        );
        let settled = record.is_trade_end || done;
        let step_reward = match self.config.reward_timing {
            RewardTiming::TradeEnd => {
                if settled {
                    self.total_reward += self.last_deal_reward;
                    self.last_deal_reward
                } else if self.stagnant(&record) {
                    -1.0
                } else {
                    0.0
                }
            }
            RewardTiming::EveryTick => {
                let increment = if settled {
                    // true the deal up against its start price, so per-trade
                    // totals equal the trade-end settlement exactly
                    let remainder = self.last_deal_reward - self.deal_accrued;
                    self.deal_accrued = 0.0;
                    remainder
                } else {
                    let increment = reward::tick_reward(
                        record.old_position,
                        &self.frame.prices,
                        self.current_tick,
                        self.config.leverage,
                    );
                    self.deal_accrued += increment;
                    increment
                };
                self.total_reward += increment;
                increment
            }
        };
        if settled
            && self.config.profit_policy == ProfitPolicy::Compounding
            && !record.old_position.is_flat()
        {
            self.total_profit *= reward::trade_profit_factor(
                record.old_position,
                self.frame.price(self.last_trade_tick),
                self.frame.price(self.current_tick),
                self.config.leverage,
            );
        }
        self.emit(EpisodeEvent::Reward {
            tick: self.current_tick,
            step_reward,
            total_reward: self.total_reward,
            deal_reward: self.last_deal_reward,
        });

        self.position = record.new_position;
        if record.old_position != record.new_position {
            self.position_history.insert(self.current_tick, self.position);
            if record.is_trade_start {
                self.last_trade_tick = self.current_tick;
                self.deal_accrued = 0.0;
                self.trade_count += 1;
            }
        }

        if done {
            self.status = EpisodeStatus::Done;
            self.emit(EpisodeEvent::Finished {
                tick: self.current_tick,
                total_reward: self.total_reward,
                total_profit: self.total_profit,
                trade_count: self.trade_count,
            });
        }

        let info = StepInfo {
            total_reward: self.total_reward,
            total_profit: self.total_profit,
            position: self.position,
            summary: done.then(|| self.summary()),
        };
        Ok(StepOutcome {
            observation: self.observation(),
            reward: step_reward,
            done,
            info,
        })
    }

    /// Decode and apply a raw action index. Decoding failures surface before
    /// any state changes.
    pub fn step_index(&mut self, index: usize) -> Result<StepOutcome, TradesimError> {
        let action = Action::from_index(index)?;
        self.step(action)
    }

    /// Best achievable profit over this engine's tick range, for baseline
    /// comparison. Unavailable while profit accounting is disabled.
    pub fn max_possible_profit(&self) -> Result<f64, TradesimError> {
        match self.config.profit_policy {
            ProfitPolicy::Disabled => Err(TradesimError::ProfitNotImplemented),
            ProfitPolicy::Compounding => Ok(reward::max_possible_profit(
                &self.frame.prices,
                self.start_tick,
                self.end_tick,
                self.config.leverage,
            )),
        }
    }

    pub fn status(&self) -> EpisodeStatus {
        self.status
    }

    pub fn current_tick(&self) -> usize {
        self.current_tick
    }

    pub fn start_tick(&self) -> usize {
        self.start_tick
    }

    pub fn end_tick(&self) -> usize {
        self.end_tick
    }

    pub fn current_position(&self) -> Position {
        self.position
    }

    pub fn total_reward(&self) -> f64 {
        self.total_reward
    }

    pub fn total_profit(&self) -> f64 {
        self.total_profit
    }

    pub fn trade_count(&self) -> usize {
        self.trade_count
    }

    pub fn config(&self) -> &EpisodeConfig {
        &self.config
    }

    fn stagnant(&self, record: &TransitionRecord) -> bool {
        match record.hold_penalty_ticks {
            Some(threshold) => self.current_tick - self.last_trade_tick > threshold as usize,
            None => false,
        }
    }

    fn observation(&self) -> Observation {
        let rows = self
            .frame
            .window(self.current_tick, self.config.window_size)
            .to_vec();
        let context = self
            .config
            .augment_observation
            .then(|| [self.position.index() as f64, self.last_deal_reward]);
        Observation { context, rows }
    }

    fn summary(&self) -> EpisodeSummary {
        EpisodeSummary {
            position_history: self.position_history.clone(),
            action_history: self.action_history.clone(),
            trade_count: self.trade_count,
        }
    }

    fn emit(&self, event: EpisodeEvent) {
        if let Some(events) = &self.events {
            events.record(&event);
        }
    }
}
