//! Transition tables mapping (position, action) pairs to new positions.
//!
//! A table is data: an explicit list of rules assembled once per policy
//! variant at construction time. Trade-boundary flags are derived from the
//! variant's boundary rule, never stored independently of it, so one table
//! can never mix classification rules.

use std::fmt;
use std::str::FromStr;

use crate::domain::error::TradesimError;
use crate::domain::market::{Action, Position};

/// How trade boundaries are derived from a position change. One rule applies
/// uniformly to a whole table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryRule {
    /// Any position change both ends the old trade and starts the new one.
    /// Two-state tables use this: a flip is the only way to exit a position,
    /// so the flip tick settles the old trade and opens the next.
    AnyChange,
    /// Only crossings of the flat state are boundaries: leaving `Out` starts
    /// a trade, returning to `Out` ends one. Three-state tables use this, so
    /// an exit such as short + buy -> out is an end and never also a start.
    FlatCrossing,
}

impl BoundaryRule {
    pub fn is_trade_start(&self, old: Position, new: Position) -> bool {
        match self {
            BoundaryRule::AnyChange => old != new,
            BoundaryRule::FlatCrossing => old.is_flat() && !new.is_flat(),
        }
    }

    pub fn is_trade_end(&self, old: Position, new: Position) -> bool {
        match self {
            BoundaryRule::AnyChange => old != new,
            BoundaryRule::FlatCrossing => !old.is_flat() && new.is_flat(),
        }
    }
}

/// Selects which transition table drives the episode.
///
/// The two-state variants know only long and short; the three-state variants
/// add the flat `Out` position. The `Hold` variants define an explicit
/// keep-position action alongside the order actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyVariant {
    TwoState,
    TwoStateHold,
    ThreeStateHold,
    ThreeState,
}

impl PolicyVariant {
    pub fn boundary_rule(&self) -> BoundaryRule {
        match self {
            PolicyVariant::TwoState | PolicyVariant::TwoStateHold => BoundaryRule::AnyChange,
            PolicyVariant::ThreeStateHold | PolicyVariant::ThreeState => BoundaryRule::FlatCrossing,
        }
    }

    /// The position an episode starts in.
    pub fn initial_position(&self) -> Position {
        match self {
            PolicyVariant::TwoState | PolicyVariant::TwoStateHold => Position::Short,
            PolicyVariant::ThreeStateHold | PolicyVariant::ThreeState => Position::Out,
        }
    }

    /// The self-loop action used to seed the action history on reset. Always
    /// maps the initial position back onto itself.
    pub fn neutral_action(&self) -> Action {
        match self {
            PolicyVariant::TwoState | PolicyVariant::TwoStateHold => Action::Sell,
            PolicyVariant::ThreeStateHold => Action::Hold,
            PolicyVariant::ThreeState => Action::Close,
        }
    }

    /// The actions this variant defines rules for, in index order.
    pub fn actions(&self) -> &'static [Action] {
        match self {
            PolicyVariant::TwoState => &[Action::Buy, Action::Sell],
            PolicyVariant::TwoStateHold => &[Action::Buy, Action::Sell, Action::Hold],
            PolicyVariant::ThreeStateHold => {
                &[Action::Buy, Action::Sell, Action::Close, Action::Hold]
            }
            PolicyVariant::ThreeState => &[Action::Buy, Action::Sell, Action::Close],
        }
    }

    /// The positions reachable under this variant.
    pub fn positions(&self) -> &'static [Position] {
        match self {
            PolicyVariant::TwoState | PolicyVariant::TwoStateHold => {
                &[Position::Long, Position::Short]
            }
            PolicyVariant::ThreeStateHold | PolicyVariant::ThreeState => {
                &[Position::Long, Position::Short, Position::Out]
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyVariant::TwoState => "two_state",
            PolicyVariant::TwoStateHold => "two_state_hold",
            PolicyVariant::ThreeStateHold => "three_state_hold",
            PolicyVariant::ThreeState => "three_state",
        }
    }
}

impl FromStr for PolicyVariant {
    type Err = TradesimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "two_state" => Ok(PolicyVariant::TwoState),
            "two_state_hold" => Ok(PolicyVariant::TwoStateHold),
            "three_state_hold" => Ok(PolicyVariant::ThreeStateHold),
            "three_state" => Ok(PolicyVariant::ThreeState),
            other => Err(TradesimError::InvalidConfiguration {
                field: "policy_variant".into(),
                reason: format!(
                    "unknown variant '{other}', expected one of two_state, \
                     two_state_hold, three_state_hold, three_state"
                ),
            }),
        }
    }
}

impl fmt::Display for PolicyVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One legal `(position, action) -> position` edge with derived boundary
/// flags and the optional stagnation threshold carried by the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRecord {
    pub old_position: Position,
    pub action: Action,
    pub new_position: Position,
    pub is_trade_start: bool,
    pub is_trade_end: bool,
    pub hold_penalty_ticks: Option<u32>,
}

impl fmt::Display for TransitionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} + {} -> {} (start: {}, end: {}",
            self.old_position, self.action, self.new_position, self.is_trade_start, self.is_trade_end
        )?;
        match self.hold_penalty_ticks {
            Some(ticks) => write!(f, ", penalty after {ticks} ticks)"),
            None => write!(f, ")"),
        }
    }
}

/// The validated transition table for one policy variant.
#[derive(Debug, Clone)]
pub struct TransitionTable {
    variant: PolicyVariant,
    records: Vec<TransitionRecord>,
}

impl TransitionTable {
    /// Build the table for a variant, substituting the configured stagnation
    /// threshold into the edges that carry it. Self-loop edges that re-affirm
    /// a position carry the threshold; boundary edges never do. The flat
    /// self-loop under the three-state variants carries half the threshold,
    /// and the two-state-hold variant pins redundant re-affirming orders at a
    /// zero threshold regardless of configuration.
    pub fn new(
        variant: PolicyVariant,
        hold_penalty_ticks: Option<u32>,
    ) -> Result<TransitionTable, TradesimError> {
        use Action::{Buy, Close, Hold, Sell};
        use Position::{Long, Out, Short};

        let pen = hold_penalty_ticks;
        let half = hold_penalty_ticks.map(|ticks| ticks / 2);

        let rules: &[(Position, Action, Position, Option<u32>)] = match variant {
            PolicyVariant::TwoState => &[
                (Long, Buy, Long, pen),
                (Long, Sell, Short, None),
                (Short, Buy, Long, None),
                (Short, Sell, Short, pen),
            ],
            PolicyVariant::TwoStateHold => &[
                (Long, Hold, Long, pen),
                (Long, Buy, Long, Some(0)),
                (Long, Sell, Short, None),
                (Short, Buy, Long, None),
                (Short, Sell, Short, Some(0)),
                (Short, Hold, Short, pen),
            ],
            PolicyVariant::ThreeStateHold => &[
                (Long, Hold, Long, pen),
                (Long, Buy, Long, pen),
                (Long, Sell, Out, None),
                (Long, Close, Out, None),
                (Short, Buy, Out, None),
                (Short, Sell, Short, pen),
                (Short, Close, Out, None),
                (Short, Hold, Short, pen),
                (Out, Close, Out, half),
                (Out, Buy, Long, None),
                (Out, Sell, Short, None),
                (Out, Hold, Out, None),
            ],
            PolicyVariant::ThreeState => &[
                (Long, Buy, Long, pen),
                (Long, Sell, Out, None),
                (Long, Close, Out, None),
                (Short, Buy, Out, None),
                (Short, Sell, Short, pen),
                (Short, Close, Out, None),
                (Out, Close, Out, half),
                (Out, Buy, Long, None),
                (Out, Sell, Short, None),
            ],
        };

        let rule = variant.boundary_rule();
        let mut records: Vec<TransitionRecord> = Vec::with_capacity(rules.len());
        for &(old, action, new, penalty) in rules {
            if records
                .iter()
                .any(|r| r.old_position == old && r.action == action)
            {
                return Err(TradesimError::InvalidConfiguration {
                    field: "transition table".into(),
                    reason: format!("duplicate rule for {old} + {action}"),
                });
            }
            records.push(TransitionRecord {
                old_position: old,
                action,
                new_position: new,
                is_trade_start: rule.is_trade_start(old, new),
                is_trade_end: rule.is_trade_end(old, new),
                hold_penalty_ticks: penalty,
            });
        }

        Ok(TransitionTable { variant, records })
    }

    /// Find the record for a (position, action) pair. A missing pair is a
    /// configuration or caller defect and is always fatal, never defaulted.
    pub fn lookup(
        &self,
        old_position: Position,
        action: Action,
    ) -> Result<&TransitionRecord, TradesimError> {
        self.records
            .iter()
            .find(|r| r.old_position == old_position && r.action == action)
            .ok_or(TradesimError::UnknownTransition {
                position: old_position,
                action,
            })
    }

    pub fn variant(&self) -> PolicyVariant {
        self.variant
    }

    pub fn boundary_rule(&self) -> BoundaryRule {
        self.variant.boundary_rule()
    }

    /// The actions this table defines rules for.
    pub fn action_set(&self) -> &'static [Action] {
        self.variant.actions()
    }

    /// All records in declaration order, for audit output.
    pub fn records(&self) -> &[TransitionRecord] {
        &self.records
    }
}
