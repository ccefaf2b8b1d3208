//! Position and action vocabulary for the episode simulator.

use std::fmt;

use crate::domain::error::TradesimError;

/// The trader's market stance at a tick. Two-state policies use only
/// `Long`/`Short`; three-state policies add the flat `Out` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    Long,
    Short,
    Out,
}

impl Position {
    /// Stable integer encoding, used in observations and histories.
    pub fn index(&self) -> usize {
        match self {
            Position::Long => 0,
            Position::Short => 1,
            Position::Out => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Position> {
        match index {
            0 => Some(Position::Long),
            1 => Some(Position::Short),
            2 => Some(Position::Out),
            _ => None,
        }
    }

    /// Directional sign for reward math: +1 long, -1 short, 0 flat.
    pub fn direction(&self) -> f64 {
        match self {
            Position::Long => 1.0,
            Position::Short => -1.0,
            Position::Out => 0.0,
        }
    }

    pub fn is_flat(&self) -> bool {
        matches!(self, Position::Out)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Position::Long => "long",
            Position::Short => "short",
            Position::Out => "out",
        };
        write!(f, "{name}")
    }
}

/// A discrete trading decision supplied by the caller each tick. `Close` is
/// the explicit exit-to-flat order; `Hold` keeps the current position. Each
/// policy variant admits a subset of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Buy,
    Sell,
    Close,
    Hold,
}

impl Action {
    /// Stable integer encoding, matching the caller-facing action space.
    pub fn index(&self) -> usize {
        match self {
            Action::Buy => 0,
            Action::Sell => 1,
            Action::Close => 2,
            Action::Hold => 3,
        }
    }

    /// Decode a caller-supplied action index. Indices outside the
    /// enumeration are an input defect, reported before any state changes.
    pub fn from_index(index: usize) -> Result<Action, TradesimError> {
        match index {
            0 => Ok(Action::Buy),
            1 => Ok(Action::Sell),
            2 => Ok(Action::Close),
            3 => Ok(Action::Hold),
            _ => Err(TradesimError::UnknownAction { index }),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Buy => "buy",
            Action::Sell => "sell",
            Action::Close => "close",
            Action::Hold => "hold",
        };
        write!(f, "{name}")
    }
}
