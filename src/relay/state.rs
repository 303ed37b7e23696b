//! Logical relay states, physical line levels, and the polarity joining them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Commanded state of a relay, as seen by users of the board.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LogicalState {
    /// Relay energized
    On,
    /// Relay released
    #[default]
    Off,
}

impl LogicalState {
    /// The opposite state.
    pub fn inverted(self) -> Self {
        match self {
            Self::On => Self::Off,
            Self::Off => Self::On,
        }
    }

    /// `"1"` for ON and `"0"` for OFF, the body of the status endpoint.
    pub fn as_flag(self) -> &'static str {
        match self {
            Self::On => "1",
            Self::Off => "0",
        }
    }
}

impl fmt::Display for LogicalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::On => f.write_str("ON"),
            Self::Off => f.write_str("OFF"),
        }
    }
}

/// Electrical level driven onto a physical output line.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PhysicalLevel {
    /// Level 0
    Low,
    /// Level 1
    High,
}

impl PhysicalLevel {
    pub fn as_bit(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::High => 1,
        }
    }
}

/// How the board wires logical states to line levels.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Level 0 switches the relay on. The ELEGOO 16-channel board works this way.
    #[default]
    ActiveLow,
    /// Level 1 switches the relay on.
    ActiveHigh,
}

impl Polarity {
    /// Translate a logical state into the level that produces it on this board.
    pub fn level_for(self, state: LogicalState) -> PhysicalLevel {
        match (self, state) {
            (Self::ActiveLow, LogicalState::On) | (Self::ActiveHigh, LogicalState::Off) => {
                PhysicalLevel::Low
            }
            (Self::ActiveLow, LogicalState::Off) | (Self::ActiveHigh, LogicalState::On) => {
                PhysicalLevel::High
            }
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ActiveLow => f.write_str("active-low"),
            Self::ActiveHigh => f.write_str("active-high"),
        }
    }
}
