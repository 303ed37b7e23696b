//! Relay board configuration.

use super::state::Polarity;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the relay board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoardConfig {
    /// Physical line driving each relay; index 0 is relay 1
    pub lines: Vec<u8>,
    /// Consumer label attached to line requests
    pub consumer: String,
    /// How logical states map onto line levels
    pub polarity: Polarity,
    /// Upper bound on driving a line, in milliseconds; `None` drives inline without a bound
    pub hardware_timeout_ms: Option<u64>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            lines: crate::DEFAULT_LINES.to_vec(),
            consumer: crate::DEFAULT_CONSUMER.to_string(),
            polarity: Polarity::default(),
            hardware_timeout_ms: Some(crate::DEFAULT_HARDWARE_TIMEOUT_MS),
        }
    }
}

impl BoardConfig {
    /// Create a board configuration for the given line mapping.
    pub fn new(lines: impl Into<Vec<u8>>) -> Self {
        Self {
            lines: lines.into(),
            ..Default::default()
        }
    }

    /// Set the consumer label.
    pub fn with_consumer(mut self, consumer: impl Into<String>) -> Self {
        self.consumer = consumer.into();
        self
    }

    /// Set the board polarity.
    pub fn with_polarity(mut self, polarity: Polarity) -> Self {
        self.polarity = polarity;
        self
    }

    /// Bound every line drive, or drive without a bound when `None`.
    pub fn with_hardware_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.hardware_timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    pub fn hardware_timeout(&self) -> Option<Duration> {
        self.hardware_timeout_ms.map(Duration::from_millis)
    }
}
