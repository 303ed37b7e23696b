//! Error handling for the relay board crate.

/// A specialized `Result` type for relay board operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// The main error type for relay board operations.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The board cannot be operated with the supplied configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Relay number outside `1..=count`, or not a number at all
    #[error("Invalid relay '{relay}': expected a number between 1 and {count}")]
    InvalidPort { relay: String, count: usize },

    /// Line acquisition or drive failed
    #[error("Hardware error on relay {relay} (line {line}): {message}")]
    Hardware {
        relay: usize,
        line: u8,
        message: String,
    },

    /// Driving a line did not finish within the board's hardware timeout
    #[error("Hardware timeout on relay {relay} (line {line}): no response within {timeout_ms}ms")]
    HardwareTimeout {
        relay: usize,
        line: u8,
        timeout_ms: u64,
    },

    /// Some relays of a bulk switch failed; the others were switched
    #[error("Failed to switch {} of {total} relays: {failed:?}", .failed.len())]
    PartialSwitch { failed: Vec<usize>, total: usize },

    /// Web server error
    #[error("Web server error: {0}")]
    WebServer(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new invalid relay error from whatever the caller supplied
    pub fn invalid_port(relay: impl ToString, count: usize) -> Self {
        Self::InvalidPort {
            relay: relay.to_string(),
            count,
        }
    }

    /// Create a new hardware error for a relay and its line
    pub fn hardware_error(relay: usize, line: u8, msg: impl Into<String>) -> Self {
        Self::Hardware {
            relay,
            line,
            message: msg.into(),
        }
    }

    /// Create a new web server error
    pub fn web_server_error(msg: impl Into<String>) -> Self {
        Self::WebServer(msg.into())
    }

    /// Whether this error came from the hardware rather than the caller.
    pub fn is_hardware(&self) -> bool {
        matches!(
            self,
            Self::Hardware { .. } | Self::HardwareTimeout { .. } | Self::PartialSwitch { .. }
        )
    }
}
