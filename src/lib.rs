//! # Relay Board - HTTP control for a Raspberry Pi relay board
//!
//! Drives a 16-channel relay board (such as the ELEGOO 16 channel module) from
//! the GPIO lines of a Raspberry Pi, and exposes the relays through a small HTTP
//! API.
//!
//! ## Features
//!
//! - **Safe switching**: every switch requests the line, drives it and releases it,
//!   clearing stale requests first
//! - **Per-relay locking**: concurrent requests never interleave on one relay
//! - **Configurable polarity**: active-low boards are the default
//! - **Simulation**: an in-memory backend for tests and machines without GPIO
//! - **Library + Binary**: use as a crate or standalone server
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use relay_board::{start_web_server, BoardConfig, RelayController, SimulatedLines, WebConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BoardConfig::default();
//!     let backend = Arc::new(SimulatedLines::new(config.lines.clone()));
//!     let controller = Arc::new(RelayController::initialize(config, backend)?);
//!
//!     start_web_server(WebConfig::default(), controller).await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod relay;
pub mod web;

// Re-export public API
pub use error::{RelayError, Result};
pub use relay::{
    config::BoardConfig,
    controller::{RelayController, RelayStatus},
    gpio::{open_backend, LineBackend, LineError, LineEvent, SimulatedLines},
    state::{LogicalState, PhysicalLevel, Polarity},
};

#[cfg(feature = "gpio")]
pub use relay::gpio::RaspberryPiLines;

pub use web::{create_app, start_web_server, WebConfig, ERROR_MSG, SUCCESS_MSG};

/// Number of relays on the board
pub const NUM_RELAYS: usize = 16;

/// Line assignment of the reference deployment, relay 1 first
pub const DEFAULT_LINES: [u8; NUM_RELAYS] =
    [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];

/// Consumer label attached to line requests
pub const DEFAULT_CONSUMER: &str = "Relay Control";

/// The default web server port
pub const DEFAULT_WEB_PORT: u16 = 5000;

/// The default bound on a single hardware operation, in milliseconds
pub const DEFAULT_HARDWARE_TIMEOUT_MS: u64 = 2000;
