//! Relay board control.
//!
//! This module maps logical relay numbers onto physical GPIO lines, keeps track
//! of what each relay was last commanded to do, and sequences every switch as
//! acquire, drive, release against the line.

pub mod config;
pub mod controller;
pub mod gpio;
pub mod state;

// Re-export commonly used items
pub use config::BoardConfig;
pub use controller::{RelayController, RelayStatus};
pub use gpio::{open_backend, LineBackend, LineError, LineEvent, SimulatedLines};
pub use state::{LogicalState, PhysicalLevel, Polarity};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a panicking thread poisoned it.
///
/// Relay state stays meaningful after a panic elsewhere: it is only written once
/// the hardware accepted the command.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
