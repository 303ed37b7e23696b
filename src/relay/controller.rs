//! The relay controller.
//!
//! [`RelayController`] owns the line mapping and the state of every relay. Each
//! relay has its own lock covering its state entry and the acquire, drive,
//! release sequence on its line, so concurrent requests for the same relay are
//! serialized while different relays switch independently. Whole-board
//! operations take a board-wide lock that single-relay operations share.
//!
//! With a hardware timeout configured, the drive runs on a helper thread and
//! the controller stops waiting for it once the timeout passes. The relay then
//! keeps its last known state and the line stays requested until the next
//! switch of that relay releases it.

use super::config::BoardConfig;
use super::gpio::{LineBackend, LineError};
use super::lock;
use super::state::{LogicalState, PhysicalLevel};
use crate::error::{RelayError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// State of one relay as reported to callers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelayStatus {
    /// Logical relay number, starting at 1
    pub relay: usize,
    /// Physical line driving the relay
    pub line: u8,
    /// Last commanded state
    pub state: LogicalState,
}

#[derive(Debug)]
struct RelaySlot {
    line: u8,
    state: LogicalState,
}

/// A requested line. Dropping the guard releases the line.
struct LineGuard {
    backend: Arc<dyn LineBackend>,
    line: u8,
    held: bool,
}

impl LineGuard {
    fn drive(&self, level: PhysicalLevel) -> std::result::Result<(), LineError> {
        self.backend.set_level(self.line, level)
    }

    /// Drive the line from a helper thread, waiting at most `timeout`.
    ///
    /// Returns `None` once the timeout passes. The drive may still land afterwards.
    fn drive_within(
        &self,
        level: PhysicalLevel,
        timeout: Duration,
    ) -> Option<std::result::Result<(), LineError>> {
        let (tx, rx) = mpsc::sync_channel(1);
        let backend = self.backend.clone();
        let line = self.line;

        let spawned = thread::Builder::new()
            .name(format!("drive-line-{}", line))
            .spawn(move || {
                // Nobody is listening any more if the caller timed out.
                let _ = tx.send(backend.set_level(line, level));
            });
        if let Err(e) = spawned {
            return Some(Err(LineError::Backend(format!(
                "Failed to start drive of line {}: {}",
                line, e
            ))));
        }

        match rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(LineError::Backend(format!(
                "drive of line {} panicked",
                line
            )))),
        }
    }

    /// Leave the line requested; the next acquisition treats it as stale.
    fn abandon(mut self) {
        self.held = false;
    }
}

impl Drop for LineGuard {
    fn drop(&mut self) {
        if !self.held {
            return;
        }

        match self.backend.release(self.line) {
            Ok(()) => debug!("Released line {}", self.line),
            // The next acquisition of this line releases it before requesting.
            Err(e) => error!("Failed to release line {}: {}", self.line, e),
        }
    }
}

/// Controller for a bank of relays wired to GPIO lines.
pub struct RelayController {
    backend: Arc<dyn LineBackend>,
    config: BoardConfig,
    relays: Vec<Mutex<RelaySlot>>,
    board: RwLock<()>,
}

impl RelayController {
    /// Validate the line mapping against the backend and declare every relay OFF.
    ///
    /// The mapping must contain exactly [`crate::NUM_RELAYS`] distinct lines, all of
    /// which the backend knows about. No line is touched until the first switch.
    pub fn initialize(config: BoardConfig, backend: Arc<dyn LineBackend>) -> Result<Self> {
        info!("Initializing relay board");

        if config.lines.len() != crate::NUM_RELAYS {
            return Err(RelayError::config_error(format!(
                "Expected {} relay lines, got {}",
                crate::NUM_RELAYS,
                config.lines.len()
            )));
        }

        let mut seen = HashSet::new();
        for &line in &config.lines {
            if !seen.insert(line) {
                return Err(RelayError::config_error(format!(
                    "Line {} is assigned to more than one relay",
                    line
                )));
            }
            if !backend.has_line(line) {
                return Err(RelayError::config_error(format!(
                    "Line {} is not available on the {} backend",
                    line,
                    backend.name()
                )));
            }
        }

        info!(
            "Relay line list: {:?} ({}, {} backend)",
            config.lines,
            config.polarity,
            backend.name()
        );

        let relays = config
            .lines
            .iter()
            .map(|&line| {
                Mutex::new(RelaySlot {
                    line,
                    state: LogicalState::Off,
                })
            })
            .collect();

        Ok(Self {
            backend,
            config,
            relays,
            board: RwLock::new(()),
        })
    }

    /// Number of relays on the board.
    pub fn count(&self) -> usize {
        self.relays.len()
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// Name of the line backend in use.
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Switch one relay on or off.
    pub fn set_relay(&self, relay: usize, state: LogicalState) -> Result<()> {
        let slot = self.slot(relay)?;
        let _board = self.board.read().unwrap_or_else(PoisonError::into_inner);
        let mut slot = lock(slot);

        info!("Turning relay {} {}", relay, state);
        self.switch(relay, &mut slot, state)
    }

    /// Invert one relay and return the state it was switched to.
    pub fn toggle(&self, relay: usize) -> Result<LogicalState> {
        let slot = self.slot(relay)?;
        let _board = self.board.read().unwrap_or_else(PoisonError::into_inner);
        let mut slot = lock(slot);

        let next = slot.state.inverted();
        info!("Toggling relay {} to {}", relay, next);
        self.switch(relay, &mut slot, next)?;
        Ok(next)
    }

    /// Switch every relay, in order, to the same state.
    ///
    /// All relays are attempted even if some fail. Relays whose line accepted the
    /// command are updated; the call only succeeds if every relay did.
    pub fn set_all(&self, state: LogicalState) -> Result<()> {
        let _board = self.board.write().unwrap_or_else(PoisonError::into_inner);
        info!("Turning all relays {}", state);

        let failed: Vec<usize> = self
            .relays
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let relay = index + 1;
                let mut slot = lock(slot);
                self.switch(relay, &mut slot, state).err().map(|_| relay)
            })
            .collect();

        if failed.is_empty() {
            Ok(())
        } else {
            Err(RelayError::PartialSwitch {
                failed,
                total: self.count(),
            })
        }
    }

    /// Last commanded state of a relay.
    ///
    /// # Panics
    ///
    /// Panics if `relay` is not between 1 and [`RelayController::count`]. Use
    /// [`RelayController::try_status`] for unvalidated input.
    pub fn status(&self, relay: usize) -> LogicalState {
        match self.try_status(relay) {
            Ok(state) => state,
            Err(e) => panic!("status requested for a relay that does not exist: {}", e),
        }
    }

    /// Last commanded state of a relay, rejecting relay numbers that do not exist.
    pub fn try_status(&self, relay: usize) -> Result<LogicalState> {
        let slot = self.slot(relay)?;
        let _board = self.board.read().unwrap_or_else(PoisonError::into_inner);
        let state = lock(slot).state;
        debug!("Relay {} is {}", relay, state);
        Ok(state)
    }

    /// Consistent view of every relay.
    pub fn snapshot(&self) -> Vec<RelayStatus> {
        let _board = self.board.write().unwrap_or_else(PoisonError::into_inner);
        self.relays
            .iter()
            .enumerate()
            .map(|(index, slot)| {
                let slot = lock(slot);
                RelayStatus {
                    relay: index + 1,
                    line: slot.line,
                    state: slot.state,
                }
            })
            .collect()
    }

    fn slot(&self, relay: usize) -> Result<&Mutex<RelaySlot>> {
        relay
            .checked_sub(1)
            .and_then(|index| self.relays.get(index))
            .ok_or_else(|| {
                warn!("Rejected invalid relay {}", relay);
                RelayError::invalid_port(relay, self.count())
            })
    }

    /// Drive a relay's line and record the new state. Caller holds the slot lock.
    fn switch(&self, relay: usize, slot: &mut RelaySlot, state: LogicalState) -> Result<()> {
        let line = slot.line;
        let level = self.config.polarity.level_for(state);
        let hardware = |e: LineError| {
            error!("Relay {} (line {}) failed: {}", relay, line, e);
            RelayError::hardware_error(relay, line, e.to_string())
        };

        let guard = self.acquire(line).map_err(hardware)?;
        match self.config.hardware_timeout() {
            None => guard.drive(level).map_err(hardware)?,
            Some(timeout) => match guard.drive_within(level, timeout) {
                Some(result) => result.map_err(hardware)?,
                None => {
                    error!(
                        "Relay {} (line {}) did not respond within {}ms, keeping it {}",
                        relay,
                        line,
                        timeout.as_millis(),
                        slot.state
                    );
                    guard.abandon();
                    return Err(RelayError::HardwareTimeout {
                        relay,
                        line,
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
            },
        }
        drop(guard);

        slot.state = state;
        debug!(
            "Relay {} is {} (line {} at level {})",
            relay,
            state,
            line,
            level.as_bit()
        );
        Ok(())
    }

    /// Release the line if a stale request still holds it, then request it.
    fn acquire(&self, line: u8) -> std::result::Result<LineGuard, LineError> {
        if self.backend.is_requested(line)? {
            warn!("Line {} is still requested, releasing it first", line);
            self.backend.release(line)?;
        }

        self.backend.request_output(line, &self.config.consumer)?;
        debug!("Requested line {} as '{}'", line, self.config.consumer);

        Ok(LineGuard {
            backend: self.backend.clone(),
            line,
            held: true,
        })
    }
}

impl std::fmt::Debug for RelayController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayController")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
