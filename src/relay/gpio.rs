//! Physical line access for the relay board.
//!
//! A [`LineBackend`] is the leaf hardware primitive the controller drives:
//! look a line up by identifier, ask whether it is already requested, request it
//! for exclusive output, drive a level onto it and release it again. The real
//! Raspberry Pi backend is feature-gated so the crate builds anywhere; the
//! [`SimulatedLines`] backend is always available for tests and dry runs.

use super::lock;
use super::state::PhysicalLevel;
use crate::error::Result;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Failure reported by a line backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LineError {
    #[error("line {0} does not exist")]
    Unknown(u8),

    #[error("line {0} is already requested")]
    Busy(u8),

    #[error("line {0} is not requested")]
    NotRequested(u8),

    #[error("{0}")]
    Backend(String),
}

/// Access to the output lines of one GPIO chip.
pub trait LineBackend: Send + Sync {
    /// Human readable backend name, used in logs and `info` output.
    fn name(&self) -> &str;

    /// Whether the chip exposes a line with this identifier.
    fn has_line(&self, line: u8) -> bool;

    /// Whether the line is currently held by an earlier request.
    fn is_requested(&self, line: u8) -> std::result::Result<bool, LineError>;

    /// Claim the line for exclusive output. Fails if it is already held.
    fn request_output(&self, line: u8, consumer: &str) -> std::result::Result<(), LineError>;

    /// Drive a level onto a requested line.
    fn set_level(&self, line: u8, level: PhysicalLevel) -> std::result::Result<(), LineError>;

    /// Give the line up. The last driven level stays on the pin.
    fn release(&self, line: u8) -> std::result::Result<(), LineError>;
}

/// One observable step taken against a simulated line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEvent {
    Requested(u8),
    Driven(u8, PhysicalLevel),
    Released(u8),
}

#[derive(Debug, Default)]
struct SimulatedLine {
    requested: bool,
    level: Option<PhysicalLevel>,
}

#[derive(Debug, Default)]
struct SimulatedChip {
    lines: HashMap<u8, SimulatedLine>,
    failing: HashSet<u8>,
    events: Vec<LineEvent>,
    latency: Duration,
}

/// In-memory GPIO chip.
///
/// Behaves like the kernel line API: requesting a line twice is rejected, and
/// levels persist after release. Lines can be marked as failing, held by a
/// foreign request, or slowed down to exercise the controller's error paths.
#[derive(Debug, Default)]
pub struct SimulatedLines {
    chip: Mutex<SimulatedChip>,
}

impl SimulatedLines {
    /// Create a simulated chip exposing exactly these lines.
    pub fn new(lines: impl IntoIterator<Item = u8>) -> Self {
        let lines = lines
            .into_iter()
            .map(|line| (line, SimulatedLine::default()))
            .collect();

        Self {
            chip: Mutex::new(SimulatedChip {
                lines,
                ..Default::default()
            }),
        }
    }

    /// Delay every level change by `latency`.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.set_latency(latency);
        self
    }

    /// Change the delay of level changes that start from now on.
    pub fn set_latency(&self, latency: Duration) {
        lock(&self.chip).latency = latency;
    }

    /// Last level driven onto the line, if any.
    pub fn level(&self, line: u8) -> Option<PhysicalLevel> {
        lock(&self.chip).lines.get(&line).and_then(|l| l.level)
    }

    /// Mark the line as requested, as if an earlier request was never released.
    pub fn hold(&self, line: u8) {
        if let Some(l) = lock(&self.chip).lines.get_mut(&line) {
            l.requested = true;
        }
    }

    /// Make every request and drive on this line fail.
    pub fn fail_line(&self, line: u8) {
        lock(&self.chip).failing.insert(line);
    }

    /// Undo [`SimulatedLines::fail_line`].
    pub fn restore_line(&self, line: u8) {
        lock(&self.chip).failing.remove(&line);
    }

    /// Every operation performed so far, in order.
    pub fn events(&self) -> Vec<LineEvent> {
        lock(&self.chip).events.clone()
    }

    /// Forget the operations recorded so far.
    pub fn clear_events(&self) {
        lock(&self.chip).events.clear();
    }
}

impl LineBackend for SimulatedLines {
    fn name(&self) -> &str {
        "simulated"
    }

    fn has_line(&self, line: u8) -> bool {
        lock(&self.chip).lines.contains_key(&line)
    }

    fn is_requested(&self, line: u8) -> std::result::Result<bool, LineError> {
        lock(&self.chip)
            .lines
            .get(&line)
            .map(|l| l.requested)
            .ok_or(LineError::Unknown(line))
    }

    fn request_output(&self, line: u8, consumer: &str) -> std::result::Result<(), LineError> {
        let mut chip = lock(&self.chip);
        if chip.failing.contains(&line) {
            return Err(LineError::Backend(format!(
                "simulated failure requesting line {}",
                line
            )));
        }

        let entry = chip.lines.get_mut(&line).ok_or(LineError::Unknown(line))?;
        if entry.requested {
            return Err(LineError::Busy(line));
        }
        entry.requested = true;
        chip.events.push(LineEvent::Requested(line));
        debug!("Simulated line {} requested by '{}'", line, consumer);
        Ok(())
    }

    fn set_level(&self, line: u8, level: PhysicalLevel) -> std::result::Result<(), LineError> {
        let latency = lock(&self.chip).latency;
        if !latency.is_zero() {
            std::thread::sleep(latency);
        }

        let mut chip = lock(&self.chip);
        if chip.failing.contains(&line) {
            return Err(LineError::Backend(format!(
                "simulated failure driving line {}",
                line
            )));
        }

        let entry = chip.lines.get_mut(&line).ok_or(LineError::Unknown(line))?;
        if !entry.requested {
            return Err(LineError::NotRequested(line));
        }
        entry.level = Some(level);
        chip.events.push(LineEvent::Driven(line, level));
        Ok(())
    }

    fn release(&self, line: u8) -> std::result::Result<(), LineError> {
        let mut chip = lock(&self.chip);
        let entry = chip.lines.get_mut(&line).ok_or(LineError::Unknown(line))?;
        if !entry.requested {
            return Err(LineError::NotRequested(line));
        }
        entry.requested = false;
        chip.events.push(LineEvent::Released(line));
        Ok(())
    }
}

#[cfg(feature = "gpio")]
mod raspberry_pi {
    use super::*;
    use rppal::gpio::{Gpio, OutputPin};

    /// Highest BCM line routed to the 40-pin header.
    const MAX_HEADER_LINE: u8 = 27;

    /// Raspberry Pi GPIO lines driven through rppal.
    pub struct RaspberryPiLines {
        gpio: Gpio,
        held: Mutex<HashMap<u8, OutputPin>>,
    }

    impl RaspberryPiLines {
        pub fn new() -> std::result::Result<Self, LineError> {
            let gpio = Gpio::new()
                .map_err(|e| LineError::Backend(format!("Failed to initialize GPIO: {}", e)))?;

            Ok(Self {
                gpio,
                held: Mutex::new(HashMap::new()),
            })
        }
    }

    impl LineBackend for RaspberryPiLines {
        fn name(&self) -> &str {
            "rppal"
        }

        fn has_line(&self, line: u8) -> bool {
            line <= MAX_HEADER_LINE
        }

        fn is_requested(&self, line: u8) -> std::result::Result<bool, LineError> {
            if !self.has_line(line) {
                return Err(LineError::Unknown(line));
            }
            Ok(lock(&self.held).contains_key(&line))
        }

        fn request_output(&self, line: u8, consumer: &str) -> std::result::Result<(), LineError> {
            let mut held = lock(&self.held);
            if held.contains_key(&line) {
                return Err(LineError::Busy(line));
            }

            let mut pin = self
                .gpio
                .get(line)
                .map_err(|e| LineError::Backend(format!("Failed to access line {}: {}", line, e)))?
                .into_output();
            // The relay has to keep its level once the pin is dropped.
            pin.set_reset_on_drop(false);

            held.insert(line, pin);
            debug!("GPIO line {} requested by '{}'", line, consumer);
            Ok(())
        }

        fn set_level(&self, line: u8, level: PhysicalLevel) -> std::result::Result<(), LineError> {
            let mut held = lock(&self.held);
            let pin = held.get_mut(&line).ok_or(LineError::NotRequested(line))?;
            match level {
                PhysicalLevel::Low => pin.set_low(),
                PhysicalLevel::High => pin.set_high(),
            }
            Ok(())
        }

        fn release(&self, line: u8) -> std::result::Result<(), LineError> {
            lock(&self.held)
                .remove(&line)
                .map(drop)
                .ok_or(LineError::NotRequested(line))
        }
    }
}

#[cfg(feature = "gpio")]
pub use raspberry_pi::RaspberryPiLines;

/// Open the backend the binary should drive.
///
/// Real hardware is used when the `gpio` feature is compiled in and `simulate`
/// is false; otherwise the lines are simulated in memory.
pub fn open_backend(simulate: bool, lines: &[u8]) -> Result<Arc<dyn LineBackend>> {
    if simulate {
        return Ok(Arc::new(SimulatedLines::new(lines.iter().copied())));
    }

    #[cfg(feature = "gpio")]
    {
        let backend = RaspberryPiLines::new().map_err(|e| {
            crate::error::RelayError::config_error(format!("Cannot open GPIO: {}", e))
        })?;
        Ok(Arc::new(backend))
    }

    #[cfg(not(feature = "gpio"))]
    {
        tracing::warn!("GPIO support not compiled in, relays will be simulated");
        Ok(Arc::new(SimulatedLines::new(lines.iter().copied())))
    }
}
