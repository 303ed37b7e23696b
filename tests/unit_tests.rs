use relay_board::{
    BoardConfig, LineBackend, LineEvent, LogicalState, PhysicalLevel, Polarity, RelayController,
    RelayError, SimulatedLines, NUM_RELAYS,
};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn board() -> (RelayController, Arc<SimulatedLines>) {
    let lines = Arc::new(SimulatedLines::new(1..=16));
    let controller = RelayController::initialize(BoardConfig::default(), lines.clone())
        .expect("Should initialize board");
    (controller, lines)
}

/// Test that a full mapping initializes with every relay off
#[test]
fn test_initialize_with_sixteen_lines() {
    let (controller, _) = board();
    assert_eq!(controller.count(), NUM_RELAYS);
    for n in 1..=NUM_RELAYS {
        assert_eq!(controller.status(n), LogicalState::Off);
    }
}

/// Test that a short mapping is rejected
#[test]
fn test_initialize_with_fifteen_lines_fails() {
    let lines = Arc::new(SimulatedLines::new(1..=16));
    let config = BoardConfig::new((1..=15).collect::<Vec<u8>>());

    let err = RelayController::initialize(config, lines).unwrap_err();
    assert!(matches!(err, RelayError::Configuration(_)));
}

#[test]
fn test_initialize_rejects_duplicate_lines() {
    let lines = Arc::new(SimulatedLines::new(1..=16));
    let mut mapping: Vec<u8> = (1..=16).collect();
    mapping[15] = 1;

    let err = RelayController::initialize(BoardConfig::new(mapping), lines).unwrap_err();
    assert!(matches!(err, RelayError::Configuration(_)));
}

#[test]
fn test_initialize_rejects_unknown_lines() {
    let lines = Arc::new(SimulatedLines::new(1..=16));
    let config = BoardConfig::new((2..=17).collect::<Vec<u8>>());

    let err = RelayController::initialize(config, lines).unwrap_err();
    assert!(err.to_string().contains("Line 17"));
}

/// Test on/off for every relay
#[test]
fn test_set_relay_reflects_in_status() {
    let (controller, lines) = board();

    for n in 1..=NUM_RELAYS {
        assert_ok!(controller.set_relay(n, LogicalState::On));
        assert_eq!(controller.status(n), LogicalState::On);
        assert_eq!(lines.level(n as u8), Some(PhysicalLevel::Low));

        assert_ok!(controller.set_relay(n, LogicalState::Off));
        assert_eq!(controller.status(n), LogicalState::Off);
        assert_eq!(lines.level(n as u8), Some(PhysicalLevel::High));
    }
}

/// Test that switching to the current state still drives the line
#[test]
fn test_repeated_command_drives_again() {
    let (controller, lines) = board();
    controller.set_relay(2, LogicalState::Off).unwrap();
    controller.set_relay(2, LogicalState::Off).unwrap();

    let drives = lines
        .events()
        .into_iter()
        .filter(|e| matches!(e, LineEvent::Driven(2, PhysicalLevel::High)))
        .count();
    assert_eq!(drives, 2);
}

/// Test that relay numbers outside the board never reach the hardware
#[test]
fn test_out_of_range_relays_are_rejected() {
    let (controller, lines) = board();

    for relay in [0, 17, usize::MAX] {
        let err = assert_err!(controller.set_relay(relay, LogicalState::On));
        assert!(matches!(err, RelayError::InvalidPort { .. }));
        assert!(matches!(
            controller.toggle(relay),
            Err(RelayError::InvalidPort { .. })
        ));
        assert!(matches!(
            controller.try_status(relay),
            Err(RelayError::InvalidPort { .. })
        ));
    }

    assert!(lines.events().is_empty());
    assert!(controller
        .snapshot()
        .iter()
        .all(|r| r.state == LogicalState::Off));
}

#[test]
#[should_panic]
fn test_status_of_missing_relay_panics() {
    let (controller, _) = board();
    controller.status(17);
}

/// Test that toggling twice returns to the starting state
#[test]
fn test_toggle_is_an_involution() {
    let (controller, _) = board();

    for start in [LogicalState::Off, LogicalState::On] {
        controller.set_relay(9, start).unwrap();

        assert_eq!(controller.toggle(9).unwrap(), start.inverted());
        assert_eq!(controller.status(9), start.inverted());
        assert_eq!(controller.toggle(9).unwrap(), start);
        assert_eq!(controller.status(9), start);
    }
}

#[test]
fn test_set_all() {
    let (controller, lines) = board();

    assert_ok!(controller.set_all(LogicalState::On));
    for n in 1..=NUM_RELAYS {
        assert_eq!(controller.status(n), LogicalState::On);
        assert_eq!(lines.level(n as u8), Some(PhysicalLevel::Low));
    }

    assert_ok!(controller.set_all(LogicalState::Off));
    assert!(controller
        .snapshot()
        .iter()
        .all(|r| r.state == LogicalState::Off));
}

/// Test that set_all switches relays in order, one full sequence at a time
#[test]
fn test_set_all_order() {
    let (controller, lines) = board();
    controller.set_all(LogicalState::On).unwrap();

    let events = lines.events();
    assert_eq!(events.len(), 3 * NUM_RELAYS);
    for (index, chunk) in events.chunks(3).enumerate() {
        let line = index as u8 + 1;
        assert_eq!(
            chunk,
            [
                LineEvent::Requested(line),
                LineEvent::Driven(line, PhysicalLevel::Low),
                LineEvent::Released(line),
            ]
        );
    }
}

/// Test that a hardware failure leaves the state untouched
#[test]
fn test_hardware_failure_keeps_last_state() {
    let (controller, lines) = board();
    controller.set_relay(3, LogicalState::On).unwrap();
    lines.fail_line(3);

    let err = assert_err!(controller.set_relay(3, LogicalState::Off));
    assert!(matches!(err, RelayError::Hardware { relay: 3, line: 3, .. }));
    assert_eq!(controller.status(3), LogicalState::On);

    let err = assert_err!(controller.toggle(3));
    assert!(err.is_hardware());
    assert_eq!(controller.status(3), LogicalState::On);

    lines.restore_line(3);
    assert_eq!(controller.toggle(3).unwrap(), LogicalState::Off);
}

/// Test that a partial bulk switch updates only what the hardware accepted
#[test]
fn test_set_all_partial_failure() {
    let (controller, lines) = board();
    lines.fail_line(4);
    lines.fail_line(9);

    match controller.set_all(LogicalState::On) {
        Err(RelayError::PartialSwitch { failed, total }) => {
            assert_eq!(failed, vec![4, 9]);
            assert_eq!(total, NUM_RELAYS);
        }
        other => panic!("Expected partial switch, got {:?}", other),
    }

    for status in controller.snapshot() {
        let expected = if status.relay == 4 || status.relay == 9 {
            LogicalState::Off
        } else {
            LogicalState::On
        };
        assert_eq!(status.state, expected, "relay {}", status.relay);
    }
    assert_eq!(lines.level(16), Some(PhysicalLevel::Low));
}

/// Test that a line left requested is released before it is requested again
#[test]
fn test_stale_line_is_recovered() {
    let (controller, lines) = board();
    lines.hold(12);

    assert_ok!(controller.set_relay(12, LogicalState::On));
    assert!(!lines.is_requested(12).unwrap());
    assert_eq!(lines.events()[0], LineEvent::Released(12));
}

/// Test that a drive which outlives the hardware timeout never updates the state
#[test]
fn test_timed_out_switch_keeps_last_state() {
    let lines = Arc::new(SimulatedLines::new(1..=16).with_latency(Duration::from_millis(200)));
    let config = BoardConfig::default().with_hardware_timeout(Some(Duration::from_millis(50)));
    let controller = RelayController::initialize(config, lines.clone()).unwrap();

    let err = assert_err!(controller.set_relay(1, LogicalState::On));
    assert!(matches!(
        err,
        RelayError::HardwareTimeout {
            relay: 1,
            line: 1,
            timeout_ms: 50
        }
    ));
    assert_eq!(controller.status(1), LogicalState::Off);

    // The late drive reaches the line but not the recorded state.
    thread::sleep(Duration::from_millis(400));
    assert_eq!(lines.level(1), Some(PhysicalLevel::Low));
    assert_eq!(controller.status(1), LogicalState::Off);
    assert!(lines.is_requested(1).unwrap());

    lines.set_latency(Duration::ZERO);
    lines.clear_events();
    assert_ok!(controller.set_relay(1, LogicalState::Off));
    assert_eq!(
        lines.events(),
        vec![
            LineEvent::Released(1),
            LineEvent::Requested(1),
            LineEvent::Driven(1, PhysicalLevel::High),
            LineEvent::Released(1),
        ]
    );
    assert_eq!(controller.status(1), LogicalState::Off);
}

/// Test that a bulk switch reports timed-out relays like any other failure
#[test]
fn test_set_all_with_slow_hardware() {
    let lines = Arc::new(SimulatedLines::new(1..=16).with_latency(Duration::from_millis(30)));
    let config = BoardConfig::default().with_hardware_timeout(Some(Duration::from_millis(2)));
    let controller = RelayController::initialize(config, lines.clone()).unwrap();

    match controller.set_all(LogicalState::On) {
        Err(RelayError::PartialSwitch { failed, total }) => {
            assert_eq!(failed, (1..=NUM_RELAYS).collect::<Vec<_>>());
            assert_eq!(total, NUM_RELAYS);
        }
        other => panic!("Expected partial switch, got {:?}", other),
    }
    assert!(controller
        .snapshot()
        .iter()
        .all(|status| status.state == LogicalState::Off));
}

#[test]
fn test_active_high_polarity() {
    let lines = Arc::new(SimulatedLines::new(1..=16));
    let config = BoardConfig::default().with_polarity(Polarity::ActiveHigh);
    let controller = RelayController::initialize(config, lines.clone()).unwrap();

    controller.set_all(LogicalState::On).unwrap();
    assert_eq!(lines.level(8), Some(PhysicalLevel::High));
}

fn concurrent_toggles(count: usize) -> LogicalState {
    let lines = Arc::new(SimulatedLines::new(1..=16).with_latency(Duration::from_millis(1)));
    let controller = RelayController::initialize(BoardConfig::default(), lines.clone()).unwrap();
    let barrier = Barrier::new(count);

    thread::scope(|s| {
        for _ in 0..count {
            s.spawn(|| {
                barrier.wait();
                controller.toggle(5).expect("Should toggle");
            });
        }
    });

    // The line carries the level of the last command issued.
    let state = controller.status(5);
    assert_eq!(
        lines.level(5),
        Some(Polarity::ActiveLow.level_for(state))
    );
    assert!(!lines.is_requested(5).unwrap());
    state
}

/// Test that simultaneous toggles are all applied
#[test]
fn test_concurrent_toggles_lose_no_updates() {
    assert_eq!(concurrent_toggles(7), LogicalState::On);
    assert_eq!(concurrent_toggles(8), LogicalState::Off);
}

/// Test that reading and switching outside the controller's lock races
#[test]
fn test_unlocked_read_then_set_loses_an_update() {
    let (controller, _) = board();
    let barrier = Barrier::new(2);

    thread::scope(|s| {
        for _ in 0..2 {
            s.spawn(|| {
                let seen = controller.status(5);
                // Both threads observe the state before either writes.
                barrier.wait();
                controller.set_relay(5, seen.inverted()).unwrap();
            });
        }
    });

    // Two toggles from OFF should end OFF; the second one was lost.
    assert_eq!(controller.status(5), LogicalState::On);
}

/// Test that bulk switches and single toggles interleave cleanly
#[test]
fn test_set_all_with_concurrent_toggles() {
    let lines = Arc::new(SimulatedLines::new(1..=16).with_latency(Duration::from_micros(200)));
    let controller = RelayController::initialize(BoardConfig::default(), lines.clone()).unwrap();

    thread::scope(|s| {
        s.spawn(|| {
            for _ in 0..5 {
                controller.set_all(LogicalState::On).unwrap();
                controller.set_all(LogicalState::Off).unwrap();
            }
        });
        for relay in [1, 8, 16] {
            let controller = &controller;
            s.spawn(move || {
                for _ in 0..10 {
                    controller.toggle(relay).unwrap();
                }
            });
        }
    });

    for status in controller.snapshot() {
        assert_eq!(
            lines.level(status.line),
            Some(Polarity::ActiveLow.level_for(status.state)),
            "relay {}",
            status.relay
        );
        assert!(!lines.is_requested(status.line).unwrap());
    }
}
