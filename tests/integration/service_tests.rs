//! Write handlers and the auto-off countdown, driven end to end through
//! `AccessoryService` on the simulated board.

use crate::mock_hw::{HOUR, MIN, SEC, SimBoard, booted};

use hvac_accessory::app::commands::AppCommand;
use hvac_accessory::app::events::{AppEvent, Characteristic};
use hvac_accessory::app::ports::{OutputChannel, TimerId};
use hvac_accessory::error::Error;
use hvac_accessory::timer::Phase;

const FAN: OutputChannel = OutputChannel::FurnaceFan;
const HRV: OutputChannel = OutputChannel::Hrv;

// ── Fan active ────────────────────────────────────────────────

#[test]
fn manual_on_runs_for_the_timeout() {
    let mut board = SimBoard::at_wall(10, 0);
    let mut svc = booted(&mut board);

    svc.write(Characteristic::FanActive, 1, &mut board).unwrap();
    assert!(board.fan);
    assert_eq!(board.deadline_of(TimerId::AutoOff), Some(HOUR));

    board.advance_to(HOUR - 1, &mut svc);
    assert!(board.fan, "duty cycle in manual mode does not interfere");

    board.advance_to(HOUR, &mut svc);
    assert!(!board.fan);
    assert!(!svc.fan_active());
    assert_eq!(board.transitions(FAN), vec![true, false]);
}

#[test]
fn redundant_on_restarts_countdown_silently() {
    let mut board = SimBoard::at_wall(10, 0);
    let mut svc = booted(&mut board);

    svc.write(Characteristic::FanActive, 1, &mut board).unwrap();
    board.advance_to(30 * MIN, &mut svc);
    svc.write(Characteristic::FanActive, 1, &mut board).unwrap();

    assert_eq!(svc.auto_off_deadline(), Some(90 * MIN));
    assert_eq!(board.transitions(FAN), vec![true]);
    assert_eq!(board.saves, 1, "nothing changed on the second write");

    board.advance_to(HOUR, &mut svc);
    assert!(board.fan);
    board.advance_to(90 * MIN, &mut svc);
    assert!(!board.fan);
}

#[test]
fn off_write_clears_every_demand_source() {
    let mut board = SimBoard::at_wall(59, 0);
    let mut svc = booted(&mut board);
    svc.write(Characteristic::FanTargetState, 1, &mut board).unwrap();

    board.advance_to(MIN, &mut svc);
    assert_eq!(svc.duty_cycle_phase(), Phase::On);
    assert!(board.fan);

    svc.write(Characteristic::FanActive, 0, &mut board).unwrap();
    assert!(!board.fan);
    assert!(!svc.state().fan_active_auto);
    assert!(!svc.state().fan_active_manual);
    assert_eq!(svc.auto_off_deadline(), None);

    // The on-phase still ends on schedule without another transition.
    board.advance_to(7 * MIN, &mut svc);
    assert_eq!(svc.duty_cycle_phase(), Phase::Off);
    assert_eq!(board.transitions(FAN), vec![true, false]);
}

#[test]
fn off_write_while_off_does_nothing() {
    let mut board = SimBoard::new();
    let mut svc = booted(&mut board);
    svc.write(Characteristic::FanActive, 0, &mut board).unwrap();
    assert_eq!(board.saves, 0);
    assert!(board.events.is_empty());
}

#[test]
fn manual_on_during_duty_cycle_is_not_a_transition() {
    let mut board = SimBoard::at_wall(59, 0);
    let mut svc = booted(&mut board);
    svc.write(Characteristic::FanTargetState, 1, &mut board).unwrap();
    board.advance_to(MIN, &mut svc);
    board.clear_events();

    svc.write(Characteristic::FanActive, 1, &mut board).unwrap();
    assert!(board.transitions(FAN).is_empty());
    assert_eq!(svc.auto_off_deadline(), Some(MIN + HOUR));

    // Manual demand keeps the fan on past the end of the on-phase.
    board.advance_to(7 * MIN, &mut svc);
    assert!(board.fan);
    assert!(board.transitions(FAN).is_empty());
}

// ── Configuration characteristics ─────────────────────────────

#[test]
fn duty_cycle_write_validates_and_notifies() {
    let mut board = SimBoard::new();
    let mut svc = booted(&mut board);

    let err = svc
        .write(Characteristic::FanDutyCycle, 101, &mut board)
        .unwrap_err();
    assert_eq!(
        err,
        Error::InvalidValue {
            characteristic: Characteristic::FanDutyCycle,
            value: 101,
        }
    );
    assert!(!err.is_fatal());
    assert_eq!(svc.fan_duty_cycle(), 10);

    svc.write(Characteristic::FanDutyCycle, 50, &mut board).unwrap();
    assert_eq!(
        board.events,
        vec![AppEvent::CharacteristicChanged(Characteristic::FanDutyCycle)]
    );
    assert_eq!(board.saves, 1);

    svc.write(Characteristic::FanDutyCycle, 50, &mut board).unwrap();
    assert_eq!(board.events.len(), 1, "unchanged value is not re-notified");
}

#[test]
fn target_state_outside_range_is_rejected() {
    let mut board = SimBoard::new();
    let mut svc = booted(&mut board);
    assert!(matches!(
        svc.write(Characteristic::FanTargetState, 2, &mut board),
        Err(Error::InvalidValue { value: 2, .. })
    ));
    assert!(matches!(
        svc.write(Characteristic::HrvTargetState, 3, &mut board),
        Err(Error::InvalidValue { value: 3, .. })
    ));
    assert!(board.events.is_empty());
}

#[test]
fn switching_to_auto_mid_cycle_turns_fan_on() {
    let mut board = SimBoard::at_wall(59, 0);
    let mut svc = booted(&mut board);
    board.advance_to(MIN, &mut svc);
    assert_eq!(svc.duty_cycle_phase(), Phase::On);
    assert!(!board.fan, "manual mode ignores the duty cycle");

    svc.write(Characteristic::FanTargetState, 1, &mut board).unwrap();
    assert!(board.fan);
    assert_eq!(
        board.events,
        vec![
            AppEvent::OutputChanged {
                channel: FAN,
                active: true,
                manual_demand: false,
                auto_demand: true,
            },
            AppEvent::CharacteristicChanged(Characteristic::FanTargetState),
        ]
    );
}

#[test]
fn shorter_timeout_than_elapsed_turns_off_immediately() {
    let mut board = SimBoard::at_wall(10, 0);
    let mut svc = booted(&mut board);
    svc.write(Characteristic::FanActive, 1, &mut board).unwrap();

    board.advance_to(30 * MIN, &mut svc);
    svc.write(Characteristic::FanTimeout, 10, &mut board).unwrap();
    assert!(!board.fan);
    assert_eq!(svc.auto_off_deadline(), None);
    assert!(
        board
            .events
            .contains(&AppEvent::CharacteristicChanged(Characteristic::FanTimeout))
    );

    board.advance_to(2 * HOUR, &mut svc);
    assert_eq!(board.transitions(FAN), vec![true, false], "fired exactly once");
}

#[test]
fn longer_timeout_extends_from_original_start() {
    let mut board = SimBoard::at_wall(10, 0);
    let mut svc = booted(&mut board);
    svc.write(Characteristic::FanActive, 1, &mut board).unwrap();
    board.advance_to(10 * MIN, &mut svc);

    svc.write(Characteristic::FanTimeout, 90, &mut board).unwrap();
    assert_eq!(svc.auto_off_deadline(), Some(90 * MIN));
    assert_eq!(svc.fan_timeout_minutes(), 90);
}

#[test]
fn timeout_written_while_idle_applies_to_next_on() {
    let mut board = SimBoard::at_wall(10, 0);
    let mut svc = booted(&mut board);
    svc.write(Characteristic::FanTimeout, 5, &mut board).unwrap();
    assert_eq!(board.deadline_of(TimerId::AutoOff), None);

    board.advance_to(MIN, &mut svc);
    svc.write(Characteristic::FanActive, 1, &mut board).unwrap();
    assert_eq!(svc.auto_off_deadline(), Some(6 * MIN));
}

// ── HRV ───────────────────────────────────────────────────────

#[test]
fn hrv_on_also_runs_fan_until_timeout() {
    let mut board = SimBoard::at_wall(10, 0);
    let mut svc = booted(&mut board);

    svc.write(Characteristic::HrvActive, 1, &mut board).unwrap();
    assert!(board.hrv && board.fan);
    assert_eq!(svc.auto_off_deadline(), Some(HOUR));

    board.advance_to(HOUR, &mut svc);
    assert!(!board.hrv && !board.fan);
    assert_eq!(board.transitions(HRV), vec![true, false]);
}

#[test]
fn hrv_off_during_duty_cycle_ends_the_cycle() {
    let mut board = SimBoard::at_wall(59, 0);
    let mut svc = booted(&mut board);
    svc.write(Characteristic::FanTargetState, 1, &mut board).unwrap();
    svc.write(Characteristic::HrvTargetState, 1, &mut board).unwrap();
    board.advance_to(MIN, &mut svc);
    assert!(board.fan && board.hrv);

    svc.write(Characteristic::HrvActive, 0, &mut board).unwrap();
    assert!(!board.hrv && !board.fan);
    assert!(!svc.state().fan_active_auto);
    assert_eq!(board.transitions(HRV), vec![true, false]);
    assert_eq!(board.transitions(FAN), vec![true, false]);
}

#[test]
fn hrv_in_manual_mode_ignores_duty_cycle() {
    let mut board = SimBoard::at_wall(59, 0);
    let mut svc = booted(&mut board);
    svc.write(Characteristic::FanTargetState, 1, &mut board).unwrap();
    board.advance_to(MIN, &mut svc);
    assert!(board.fan);
    assert!(!board.hrv);
    assert!(!svc.hrv_active());
}

#[test]
fn hrv_on_write_when_already_on_is_ignored() {
    let mut board = SimBoard::at_wall(10, 0);
    let mut svc = booted(&mut board);
    svc.write(Characteristic::HrvActive, 1, &mut board).unwrap();
    board.advance_to(20 * MIN, &mut svc);
    svc.write(Characteristic::HrvActive, 1, &mut board).unwrap();
    assert_eq!(svc.auto_off_deadline(), Some(HOUR), "countdown not restarted");
    assert_eq!(board.saves, 1);
}

// ── Other commands ────────────────────────────────────────────

#[test]
fn identify_emits_event() {
    let mut board = SimBoard::new();
    let mut svc = booted(&mut board);
    svc.handle_command(AppCommand::Identify, &mut board).unwrap();
    assert_eq!(board.events, vec![AppEvent::Identified]);
}

#[test]
fn write_commands_dispatch_like_direct_writes() {
    let mut board = SimBoard::at_wall(10, 0);
    let mut svc = booted(&mut board);
    svc.handle_command(
        AppCommand::Write {
            characteristic: Characteristic::FanActive,
            value: 1,
        },
        &mut board,
    )
    .unwrap();
    assert!(board.fan);
    assert_eq!(svc.read(Characteristic::FanActive), 1);
    assert_eq!(svc.read(Characteristic::HrvActive), 0);
}

#[test]
fn time_sync_reanchors_off_phase() {
    let mut board = SimBoard::at_wall(10, 0);
    let mut svc = booted(&mut board);
    assert_eq!(svc.duty_cycle_deadline(), Some(50 * MIN));

    board.set_wall(45, 30);
    svc.handle_command(AppCommand::TimeSynced, &mut board).unwrap();
    assert_eq!(svc.duty_cycle_deadline(), Some(14 * MIN + 30 * SEC));
}

#[test]
fn stale_expiry_is_ignored() {
    let mut board = SimBoard::at_wall(10, 0);
    let mut svc = booted(&mut board);
    svc.write(Characteristic::FanTimeout, 1, &mut board).unwrap();
    svc.write(Characteristic::FanActive, 1, &mut board).unwrap();

    // The one-minute countdown fires, but its command is still queued.
    let (owner, stale, _) = board.timers.next_due(MIN).unwrap();
    assert_eq!(owner, TimerId::AutoOff);

    // Restart supersedes the registration whose fire we are holding.
    svc.write(Characteristic::FanActive, 1, &mut board).unwrap();
    svc.handle_command(
        AppCommand::TimerExpired {
            owner,
            handle: stale,
        },
        &mut board,
    )
    .unwrap();
    assert!(board.fan);
}
