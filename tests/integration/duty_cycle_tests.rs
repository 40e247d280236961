//! Duty-cycle oscillator behaviour seen through the relays.

use crate::mock_hw::{HOUR, MIN, SEC, SimBoard, booted};

use hvac_accessory::app::commands::AppCommand;
use hvac_accessory::app::events::Characteristic;
use hvac_accessory::app::ports::{OutputChannel, TimerId, WallClockPort, WallTime};
use hvac_accessory::app::service::AccessoryService;
use hvac_accessory::timer::Phase;

const FAN: OutputChannel = OutputChannel::FurnaceFan;

fn auto_mode(board: &mut SimBoard, svc: &mut AccessoryService) {
    svc.write(Characteristic::FanTargetState, 1, board).unwrap();
}

#[test]
fn ten_percent_at_minute_fifty() {
    let mut board = SimBoard::at_wall(50, 0);
    let mut svc = booted(&mut board);
    auto_mode(&mut board, &mut svc);
    assert_eq!(svc.duty_cycle_deadline(), Some(10 * MIN));

    board.advance_to(10 * MIN - 1, &mut svc);
    assert!(!board.fan);
    board.advance_to(10 * MIN, &mut svc);
    assert!(board.fan);
    assert_eq!(svc.duty_cycle_phase(), Phase::On);
    assert_eq!(svc.duty_cycle_deadline(), Some(16 * MIN));

    board.advance_to(16 * MIN, &mut svc);
    assert!(!board.fan);
    // Wall clock now reads :06; off until the next :00.
    assert_eq!(svc.duty_cycle_deadline(), Some(70 * MIN));
}

#[test]
fn full_duty_cycle_runs_one_hour() {
    let mut board = SimBoard::at_wall(59, 0);
    let mut svc = booted(&mut board);
    auto_mode(&mut board, &mut svc);
    svc.write(Characteristic::FanDutyCycle, 100, &mut board)
        .unwrap();

    board.advance_to(MIN, &mut svc);
    assert!(board.fan);
    assert_eq!(svc.duty_cycle_deadline(), Some(MIN + HOUR));

    board.advance_to(MIN + HOUR - 1, &mut svc);
    assert!(board.fan);
    board.advance_to(MIN + HOUR, &mut svc);
    assert!(!board.fan);
    assert_eq!(board.transitions(FAN), vec![true, false]);
}

#[test]
fn zero_duty_cycle_never_turns_on() {
    let mut board = SimBoard::at_wall(30, 0);
    let mut svc = booted(&mut board);
    auto_mode(&mut board, &mut svc);
    svc.write(Characteristic::FanDutyCycle, 0, &mut board).unwrap();

    board.advance_to(3 * HOUR, &mut svc);
    assert!(board.transitions(FAN).is_empty());
    assert!(!svc.state().fan_active_auto);
    assert_eq!(svc.duty_cycle_phase(), Phase::Off);
    // Still re-evaluating at every hour boundary.
    assert_eq!(svc.duty_cycle_deadline(), Some(3 * HOUR + 30 * MIN));
}

#[test]
fn raising_duty_cycle_from_zero_takes_effect_next_hour() {
    let mut board = SimBoard::at_wall(30, 0);
    let mut svc = booted(&mut board);
    auto_mode(&mut board, &mut svc);
    svc.write(Characteristic::FanDutyCycle, 0, &mut board).unwrap();
    board.advance_to(40 * MIN, &mut svc);

    svc.write(Characteristic::FanDutyCycle, 20, &mut board)
        .unwrap();
    assert!(!board.fan, "off-phase is not shortened");
    board.advance_to(90 * MIN, &mut svc);
    assert!(board.fan);
    board.advance_to(102 * MIN, &mut svc);
    assert!(!board.fan);
}

#[test]
fn duty_change_retimes_running_on_phase() {
    let mut board = SimBoard::at_wall(59, 0);
    let mut svc = booted(&mut board);
    auto_mode(&mut board, &mut svc);
    board.advance_to(MIN, &mut svc);
    board.advance_to(3 * MIN, &mut svc);
    assert!(board.fan);

    svc.write(Characteristic::FanDutyCycle, 50, &mut board).unwrap();
    assert_eq!(svc.duty_cycle_deadline(), Some(MIN + 30 * MIN));

    // 1% is 36 s, already behind us: the on-phase ends right away.
    svc.write(Characteristic::FanDutyCycle, 1, &mut board).unwrap();
    assert!(!board.fan);
    assert_eq!(svc.duty_cycle_phase(), Phase::Off);
    // Wall clock reads :02, so the next on-phase is 58 minutes out.
    assert_eq!(svc.duty_cycle_deadline(), Some(3 * MIN + 58 * MIN));
    assert_eq!(board.transitions(FAN), vec![true, false]);
}

#[test]
fn duty_change_inside_fatigue_margin_ends_on_phase() {
    let mut board = SimBoard::at_wall(59, 0);
    let mut svc = booted(&mut board);
    auto_mode(&mut board, &mut svc);
    board.advance_to(MIN, &mut svc);
    // 5% is three minutes; move to half a second before that.
    board.advance_to(4 * MIN - SEC / 2, &mut svc);

    svc.write(Characteristic::FanDutyCycle, 5, &mut board).unwrap();
    assert!(!board.fan);
}

#[test]
fn off_phase_stays_on_the_hour_across_time_sync() {
    let mut board = SimBoard::at_wall(20, 0);
    let mut svc = booted(&mut board);
    auto_mode(&mut board, &mut svc);
    assert_eq!(svc.duty_cycle_deadline(), Some(40 * MIN));

    board.advance_to(5 * MIN, &mut svc);
    // The clock was half an hour slow.
    board.set_wall(55, 0);
    svc.handle_command(AppCommand::TimeSynced, &mut board).unwrap();
    assert_eq!(board.timers.pending(), 1, "old deadline was cancelled");

    board.advance_to(10 * MIN, &mut svc);
    assert!(board.fan);
    assert_eq!(
        board.wall_time(),
        WallTime {
            minute: 0,
            second: 0
        }
    );
}

#[test]
fn time_sync_during_on_phase_keeps_deadline() {
    let mut board = SimBoard::at_wall(59, 0);
    let mut svc = booted(&mut board);
    auto_mode(&mut board, &mut svc);
    board.advance_to(MIN, &mut svc);
    let before = svc.duty_cycle_deadline();

    board.set_wall(30, 0);
    svc.handle_command(AppCommand::TimeSynced, &mut board).unwrap();
    assert_eq!(svc.duty_cycle_deadline(), before);
    assert!(board.fan);
}

#[test]
fn oscillator_holds_exactly_one_registration() {
    let mut board = SimBoard::at_wall(45, 0);
    let mut svc = booted(&mut board);
    auto_mode(&mut board, &mut svc);
    for _ in 0..6 {
        let next = svc.duty_cycle_deadline().unwrap();
        board.advance_to(next, &mut svc);
        assert_eq!(board.timers.pending(), 1);
        assert!(board.deadline_of(TimerId::DutyCycle).is_some());
    }
    assert_eq!(board.transitions(FAN), vec![true, false, true, false, true, false]);
}

#[test]
fn custom_anchor_minute() {
    let mut board = SimBoard::at_wall(10, 0);
    let mut svc = AccessoryService::with_anchor_minute(30);
    svc.boot(&mut board).unwrap();
    assert_eq!(svc.duty_cycle_deadline(), Some(20 * MIN));
}
