//! Mode state-machine transitions and their preconditions.

mod common;

use common::{bare_laser, laser_with};
use laser_ctl::components::HeaterChannel;
use laser_ctl::{LaserError, LaserMode, LaserModel};
use std::time::Duration;

#[tokio::test]
async fn fresh_session_starts_in_manual_mode() {
    let (laser, _handle) = bare_laser().await;
    assert_eq!(laser.mode(), LaserMode::Manual);
}

#[tokio::test]
async fn calibrated_modes_are_refused_without_a_table() {
    let (mut laser, _handle) = bare_laser().await;
    laser.turn_on().await.unwrap();
    assert!(matches!(
        laser.set_mode(LaserMode::Steady).await,
        Err(LaserError::NoCalibration)
    ));
    assert!(matches!(
        laser.set_mode(LaserMode::Sweep).await,
        Err(LaserError::NoCalibration)
    ));
    assert_eq!(laser.mode(), LaserMode::Manual);
}

#[tokio::test]
async fn mode_switching_needs_system_power() {
    let (mut laser, _handle) = laser_with(LaserModel::Comet, 10, 0.1).await;
    assert!(matches!(
        laser.set_mode(LaserMode::Steady).await,
        Err(LaserError::SystemOff)
    ));
}

#[tokio::test]
async fn sweep_mode_is_refused_on_atlas_devices() {
    let (mut laser, _handle) = laser_with(LaserModel::Atlas, 10, 0.1).await;
    laser.turn_on().await.unwrap();
    assert!(matches!(
        laser.set_mode(LaserMode::Sweep).await,
        Err(LaserError::SweepUnsupported(LaserModel::Atlas))
    ));
    laser.set_mode(LaserMode::Steady).await.unwrap();
}

#[tokio::test]
async fn switching_to_the_active_mode_is_silent() {
    let (mut laser, handle) = laser_with(LaserModel::Comet, 10, 0.1).await;
    laser.turn_on().await.unwrap();
    laser.set_mode(LaserMode::Steady).await.unwrap();
    let before = handle.command_count();
    laser.set_mode(LaserMode::Steady).await.unwrap();
    assert_eq!(handle.command_count(), before);
}

#[tokio::test]
async fn manual_heater_writes_are_gated_on_manual_mode() {
    let (mut laser, _handle) = laser_with(LaserModel::Comet, 10, 0.1).await;
    laser.turn_on().await.unwrap();
    laser.set_heater(HeaterChannel::PhaseSection, 5.0).await.unwrap();

    laser.set_mode(LaserMode::Steady).await.unwrap();
    let err = laser
        .set_heater(HeaterChannel::PhaseSection, 5.0)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LaserError::WrongMode {
            expected: LaserMode::Manual,
            actual: LaserMode::Steady,
        }
    ));
}

#[tokio::test]
async fn entering_manual_mode_leaves_the_heaters_alone() {
    let (mut laser, handle) = laser_with(LaserModel::Comet, 10, 0.1).await;
    laser.turn_on().await.unwrap();
    laser.set_mode(LaserMode::Steady).await.unwrap();
    handle.clear_log();

    laser.set_mode(LaserMode::Manual).await.unwrap();
    assert_eq!(handle.count_matching("DRV:"), 0);
    assert_eq!(handle.count_matching("LSR:"), 0);
}

#[tokio::test]
async fn reentering_steady_mode_reactuates_the_tracked_entry() {
    let (mut laser, handle) = laser_with(LaserModel::Comet, 20, 0.1).await;
    laser.turn_on().await.unwrap();
    laser.set_mode(LaserMode::Steady).await.unwrap();
    laser.set_wavelength(1540.5).await.unwrap();
    assert_eq!(laser.cycler_index().await, Some(5));

    laser.set_mode(LaserMode::Manual).await.unwrap();
    handle.clear_log();
    laser.set_mode(LaserMode::Steady).await.unwrap();

    // Plain re-actuation of entry 5: one commit, no high-side detour.
    assert_eq!(handle.count_matching("DRV:U"), 1);
    assert_eq!(handle.last_matching("DRV:DP 0").unwrap(), "DRV:DP 0 15.0000");
    assert_eq!(laser.cycler_index().await, Some(5));
}

#[tokio::test]
async fn leaving_sweep_mode_stops_the_running_sweep() {
    let (mut laser, handle) = laser_with(LaserModel::Comet, 10, 0.1).await;
    laser.turn_on().await.unwrap();
    laser.set_mode(LaserMode::Sweep).await.unwrap();
    laser.set_sweep_bounds(1540.0, 1540.9).unwrap();
    laser.set_sweep_interval(Duration::from_millis(5)).unwrap();
    laser.start_sweep().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    laser.set_mode(LaserMode::Steady).await.unwrap();
    assert!(!laser.sweep_running());

    let settled = handle.count_matching("DRV:CYC:LOAD");
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(handle.count_matching("DRV:CYC:LOAD"), settled);
}

#[tokio::test]
async fn sweep_mode_applies_its_own_defaults() {
    let (mut laser, handle) = laser_with(LaserModel::Comet, 10, 0.1).await;
    laser.turn_on().await.unwrap();
    laser.set_mode(LaserMode::Sweep).await.unwrap();
    // Sweep defaults from the fixture calibration: 300 mA, 25 C.
    assert_eq!(handle.count_matching("LSR:ILEV 300.000"), 1);
    assert_eq!(handle.count_matching("TEC:TTGT 25.000"), 1);
}

#[tokio::test]
async fn power_off_drops_back_to_manual_and_forgets_the_position() {
    let (mut laser, _handle) = laser_with(LaserModel::Comet, 10, 0.1).await;
    laser.turn_on().await.unwrap();
    laser.set_mode(LaserMode::Steady).await.unwrap();
    laser.set_wavelength(1540.5).await.unwrap();

    laser.turn_off().await.unwrap();
    assert_eq!(laser.mode(), LaserMode::Manual);
    assert_eq!(laser.wavelength().await, None);
    assert_eq!(laser.cycler_index().await, None);
}

#[tokio::test]
async fn replacing_the_calibration_invalidates_the_position() {
    let (mut laser, _handle) = laser_with(LaserModel::Comet, 10, 0.1).await;
    laser.turn_on().await.unwrap();
    laser.set_mode(LaserMode::Steady).await.unwrap();
    laser.set_wavelength(1540.5).await.unwrap();
    assert!(laser.wavelength().await.is_some());

    laser
        .install_calibration(common::calibration(LaserModel::Comet, 20, 0.2))
        .await
        .unwrap();
    assert_eq!(laser.wavelength().await, None);
    let (min, max) = laser.wavelength_bounds().unwrap();
    assert_eq!(min, 1540.0);
    assert!((max - 1543.8).abs() < 1e-9);
}
