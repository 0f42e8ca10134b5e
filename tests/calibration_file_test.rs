//! Loading calibration files from disk and installing them into a session.

use laser_ctl::calibration::{load_calibration, LaserModel};
use laser_ctl::comm::MockGateway;
use laser_ctl::{Laser, LaserError, LaserMode};
use std::io::Write as _;
use tempfile::NamedTempFile;

fn write_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

const COMET_FILE: &str = "\
[default_settings]
laser_model = COMET
tune_diode_current = 280.0
tune_tec_target = 25.0
sweep_diode_current = 300.0
sweep_tec_target = 25.0
sweep_interval = 100
[look_up_table]
10.0;20.0;30.0;40.0;1540.00;0
10.5;20.5;30.5;40.5;1540.05;0
11.0;21.0;31.0;41.0;1540.10;1
11.5;21.5;31.5;41.5;1540.15;0
12.0;22.0;32.0;42.0;1540.20;0
";

#[tokio::test]
async fn a_file_from_disk_drives_a_full_steady_session() {
    let file = write_file(COMET_FILE);
    let mock = MockGateway::new();
    let handle = mock.handle();
    let mut laser = Laser::connect_with_calibration(Box::new(mock), file.path())
        .await
        .unwrap();

    assert_eq!(laser.model(), Some(LaserModel::Comet));
    let (min, max) = laser.wavelength_bounds().unwrap();
    assert_eq!(min, 1540.00);
    assert_eq!(max, 1540.20);

    laser.turn_on().await.unwrap();
    laser.set_mode(LaserMode::Steady).await.unwrap();
    laser.set_wavelength(1540.10).await.unwrap();
    assert_eq!(laser.cycler_index().await, Some(2));
    // Heater values come straight from the file's third row.
    assert_eq!(handle.last_matching("DRV:DP 0").unwrap(), "DRV:DP 0 11.0000");
    assert_eq!(handle.last_matching("DRV:DP 3").unwrap(), "DRV:DP 3 41.0000");
}

#[test]
fn the_defaults_block_round_trips() {
    let file = write_file(COMET_FILE);
    let cal = load_calibration(file.path()).unwrap();
    assert_eq!(cal.model, LaserModel::Comet);
    assert_eq!(cal.steady.diode_current_ma, 280.0);
    assert_eq!(cal.steady.tec_target_c, 25.0);
    let sweep = cal.sweep.unwrap();
    assert_eq!(sweep.diode_current_ma, 300.0);
    assert_eq!(sweep.step_interval_us, Some(100));
    assert_eq!(cal.table.len(), 5);
    assert!(cal.table.entries()[2].mode_hop_flag);
}

#[test]
fn a_non_monotonic_file_is_rejected_whole() {
    let file = write_file(
        "\
[default_settings]
laser_model = ATLAS
tune_diode_current = 250.0
tune_tec_target = 24.0
[look_up_table]
10.0;20.0;30.0;40.0;1541.0;0
11.0;21.0;31.0;41.0;1540.5;0
",
    );
    assert!(matches!(
        load_calibration(file.path()),
        Err(LaserError::CalibrationFormat(_))
    ));
}

#[test]
fn a_missing_file_surfaces_as_io() {
    let err = load_calibration(std::path::Path::new("/nonexistent/cal.csv")).unwrap_err();
    assert!(matches!(err, LaserError::Io(_)));
}

#[tokio::test]
async fn a_rejected_file_leaves_the_session_without_calibration() {
    let good = write_file(COMET_FILE);
    let bad = write_file("garbage;;;\n");

    let mock = MockGateway::new();
    let mut laser = Laser::connect(Box::new(mock)).await.unwrap();
    laser
        .install_calibration(load_calibration(good.path()).unwrap())
        .await
        .unwrap();

    // The bad file fails at load time; nothing reaches the session.
    assert!(load_calibration(bad.path()).is_err());
    assert_eq!(laser.model(), Some(LaserModel::Comet));
    assert!(laser.wavelength_bounds().is_ok());
}

#[tokio::test]
async fn connecting_to_a_foreign_device_is_refused() {
    let mock = MockGateway::new();
    mock.handle().set_response("*IDN?", "ACME function generator");
    let err = Laser::connect(Box::new(mock)).await.unwrap_err();
    assert!(matches!(
        err,
        LaserError::Comm(laser_ctl::CommError::UnexpectedDevice(_))
    ));
}
