//! Shared fixtures for the integration tests: synthetic calibrations and a
//! connected laser backed by the scripted mock gateway.

#![allow(dead_code)]

use laser_ctl::calibration::{
    CalibrationEntry, CalibrationFile, CalibrationTable, LaserModel, ModeDefaults,
};
use laser_ctl::comm::{MockGateway, MockHandle};
use laser_ctl::Laser;

/// Strictly increasing table: `len` entries from `start_nm` in `step_nm`
/// increments, with recognizable per-entry heater values.
pub fn table(len: usize, start_nm: f64, step_nm: f64) -> CalibrationTable {
    let entries = (0..len)
        .map(|i| CalibrationEntry {
            wavelength: start_nm + i as f64 * step_nm,
            phase_section: 10.0 + i as f64,
            large_ring: 20.0 + i as f64,
            small_ring: 30.0 + i as f64,
            coupler: 40.0 + i as f64,
            mode_hop_flag: false,
            cycler_index: i,
        })
        .collect();
    CalibrationTable::new(entries).expect("fixture table must validate")
}

/// A complete calibration for `model` over `len` entries starting at 1540 nm.
pub fn calibration(model: LaserModel, len: usize, step_nm: f64) -> CalibrationFile {
    let sweep = match model {
        LaserModel::Comet => Some(ModeDefaults {
            diode_current_ma: 300.0,
            tec_target_c: 25.0,
            step_interval_us: Some(100),
        }),
        LaserModel::Atlas => None,
    };
    CalibrationFile {
        model,
        table: table(len, 1540.0, step_nm),
        steady: ModeDefaults {
            diode_current_ma: 280.0,
            tec_target_c: 25.0,
            step_interval_us: None,
        },
        sweep,
    }
}

/// Connect a laser to a fresh mock and install the given calibration.
pub async fn laser_with(model: LaserModel, len: usize, step_nm: f64) -> (Laser, MockHandle) {
    let mock = MockGateway::new();
    let handle = mock.handle();
    let mut laser = Laser::connect(Box::new(mock))
        .await
        .expect("mock identifies as a Chilas device");
    laser
        .install_calibration(calibration(model, len, step_nm))
        .await
        .expect("fixture calibration installs");
    (laser, handle)
}

/// Connect a laser with no calibration installed.
pub async fn bare_laser() -> (Laser, MockHandle) {
    let mock = MockGateway::new();
    let handle = mock.handle();
    let laser = Laser::connect(Box::new(mock))
        .await
        .expect("mock identifies as a Chilas device");
    (laser, handle)
}
