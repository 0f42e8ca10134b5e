//! Operating modes and actuation strategies.

use crate::calibration::LaserModel;
use std::fmt;

/// Operating mode of the laser.
///
/// Mode gates which operations are legal: wavelength moves need `Steady`,
/// direct heater writes need `Manual`, sweeping needs `Sweep`. Transitions
/// are driven through [`Laser::set_mode`](crate::laser::Laser::set_mode),
/// which enforces the preconditions and runs the activation sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaserMode {
    /// Raw heater access, no calibration required.
    Manual,
    /// Calibrated single-wavelength operation.
    Steady,
    /// Continuous calibrated wavelength sweeping (Comet only).
    Sweep,
}

impl LaserMode {
    /// Whether entering this mode requires an installed calibration.
    pub fn requires_calibration(self) -> bool {
        match self {
            LaserMode::Manual => false,
            LaserMode::Steady | LaserMode::Sweep => true,
        }
    }
}

impl fmt::Display for LaserMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaserMode::Manual => write!(f, "manual"),
            LaserMode::Steady => write!(f, "steady"),
            LaserMode::Sweep => write!(f, "sweep"),
        }
    }
}

/// How a calibration entry is actuated on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeMethod {
    /// Stage all four heater values with `DRV:DP`, then commit with `DRV:U`.
    PreLoad,
    /// Recall a row of the device-resident cycler table with `DRV:CYC:LOAD`.
    CyclerIndex,
}

impl ChangeMethod {
    /// The actuation strategy native to `model`.
    pub fn for_model(model: LaserModel) -> Self {
        match model {
            LaserModel::Atlas => ChangeMethod::CyclerIndex,
            LaserModel::Comet => ChangeMethod::PreLoad,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_manual_mode_works_without_calibration() {
        assert!(!LaserMode::Manual.requires_calibration());
        assert!(LaserMode::Steady.requires_calibration());
        assert!(LaserMode::Sweep.requires_calibration());
    }

    #[test]
    fn change_method_follows_the_model_family() {
        assert_eq!(ChangeMethod::for_model(LaserModel::Comet), ChangeMethod::PreLoad);
        assert_eq!(
            ChangeMethod::for_model(LaserModel::Atlas),
            ChangeMethod::CyclerIndex
        );
    }
}
