//! Tracked device state for one connection.
//!
//! The driver board does not report which cycler entry it last actuated, so
//! the session keeps a host-side shadow of it. The shadow is updated only
//! after the device has acknowledged the corresponding command; a failed
//! actuation leaves it at the last confirmed point.

use std::sync::Arc;
use tokio::sync::Mutex;

/// Host-side shadow of the device state.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Whether the system (TEC loop and supervision) is powered.
    pub system_on: bool,
    /// Whether the pump diode is emitting.
    pub diode_on: bool,
    /// Whether the TEC control loop is engaged.
    pub tec_on: bool,
    /// Last cycler index confirmed by the device, if any wavelength has been
    /// set since the calibration was installed.
    pub current_index: Option<usize>,
    /// Wavelength of `current_index` in nanometers.
    pub current_wavelength: Option<f64>,
}

impl SessionState {
    /// Record a confirmed move to a calibration entry.
    pub fn confirm(&mut self, index: usize, wavelength: f64) {
        self.current_index = Some(index);
        self.current_wavelength = Some(wavelength);
    }

    /// Forget the tracked position (calibration replaced, device power cycled).
    pub fn clear_position(&mut self) {
        self.current_index = None;
        self.current_wavelength = None;
    }
}

/// Session state shared between the laser facade and the sweep task.
pub type SharedSession = Arc<Mutex<SessionState>>;

/// Create a fresh shared session.
pub fn shared_session() -> SharedSession {
    Arc::new(Mutex::new(SessionState::default()))
}
