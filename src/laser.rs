//! High-level laser session.
//!
//! [`Laser`] owns the gateway, the installed calibration, and the mode state
//! machine, and is the only type callers normally touch. Operations are gated
//! by mode: calibrated wavelength moves need steady mode, raw heater writes
//! need manual mode, sweeping needs sweep mode. Wavelength state is tracked
//! host-side and updated only on device-confirmed actuations.

use crate::calibration::{
    load_calibration, CalibrationFile, CalibrationTable, LaserModel, ModeDefaults,
};
use crate::comm::{shared, Gateway, SharedGateway};
use crate::components::{DiodeDriver, HeaterChannel, HeaterDriver, SystemIdentity, SystemInfo, TecDriver};
use crate::error::{CommError, LaserError, Result};
use crate::modes::{ChangeMethod, LaserMode};
use crate::session::{shared_session, SharedSession};
use crate::sweep::{SweepController, SweepDirection};
use crate::tuning;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

struct InstalledCalibration {
    model: LaserModel,
    method: ChangeMethod,
    table: Arc<CalibrationTable>,
    steady: ModeDefaults,
    sweep: Option<ModeDefaults>,
}

/// A connected laser module.
pub struct Laser {
    gateway: SharedGateway,
    session: SharedSession,
    mode: LaserMode,
    calibration: Option<InstalledCalibration>,
    heaters: HeaterDriver,
    diode: DiodeDriver,
    tec: TecDriver,
    system: SystemInfo,
    sweep: SweepController,
    auto_trigger: bool,
}

impl std::fmt::Debug for Laser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Laser")
            .field("mode", &self.mode)
            .field("auto_trigger", &self.auto_trigger)
            .finish_non_exhaustive()
    }
}

impl Laser {
    /// Take ownership of a gateway and verify the device behind it.
    ///
    /// Sends `*IDN?` and rejects anything that does not identify as a Chilas
    /// module. The session starts in manual mode with no calibration.
    pub async fn connect(gateway: Box<dyn Gateway>) -> Result<Self> {
        let gateway = shared(gateway);

        let identity = gateway.lock().await.query("*IDN?").await?;
        if !identity.contains("Chilas") {
            return Err(CommError::UnexpectedDevice(identity).into());
        }
        info!(identity, "connected");

        let session = shared_session();
        Ok(Self {
            heaters: HeaterDriver::new(Arc::clone(&gateway)),
            diode: DiodeDriver::new(Arc::clone(&gateway)),
            tec: TecDriver::new(Arc::clone(&gateway)),
            system: SystemInfo::new(Arc::clone(&gateway)),
            sweep: SweepController::new(Arc::clone(&gateway), Arc::clone(&session)),
            gateway,
            session,
            mode: LaserMode::Manual,
            calibration: None,
            auto_trigger: false,
        })
    }

    /// Connect and install a calibration file in one step.
    pub async fn connect_with_calibration(
        gateway: Box<dyn Gateway>,
        calibration_path: &Path,
    ) -> Result<Self> {
        let calibration = load_calibration(calibration_path)?;
        let mut laser = Self::connect(gateway).await?;
        laser.install_calibration(calibration).await?;
        Ok(laser)
    }

    /// Install (or replace) the calibration table and mode defaults.
    ///
    /// Replacing a calibration invalidates the tracked wavelength position
    /// and any configured sweep bounds.
    ///
    /// # Errors
    /// `SweepActive` while a sweep is running.
    pub async fn install_calibration(&mut self, calibration: CalibrationFile) -> Result<()> {
        self.sweep.clear_bounds()?;
        info!(
            model = %calibration.model,
            entries = calibration.table.len(),
            "calibration installed"
        );
        self.calibration = Some(InstalledCalibration {
            model: calibration.model,
            method: ChangeMethod::for_model(calibration.model),
            table: Arc::new(calibration.table),
            steady: calibration.steady,
            sweep: calibration.sweep,
        });
        self.session.lock().await.clear_position();
        Ok(())
    }

    /// Device family of the installed calibration, if any.
    pub fn model(&self) -> Option<LaserModel> {
        self.calibration.as_ref().map(|c| c.model)
    }

    /// The installed calibration table, if any.
    pub fn calibration_table(&self) -> Option<&CalibrationTable> {
        self.calibration.as_ref().map(|c| c.table.as_ref())
    }

    /// The currently active mode.
    pub fn mode(&self) -> LaserMode {
        self.mode
    }

    // ---- power -----------------------------------------------------------

    /// Power the system on: supervision, TEC loop, then the pump diode.
    pub async fn turn_on(&mut self) -> Result<()> {
        self.gateway.lock().await.query("SYST:STAT 1").await?;
        self.tec.set_state(true).await?;
        self.diode.set_state(true).await?;
        let mut state = self.session.lock().await;
        state.system_on = true;
        state.tec_on = true;
        state.diode_on = true;
        info!("system on");
        Ok(())
    }

    /// Power the pump diode and the system off.
    ///
    /// A running sweep is stopped first, and the session drops back to manual
    /// mode; the tracked wavelength position is forgotten because the heaters
    /// cool down unpowered.
    pub async fn turn_off(&mut self) -> Result<()> {
        self.sweep.stop().await;
        self.diode.set_state(false).await?;
        self.tec.set_state(false).await?;
        self.gateway.lock().await.query("SYST:STAT 0").await?;
        let mut state = self.session.lock().await;
        state.system_on = false;
        state.tec_on = false;
        state.diode_on = false;
        state.clear_position();
        drop(state);
        self.mode = LaserMode::Manual;
        info!("system off");
        Ok(())
    }

    // ---- mode state machine ----------------------------------------------

    /// Switch operating mode, running the target mode's activation sequence.
    ///
    /// Switching to the active mode is a no-op. Leaving sweep mode stops a
    /// running sweep. Entering steady or sweep mode applies the calibrated
    /// diode-current and TEC defaults for that mode; entering steady mode
    /// additionally re-actuates the tracked entry (or the first table entry
    /// on the very first activation) so that relative moves always have a
    /// defined starting point. Manual mode leaves the heaters untouched.
    ///
    /// # Errors
    /// `SystemOff` unless the system is powered; `NoCalibration` for steady
    /// and sweep without a table; `SweepUnsupported` for sweep on a
    /// non-Comet device.
    pub async fn set_mode(&mut self, mode: LaserMode) -> Result<()> {
        if mode == self.mode {
            return Ok(());
        }
        if !self.session.lock().await.system_on {
            return Err(LaserError::SystemOff);
        }
        if mode.requires_calibration() && self.calibration.is_none() {
            return Err(LaserError::NoCalibration);
        }
        if mode == LaserMode::Sweep {
            let model = self.calibration.as_ref().map(|c| c.model);
            if model != Some(LaserModel::Comet) {
                // requires_calibration() was checked above.
                return Err(LaserError::SweepUnsupported(
                    model.unwrap_or(LaserModel::Atlas),
                ));
            }
        }

        if self.mode == LaserMode::Sweep {
            self.sweep.stop().await;
        }

        match mode {
            LaserMode::Manual => {}
            LaserMode::Steady => {
                let (defaults, method, table) = {
                    let cal = self.calibration.as_ref().ok_or(LaserError::NoCalibration)?;
                    (cal.steady.clone(), cal.method, Arc::clone(&cal.table))
                };
                self.apply_defaults(&defaults).await?;
                let tracked = self.session.lock().await.current_index;
                match tracked {
                    Some(_) => {
                        tuning::reapply(&self.gateway, &self.session, &table, method).await?;
                    }
                    None => {
                        let first = table.lookup_by_index(0)?.clone();
                        tuning::write_entry(&self.gateway, method, &first).await?;
                        self.session.lock().await.confirm(0, first.wavelength);
                    }
                }
            }
            LaserMode::Sweep => {
                let (defaults, interval_us) = {
                    let cal = self.calibration.as_ref().ok_or(LaserError::NoCalibration)?;
                    let defaults = cal.sweep.clone().ok_or(LaserError::SweepUnsupported(cal.model))?;
                    let interval = defaults.step_interval_us;
                    (defaults, interval)
                };
                self.apply_defaults(&defaults).await?;
                if let Some(us) = interval_us {
                    self.sweep.set_step_interval(Duration::from_micros(us))?;
                }
            }
        }

        info!(from = %self.mode, to = %mode, "mode switched");
        self.mode = mode;
        Ok(())
    }

    async fn apply_defaults(&mut self, defaults: &ModeDefaults) -> Result<()> {
        self.diode.set_current(defaults.diode_current_ma).await?;
        self.tec.set_target(defaults.tec_target_c).await?;
        Ok(())
    }

    // ---- calibrated wavelength control (steady mode) ---------------------

    fn require_mode(&self, expected: LaserMode) -> Result<()> {
        if self.mode != expected {
            return Err(LaserError::WrongMode {
                expected,
                actual: self.mode,
            });
        }
        Ok(())
    }

    fn installed(&self) -> Result<(&InstalledCalibration, Arc<CalibrationTable>)> {
        let cal = self.calibration.as_ref().ok_or(LaserError::NoCalibration)?;
        let table = Arc::clone(&cal.table);
        Ok((cal, table))
    }

    /// Move to the calibrated entry nearest `nm` (absolute, nanometers).
    ///
    /// Requests up to one nominal table step beyond either end of the
    /// calibrated range clamp to the boundary entry; anything further is
    /// rejected with `OutOfRange` and no command is sent.
    pub async fn set_wavelength(&mut self, nm: f64) -> Result<()> {
        self.require_mode(LaserMode::Steady)?;
        let (cal, table) = self.installed()?;
        let method = cal.method;
        let index = resolve_index(&table, nm)?;
        tuning::set_index(&self.gateway, &self.session, &table, method, index).await?;
        self.emit_trigger_if_enabled().await
    }

    /// Move by `delta_nm` relative to the tracked wavelength.
    pub async fn set_wavelength_relative(&mut self, delta_nm: f64) -> Result<()> {
        self.require_mode(LaserMode::Steady)?;
        let current = self
            .session
            .lock()
            .await
            .current_wavelength
            .ok_or(LaserError::NoCalibration)?;
        self.set_wavelength(current + delta_nm).await
    }

    /// Move to the calibration entry at `index` directly.
    pub async fn set_wavelength_by_index(&mut self, index: usize) -> Result<()> {
        self.require_mode(LaserMode::Steady)?;
        let (cal, table) = self.installed()?;
        let method = cal.method;
        tuning::set_index(&self.gateway, &self.session, &table, method, index).await?;
        self.emit_trigger_if_enabled().await
    }

    /// Wavelength of the last confirmed entry, if any.
    pub async fn wavelength(&self) -> Option<f64> {
        self.session.lock().await.current_wavelength
    }

    /// Cycler index of the last confirmed entry, if any.
    pub async fn cycler_index(&self) -> Option<usize> {
        self.session.lock().await.current_index
    }

    /// Calibrated wavelength range in nanometers.
    pub fn wavelength_bounds(&self) -> Result<(f64, f64)> {
        let (_, table) = self.installed()?;
        Ok((table.min_wavelength(), table.max_wavelength()))
    }

    // ---- manual heater access (manual mode) ------------------------------

    /// Write a raw heater value. Manual mode only.
    pub async fn set_heater(&mut self, channel: HeaterChannel, value: f64) -> Result<()> {
        self.require_mode(LaserMode::Manual)?;
        self.heaters.set_value(channel, value).await
    }

    /// Read back a heater's present drive value (any mode).
    pub async fn heater(&self, channel: HeaterChannel) -> Result<f64> {
        self.heaters.value(channel).await
    }

    /// Hardware drive limits of a heater channel.
    pub async fn heater_limits(&mut self, channel: HeaterChannel) -> Result<(f64, f64)> {
        self.heaters.limits(channel).await
    }

    // ---- sweeping (sweep mode) -------------------------------------------

    /// Configure the wavelength range a sweep covers, in nanometers.
    pub fn set_sweep_bounds(&mut self, start_nm: f64, end_nm: f64) -> Result<()> {
        let (_, table) = self.installed()?;
        let start = resolve_index(&table, start_nm)?;
        let end = resolve_index(&table, end_nm)?;
        self.sweep.set_bounds(table, start, end)
    }

    /// Set the sweep dwell time per entry.
    pub fn set_sweep_interval(&mut self, interval: Duration) -> Result<()> {
        self.sweep.set_step_interval(interval)
    }

    /// Set the sweep direction.
    pub fn set_sweep_direction(&mut self, direction: SweepDirection) -> Result<()> {
        self.sweep.set_direction(direction)
    }

    /// Start sweeping. Sweep mode only; starting twice is a no-op.
    pub async fn start_sweep(&mut self) -> Result<()> {
        self.require_mode(LaserMode::Sweep)?;
        self.sweep.start().await
    }

    /// Stop a running sweep; a no-op when idle.
    pub async fn stop_sweep(&mut self) {
        self.sweep.stop().await;
    }

    /// Whether a sweep task is currently alive.
    pub fn sweep_running(&mut self) -> bool {
        self.sweep.is_running()
    }

    /// Wall-clock duration of one full sweep pass, if bounds are configured.
    pub fn sweep_pass_duration(&self) -> Option<Duration> {
        self.sweep.estimated_pass_duration()
    }

    // ---- trigger output --------------------------------------------------

    /// Emit one pulse on the trigger output.
    pub async fn trigger_pulse(&mut self) -> Result<()> {
        let mut gw = self.gateway.lock().await;
        gw.query("DRV:CYC:TRIG 1").await?;
        gw.query("DRV:CYC:TRIG 0").await?;
        Ok(())
    }

    /// Emit a trigger pulse automatically after every confirmed wavelength
    /// move in steady mode.
    pub fn set_auto_trigger(&mut self, enabled: bool) {
        self.auto_trigger = enabled;
    }

    async fn emit_trigger_if_enabled(&mut self) -> Result<()> {
        if self.auto_trigger {
            self.trigger_pulse().await?;
        }
        Ok(())
    }

    // ---- status ----------------------------------------------------------

    /// Hardware/firmware identity of the module.
    pub async fn identity(&mut self) -> Result<SystemIdentity> {
        Ok(self.system.identity().await?.clone())
    }

    /// Seconds since the device powered on.
    pub async fn uptime_secs(&self) -> Result<u64> {
        self.system.uptime_secs().await
    }

    /// Measured TEC temperature in Celsius.
    pub async fn temperature(&self) -> Result<f64> {
        self.tec.temperature().await
    }

    /// Present diode drive current in milliamps.
    pub async fn diode_current(&self) -> Result<f64> {
        self.diode.current().await
    }
}

/// Resolve a wavelength request to a table index.
///
/// Inside the calibrated range this is a nearest-entry lookup. Requests up to
/// one nominal step outside the range clamp to the boundary entry; beyond
/// that the request is rejected.
fn resolve_index(table: &CalibrationTable, nm: f64) -> Result<usize> {
    let min = table.min_wavelength();
    let max = table.max_wavelength();
    let slack = table.step_size();
    if nm < min {
        if min - nm <= slack {
            Ok(0)
        } else {
            Err(LaserError::OutOfRange {
                requested: nm,
                min,
                max,
            })
        }
    } else if nm > max {
        if nm - max <= slack {
            Ok(table.last_index())
        } else {
            Err(LaserError::OutOfRange {
                requested: nm,
                min,
                max,
            })
        }
    } else {
        Ok(table.nearest_index_for_wavelength(nm))
    }
}
