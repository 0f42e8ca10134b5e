//! Custom error types for the crate.
//!
//! This module defines the primary error type, `LaserError`, for the entire
//! crate. Using the `thiserror` crate, it provides a centralized and
//! consistent way to handle the different kinds of failures a laser session
//! can run into, from transport problems to calibration-domain violations.
//!
//! ## Error Hierarchy
//!
//! `LaserError` consolidates the error sources the wavelength-control engine
//! distinguishes:
//!
//! - **`CalibrationFormat`**: a calibration table or file failed validation at
//!   load time. Fatal to that load; the table is never partially installed.
//! - **`NoCalibration`**: a calibrated mode (Steady/Sweep) was requested while
//!   no calibration table is installed. Recoverable by loading one.
//! - **`OutOfRange` / `IndexOutOfRange` / `InvalidRange` / `InvalidInterval`**:
//!   a requested wavelength, index, bound pair, or step interval falls outside
//!   its valid domain. The request is rejected with state unchanged.
//! - **`Actuation`**: a device write failed mid-procedure. Session state is
//!   guaranteed consistent with the last *confirmed* write; the caller must
//!   re-verify device state before retrying.
//! - **`SweepActive`**: reconfiguration was attempted while a sweep is
//!   running. Stop the sweep first.
//! - **`Comm`**: a transport-level failure surfaced verbatim from the
//!   [`Gateway`](crate::comm::Gateway).
//!
//! None of these are swallowed internally; every operation propagates them to
//! the caller with `?`. There is no global retry policy because physical
//! actuation is not always safe to repeat blindly.

use crate::calibration::LaserModel;
use crate::modes::LaserMode;
use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type Result<T> = std::result::Result<T, LaserError>;

/// Transport-level failures reported by a [`Gateway`](crate::comm::Gateway).
#[derive(Error, Debug)]
pub enum CommError {
    /// Underlying I/O failure on the transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No reply arrived within the transport timeout.
    #[error("timed out waiting for a reply to '{command}'")]
    Timeout {
        /// The command that went unanswered.
        command: String,
    },

    /// The device answered with a nonzero return code.
    #[error("device error {code}: {message}")]
    Device {
        /// Firmware error code (e.g. `E014`).
        code: String,
        /// Human-readable message from the device, possibly empty.
        message: String,
    },

    /// A reply arrived but its payload could not be parsed.
    #[error("could not parse reply to '{command}': '{payload}'")]
    Parse {
        /// The command that was sent.
        command: String,
        /// The unparseable payload.
        payload: String,
    },

    /// The connected device did not identify as a supported laser module.
    #[error("unexpected device identity: '{0}'")]
    UnexpectedDevice(String),
}

/// Primary error type for laser control operations.
#[derive(Error, Debug)]
pub enum LaserError {
    /// The calibration data failed validation and was not installed.
    #[error("calibration format error: {0}")]
    CalibrationFormat(String),

    /// A calibrated mode was requested without an installed table.
    #[error("no calibration table is loaded")]
    NoCalibration,

    /// A requested value falls outside its valid domain.
    #[error("requested value {requested} outside valid range {min}..{max}")]
    OutOfRange {
        /// The rejected value.
        requested: f64,
        /// Lower end of the valid domain.
        min: f64,
        /// Upper end of the valid domain.
        max: f64,
    },

    /// A table index falls outside the installed table.
    #[error("index {index} outside calibration table of {len} entries")]
    IndexOutOfRange {
        /// The rejected index.
        index: usize,
        /// Number of entries in the table.
        len: usize,
    },

    /// Sweep bounds resolved to an empty or inverted index range.
    #[error("invalid sweep range: start index {start} must be below end index {end}")]
    InvalidRange {
        /// Resolved start index.
        start: usize,
        /// Resolved end index.
        end: usize,
    },

    /// A sweep step interval falls outside the supported range.
    #[error("step interval {0:?} outside supported range (20 us to 50 ms)")]
    InvalidInterval(Duration),

    /// A device write failed mid-procedure. Session state reflects the last
    /// confirmed write, never the attempted one.
    #[error("actuation failed: {0}")]
    Actuation(String),

    /// Reconfiguration attempted while a sweep is running.
    #[error("sweep is running; stop it before reconfiguring")]
    SweepActive,

    /// A sweep was started before its bounds were configured.
    #[error("sweep bounds are not configured")]
    SweepNotConfigured,

    /// Sweep mode was requested on a device class without a hardware cycler.
    #[error("sweep mode requires a Comet-class device (model is {0})")]
    SweepUnsupported(LaserModel),

    /// The operation is not available in the currently active mode.
    #[error("operation requires {expected} mode (currently in {actual} mode)")]
    WrongMode {
        /// Mode the operation belongs to.
        expected: LaserMode,
        /// Mode that is actually active.
        actual: LaserMode,
    },

    /// A mode transition was attempted while the system is off.
    #[error("system is off; turn it on before switching modes")]
    SystemOff,

    /// Transport-level failure, surfaced verbatim from the gateway.
    #[error("communication error: {0}")]
    Comm(#[from] CommError),

    /// Configuration file error.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// File-level I/O error (calibration loading).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
