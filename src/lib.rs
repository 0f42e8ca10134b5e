//! # laser-ctl
//!
//! Calibration-driven wavelength control for Chilas tunable lasers over a
//! serial link.
//!
//! The device exposes four thermo-optic heaters; a factory calibration table
//! maps each producible wavelength to the heater set-points that emit it.
//! This crate loads and validates that table, tracks the device's position in
//! it, and drives wavelength changes through an anti-hysteresis actuation
//! sequence so repeated moves land on reproducible optical points.
//!
//! ## Module map
//!
//! - **`comm`**: the [`Gateway`](comm::Gateway) transport trait, the RS-232
//!   implementation, and a scripted mock for tests.
//! - **`calibration`**: table data model, validation, file loading.
//! - **`components`**: typed drivers for heaters, pump diode, TEC, and the
//!   system identity block.
//! - **`session`**: host-side shadow of the device state.
//! - **`modes`**: operating modes and per-model actuation strategies.
//! - **`tuning`**: the anti-hysteresis wavelength actuation sequence.
//! - **`sweep`**: the continuous-sweep task and its controller.
//! - **`laser`**: the [`Laser`] facade tying all of the above together.
//! - **`config`** / **`logging`**: application settings and tracing setup.
//!
//! ## Quick start
//!
//! ```no_run
//! # async fn demo() -> laser_ctl::Result<()> {
//! use laser_ctl::comm::SerialGateway;
//! use laser_ctl::{Laser, LaserMode};
//! use std::path::Path;
//! use std::time::Duration;
//!
//! let gateway = SerialGateway::open("/dev/ttyUSB0", 57_600, Duration::from_secs(2))?;
//! let mut laser =
//!     Laser::connect_with_calibration(Box::new(gateway), Path::new("cal.csv")).await?;
//! laser.turn_on().await?;
//! laser.set_mode(LaserMode::Steady).await?;
//! laser.set_wavelength(1550.0).await?;
//! # Ok(())
//! # }
//! ```

pub mod calibration;
pub mod comm;
pub mod components;
pub mod config;
pub mod error;
pub mod laser;
pub mod logging;
pub mod modes;
pub mod session;
pub mod sweep;
pub mod tuning;

pub use calibration::{CalibrationEntry, CalibrationFile, CalibrationTable, LaserModel};
pub use components::HeaterChannel;
pub use error::{CommError, LaserError, Result};
pub use laser::Laser;
pub use modes::{ChangeMethod, LaserMode};
pub use sweep::SweepDirection;
