//! Calibration table data model and lookup.
//!
//! A calibration ("cycler") table maps every producible wavelength to the
//! heater and coupler set-points that physically emit it. The table is
//! validated once at construction and immutable afterwards; recalibration
//! replaces it wholesale, never patches it in place. That all-or-nothing rule
//! is what makes the binary-search lookup sound: wavelengths are strictly
//! increasing with the cycler index, exactly one entry per index.

use crate::error::{LaserError, Result};
use std::fmt;

pub mod loader;

pub use loader::{load_calibration, parse_calibration, CalibrationFile, ModeDefaults};

/// Laser model family a calibration was produced for.
///
/// Comet-class devices carry a hardware cycler and support sweep mode;
/// Atlas-class devices tune point-by-point only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaserModel {
    /// Single-point tunable device.
    Atlas,
    /// Sweep-capable device with a hardware cycler.
    Comet,
}

impl fmt::Display for LaserModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaserModel::Atlas => write!(f, "Atlas"),
            LaserModel::Comet => write!(f, "Comet"),
        }
    }
}

/// One calibrated operating point.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationEntry {
    /// Target wavelength in nanometers.
    pub wavelength: f64,
    /// Phase-section heater set-point.
    pub phase_section: f64,
    /// Large-ring heater set-point.
    pub large_ring: f64,
    /// Small-ring heater set-point.
    pub small_ring: f64,
    /// Tunable-coupler heater set-point.
    pub coupler: f64,
    /// Marks entries known to induce a laser mode hop when traversed.
    pub mode_hop_flag: bool,
    /// Position in the device-resident table (0-based, contiguous).
    pub cycler_index: usize,
}

impl CalibrationEntry {
    /// All four heater set-points in channel order
    /// (phase section, large ring, small ring, coupler).
    pub fn heater_values(&self) -> [f64; 4] {
        [
            self.phase_section,
            self.large_ring,
            self.small_ring,
            self.coupler,
        ]
    }
}

/// Ordered, validated collection of calibration entries.
///
/// Invariants (checked in [`CalibrationTable::new`], violations rejected with
/// `CalibrationFormat` before anything is installed):
/// - non-empty
/// - `cycler_index` contiguous from 0
/// - wavelengths finite and strictly increasing with index
#[derive(Debug, Clone)]
pub struct CalibrationTable {
    entries: Vec<CalibrationEntry>,
    step: f64,
}

impl CalibrationTable {
    /// Validate and install a sequence of entries.
    ///
    /// # Errors
    /// `CalibrationFormat` if the sequence is empty, indices are not
    /// contiguous, or wavelengths are not strictly increasing.
    pub fn new(entries: Vec<CalibrationEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(LaserError::CalibrationFormat(
                "empty calibration received".to_string(),
            ));
        }
        for (i, entry) in entries.iter().enumerate() {
            if entry.cycler_index != i {
                return Err(LaserError::CalibrationFormat(format!(
                    "entry {i} carries cycler index {}",
                    entry.cycler_index
                )));
            }
            if !entry.wavelength.is_finite() {
                return Err(LaserError::CalibrationFormat(format!(
                    "entry {i} has a non-finite wavelength"
                )));
            }
            if i > 0 && entry.wavelength <= entries[i - 1].wavelength {
                return Err(LaserError::CalibrationFormat(format!(
                    "wavelengths must be strictly increasing: entry {i} ({} nm) \
                     does not exceed entry {} ({} nm)",
                    entry.wavelength,
                    i - 1,
                    entries[i - 1].wavelength
                )));
            }
        }

        let step = if entries.len() > 1 {
            let span = entries[entries.len() - 1].wavelength - entries[0].wavelength;
            span / (entries.len() - 1) as f64
        } else {
            0.0
        };

        Ok(Self { entries, step })
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; a validated table holds at least one entry.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the last entry.
    pub fn last_index(&self) -> usize {
        self.entries.len() - 1
    }

    /// Lowest calibrated wavelength in nanometers.
    pub fn min_wavelength(&self) -> f64 {
        self.entries[0].wavelength
    }

    /// Highest calibrated wavelength in nanometers.
    pub fn max_wavelength(&self) -> f64 {
        self.entries[self.entries.len() - 1].wavelength
    }

    /// Nominal wavelength distance between neighboring entries.
    pub fn step_size(&self) -> f64 {
        self.step
    }

    /// All entries in index order.
    pub fn entries(&self) -> &[CalibrationEntry] {
        &self.entries
    }

    /// Entry at `index`.
    ///
    /// # Errors
    /// `IndexOutOfRange` when `index` is past the end of the table.
    pub fn lookup_by_index(&self, index: usize) -> Result<&CalibrationEntry> {
        self.entries
            .get(index)
            .ok_or(LaserError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            })
    }

    /// Index of the entry whose wavelength is nearest to `wl`.
    ///
    /// Binary search over the monotonic wavelength axis. Requests below the
    /// first entry resolve to index 0, above the last entry to the last
    /// index; an exact midpoint tie resolves toward the lower index.
    pub fn nearest_index_for_wavelength(&self, wl: f64) -> usize {
        let above = self.entries.partition_point(|e| e.wavelength < wl);
        if above == 0 {
            return 0;
        }
        if above == self.entries.len() {
            return self.entries.len() - 1;
        }
        let below = above - 1;
        let dist_below = wl - self.entries[below].wavelength;
        let dist_above = self.entries[above].wavelength - wl;
        if dist_below <= dist_above {
            below
        } else {
            above
        }
    }

    /// Entry nearest to `wl`, and whether the match is exact.
    ///
    /// `exact` is true only on a bit-for-bit match against a stored entry's
    /// wavelength.
    pub fn lookup_by_wavelength(&self, wl: f64) -> (&CalibrationEntry, bool) {
        let index = self.nearest_index_for_wavelength(wl);
        let entry = &self.entries[index];
        (entry, entry.wavelength == wl)
    }
}
