//! Calibration file loading.
//!
//! Calibration files have two sections:
//!
//! ```text
//! [default_settings]
//! laser_model = COMET
//! tune_diode_current = 280.0
//! tune_tec_target = 25.0
//! sweep_diode_current = 280.0
//! sweep_tec_target = 25.0
//! sweep_interval = 100
//! [look_up_table]
//! 10.0;20.0;30.0;40.0;1540.0;0
//! 11.0;21.0;31.0;41.0;1540.1;0
//! ...
//! ```
//!
//! The lookup-table rows are semicolon-delimited:
//! `phase;large_ring;small_ring;coupler;wavelength;hop_flag`. Files without a
//! `[default_settings]` block fall back to hard-coded defaults. Loading is
//! all-or-nothing: any malformed row or missing key rejects the whole file.

use super::{CalibrationEntry, CalibrationTable, LaserModel};
use crate::error::{LaserError, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::warn;

const DEFAULTS_HEADER: &str = "[default_settings]";
const TABLE_HEADER: &str = "[look_up_table]";

// Fallbacks for calibration files without a defaults block.
const FALLBACK_MODEL: LaserModel = LaserModel::Comet;
const FALLBACK_DIODE_CURRENT_MA: f64 = 280.0;
const FALLBACK_TEC_TARGET_C: f64 = 25.0;
const FALLBACK_SWEEP_INTERVAL_US: u64 = 100;

/// Calibrated operating defaults for one mode.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeDefaults {
    /// Diode drive current in milliamps.
    pub diode_current_ma: f64,
    /// TEC temperature target in Celsius.
    pub tec_target_c: f64,
    /// Cycler step interval in microseconds (sweep defaults only).
    pub step_interval_us: Option<u64>,
}

/// Everything a calibration file provides: the validated table plus the
/// per-mode operating defaults.
#[derive(Debug, Clone)]
pub struct CalibrationFile {
    /// Device family the calibration was produced for.
    pub model: LaserModel,
    /// The validated lookup table.
    pub table: CalibrationTable,
    /// Defaults applied when entering steady mode.
    pub steady: ModeDefaults,
    /// Defaults applied when entering sweep mode (Comet only).
    pub sweep: Option<ModeDefaults>,
}

/// Load and validate a calibration file from disk.
///
/// # Errors
/// `Io` if the file cannot be read, `CalibrationFormat` on any structural
/// problem. Nothing is installed on failure.
pub fn load_calibration(path: &Path) -> Result<CalibrationFile> {
    let file = File::open(path)?;
    parse_calibration(BufReader::new(file))
}

/// Parse a calibration file from any buffered reader.
pub fn parse_calibration(reader: impl BufRead) -> Result<CalibrationFile> {
    let mut lines = reader.lines();

    let first = loop {
        match lines.next() {
            Some(line) => {
                let line = line?;
                if !line.trim().is_empty() {
                    break line;
                }
            }
            None => {
                return Err(LaserError::CalibrationFormat(
                    "empty calibration file".to_string(),
                ))
            }
        }
    };

    let (model, steady, sweep, first_row) = if first.trim().eq_ignore_ascii_case(DEFAULTS_HEADER) {
        let (model, steady, sweep) = parse_defaults_block(&mut lines)?;
        (model, steady, sweep, None)
    } else {
        // No defaults block: the first line already belongs to the table.
        let steady = ModeDefaults {
            diode_current_ma: FALLBACK_DIODE_CURRENT_MA,
            tec_target_c: FALLBACK_TEC_TARGET_C,
            step_interval_us: None,
        };
        let sweep = match FALLBACK_MODEL {
            LaserModel::Comet => Some(ModeDefaults {
                diode_current_ma: FALLBACK_DIODE_CURRENT_MA,
                tec_target_c: FALLBACK_TEC_TARGET_C,
                step_interval_us: Some(FALLBACK_SWEEP_INTERVAL_US),
            }),
            LaserModel::Atlas => None,
        };
        (FALLBACK_MODEL, steady, sweep, Some(first))
    };

    let mut entries = Vec::new();
    let mut cycler_index = 0;
    let mut push_row = |line: &str| -> Result<()> {
        if line.trim().is_empty() {
            return Ok(());
        }
        entries.push(parse_row(line, cycler_index)?);
        cycler_index += 1;
        Ok(())
    };

    if let Some(row) = first_row {
        push_row(&row)?;
    }
    for line in lines {
        push_row(&line?)?;
    }

    let table = CalibrationTable::new(entries)?;
    Ok(CalibrationFile {
        model,
        table,
        steady,
        sweep,
    })
}

/// Parse `key = value` lines until the `[look_up_table]` marker.
fn parse_defaults_block(
    lines: &mut impl Iterator<Item = std::io::Result<String>>,
) -> Result<(LaserModel, ModeDefaults, Option<ModeDefaults>)> {
    let mut settings: HashMap<String, String> = HashMap::new();

    loop {
        let line = match lines.next() {
            Some(line) => line?,
            None => {
                return Err(LaserError::CalibrationFormat(
                    "unexpected end of file: no calibration data found".to_string(),
                ))
            }
        };
        let line = line.trim();
        if line.eq_ignore_ascii_case(TABLE_HEADER) {
            break;
        }
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        settings.insert(key.trim().to_ascii_uppercase(), value.trim().to_string());
    }

    let model = match settings.remove("LASER_MODEL") {
        Some(value) => match value.to_ascii_uppercase().as_str() {
            "ATLAS" => LaserModel::Atlas,
            "COMET" => LaserModel::Comet,
            other => {
                return Err(LaserError::CalibrationFormat(format!(
                    "unknown laser model '{other}'"
                )))
            }
        },
        None => {
            return Err(LaserError::CalibrationFormat(
                "calibration data incomplete: missing parameter LASER_MODEL".to_string(),
            ))
        }
    };

    let steady = ModeDefaults {
        diode_current_ma: take_f64(&mut settings, "TUNE_DIODE_CURRENT")?,
        tec_target_c: take_f64(&mut settings, "TUNE_TEC_TARGET")?,
        step_interval_us: None,
    };

    let sweep = match model {
        LaserModel::Atlas => None,
        LaserModel::Comet => Some(ModeDefaults {
            diode_current_ma: take_f64(&mut settings, "SWEEP_DIODE_CURRENT")?,
            tec_target_c: take_f64(&mut settings, "SWEEP_TEC_TARGET")?,
            step_interval_us: Some(take_f64(&mut settings, "SWEEP_INTERVAL")? as u64),
        }),
    };

    for key in settings.keys() {
        warn!(param = key.as_str(), "ignoring unrecognized calibration parameter");
    }

    Ok((model, steady, sweep))
}

fn take_f64(settings: &mut HashMap<String, String>, key: &str) -> Result<f64> {
    let raw = settings.remove(key).ok_or_else(|| {
        LaserError::CalibrationFormat(format!(
            "calibration data incomplete: missing parameter {key}"
        ))
    })?;
    raw.parse::<f64>().map_err(|_| {
        LaserError::CalibrationFormat(format!("parameter {key} has non-numeric value '{raw}'"))
    })
}

fn parse_row(line: &str, cycler_index: usize) -> Result<CalibrationEntry> {
    let fields: Vec<&str> = line.trim().split(';').collect();
    if fields.len() < 6 {
        return Err(LaserError::CalibrationFormat(format!(
            "row {cycler_index}: expected 6 columns, found {}",
            fields.len()
        )));
    }

    let column = |i: usize| -> Result<f64> {
        fields[i].trim().parse::<f64>().map_err(|_| {
            LaserError::CalibrationFormat(format!(
                "row {cycler_index}: non-numeric value '{}' in column {i}",
                fields[i].trim()
            ))
        })
    };

    Ok(CalibrationEntry {
        phase_section: column(0)?,
        large_ring: column(1)?,
        small_ring: column(2)?,
        coupler: column(3)?,
        wavelength: column(4)?,
        mode_hop_flag: fields[5].trim() == "1",
        cycler_index,
    })
}
