//! Calibrated wavelength actuation.
//!
//! Thermo-optic heaters drift with their drive history, so landing on an
//! entry from below and landing on it from above settle at slightly different
//! optical points. Every move therefore approaches the target from the same
//! side: first actuate a reference entry a few steps above the target, then
//! step down onto the target itself. Approaching from a fixed side makes the
//! emitted wavelength reproducible regardless of where the laser was before.

use crate::calibration::{CalibrationEntry, CalibrationTable};
use crate::comm::SharedGateway;
use crate::error::{CommError, LaserError, Result};
use crate::modes::ChangeMethod;
use crate::session::SharedSession;
use std::time::Duration;
use tracing::debug;

/// Steps above the target used as the anti-hysteresis reference point.
pub const OVERSHOOT_STEPS: usize = 8;

/// Settle time between the reference actuation and the target actuation.
const SETTLE: Duration = Duration::from_millis(5);

/// Send one calibration entry to the device using `method`.
///
/// Errors are reported as `Actuation` naming the command that failed; the
/// caller's session shadow is untouched on failure.
pub async fn write_entry(
    gateway: &SharedGateway,
    method: ChangeMethod,
    entry: &CalibrationEntry,
) -> Result<()> {
    match method {
        ChangeMethod::PreLoad => {
            let values = entry.heater_values();
            for (channel, value) in values.iter().enumerate() {
                send(gateway, &format!("DRV:DP {channel} {value:.4}")).await?;
            }
            send(gateway, "DRV:U").await?;
        }
        ChangeMethod::CyclerIndex => {
            send(gateway, &format!("DRV:CYC:LOAD {}", entry.cycler_index)).await?;
        }
    }
    Ok(())
}

/// Move to the entry at `target`, approaching from the high side.
///
/// A move to the index the session already tracks is a no-op. The session
/// shadow is updated only after the target actuation succeeds; a failure in
/// either phase leaves it at the last confirmed position.
pub async fn set_index(
    gateway: &SharedGateway,
    session: &SharedSession,
    table: &CalibrationTable,
    method: ChangeMethod,
    target: usize,
) -> Result<()> {
    let entry = table.lookup_by_index(target)?.clone();

    if session.lock().await.current_index == Some(target) {
        debug!(index = target, "already at requested entry");
        return Ok(());
    }

    let reference = (target + OVERSHOOT_STEPS).min(table.last_index());
    if reference != target {
        let reference_entry = table.lookup_by_index(reference)?;
        debug!(
            index = target,
            reference,
            "approaching entry via high-side reference"
        );
        write_entry(gateway, method, reference_entry).await?;
        tokio::time::sleep(SETTLE).await;
    }

    write_entry(gateway, method, &entry).await?;
    session.lock().await.confirm(target, entry.wavelength);
    Ok(())
}

/// Re-actuate the session's current entry without the anti-hysteresis detour.
///
/// Used when re-entering steady mode: the heaters are already at (or near)
/// the tracked point, so a plain write is enough.
pub async fn reapply(
    gateway: &SharedGateway,
    session: &SharedSession,
    table: &CalibrationTable,
    method: ChangeMethod,
) -> Result<()> {
    let index = match session.lock().await.current_index {
        Some(index) => index,
        None => return Ok(()),
    };
    let entry = table.lookup_by_index(index)?.clone();
    write_entry(gateway, method, &entry).await?;
    session.lock().await.confirm(index, entry.wavelength);
    Ok(())
}

async fn send(gateway: &SharedGateway, command: &str) -> Result<()> {
    gateway
        .lock()
        .await
        .query(command)
        .await
        .map(|_| ())
        .map_err(|e| match e {
            CommError::Io(_) | CommError::Timeout { .. } | CommError::Device { .. } => {
                LaserError::Actuation(format!("'{command}' failed: {e}"))
            }
            other => LaserError::Comm(other),
        })
}
