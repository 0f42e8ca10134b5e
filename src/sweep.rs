//! Continuous wavelength sweeping.
//!
//! A sweep walks the cycler table between two configured indices, one entry
//! per tick, wrapping around when it reaches the far bound. The walk runs in
//! a spawned task so the rest of the session stays responsive; a watch
//! channel stops it cooperatively between ticks, so stopping never cuts an
//! actuation in half.

use crate::calibration::CalibrationTable;
use crate::comm::SharedGateway;
use crate::error::{LaserError, Result};
use crate::session::SharedSession;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Shortest supported step interval.
pub const MIN_STEP_INTERVAL: Duration = Duration::from_micros(20);
/// Longest supported step interval.
pub const MAX_STEP_INTERVAL: Duration = Duration::from_millis(50);

const DEFAULT_STEP_INTERVAL: Duration = Duration::from_micros(100);

/// Direction a sweep walks the table in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepDirection {
    /// Ascending wavelength, wrapping from the end bound back to the start.
    Forward,
    /// Descending wavelength, wrapping from the start bound back to the end.
    Backward,
    /// Ascending then descending, reversing at each bound.
    RoundTrip,
}

#[derive(Clone)]
struct SweepSpec {
    table: Arc<CalibrationTable>,
    start_index: usize,
    end_index: usize,
}

struct RunningSweep {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Host-side sweep engine over a shared gateway.
///
/// Bounds, interval, and direction are locked while a sweep runs; call
/// [`stop`](SweepController::stop) before reconfiguring.
pub struct SweepController {
    gateway: SharedGateway,
    session: SharedSession,
    spec: Option<SweepSpec>,
    interval: Duration,
    direction: SweepDirection,
    running: Option<RunningSweep>,
}

impl SweepController {
    /// Create an idle controller with the default interval and direction.
    pub fn new(gateway: SharedGateway, session: SharedSession) -> Self {
        Self {
            gateway,
            session,
            spec: None,
            interval: DEFAULT_STEP_INTERVAL,
            direction: SweepDirection::Forward,
            running: None,
        }
    }

    /// Whether a sweep task is currently alive.
    pub fn is_running(&mut self) -> bool {
        if let Some(running) = &self.running {
            if running.task.is_finished() {
                self.running = None;
            }
        }
        self.running.is_some()
    }

    fn guard_idle(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(LaserError::SweepActive);
        }
        Ok(())
    }

    /// Configure the index range the sweep walks, inclusive on both ends.
    ///
    /// # Errors
    /// `SweepActive` while running, `IndexOutOfRange` if a bound is past the
    /// table, `InvalidRange` unless `start_index < end_index`.
    pub fn set_bounds(
        &mut self,
        table: Arc<CalibrationTable>,
        start_index: usize,
        end_index: usize,
    ) -> Result<()> {
        self.guard_idle()?;
        for index in [start_index, end_index] {
            if index > table.last_index() {
                return Err(LaserError::IndexOutOfRange {
                    index,
                    len: table.len(),
                });
            }
        }
        if start_index >= end_index {
            return Err(LaserError::InvalidRange {
                start: start_index,
                end: end_index,
            });
        }
        let hops = table.entries()[start_index..=end_index]
            .iter()
            .filter(|e| e.mode_hop_flag)
            .count();
        if hops > 0 {
            warn!(hops, "sweep range crosses mode-hop entries");
        }
        self.spec = Some(SweepSpec {
            table,
            start_index,
            end_index,
        });
        Ok(())
    }

    /// Forget the configured bounds (calibration replaced).
    pub fn clear_bounds(&mut self) -> Result<()> {
        self.guard_idle()?;
        self.spec = None;
        Ok(())
    }

    /// Set the per-step dwell time.
    ///
    /// # Errors
    /// `SweepActive` while running, `InvalidInterval` outside
    /// [`MIN_STEP_INTERVAL`]..=[`MAX_STEP_INTERVAL`].
    pub fn set_step_interval(&mut self, interval: Duration) -> Result<()> {
        self.guard_idle()?;
        if interval < MIN_STEP_INTERVAL || interval > MAX_STEP_INTERVAL {
            return Err(LaserError::InvalidInterval(interval));
        }
        self.interval = interval;
        Ok(())
    }

    /// Current per-step dwell time.
    pub fn step_interval(&self) -> Duration {
        self.interval
    }

    /// Set the walk direction.
    pub fn set_direction(&mut self, direction: SweepDirection) -> Result<()> {
        self.guard_idle()?;
        self.direction = direction;
        Ok(())
    }

    /// Number of entries one full pass visits, if bounds are configured.
    pub fn points(&self) -> Option<usize> {
        self.spec
            .as_ref()
            .map(|spec| spec.end_index - spec.start_index + 1)
    }

    /// Wall-clock duration of one full pass, if bounds are configured.
    pub fn estimated_pass_duration(&self) -> Option<Duration> {
        self.points().map(|n| self.interval * n as u32)
    }

    /// Start the sweep task. Starting while already running is a no-op.
    ///
    /// # Errors
    /// `SweepNotConfigured` if no bounds have been set; `Comm` if announcing
    /// the span or interval to the device fails.
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        let spec = self.spec.clone().ok_or(LaserError::SweepNotConfigured)?;

        {
            let mut gw = self.gateway.lock().await;
            gw.query(&format!("DRV:CYC:SPAN {} {}", spec.start_index, spec.end_index))
                .await?;
            gw.query(&format!("DRV:CYC:INT {}", self.interval.as_micros()))
                .await?;
        }

        info!(
            start = spec.start_index,
            end = spec.end_index,
            interval_us = self.interval.as_micros() as u64,
            direction = ?self.direction,
            "starting sweep"
        );

        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(run_sweep(
            Arc::clone(&self.gateway),
            Arc::clone(&self.session),
            spec,
            self.interval,
            self.direction,
            stop_rx,
        ));
        self.running = Some(RunningSweep {
            stop: stop_tx,
            task,
        });
        Ok(())
    }

    /// Stop the sweep task and wait for it to finish its current tick.
    ///
    /// Stopping an idle controller is a no-op. The session keeps the last
    /// entry the sweep confirmed before stopping.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        let _ = running.stop.send(true);
        if let Err(e) = running.task.await {
            warn!(error = %e, "sweep task ended abnormally");
        }
        info!("sweep stopped");
    }
}

async fn run_sweep(
    gateway: SharedGateway,
    session: SharedSession,
    spec: SweepSpec,
    interval: Duration,
    direction: SweepDirection,
    mut stop: watch::Receiver<bool>,
) {
    let mut ascending = !matches!(direction, SweepDirection::Backward);
    let mut index = if ascending {
        spec.start_index
    } else {
        spec.end_index
    };

    loop {
        tokio::select! {
            biased;
            _ = stop.changed() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        let command = format!("DRV:CYC:LOAD {index}");
        match gateway.lock().await.query(&command).await {
            Ok(_) => {
                let wavelength = spec.table.entries()[index].wavelength;
                session.lock().await.confirm(index, wavelength);
            }
            Err(e) => {
                warn!(index, error = %e, "sweep step failed, stopping sweep");
                break;
            }
        }

        index = match direction {
            SweepDirection::Forward => {
                if index >= spec.end_index {
                    spec.start_index
                } else {
                    index + 1
                }
            }
            SweepDirection::Backward => {
                if index <= spec.start_index {
                    spec.end_index
                } else {
                    index - 1
                }
            }
            SweepDirection::RoundTrip => {
                // Bounds are validated strictly ordered, so stepping inward
                // from either bound never leaves the range.
                if ascending && index >= spec.end_index {
                    ascending = false;
                }
                if !ascending && index <= spec.start_index {
                    ascending = true;
                }
                if ascending {
                    index + 1
                } else {
                    index - 1
                }
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationEntry;
    use crate::comm::{shared, MockGateway, MockHandle};
    use crate::session::shared_session;

    fn table(len: usize) -> Arc<CalibrationTable> {
        let entries = (0..len)
            .map(|i| CalibrationEntry {
                wavelength: 1540.0 + i as f64,
                phase_section: 10.0,
                large_ring: 20.0,
                small_ring: 30.0,
                coupler: 40.0,
                mode_hop_flag: false,
                cycler_index: i,
            })
            .collect();
        Arc::new(CalibrationTable::new(entries).unwrap())
    }

    fn fixture() -> (SweepController, MockHandle, SharedSession) {
        let mock = MockGateway::new();
        let handle = mock.handle();
        let session = shared_session();
        let controller = SweepController::new(shared(Box::new(mock)), Arc::clone(&session));
        (controller, handle, session)
    }

    #[tokio::test]
    async fn inverted_bounds_are_rejected() {
        let (mut sweep, _handle, _session) = fixture();
        assert!(matches!(
            sweep.set_bounds(table(10), 5, 5),
            Err(LaserError::InvalidRange { start: 5, end: 5 })
        ));
        assert!(matches!(
            sweep.set_bounds(table(10), 7, 2),
            Err(LaserError::InvalidRange { .. })
        ));
    }

    #[tokio::test]
    async fn bounds_past_the_table_are_rejected() {
        let (mut sweep, _handle, _session) = fixture();
        assert!(matches!(
            sweep.set_bounds(table(10), 0, 10),
            Err(LaserError::IndexOutOfRange { index: 10, len: 10 })
        ));
    }

    #[tokio::test]
    async fn interval_outside_the_supported_window_is_rejected() {
        let (mut sweep, _handle, _session) = fixture();
        assert!(matches!(
            sweep.set_step_interval(Duration::from_micros(10)),
            Err(LaserError::InvalidInterval(_))
        ));
        assert!(matches!(
            sweep.set_step_interval(Duration::from_millis(60)),
            Err(LaserError::InvalidInterval(_))
        ));
        sweep.set_step_interval(Duration::from_micros(100)).unwrap();
    }

    #[tokio::test]
    async fn start_without_bounds_is_rejected() {
        let (mut sweep, _handle, _session) = fixture();
        assert!(matches!(
            sweep.start().await,
            Err(LaserError::SweepNotConfigured)
        ));
    }

    #[tokio::test]
    async fn start_announces_span_and_interval_to_the_device() {
        let (mut sweep, handle, _session) = fixture();
        sweep.set_bounds(table(10), 2, 8).unwrap();
        sweep.set_step_interval(Duration::from_millis(10)).unwrap();
        sweep.start().await.unwrap();
        sweep.stop().await;
        assert_eq!(
            handle.last_matching("DRV:CYC:SPAN").unwrap(),
            "DRV:CYC:SPAN 2 8"
        );
        assert_eq!(
            handle.last_matching("DRV:CYC:INT").unwrap(),
            "DRV:CYC:INT 10000"
        );
    }

    #[tokio::test]
    async fn sweep_walks_upward_and_wraps() {
        let (mut sweep, handle, _session) = fixture();
        sweep.set_bounds(table(5), 1, 3).unwrap();
        sweep.set_step_interval(Duration::from_millis(5)).unwrap();
        sweep.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        sweep.stop().await;

        let loads: Vec<String> = handle
            .commands()
            .into_iter()
            .filter(|c| c.starts_with("DRV:CYC:LOAD"))
            .collect();
        assert!(loads.len() >= 4, "expected several ticks, got {loads:?}");
        assert_eq!(&loads[..4], &["DRV:CYC:LOAD 1", "DRV:CYC:LOAD 2", "DRV:CYC:LOAD 3", "DRV:CYC:LOAD 1"]);
    }

    #[tokio::test]
    async fn session_tracks_the_last_confirmed_sweep_entry() {
        let (mut sweep, handle, session) = fixture();
        sweep.set_bounds(table(5), 0, 4).unwrap();
        sweep.set_step_interval(Duration::from_millis(5)).unwrap();
        sweep.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        sweep.stop().await;

        let last = handle.last_matching("DRV:CYC:LOAD").unwrap();
        let index: usize = last.rsplit(' ').next().unwrap().parse().unwrap();
        let state = session.lock().await;
        assert_eq!(state.current_index, Some(index));
        assert_eq!(state.current_wavelength, Some(1540.0 + index as f64));
    }

    #[tokio::test]
    async fn stop_before_the_first_tick_emits_no_steps() {
        let (mut sweep, handle, _session) = fixture();
        sweep.set_bounds(table(5), 0, 4).unwrap();
        sweep.set_step_interval(Duration::from_millis(50)).unwrap();
        sweep.start().await.unwrap();
        sweep.stop().await;
        assert_eq!(handle.count_matching("DRV:CYC:LOAD"), 0);
    }

    #[tokio::test]
    async fn reconfiguration_is_locked_while_running() {
        let (mut sweep, _handle, _session) = fixture();
        sweep.set_bounds(table(10), 0, 9).unwrap();
        sweep.set_step_interval(Duration::from_millis(10)).unwrap();
        sweep.start().await.unwrap();
        assert!(matches!(
            sweep.set_bounds(table(10), 1, 8),
            Err(LaserError::SweepActive)
        ));
        assert!(matches!(
            sweep.set_step_interval(Duration::from_millis(20)),
            Err(LaserError::SweepActive)
        ));
        assert!(matches!(
            sweep.set_direction(SweepDirection::Backward),
            Err(LaserError::SweepActive)
        ));
        sweep.stop().await;
        sweep.set_bounds(table(10), 1, 8).unwrap();
    }

    #[tokio::test]
    async fn starting_twice_is_a_no_op() {
        let (mut sweep, handle, _session) = fixture();
        sweep.set_bounds(table(5), 0, 4).unwrap();
        sweep.set_step_interval(Duration::from_millis(10)).unwrap();
        sweep.start().await.unwrap();
        sweep.start().await.unwrap();
        sweep.stop().await;
        assert_eq!(handle.count_matching("DRV:CYC:SPAN"), 1);
    }

    #[tokio::test]
    async fn device_failure_ends_the_sweep_on_its_own() {
        let (mut sweep, handle, _session) = fixture();
        sweep.set_bounds(table(5), 0, 4).unwrap();
        sweep.set_step_interval(Duration::from_millis(5)).unwrap();
        sweep.start().await.unwrap();
        handle.fail_matching(Some("DRV:CYC:LOAD"));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!sweep.is_running());
    }
}
