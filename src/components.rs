//! Typed drivers for the laser's physical components.
//!
//! Each driver is a thin wrapper over the [`Gateway`](crate::comm::Gateway)
//! that owns one concern: heater channels, the pump diode, the TEC loop, or
//! the system identity block. Hardware limits are queried from the device
//! once and cached; set-point writes are validated against them before
//! anything touches the wire.

use crate::comm::{query_bool, query_f64, SharedGateway};
use crate::error::{LaserError, Result};

/// Identifier of one thermo-optic heater channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaterChannel {
    /// Phase-section heater (channel 0).
    PhaseSection,
    /// Large-ring heater (channel 1).
    LargeRing,
    /// Small-ring heater (channel 2).
    SmallRing,
    /// Tunable-coupler heater (channel 3).
    Coupler,
}

impl HeaterChannel {
    /// All channels in wire order.
    pub const ALL: [HeaterChannel; 4] = [
        HeaterChannel::PhaseSection,
        HeaterChannel::LargeRing,
        HeaterChannel::SmallRing,
        HeaterChannel::Coupler,
    ];

    /// Numeric channel id used on the wire.
    pub fn id(self) -> u8 {
        match self {
            HeaterChannel::PhaseSection => 0,
            HeaterChannel::LargeRing => 1,
            HeaterChannel::SmallRing => 2,
            HeaterChannel::Coupler => 3,
        }
    }
}

impl TryFrom<u8> for HeaterChannel {
    type Error = LaserError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(HeaterChannel::PhaseSection),
            1 => Ok(HeaterChannel::LargeRing),
            2 => Ok(HeaterChannel::SmallRing),
            3 => Ok(HeaterChannel::Coupler),
            _ => Err(LaserError::IndexOutOfRange {
                index: value as usize,
                len: 4,
            }),
        }
    }
}

impl std::fmt::Display for HeaterChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeaterChannel::PhaseSection => write!(f, "phase section"),
            HeaterChannel::LargeRing => write!(f, "large ring"),
            HeaterChannel::SmallRing => write!(f, "small ring"),
            HeaterChannel::Coupler => write!(f, "tunable coupler"),
        }
    }
}

/// Direct drive access to the four heater channels.
pub struct HeaterDriver {
    gateway: SharedGateway,
    limits: [Option<(f64, f64)>; 4],
}

impl HeaterDriver {
    /// Create a heater driver over a shared gateway.
    pub fn new(gateway: SharedGateway) -> Self {
        Self {
            gateway,
            limits: [None; 4],
        }
    }

    /// Hardware drive limits of `channel`, queried once and cached.
    pub async fn limits(&mut self, channel: HeaterChannel) -> Result<(f64, f64)> {
        let slot = channel.id() as usize;
        if let Some(limits) = self.limits[slot] {
            return Ok(limits);
        }
        let min = query_f64(&self.gateway, &format!("DRV:LIM:MIN? {}", channel.id())).await?;
        let max = query_f64(&self.gateway, &format!("DRV:LIM:MAX? {}", channel.id())).await?;
        self.limits[slot] = Some((min, max));
        Ok((min, max))
    }

    /// Current drive value of `channel`.
    pub async fn value(&self, channel: HeaterChannel) -> Result<f64> {
        Ok(query_f64(&self.gateway, &format!("DRV:D? {}", channel.id())).await?)
    }

    /// Set the drive value of `channel`, validated against hardware limits.
    pub async fn set_value(&mut self, channel: HeaterChannel, value: f64) -> Result<()> {
        let (min, max) = self.limits(channel).await?;
        if value < min || value > max {
            return Err(LaserError::OutOfRange {
                requested: value,
                min,
                max,
            });
        }
        self.gateway
            .lock()
            .await
            .query(&format!("DRV:D {} {value:.4}", channel.id()))
            .await?;
        Ok(())
    }
}

/// Pump diode control: on/off state and drive current.
pub struct DiodeDriver {
    gateway: SharedGateway,
    max_current_ma: Option<f64>,
}

impl DiodeDriver {
    /// Create a diode driver over a shared gateway.
    pub fn new(gateway: SharedGateway) -> Self {
        Self {
            gateway,
            max_current_ma: None,
        }
    }

    /// Whether the diode is emitting.
    pub async fn state(&self) -> Result<bool> {
        Ok(query_bool(&self.gateway, "LSR:STAT?").await?)
    }

    /// Turn the diode on or off.
    pub async fn set_state(&self, on: bool) -> Result<()> {
        self.gateway
            .lock()
            .await
            .query(&format!("LSR:STAT {}", u8::from(on)))
            .await?;
        Ok(())
    }

    /// Present drive current in milliamps.
    pub async fn current(&self) -> Result<f64> {
        Ok(query_f64(&self.gateway, "LSR:ILEV?").await?)
    }

    /// Set the drive current, validated against the hardware maximum.
    pub async fn set_current(&mut self, current_ma: f64) -> Result<()> {
        let max = match self.max_current_ma {
            Some(max) => max,
            None => {
                let max = query_f64(&self.gateway, "LSR:IMAX?").await?;
                self.max_current_ma = Some(max);
                max
            }
        };
        if current_ma < 0.0 || current_ma > max {
            return Err(LaserError::OutOfRange {
                requested: current_ma,
                min: 0.0,
                max,
            });
        }
        self.gateway
            .lock()
            .await
            .query(&format!("LSR:ILEV {current_ma:.3}"))
            .await?;
        Ok(())
    }
}

/// TEC loop control: temperature target and readback.
pub struct TecDriver {
    gateway: SharedGateway,
    limits_c: Option<(f64, f64)>,
}

impl TecDriver {
    /// Create a TEC driver over a shared gateway.
    pub fn new(gateway: SharedGateway) -> Self {
        Self {
            gateway,
            limits_c: None,
        }
    }

    /// Enable or disable the TEC control loop.
    pub async fn set_state(&self, on: bool) -> Result<()> {
        self.gateway
            .lock()
            .await
            .query(&format!("TEC:STAT {}", u8::from(on)))
            .await?;
        Ok(())
    }

    /// Present temperature target in Celsius.
    pub async fn target(&self) -> Result<f64> {
        Ok(query_f64(&self.gateway, "TEC:TTGT?").await?)
    }

    /// Set the temperature target, validated against hardware limits.
    pub async fn set_target(&mut self, target_c: f64) -> Result<()> {
        let (min, max) = match self.limits_c {
            Some(limits) => limits,
            None => {
                let min = query_f64(&self.gateway, "TEC:CFG:TMIN?").await?;
                let max = query_f64(&self.gateway, "TEC:CFG:TMAX?").await?;
                self.limits_c = Some((min, max));
                (min, max)
            }
        };
        if target_c < min || target_c > max {
            return Err(LaserError::OutOfRange {
                requested: target_c,
                min,
                max,
            });
        }
        self.gateway
            .lock()
            .await
            .query(&format!("TEC:TTGT {target_c:.3}"))
            .await?;
        Ok(())
    }

    /// Measured temperature in Celsius.
    pub async fn temperature(&self) -> Result<f64> {
        Ok(query_f64(&self.gateway, "TEC:TEMP?").await?)
    }
}

/// Hardware/firmware identity of the connected module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemIdentity {
    /// Hardware version, `x.y.z` with an optional variant suffix.
    pub hw_version: String,
    /// Firmware version.
    pub fw_version: String,
    /// Serial number.
    pub serial_no: String,
}

/// Read-only system metadata, fetched once per session.
pub struct SystemInfo {
    gateway: SharedGateway,
    identity: Option<SystemIdentity>,
}

impl SystemInfo {
    /// Create a system-info reader over a shared gateway.
    pub fn new(gateway: SharedGateway) -> Self {
        Self {
            gateway,
            identity: None,
        }
    }

    /// Identity block, queried from the device on first use.
    pub async fn identity(&mut self) -> Result<&SystemIdentity> {
        if self.identity.is_none() {
            let mut gw = self.gateway.lock().await;
            let hw_version = gw.query("SYST:HWV?").await?;
            let fw_version = gw.query("SYST:FWV?").await?;
            let serial_no = gw.query("SYST:SRN?").await?;
            drop(gw);
            self.identity = Some(SystemIdentity {
                hw_version,
                fw_version,
                serial_no,
            });
        }
        // Populated just above.
        Ok(self.identity.as_ref().ok_or(LaserError::Actuation(
            "identity unavailable".to_string(),
        ))?)
    }

    /// Seconds since the device was powered on (never cached).
    pub async fn uptime_secs(&self) -> Result<u64> {
        Ok(query_f64(&self.gateway, "SYST:UPT?").await? as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::{shared, MockGateway};

    fn mock_pair() -> (SharedGateway, crate::comm::MockHandle) {
        let mock = MockGateway::new();
        let handle = mock.handle();
        (shared(Box::new(mock)), handle)
    }

    #[tokio::test]
    async fn heater_limits_are_cached_after_first_query() {
        let (gateway, handle) = mock_pair();
        let mut heaters = HeaterDriver::new(gateway);
        heaters.set_value(HeaterChannel::PhaseSection, 10.0).await.unwrap();
        heaters.set_value(HeaterChannel::PhaseSection, 12.0).await.unwrap();
        assert_eq!(handle.count_matching("DRV:LIM:MIN?"), 1);
        assert_eq!(handle.count_matching("DRV:LIM:MAX?"), 1);
        assert_eq!(handle.count_matching("DRV:D 0"), 2);
    }

    #[tokio::test]
    async fn heater_set_outside_limits_is_rejected_without_a_write() {
        let (gateway, handle) = mock_pair();
        let mut heaters = HeaterDriver::new(gateway);
        let err = heaters
            .set_value(HeaterChannel::Coupler, 99.0)
            .await
            .unwrap_err();
        assert!(matches!(err, LaserError::OutOfRange { .. }));
        assert_eq!(handle.count_matching("DRV:D 3"), 0);
    }

    #[tokio::test]
    async fn diode_current_validates_against_device_maximum() {
        let (gateway, handle) = mock_pair();
        let mut diode = DiodeDriver::new(gateway);
        diode.set_current(280.0).await.unwrap();
        assert!(matches!(
            diode.set_current(500.0).await,
            Err(LaserError::OutOfRange { .. })
        ));
        assert_eq!(handle.count_matching("LSR:ILEV "), 1);
    }

    #[tokio::test]
    async fn tec_target_validates_against_configured_window() {
        let (gateway, _handle) = mock_pair();
        let mut tec = TecDriver::new(gateway);
        tec.set_target(25.0).await.unwrap();
        assert!(matches!(
            tec.set_target(60.0).await,
            Err(LaserError::OutOfRange { .. })
        ));
    }

    #[tokio::test]
    async fn identity_is_fetched_once() {
        let (gateway, handle) = mock_pair();
        let mut info = SystemInfo::new(gateway);
        let first = info.identity().await.unwrap().clone();
        let second = info.identity().await.unwrap().clone();
        assert_eq!(first, second);
        assert_eq!(handle.count_matching("SYST:HWV?"), 1);
    }
}
