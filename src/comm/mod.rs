//! Communication gateway to the laser module.
//!
//! The core never touches a serial port directly; every device interaction
//! goes through the [`Gateway`] trait as an opaque ASCII command string. The
//! exact command grammar belongs to the device firmware, not to this module.
//!
//! Two implementations are provided:
//!
//! - [`SerialGateway`] (feature `serial`): the real RS-232 transport.
//! - [`MockGateway`]: a scripted in-memory device for tests and dry runs.
//!
//! The gateway accepts one outstanding request at a time; callers share it as
//! a [`SharedGateway`] and all commands serialize through its mutex.

use crate::error::CommError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

pub mod mock;
#[cfg(feature = "serial")]
pub mod serial;

pub use mock::{MockGateway, MockHandle};
#[cfg(feature = "serial")]
pub use serial::SerialGateway;

/// Synchronous command/response channel to the device.
///
/// Commands are opaque ASCII strings; framing and return-code handling are
/// the implementation's concern. `query` expects a reply payload; `write`
/// sends a command whose reply carries no payload of interest.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Send a command and return the reply payload.
    async fn query(&mut self, command: &str) -> std::result::Result<String, CommError>;

    /// Send a command, discarding the reply payload.
    async fn write(&mut self, command: &str) -> std::result::Result<(), CommError>;
}

/// A gateway shared between the session object and the sweep step task.
///
/// The mutex enforces the one-outstanding-request rule: no pipelining, no
/// interleaving between a sweep tick and an externally issued command.
pub type SharedGateway = Arc<Mutex<Box<dyn Gateway>>>;

/// Wrap a gateway implementation for shared use.
pub fn shared(gateway: Box<dyn Gateway>) -> SharedGateway {
    Arc::new(Mutex::new(gateway))
}

/// Query a command whose payload is a single floating-point number.
pub async fn query_f64(
    gateway: &SharedGateway,
    command: &str,
) -> std::result::Result<f64, CommError> {
    let payload = gateway.lock().await.query(command).await?;
    payload
        .trim()
        .parse::<f64>()
        .map_err(|_| CommError::Parse {
            command: command.to_string(),
            payload,
        })
}

/// Query a command whose payload is a boolean encoded as `0`/`1`.
pub async fn query_bool(
    gateway: &SharedGateway,
    command: &str,
) -> std::result::Result<bool, CommError> {
    let payload = gateway.lock().await.query(command).await?;
    match payload.trim() {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(CommError::Parse {
            command: command.to_string(),
            payload,
        }),
    }
}
