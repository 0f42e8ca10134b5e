//! RS-232 gateway implementation.
//!
//! Protocol overview:
//! - ASCII command/response, 8N1, default 57600 baud
//! - Commands terminated with CR LF
//! - Replies are single lines prefixed with a return code: `0 <payload>` on
//!   success, `1 <code> <message>` on a device-side error

use crate::error::CommError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::time::timeout;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::trace;

/// Default baud rate of the laser driver board.
pub const DEFAULT_BAUD_RATE: u32 = 57_600;

/// Serial gateway for a directly attached laser module.
pub struct SerialGateway {
    port: BufReader<SerialStream>,
    timeout: Duration,
}

impl SerialGateway {
    /// Open the serial port and wrap it as a gateway.
    ///
    /// # Errors
    /// Returns `CommError::Io` if the port cannot be opened.
    pub fn open(path: &str, baud_rate: u32, response_timeout: Duration) -> Result<Self, CommError> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .open_native_async()
            .map_err(|e| CommError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;

        Ok(Self {
            port: BufReader::new(port),
            timeout: response_timeout,
        })
    }

    async fn exchange(&mut self, command: &str) -> Result<String, CommError> {
        trace!(command, "W");
        let framed = format!("{command}\r\n");
        self.port.write_all(framed.as_bytes()).await?;

        let mut line = String::new();
        timeout(self.timeout, self.port.read_line(&mut line))
            .await
            .map_err(|_| CommError::Timeout {
                command: command.to_string(),
            })??;

        trace!(reply = line.trim(), "R");
        parse_reply(command, line.trim())
    }
}

/// Split a raw reply line into its payload, honoring the return-code prefix.
fn parse_reply(command: &str, line: &str) -> Result<String, CommError> {
    let mut parts = line.splitn(2, ' ');
    let rc = parts.next().unwrap_or_default();
    let rest = parts.next().unwrap_or_default();
    match rc {
        "0" => Ok(rest.to_string()),
        "1" => {
            let mut err = rest.splitn(2, ' ');
            Err(CommError::Device {
                code: err.next().unwrap_or_default().to_string(),
                message: err.next().unwrap_or_default().to_string(),
            })
        }
        _ => Err(CommError::Parse {
            command: command.to_string(),
            payload: line.to_string(),
        }),
    }
}

#[async_trait]
impl super::Gateway for SerialGateway {
    async fn query(&mut self, command: &str) -> Result<String, CommError> {
        self.exchange(command).await
    }

    async fn write(&mut self, command: &str) -> Result<(), CommError> {
        self.exchange(command).await.map(|_| ())
    }
}
