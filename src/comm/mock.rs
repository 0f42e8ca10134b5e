//! Scripted in-memory gateway for tests and dry runs.
//!
//! `MockGateway` plays the role of a powered laser driver board: it records
//! every command it is sent, answers queries from a table of canned replies,
//! and can inject failures at a chosen point so error paths can be exercised
//! deterministically. A [`MockHandle`] stays usable after the gateway has
//! been moved into a session object.

use crate::error::CommError;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Inner {
    log: Vec<String>,
    responses: Vec<(String, String)>,
    fail_matching: Option<String>,
    fail_after: Option<usize>,
    sent: usize,
}

impl Inner {
    fn respond(&self, command: &str) -> String {
        for (prefix, payload) in &self.responses {
            if command.starts_with(prefix.as_str()) {
                return payload.clone();
            }
        }
        builtin_response(command).to_string()
    }
}

/// Canned replies a factory-fresh virtual device gives to common queries.
fn builtin_response(command: &str) -> &'static str {
    if command.starts_with("*IDN?") {
        "Chilas virtual laser"
    } else if command.starts_with("DRV:LIM:MIN?") {
        "0.0000"
    } else if command.starts_with("DRV:LIM:MAX?") {
        "60.0000"
    } else if command.starts_with("DRV:D?") {
        "0.0000"
    } else if command.starts_with("LSR:IMAX?") {
        "350.0"
    } else if command.starts_with("LSR:ILEV?") {
        "0.0"
    } else if command.starts_with("LSR:STAT?") || command.starts_with("SYST:STAT?") {
        "0"
    } else if command.starts_with("TEC:CFG:TMIN?") {
        "15.0"
    } else if command.starts_with("TEC:CFG:TMAX?") {
        "45.0"
    } else if command.starts_with("TEC:TEMP?") || command.starts_with("TEC:TTGT?") {
        "25.0"
    } else if command.starts_with("SYST:HWV?") {
        "2.1.0"
    } else if command.starts_with("SYST:FWV?") {
        "1.8.3"
    } else if command.starts_with("SYST:SRN?") {
        "CLX-0042"
    } else if command.starts_with("SYST:UPT?") {
        "3600"
    } else {
        ""
    }
}

/// In-memory gateway that records commands and serves scripted replies.
pub struct MockGateway {
    inner: Arc<Mutex<Inner>>,
}

impl MockGateway {
    /// Create a virtual device with factory-default query replies.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Handle for inspecting and reconfiguring the mock after it has been
    /// boxed and moved into a session object.
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            inner: Arc::clone(&self.inner),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn issue(&mut self, command: &str) -> Result<String, CommError> {
        let mut inner = self.lock();
        inner.sent += 1;
        inner.log.push(command.to_string());

        if let Some(limit) = inner.fail_after {
            if inner.sent > limit {
                return Err(CommError::Device {
                    code: "E099".to_string(),
                    message: format!("injected failure on '{command}'"),
                });
            }
        }
        if let Some(prefix) = &inner.fail_matching {
            if command.starts_with(prefix.as_str()) {
                return Err(CommError::Device {
                    code: "E099".to_string(),
                    message: format!("injected failure on '{command}'"),
                });
            }
        }

        Ok(inner.respond(command))
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl super::Gateway for MockGateway {
    async fn query(&mut self, command: &str) -> Result<String, CommError> {
        self.issue(command)
    }

    async fn write(&mut self, command: &str) -> Result<(), CommError> {
        self.issue(command).map(|_| ())
    }
}

/// Inspection and scripting handle for a [`MockGateway`].
#[derive(Clone)]
pub struct MockHandle {
    inner: Arc<Mutex<Inner>>,
}

impl MockHandle {
    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Every command the device has seen, in wire order (failed attempts
    /// included).
    pub fn commands(&self) -> Vec<String> {
        self.lock().log.clone()
    }

    /// Total number of commands seen.
    pub fn command_count(&self) -> usize {
        self.lock().log.len()
    }

    /// Number of commands starting with `prefix`.
    pub fn count_matching(&self, prefix: &str) -> usize {
        self.lock()
            .log
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    /// The most recent command starting with `prefix`, if any.
    pub fn last_matching(&self, prefix: &str) -> Option<String> {
        self.lock()
            .log
            .iter()
            .rev()
            .find(|c| c.starts_with(prefix))
            .cloned()
    }

    /// Install or override a canned reply, matched by command prefix.
    pub fn set_response(&self, prefix: &str, payload: &str) {
        let mut inner = self.lock();
        inner
            .responses
            .retain(|(existing, _)| existing != prefix);
        inner
            .responses
            .push((prefix.to_string(), payload.to_string()));
    }

    /// Fail every command starting with `prefix`; `None` clears the fault.
    pub fn fail_matching(&self, prefix: Option<&str>) {
        self.lock().fail_matching = prefix.map(str::to_string);
    }

    /// Fail every command after the next `n`; `None` clears the fault.
    pub fn fail_after(&self, n: Option<usize>) {
        let mut inner = self.lock();
        inner.fail_after = n.map(|n| inner.sent + n);
    }

    /// Forget the recorded command log.
    pub fn clear_log(&self) {
        self.lock().log.clear();
    }
}
