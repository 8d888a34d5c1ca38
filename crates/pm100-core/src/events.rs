//! Events delivered to the embedder.
//!
//! Each component owns the sending half of an unbounded channel; the caller
//! holds the receiver. A dropped receiver is not an error, events are simply
//! discarded.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::types::{DeviceInfo, RawDatagram, ServerStatus, TelemetryFrame};

/// Events produced by the discovery scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum ScanEvent {
    Log(String),
    Device(DeviceInfo),
    Raw(RawDatagram),
}

/// Events produced by the telemetry frame server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum ServerEvent {
    Log(String),
    Status(ServerStatus),
    Frame(TelemetryFrame),
}

pub(crate) trait LogEvent {
    fn log_line(line: String) -> Self;
}

impl LogEvent for ScanEvent {
    fn log_line(line: String) -> Self {
        ScanEvent::Log(line)
    }
}

impl LogEvent for ServerEvent {
    fn log_line(line: String) -> Self {
        ServerEvent::Log(line)
    }
}

/// Sending half shared by a component and its background tasks.
///
/// Log lines go both to the channel and to `tracing`.
pub(crate) struct Emitter<E> {
    tx: mpsc::UnboundedSender<E>,
    component: &'static str,
}

impl<E> Clone for Emitter<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            component: self.component,
        }
    }
}

impl<E: LogEvent> Emitter<E> {
    pub fn new(component: &'static str) -> (Self, mpsc::UnboundedReceiver<E>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, component }, rx)
    }

    pub fn emit(&self, event: E) {
        let _ = self.tx.send(event);
    }

    pub fn info(&self, line: impl Into<String>) {
        let line = line.into();
        tracing::info!(component = self.component, "{}", line);
        self.emit(E::log_line(line));
    }

    pub fn warn(&self, line: impl Into<String>) {
        let line = line.into();
        tracing::warn!(component = self.component, "{}", line);
        self.emit(E::log_line(line));
    }

    pub fn debug(&self, line: impl Into<String>) {
        let line = line.into();
        tracing::debug!(component = self.component, "{}", line);
        self.emit(E::log_line(line));
    }
}
