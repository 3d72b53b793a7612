use std::sync::Arc;

use ibk_cache::EntityCache;
use ibk_connection::{ConnectionDriver, ConnectionHandle, ConnectionStatus};
use ibk_events::ErrorHooks;
use ibk_schemas::LogRecord;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::{Endpoint, OutboundRequest, Transport};

/// Session-wide notifications, fanned out to every subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Edge of the `Connected` status: `true` on entry, `false` on exit.
    ConnectionChanged(bool),
    Log(LogRecord),
    /// A broker message that concerns no particular request.
    SessionError(LogRecord),
    /// A critical message. The session disconnects itself.
    Fatal(LogRecord),
}

pub(crate) fn publish(events: &broadcast::Sender<SessionEvent>, event: SessionEvent) {
    // No receivers is not an error.
    let _ = events.send(event);
}

// ---------------------------------------------------------------------------
// Connection driver
// ---------------------------------------------------------------------------

/// Drives the transport on behalf of the connection monitor.
///
/// Holds no [`ConnectionHandle`]: the monitor owns the driver, so a handle
/// here would keep the monitor alive forever.
pub(crate) struct SessionDriver {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) endpoint: Endpoint,
    pub(crate) cache: Arc<EntityCache>,
    pub(crate) events: broadcast::Sender<SessionEvent>,
}

impl ConnectionDriver for SessionDriver {
    fn connect_request(&self) -> anyhow::Result<()> {
        info!(
            host = %self.endpoint.host,
            port = self.endpoint.port,
            client_id = self.endpoint.client_id,
            "connecting"
        );
        self.transport.connect(&self.endpoint)
    }

    fn disconnect_request(&self, reconnect: bool) -> anyhow::Result<()> {
        info!(reconnect, "disconnecting");
        // Broker-side state is re-sent after the next connect.
        self.cache.clear();
        self.transport.disconnect()
    }

    fn after_connect(&self) -> anyhow::Result<()> {
        self.transport.send(OutboundRequest::ReqIds)
    }

    fn on_connect_status_change(&self, connected: bool) {
        publish(&self.events, SessionEvent::ConnectionChanged(connected));
    }

    fn on_status(&self, from: ConnectionStatus, to: ConnectionStatus) {
        debug!(%from, %to, "session connection status");
    }
}

// ---------------------------------------------------------------------------
// Error hooks
// ---------------------------------------------------------------------------

pub(crate) struct SessionHooks {
    pub(crate) connection: ConnectionHandle,
    pub(crate) events: broadcast::Sender<SessionEvent>,
}

impl ErrorHooks for SessionHooks {
    fn on_log(&self, record: &LogRecord) {
        publish(&self.events, SessionEvent::Log(record.clone()));
    }

    fn on_session_error(&self, record: &LogRecord) {
        warn!(code = record.code, "session error: {}", record.message);
        publish(&self.events, SessionEvent::SessionError(record.clone()));
    }

    fn on_fatal_error(&self, record: &LogRecord) {
        if let Err(err) = self.connection.disconnect() {
            error!(error = %err, "cannot disconnect after fatal error");
        }
        publish(&self.events, SessionEvent::Fatal(record.clone()));
    }
}
