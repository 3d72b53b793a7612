//! Connection state machine.
//!
//! # Design
//!
//! One loop thread owns every status transition. Callers only ever post a
//! [`Command`]; commands are coalesced (the loop swaps the slot back to
//! `None`, so only the latest unconsumed command is seen) and posting any
//! command disarms a pending deferred action.
//!
//! ```text
//!   Unknown ──start──► Disconnected ◄─────────────────────────────┐
//!                          │  Connect                              │
//!                          ▼                                       │
//!                      Connecting ──ConfirmConnect──► Sleeping ──► Connected
//!                          ▲                         (grace window)    │
//!                          │ delay elapsed                              │
//!                      Sleeping ◄── Disconnected ◄── Disconnecting ◄────┘
//!                                     (Reconnect)      (Disconnect / Reconnect)
//! ```
//!
//! `ConfirmConnect` does not commit immediately: the transport may emit a
//! malformed-message error shortly after a raw connect, so `Connected` is
//! only declared once `connection_delay` has passed without another command.
//!
//! # Notifications
//!
//! [`ConnectionDriver::on_connect_status_change`] is edge-triggered: `true`
//! once when entering `Connected`, `false` once when leaving it.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::DeferredTimer;

// ---------------------------------------------------------------------------
// Status / Command
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ConnectionStatus {
    Unknown = 0,
    Disconnected = 1,
    Connecting = 2,
    Connected = 3,
    Disconnecting = 4,
    /// Waiting for a deferred action to fire.
    Sleeping = 5,
}

impl ConnectionStatus {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Disconnected,
            2 => Self::Connecting,
            3 => Self::Connected,
            4 => Self::Disconnecting,
            5 => Self::Sleeping,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unknown => "UNKNOWN",
            Self::Disconnected => "DISCONNECTED",
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
            Self::Disconnecting => "DISCONNECTING",
            Self::Sleeping => "SLEEPING",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    None = 0,
    Connect = 1,
    Reconnect = 2,
    ConfirmConnect = 3,
    Disconnect = 4,
}

impl Command {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Connect,
            2 => Self::Reconnect,
            3 => Self::ConfirmConnect,
            4 => Self::Disconnect,
            _ => Self::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeferredAction {
    Connect,
    DeclareConnected,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// The target status was not reached in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("timeout waiting for '{expected}' status, actual status is '{actual}'")]
pub struct WaitTimeout {
    pub expected: ConnectionStatus,
    pub actual: ConnectionStatus,
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("connection monitor thread is not running")]
    NotRunning,
    #[error("connection monitor already started")]
    AlreadyStarted,
    #[error("failed to spawn connection monitor thread: {0}")]
    Spawn(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Driver seam
// ---------------------------------------------------------------------------

/// External side effects the state machine sequences. All methods are
/// invoked on the monitor's loop thread.
pub trait ConnectionDriver: Send + Sync + 'static {
    fn connect_request(&self) -> anyhow::Result<()>;

    fn disconnect_request(&self, reconnect: bool) -> anyhow::Result<()>;

    /// Runs right after the machine declares `Connected`.
    fn after_connect(&self) -> anyhow::Result<()>;

    /// Edge-triggered online/offline notification.
    fn on_connect_status_change(&self, connected: bool);

    /// Every status transition. Observers only.
    fn on_status(&self, _from: ConnectionStatus, _to: ConnectionStatus) {}
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Grace window before `Connected` and the delay before reconnecting.
    pub connection_delay: Duration,
    /// Idle sleep between loop iterations.
    pub poll_interval: Duration,
    /// Ceiling on waiting for `Disconnected` at startup.
    pub start_timeout: Duration,
    /// How long `close()` waits for the loop thread to exit.
    pub close_grace: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            connection_delay: Duration::from_millis(1000),
            poll_interval: Duration::from_millis(100),
            start_timeout: Duration::from_secs(60),
            close_grace: Duration::from_secs(10),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

struct Shared {
    status: AtomicU8,
    command: AtomicU8,
    running: AtomicBool,
    is_connected: AtomicBool,
    timer: DeferredTimer<DeferredAction>,
    // Reserved for wait_for_status.
    wait_lock: Mutex<()>,
    changed: Condvar,
    driver: Arc<dyn ConnectionDriver>,
    config: MonitorConfig,
}

impl Shared {
    fn status(&self) -> ConnectionStatus {
        ConnectionStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    fn set_command(&self, command: Command) {
        self.timer.reset();
        self.command.store(command as u8, Ordering::SeqCst);
        debug!(?command, "connection command");
    }

    fn set_status(&self, new: ConnectionStatus) {
        let old = ConnectionStatus::from_u8(self.status.swap(new as u8, Ordering::SeqCst));
        if old == new {
            return;
        }
        debug!(from = %old, to = %new, "connection status change");
        self.driver.on_status(old, new);
        self.trigger_edge(new);

        let _guard = self.wait_lock.lock();
        self.changed.notify_all();
    }

    fn trigger_edge(&self, new: ConnectionStatus) {
        let was_connected = self.is_connected.load(Ordering::SeqCst);
        if !was_connected && new == ConnectionStatus::Connected {
            self.is_connected.store(true, Ordering::SeqCst);
            info!("connection is online");
            self.driver.on_connect_status_change(true);
        } else if was_connected && new != ConnectionStatus::Connected {
            self.is_connected.store(false, Ordering::SeqCst);
            info!("connection is offline");
            self.driver.on_connect_status_change(false);
        }
    }

    fn wait_for_status(
        &self,
        expected: ConnectionStatus,
        timeout: Option<Duration>,
    ) -> Result<(), WaitTimeout> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut guard = self.wait_lock.lock();
        while self.status() != expected {
            match deadline {
                None => self.changed.wait(&mut guard),
                Some(deadline) => {
                    if self.changed.wait_until(&mut guard, deadline).timed_out()
                        && self.status() != expected
                    {
                        return Err(WaitTimeout {
                            expected,
                            actual: self.status(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn run(&self) {
        self.set_status(ConnectionStatus::Disconnected);
        while self.running.load(Ordering::SeqCst) {
            let command = Command::from_u8(self.command.swap(Command::None as u8, Ordering::SeqCst));
            self.handle(command);
            if command == Command::None {
                thread::sleep(self.config.poll_interval);
            }
        }
        debug!("connection monitor loop exited");
    }

    fn handle(&self, command: Command) {
        if command != Command::None {
            self.timer.reset();
        }
        match command {
            Command::Connect => {
                self.set_status(ConnectionStatus::Connecting);
                self.request_connect();
            }
            Command::Reconnect => {
                self.set_status(ConnectionStatus::Disconnecting);
                self.request_disconnect(true);
                self.set_status(ConnectionStatus::Disconnected);
                self.defer(DeferredAction::Connect);
            }
            Command::ConfirmConnect => {
                self.defer(DeferredAction::DeclareConnected);
            }
            Command::Disconnect => {
                self.set_status(ConnectionStatus::Disconnecting);
                self.request_disconnect(false);
                self.set_status(ConnectionStatus::Disconnected);
            }
            Command::None => {
                if self.timer.is_armed() {
                    self.set_status(ConnectionStatus::Sleeping);
                    if let Some(action) = self.timer.poll(Instant::now()) {
                        self.fire(action);
                    }
                }
            }
        }
    }

    /// Arms only while no newer command is queued; a command posted during
    /// the preceding side effect supersedes the action.
    fn defer(&self, action: DeferredAction) {
        if self.command_pending() {
            debug!(?action, "deferred action superseded by a newer command");
            return;
        }
        if let Some(now) = self.timer.start(self.config.connection_delay, action) {
            self.fire(now);
        }
    }

    fn command_pending(&self) -> bool {
        Command::from_u8(self.command.load(Ordering::SeqCst)) != Command::None
    }

    fn fire(&self, action: DeferredAction) {
        match action {
            DeferredAction::Connect => {
                self.set_status(ConnectionStatus::Connecting);
                self.request_connect();
            }
            DeferredAction::DeclareConnected => {
                self.set_status(ConnectionStatus::Connected);
                if let Err(err) = self.driver.after_connect() {
                    error!(error = %err, "after-connect hook failed");
                }
            }
        }
    }

    fn request_connect(&self) {
        if let Err(err) = self.driver.connect_request() {
            error!(error = %err, "connect request failed");
        }
    }

    fn request_disconnect(&self, reconnect: bool) {
        if let Err(err) = self.driver.disconnect_request(reconnect) {
            error!(error = %err, reconnect, "disconnect request failed");
        }
    }
}

// ---------------------------------------------------------------------------
// ConnectionHandle
// ---------------------------------------------------------------------------

/// Caller-side view of a [`ConnectionMonitor`]: commands, status query and
/// the blocking wait.
#[derive(Clone)]
pub struct ConnectionHandle {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("status", &self.status())
            .finish()
    }
}

impl ConnectionHandle {
    pub fn status(&self) -> ConnectionStatus {
        self.shared.status()
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    pub fn connect(&self) {
        self.shared.set_command(Command::Connect);
    }

    pub fn reconnect(&self) {
        self.shared.set_command(Command::Reconnect);
    }

    pub fn confirm_connection(&self) {
        self.shared.set_command(Command::ConfirmConnect);
    }

    pub fn disconnect(&self) -> Result<(), ConnectionError> {
        if !self.shared.running.load(Ordering::SeqCst) {
            return Err(ConnectionError::NotRunning);
        }
        self.shared.set_command(Command::Disconnect);
        Ok(())
    }

    /// Block until `expected` is observed. `None` waits without bound.
    pub fn wait_for_status(
        &self,
        expected: ConnectionStatus,
        timeout: Option<Duration>,
    ) -> Result<(), WaitTimeout> {
        self.shared.wait_for_status(expected, timeout)
    }
}

// ---------------------------------------------------------------------------
// ConnectionMonitor
// ---------------------------------------------------------------------------

pub struct ConnectionMonitor {
    handle: ConnectionHandle,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionMonitor {
    pub fn new(driver: Arc<dyn ConnectionDriver>, config: MonitorConfig) -> Self {
        let shared = Arc::new(Shared {
            status: AtomicU8::new(ConnectionStatus::Unknown as u8),
            command: AtomicU8::new(Command::None as u8),
            running: AtomicBool::new(false),
            is_connected: AtomicBool::new(false),
            timer: DeferredTimer::new(),
            wait_lock: Mutex::new(()),
            changed: Condvar::new(),
            driver,
            config,
        });
        Self {
            handle: ConnectionHandle { shared },
            thread: Mutex::new(None),
        }
    }

    pub fn handle(&self) -> ConnectionHandle {
        self.handle.clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.handle.status()
    }

    /// Spawn the loop thread and wait (bounded by `start_timeout`) for the
    /// initial `Disconnected` status. Missing that ceiling is logged only.
    pub fn start(&self) -> Result<(), ConnectionError> {
        let mut slot = self.thread.lock();
        if slot.is_some() {
            return Err(ConnectionError::AlreadyStarted);
        }

        let shared = &self.handle.shared;
        shared.status.store(ConnectionStatus::Unknown as u8, Ordering::SeqCst);
        shared.command.store(Command::None as u8, Ordering::SeqCst);
        shared.is_connected.store(false, Ordering::SeqCst);
        shared.timer.reset();
        shared.running.store(true, Ordering::SeqCst);

        let loop_state = Arc::clone(shared);
        let spawned = thread::Builder::new()
            .name("connection-monitor".to_string())
            .spawn(move || loop_state.run());
        let join = match spawned {
            Ok(join) => join,
            Err(err) => {
                shared.running.store(false, Ordering::SeqCst);
                return Err(err.into());
            }
        };
        *slot = Some(join);
        drop(slot);

        if let Err(err) =
            shared.wait_for_status(ConnectionStatus::Disconnected, Some(shared.config.start_timeout))
        {
            error!(error = %err, "connection monitor did not reach initial status");
        }
        Ok(())
    }

    /// Disconnect if needed, wait for `Disconnected`, then stop the loop.
    /// A loop thread that outlives `close_grace` is logged, not an error.
    pub fn close(&self) {
        let Some(join) = self.thread.lock().take() else {
            return;
        };
        let shared = &self.handle.shared;

        if !join.is_finished() {
            if shared.status() != ConnectionStatus::Disconnected {
                shared.set_command(Command::Disconnect);
            }
            let _ = shared.wait_for_status(ConnectionStatus::Disconnected, None);
        }
        shared.running.store(false, Ordering::SeqCst);

        let deadline = Instant::now() + shared.config.close_grace;
        while !join.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        if join.is_finished() {
            if join.join().is_err() {
                error!("connection monitor thread panicked");
            }
        } else {
            warn!(
                grace_ms = shared.config.close_grace.as_millis() as u64,
                "connection monitor thread did not stop in time"
            );
        }
    }
}

impl Drop for ConnectionMonitor {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Quiet;

    impl ConnectionDriver for Quiet {
        fn connect_request(&self) -> anyhow::Result<()> {
            Ok(())
        }
        fn disconnect_request(&self, _reconnect: bool) -> anyhow::Result<()> {
            Ok(())
        }
        fn after_connect(&self) -> anyhow::Result<()> {
            Ok(())
        }
        fn on_connect_status_change(&self, _connected: bool) {}
    }

    fn fast() -> MonitorConfig {
        MonitorConfig {
            connection_delay: Duration::from_millis(30),
            poll_interval: Duration::from_millis(2),
            start_timeout: Duration::from_secs(5),
            close_grace: Duration::from_secs(2),
        }
    }

    #[test]
    fn status_codes_round_trip() {
        for s in [
            ConnectionStatus::Unknown,
            ConnectionStatus::Disconnected,
            ConnectionStatus::Connecting,
            ConnectionStatus::Connected,
            ConnectionStatus::Disconnecting,
            ConnectionStatus::Sleeping,
        ] {
            assert_eq!(ConnectionStatus::from_u8(s as u8), s);
        }
        assert_eq!(Command::from_u8(Command::Reconnect as u8), Command::Reconnect);
    }

    #[test]
    fn start_reaches_disconnected_and_rejects_second_start() {
        let monitor = ConnectionMonitor::new(Arc::new(Quiet), fast());
        assert_eq!(monitor.status(), ConnectionStatus::Unknown);
        monitor.start().unwrap();
        assert_eq!(monitor.status(), ConnectionStatus::Disconnected);
        assert!(matches!(monitor.start(), Err(ConnectionError::AlreadyStarted)));
        monitor.close();
    }

    #[test]
    fn disconnect_before_start_is_not_running() {
        let monitor = ConnectionMonitor::new(Arc::new(Quiet), fast());
        assert!(matches!(
            monitor.handle().disconnect(),
            Err(ConnectionError::NotRunning)
        ));
    }

    #[test]
    fn wait_timeout_reports_actual_status() {
        let monitor = ConnectionMonitor::new(Arc::new(Quiet), fast());
        monitor.start().unwrap();
        let err = monitor
            .handle()
            .wait_for_status(ConnectionStatus::Connected, Some(Duration::from_millis(20)))
            .unwrap_err();
        assert_eq!(
            err,
            WaitTimeout {
                expected: ConnectionStatus::Connected,
                actual: ConnectionStatus::Disconnected,
            }
        );
        assert_eq!(
            err.to_string(),
            "timeout waiting for 'CONNECTED' status, actual status is 'DISCONNECTED'"
        );
        monitor.close();
    }
}
