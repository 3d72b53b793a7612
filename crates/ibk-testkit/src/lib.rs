//! Test support: an in-memory transport, a canned broker script, and a
//! harness that runs a full [`Session`] against them.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use ibk_config::SessionConfig;
use ibk_connection::{ConnectionStatus, WaitTimeout};
use ibk_requests::{RequestError, Subscription};
use ibk_session::Session;

mod paper;
pub mod script;

pub use paper::{PaperTransport, Reactor};

/// Short delays so scenario tests finish quickly.
pub fn fast_config() -> SessionConfig {
    SessionConfig {
        connection_delay_ms: 30,
        start_timeout_ms: 2_000,
        close_grace_ms: 2_000,
        poll_interval_ms: 2,
        reader_idle_ms: 2,
        reader_stop_grace_ms: 1_000,
        ..SessionConfig::default()
    }
}

/// Poll `cond` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(2));
    }
}

/// Poll a subscription until it yields, ends, or `timeout` passes.
///
/// `None` means ended or timed out; check [`Subscription::is_finished`] to
/// tell them apart.
pub fn next_within<T: Send + 'static>(
    sub: &mut Subscription<T>,
    timeout: Duration,
) -> Option<Result<T, RequestError>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(item) = sub.try_next() {
            return Some(item);
        }
        if sub.is_finished() || Instant::now() >= deadline {
            return None;
        }
        thread::sleep(Duration::from_millis(2));
    }
}

pub struct SessionHarness {
    pub transport: Arc<PaperTransport>,
    pub session: Session,
}

impl SessionHarness {
    /// Started (so `Disconnected`), not connected.
    pub fn start(transport: PaperTransport, config: &SessionConfig) -> anyhow::Result<Self> {
        let transport = Arc::new(transport);
        let session = Session::new(transport.clone(), config);
        session.start()?;
        Ok(Self { transport, session })
    }

    /// Connect and wait through the confirmation window.
    pub fn connect(&self, timeout: Duration) -> Result<(), WaitTimeout> {
        self.session.connect();
        self.session
            .wait_for_status(ConnectionStatus::Connected, Some(timeout))
    }

    pub fn disconnect(&self, timeout: Duration) -> anyhow::Result<()> {
        self.session.disconnect()?;
        self.session
            .wait_for_status(ConnectionStatus::Disconnected, Some(timeout))?;
        Ok(())
    }
}
