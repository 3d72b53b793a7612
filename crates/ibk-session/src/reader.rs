use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::{Callbacks, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Sleep while disconnected, and the bound on each signal wait.
    pub idle: Duration,
    pub stop_grace: Duration,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            idle: Duration::from_millis(100),
            stop_grace: Duration::from_secs(1),
        }
    }
}

/// Pumps the transport on a dedicated `ibk-reader` thread.
///
/// While connected it waits for the transport's signal and dispatches every
/// decoded message; while disconnected it idles.
pub struct ReaderLoop {
    transport: Arc<dyn Transport>,
    callbacks: Arc<Callbacks>,
    config: ReaderConfig,
    running: Arc<AtomicBool>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl ReaderLoop {
    pub fn new(transport: Arc<dyn Transport>, callbacks: Arc<Callbacks>, config: ReaderConfig) -> Self {
        Self {
            transport,
            callbacks,
            config,
            running: Arc::new(AtomicBool::new(false)),
            thread: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// No-op if already started.
    pub fn start(&self) -> std::io::Result<()> {
        let mut slot = self.thread.lock();
        if slot.is_some() {
            return Ok(());
        }
        self.running.store(true, Ordering::SeqCst);

        let transport = Arc::clone(&self.transport);
        let callbacks = Arc::clone(&self.callbacks);
        let running = Arc::clone(&self.running);
        let idle = self.config.idle;
        let spawned = thread::Builder::new()
            .name("ibk-reader".to_string())
            .spawn(move || pump(&*transport, &callbacks, &running, idle));
        match spawned {
            Ok(join) => {
                *slot = Some(join);
                Ok(())
            }
            Err(err) => {
                self.running.store(false, Ordering::SeqCst);
                Err(err)
            }
        }
    }

    /// Stop the thread, waiting up to `stop_grace` for it to exit.
    pub fn close(&self) {
        self.running.store(false, Ordering::SeqCst);
        let Some(join) = self.thread.lock().take() else {
            return;
        };

        let deadline = Instant::now() + self.config.stop_grace;
        while !join.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        if join.is_finished() {
            if join.join().is_err() {
                error!("reader thread panicked");
            }
        } else {
            warn!(
                grace_ms = self.config.stop_grace.as_millis() as u64,
                "reader thread did not stop in time"
            );
        }
    }
}

impl Drop for ReaderLoop {
    fn drop(&mut self) {
        self.close();
    }
}

fn pump(transport: &dyn Transport, callbacks: &Callbacks, running: &AtomicBool, idle: Duration) {
    debug!("reader started");
    while running.load(Ordering::SeqCst) {
        if !transport.is_connected() {
            thread::sleep(idle);
            continue;
        }
        if !transport.wait_for_signal(idle) {
            continue;
        }
        match transport.process_messages() {
            Ok(messages) => {
                for message in messages {
                    callbacks.dispatch(message);
                }
            }
            Err(err) => error!(error = %err, "cannot process broker messages"),
        }
    }
    debug!("reader stopped");
}
