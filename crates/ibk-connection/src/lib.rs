//! Connection lifecycle for a broker session.
//!
//! [`ConnectionMonitor`] owns a dedicated loop thread that consumes caller
//! commands and drives an external [`ConnectionDriver`]. Callers interact
//! through a cheap, clonable [`ConnectionHandle`].

mod monitor;
mod timer;

pub use monitor::{
    Command, ConnectionDriver, ConnectionError, ConnectionHandle, ConnectionMonitor,
    ConnectionStatus, MonitorConfig, WaitTimeout,
};
pub use timer::DeferredTimer;
