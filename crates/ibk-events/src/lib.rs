//! Broker message classification.
//!
//! The transport reports everything that is not a data callback as an
//! `(id, code, message)` triple. [`classify`] turns one triple into a
//! [`LogRecord`](ibk_schemas::LogRecord) plus a routing decision;
//! [`ErrorRouter`] applies that decision to the request repository and the
//! session hooks.

mod classify;
mod router;

pub use classify::{classify, Action, Category, Classification, HistoricalOutcome};
pub use router::{ErrorHooks, ErrorRouter};
