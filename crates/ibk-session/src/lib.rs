//! A managed broker session.
//!
//! [`Session`] wires the connection monitor, the reader loop, the request
//! repository, the entity cache and the error router around one
//! [`Transport`]. Callers subscribe through the helpers on `Session` and get
//! back lazy, cancellable [`Subscription`](ibk_requests::Subscription)s; the
//! transport feeds [`InboundMessage`]s into [`Callbacks`].

mod callbacks;
mod driver;
mod reader;
mod session;
mod transport;

pub use callbacks::Callbacks;
pub use driver::SessionEvent;
pub use reader::{ReaderConfig, ReaderLoop};
pub use session::{HistoricalQuery, Session};
pub use transport::{Endpoint, ExecutionFilter, InboundMessage, OutboundRequest, Transport};
