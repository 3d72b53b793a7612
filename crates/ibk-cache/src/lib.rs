//! Last-known broker state.
//!
//! One concurrent map per entity family, each synchronized on its own, so
//! callback threads updating different families (or different keys) never
//! contend. Inbound messages merge into existing entries; nothing is
//! replaced wholesale except an order definition re-sent by the broker,
//! which absorbs the status history of the record it replaces.

mod cache;
mod order;

pub use cache::{CacheError, EntityCache, OrderBook, PositionKey};
pub use order::CachedOrder;
