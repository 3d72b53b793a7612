//! Request correlation.
//!
//! The broker identifies replies only by a small integer id (and, implicitly,
//! by which callback fired). [`RequestRepository`] maps a [`RequestKey`] to
//! the one live subscription waiting for those replies, runs the
//! register/unregister side effects at subscription start and cancellation,
//! and routes values, typed failures and completion into it.

mod builder;
mod error;
mod id;
mod key;
mod repository;
mod subscription;

pub use builder::RequestBuilder;
pub use error::{BrokerFailure, RequestError};
pub use id::IdGenerator;
pub use key::{RequestKey, RequestType};
pub use repository::{ConnectionProbe, RequestRepository};
pub use subscription::Subscription;
