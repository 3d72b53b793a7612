//! Broker-side records shared by every `ibk-*` crate.
//!
//! These are plain data carriers. Conversion from the transport's native
//! structures is mechanical; the only non-trivial rules live here:
//!
//! - the transport's "unset double" sentinel becomes an absent decimal
//!   ([`decimal_from_wire`]);
//! - order statuses carry the helpers callers use to decide liveness;
//! - ticks and account summaries dispatch over closed tag enumerations and
//!   log-and-ignore anything they do not recognise.

mod account;
mod bar;
mod contract;
mod depth;
mod execution;
mod log;
mod order;
mod tick;
mod wire;

pub use account::{
    AccountSummary, AccountTag, CurrencyTag, Pnl, PortfolioLine, Position, SummaryError,
    SummaryTag, SummaryValue,
};
pub use bar::Bar;
pub use contract::{
    Contract, ContractDescription, ContractDetails, DepthExchange, MarketRule, PriceIncrement,
};
pub use depth::{DepthKey, DepthOperation, DepthSide, MarketDepth};
pub use execution::{CommissionReport, Execution, ExecutionReport};
pub use log::{LogRecord, Severity};
pub use order::{OpenOrder, OrderDefinition, OrderState, OrderStatus, OrderStatusKind};
pub use tick::{Tick, TickAttrib, TickKind, TickType, TickValue};
pub use wire::{decimal_from_wire, parse_broker_time, SchemaError, UNSET_DOUBLE};
