//! Boundary with the broker transport.
//!
//! The transport owns wire framing and decoding. The session sees it as a
//! connected flag, connect/disconnect calls, a catalogue of outbound
//! requests, and a message pump that yields already-decoded inbound
//! messages.

use std::time::Duration;

use ibk_schemas::{
    Bar, CommissionReport, Contract, ContractDetails, DepthExchange, Execution, OpenOrder,
    OrderDefinition, OrderStatus, PortfolioLine, Position, PriceIncrement, TickAttrib,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub client_id: i32,
}

impl From<&ibk_config::SessionConfig> for Endpoint {
    fn from(cfg: &ibk_config::SessionConfig) -> Self {
        Self {
            host: cfg.host.clone(),
            port: cfg.port,
            client_id: cfg.client_id,
        }
    }
}

pub trait Transport: Send + Sync + 'static {
    fn is_connected(&self) -> bool;

    /// Raw socket connect. Success is confirmed later by a
    /// [`InboundMessage::ConnectAck`].
    fn connect(&self, endpoint: &Endpoint) -> anyhow::Result<()>;

    fn disconnect(&self) -> anyhow::Result<()>;

    fn send(&self, request: OutboundRequest) -> anyhow::Result<()>;

    /// Block until messages are available or `timeout` elapses. Returns
    /// `false` on timeout.
    fn wait_for_signal(&self, timeout: Duration) -> bool;

    /// Decode whatever is buffered.
    fn process_messages(&self) -> anyhow::Result<Vec<InboundMessage>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionFilter {
    pub client_id: i32,
    pub account: String,
    pub time: String,
    pub symbol: String,
    pub sec_type: String,
    pub exchange: String,
    pub side: String,
}

/// Everything the session can ask of the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "snake_case")]
pub enum OutboundRequest {
    ReqIds,
    ReqCurrentTime,
    ReqMarketData {
        ticker_id: i32,
        contract: Contract,
        generic_ticks: String,
        snapshot: bool,
    },
    CancelMarketData {
        ticker_id: i32,
    },
    ReqMarketDepth {
        ticker_id: i32,
        contract: Contract,
        rows: i32,
        smart_depth: bool,
    },
    CancelMarketDepth {
        ticker_id: i32,
        smart_depth: bool,
    },
    ReqMarketDepthExchanges,
    ReqAccountSummary {
        req_id: i32,
        group: String,
        tags: String,
    },
    CancelAccountSummary {
        req_id: i32,
    },
    ReqPositions,
    CancelPositions,
    ReqAccountUpdates {
        subscribe: bool,
        account: String,
    },
    PlaceOrder {
        order_id: i32,
        contract: Contract,
        order: OrderDefinition,
    },
    CancelOrder {
        order_id: i32,
    },
    ReqAllOpenOrders,
    ReqExecutions {
        req_id: i32,
        filter: ExecutionFilter,
    },
    ReqContractDetails {
        req_id: i32,
        contract: Contract,
    },
    ReqHistoricalData {
        req_id: i32,
        contract: Contract,
        end_date_time: String,
        duration: String,
        bar_size: String,
        what_to_show: String,
        use_rth: bool,
    },
    CancelHistoricalData {
        req_id: i32,
    },
    ReqPnl {
        req_id: i32,
        account: String,
        model_code: String,
    },
    CancelPnl {
        req_id: i32,
    },
    ReqPnlSingle {
        req_id: i32,
        account: String,
        model_code: String,
        conid: i32,
    },
    CancelPnlSingle {
        req_id: i32,
    },
    ReqMarketRule {
        market_rule_id: i32,
    },
}

/// One decoded inbound message. Prices and PnL values arrive as raw wire
/// doubles (the unset sentinel included); everything else is already typed.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    ConnectAck,
    ConnectionClosed,
    NextValidId(i32),
    Error {
        id: i32,
        code: i32,
        message: String,
    },
    CurrentTime(i64),
    TickPrice {
        ticker_id: i32,
        field: i32,
        price: f64,
        attrib: TickAttrib,
    },
    TickSize {
        ticker_id: i32,
        field: i32,
        size: Decimal,
    },
    TickString {
        ticker_id: i32,
        field: i32,
        value: String,
    },
    TickGeneric {
        ticker_id: i32,
        field: i32,
        value: f64,
    },
    TickSnapshotEnd(i32),
    MarketDepth {
        ticker_id: i32,
        position: i32,
        operation: i32,
        side: i32,
        price: f64,
        size: Decimal,
        market_maker: String,
    },
    MarketDepthExchanges(Vec<DepthExchange>),
    Position(Position),
    PositionEnd,
    Portfolio(PortfolioLine),
    AccountDownloadEnd(String),
    AccountSummary {
        req_id: i32,
        account: String,
        tag: String,
        value: String,
        currency: String,
    },
    AccountSummaryEnd(i32),
    OpenOrder(OpenOrder),
    OrderStatus(OrderStatus),
    OpenOrderEnd,
    ExecDetails {
        req_id: i32,
        contract: Contract,
        execution: Execution,
    },
    ExecDetailsEnd(i32),
    CommissionReport(CommissionReport),
    ContractDetails {
        req_id: i32,
        details: ContractDetails,
    },
    ContractDetailsEnd(i32),
    HistoricalData {
        req_id: i32,
        bar: Bar,
    },
    HistoricalDataEnd(i32),
    Pnl {
        req_id: i32,
        daily_pnl: f64,
        unrealized_pnl: f64,
        realized_pnl: f64,
    },
    PnlSingle {
        req_id: i32,
        position: Decimal,
        daily_pnl: f64,
        unrealized_pnl: f64,
        realized_pnl: f64,
        value: f64,
    },
    MarketRule {
        market_rule_id: i32,
        increments: Vec<PriceIncrement>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use ibk_config::SessionConfig;

    #[test]
    fn endpoint_comes_from_session_config() {
        let cfg = SessionConfig {
            host: "gw.internal".into(),
            port: 7497,
            client_id: 12,
            ..SessionConfig::default()
        };
        assert_eq!(
            Endpoint::from(&cfg),
            Endpoint {
                host: "gw.internal".into(),
                port: 7497,
                client_id: 12,
            }
        );
    }
}
