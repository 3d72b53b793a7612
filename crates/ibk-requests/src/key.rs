use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestType {
    EventContractPnl,
    EventAccountPnl,
    EventPosition,
    EventPositionMulti,
    EventOrderStatus,
    EventMarketData,
    EventMarketDataLvl2,
    EventPortfolio,
    EventHistoricalData,
    EventExecutionInfo,
    ReqMarketData,
    ReqMarketDepthExchanges,
    ReqCurrentTime,
    ReqOrderPlace,
    ReqOrderCancel,
    ReqOrderList,
    ReqExecutions,
    ReqContractDetail,
    ReqContractDescription,
    ReqHistoricalMidpointTick,
    ReqHistoricalBidAskTick,
    ReqHistoricalTrade,
    ReqHistoricalData,
    ReqAccountSummary,
    ReqMarketRule,
}

impl RequestType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EventContractPnl => "EVENT_CONTRACT_PNL",
            Self::EventAccountPnl => "EVENT_ACCOUNT_PNL",
            Self::EventPosition => "EVENT_POSITION",
            Self::EventPositionMulti => "EVENT_POSITION_MULTI",
            Self::EventOrderStatus => "EVENT_ORDER_STATUS",
            Self::EventMarketData => "EVENT_MARKET_DATA",
            Self::EventMarketDataLvl2 => "EVENT_MARKET_DATA_LVL2",
            Self::EventPortfolio => "EVENT_PORTFOLIO",
            Self::EventHistoricalData => "EVENT_HISTORICAL_DATA",
            Self::EventExecutionInfo => "EVENT_EXECUTION_INFO",
            Self::ReqMarketData => "REQ_MARKET_DATA",
            Self::ReqMarketDepthExchanges => "REQ_MARKET_DEPTH_EXCHANGES",
            Self::ReqCurrentTime => "REQ_CURRENT_TIME",
            Self::ReqOrderPlace => "REQ_ORDER_PLACE",
            Self::ReqOrderCancel => "REQ_ORDER_CANCEL",
            Self::ReqOrderList => "REQ_ORDER_LIST",
            Self::ReqExecutions => "REQ_EXECUTIONS",
            Self::ReqContractDetail => "REQ_CONTRACT_DETAIL",
            Self::ReqContractDescription => "REQ_CONTRACT_DESCRIPTION",
            Self::ReqHistoricalMidpointTick => "REQ_HISTORICAL_MIDPOINT_TICK",
            Self::ReqHistoricalBidAskTick => "REQ_HISTORICAL_BID_ASK_TICK",
            Self::ReqHistoricalTrade => "REQ_HISTORICAL_TRADE",
            Self::ReqHistoricalData => "REQ_HISTORICAL_DATA",
            Self::ReqAccountSummary => "REQ_ACCOUNT_SUMMARY",
            Self::ReqMarketRule => "REQ_MARKET_RULE",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Correlation key.
///
/// A key without a type is a wildcard: it equals any key carrying the same
/// id. Hashing covers the id only, so every key that could compare equal
/// lands in the same bucket.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RequestKey {
    pub ty: Option<RequestType>,
    pub id: Option<i32>,
}

impl RequestKey {
    pub fn new(ty: RequestType, id: i32) -> Self {
        Self {
            ty: Some(ty),
            id: Some(id),
        }
    }

    /// A request that carries no id (one live instance per type).
    pub fn typed(ty: RequestType) -> Self {
        Self { ty: Some(ty), id: None }
    }

    /// Matches whatever request owns `id`.
    pub fn any(id: i32) -> Self {
        Self { ty: None, id: Some(id) }
    }

    pub fn is_wildcard(&self) -> bool {
        self.ty.is_none()
    }
}

impl PartialEq for RequestKey {
    fn eq(&self, other: &Self) -> bool {
        let types_match = match (self.ty, other.ty) {
            (None, _) | (_, None) => true,
            (Some(a), Some(b)) => a == b,
        };
        types_match && self.id == other.id
    }
}

impl Eq for RequestKey {}

impl Hash for RequestKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.ty, self.id) {
            (Some(ty), Some(id)) => write!(f, "{ty},{id}"),
            (None, Some(id)) => write!(f, "{id}"),
            (Some(ty), None) => write!(f, "{ty}"),
            (None, None) => f.write_str("invalid key"),
        }
    }
}
