use serde::Serialize;
use thiserror::Error;

use crate::RequestKey;

/// Broker-assigned failure delivered to exactly one pending request.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BrokerFailure {
    #[error("terminal error id={id} code={code}: {message}")]
    Terminal { id: i32, code: i32, message: String },
    #[error("no market data permissions (id={id}): {message}")]
    NoPermissions { id: i32, message: String },
    #[error("no data (id={id}): {message}")]
    NoData { id: i32, message: String },
    #[error("client error (id={id}): {message}")]
    Client { id: i32, message: String },
    #[error("max number of tickers reached (id={id}): {message}")]
    MaxTickers { id: i32, message: String },
    #[error("no security definition (id={id}): {message}")]
    NoSecurityDefinition { id: i32, message: String },
    #[error("subscription lost by disconnect (id={id}): {message}")]
    SubscriptionLostByDisconnect { id: i32, message: String },
    #[error("subscription lost by competing session (id={id}): {message}")]
    SubscriptionLostByCompetingSession { id: i32, message: String },
}

impl BrokerFailure {
    pub fn id(&self) -> i32 {
        match self {
            Self::Terminal { id, .. }
            | Self::NoPermissions { id, .. }
            | Self::NoData { id, .. }
            | Self::Client { id, .. }
            | Self::MaxTickers { id, .. }
            | Self::NoSecurityDefinition { id, .. }
            | Self::SubscriptionLostByDisconnect { id, .. }
            | Self::SubscriptionLostByCompetingSession { id, .. } => *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("registration function is mandatory")]
    MissingRegister,
    #[error("request type is mandatory")]
    MissingType,
    #[error("not connected")]
    NotConnected,
    #[error("duplicated request: {0}")]
    Duplicated(RequestKey),
    #[error("register action failed for {key}: {message}")]
    Register { key: RequestKey, message: String },
    #[error("session closed")]
    SessionClosed,
    #[error(transparent)]
    Broker(#[from] BrokerFailure),
}
