use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Instrument description. Only `conid` is interpreted by the session core;
/// everything else is carried through for callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub conid: i32,
    pub symbol: String,
    pub sec_type: String,
    pub last_trade_date_or_contract_month: String,
    pub strike: Option<Decimal>,
    pub right: String,
    pub multiplier: String,
    pub exchange: String,
    pub primary_exchange: String,
    pub currency: String,
    pub local_symbol: String,
    pub trading_class: String,
    pub include_expired: bool,
}

impl Contract {
    pub fn stock(symbol: impl Into<String>, exchange: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            sec_type: "STK".to_string(),
            exchange: exchange.into(),
            currency: currency.into(),
            ..Self::default()
        }
    }

    pub fn with_conid(conid: i32) -> Self {
        Self {
            conid,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDetails {
    pub contract: Contract,
    pub market_name: String,
    pub min_tick: Option<Decimal>,
    pub long_name: String,
    pub order_types: String,
    pub valid_exchanges: String,
    pub market_rule_ids: String,
    pub time_zone_id: String,
    pub trading_hours: String,
    pub liquid_hours: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDescription {
    pub contract: Contract,
    pub derivative_sec_types: Vec<String>,
}

/// One venue offering level-2 data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthExchange {
    pub exchange: String,
    pub sec_type: String,
    pub listing_exchange: String,
    pub service_data_type: String,
    pub agg_group: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceIncrement {
    pub low_edge: Decimal,
    pub increment: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketRule {
    pub market_rule_id: i32,
    pub increments: Vec<PriceIncrement>,
}

impl MarketRule {
    /// Tick increment that applies at `price` (the last band whose low edge
    /// does not exceed it).
    pub fn increment_at(&self, price: Decimal) -> Option<Decimal> {
        self.increments
            .iter()
            .filter(|band| band.low_edge <= price)
            .last()
            .map(|band| band.increment)
    }
}
