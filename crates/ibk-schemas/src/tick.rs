//! Sparse market-data snapshot for one ticker id.
//!
//! The broker pushes one field at a time, tagged with a numeric tick type and
//! routed through one of four callbacks (size, price, string, generic). Each
//! [`TickType`] has exactly one [`TickKind`]; a value arriving through the
//! wrong callback, or with a code outside the enumeration, is logged and
//! dropped.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TickKind {
    Size,
    Price,
    Text,
    Generic,
}

macro_rules! tick_types {
    ($($name:ident = $code:literal => $kind:ident,)+) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum TickType {
            $($name,)+
        }

        impl TickType {
            pub const ALL: &'static [TickType] = &[$(TickType::$name,)+];

            pub fn from_code(code: i32) -> Option<Self> {
                match code {
                    $($code => Some(TickType::$name),)+
                    _ => None,
                }
            }

            pub fn code(self) -> i32 {
                match self {
                    $(TickType::$name => $code,)+
                }
            }

            pub fn kind(self) -> TickKind {
                match self {
                    $(TickType::$name => TickKind::$kind,)+
                }
            }
        }
    };
}

tick_types! {
    BidSize = 0 => Size,
    Bid = 1 => Price,
    Ask = 2 => Price,
    AskSize = 3 => Size,
    Last = 4 => Price,
    LastSize = 5 => Size,
    High = 6 => Price,
    Low = 7 => Price,
    Volume = 8 => Size,
    Close = 9 => Price,
    Open = 14 => Price,
    Low13Weeks = 15 => Price,
    High13Weeks = 16 => Price,
    Low26Weeks = 17 => Price,
    High26Weeks = 18 => Price,
    Low52Weeks = 19 => Price,
    High52Weeks = 20 => Price,
    AverageVolume = 21 => Size,
    OptionHistoricalVolatility = 23 => Generic,
    OptionImpliedVolatility = 24 => Generic,
    OptionCallOpenInterest = 27 => Size,
    OptionPutOpenInterest = 28 => Size,
    OptionCallVolume = 29 => Size,
    OptionPutVolume = 30 => Size,
    IndexFuturePremium = 31 => Generic,
    BidExchange = 32 => Text,
    AskExchange = 33 => Text,
    AuctionVolume = 34 => Size,
    AuctionPrice = 35 => Price,
    AuctionImbalance = 36 => Size,
    MarkPrice = 37 => Price,
    LastTimestamp = 45 => Text,
    Shortable = 46 => Generic,
    RtVolume = 48 => Text,
    Halted = 49 => Generic,
    BidYield = 50 => Price,
    AskYield = 51 => Price,
    LastYield = 52 => Price,
    TradeCount = 54 => Generic,
    TradeRate = 55 => Generic,
    VolumeRate = 56 => Generic,
    LastRthTrade = 57 => Price,
    RtHistoricalVolatility = 58 => Generic,
    IbDividends = 59 => Text,
    RegulatoryImbalance = 61 => Size,
    News = 62 => Text,
    ShortTermVolume3Min = 63 => Size,
    ShortTermVolume5Min = 64 => Size,
    ShortTermVolume10Min = 65 => Size,
    DelayedBid = 66 => Price,
    DelayedAsk = 67 => Price,
    DelayedLast = 68 => Price,
    DelayedBidSize = 69 => Size,
    DelayedAskSize = 70 => Size,
    DelayedLastSize = 71 => Size,
    DelayedHigh = 72 => Price,
    DelayedLow = 73 => Price,
    DelayedVolume = 74 => Size,
    DelayedClose = 75 => Price,
    DelayedOpen = 76 => Price,
    RtTradeVolume = 77 => Text,
    CreditmanMarkPrice = 78 => Price,
    CreditmanSlowMarkPrice = 79 => Price,
    DelayedBidOption = 80 => Price,
    DelayedAskOption = 81 => Price,
    DelayedLastOption = 82 => Price,
    DelayedModelOption = 83 => Price,
    LastExchange = 84 => Text,
    LastRegulatoryTime = 85 => Text,
    FuturesOpenInterest = 86 => Size,
    AverageOptionVolume = 87 => Size,
    DelayedLastTimestamp = 88 => Text,
    ShortableShares = 89 => Size,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TickValue {
    Size(Decimal),
    Price(Decimal),
    Text(String),
    Generic(Decimal),
}

impl TickValue {
    pub fn kind(&self) -> TickKind {
        match self {
            TickValue::Size(_) => TickKind::Size,
            TickValue::Price(_) => TickKind::Price,
            TickValue::Text(_) => TickKind::Text,
            TickValue::Generic(_) => TickKind::Generic,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickAttrib {
    pub can_auto_execute: bool,
    pub past_limit: bool,
    pub pre_open: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    values: BTreeMap<TickType, TickValue>,
    updated_at: Option<DateTime<Utc>>,
}

impl Tick {
    pub fn set_size(&mut self, ticker_id: i32, code: i32, value: Decimal) -> bool {
        self.set(ticker_id, code, TickValue::Size(value))
    }

    pub fn set_price(&mut self, ticker_id: i32, code: i32, value: Decimal, attrib: TickAttrib) -> bool {
        tracing::trace!(
            ticker_id,
            code,
            auto_exec = attrib.can_auto_execute,
            past_limit = attrib.past_limit,
            pre_open = attrib.pre_open,
            "price tick attributes"
        );
        self.set(ticker_id, code, TickValue::Price(value))
    }

    pub fn set_text(&mut self, ticker_id: i32, code: i32, value: impl Into<String>) -> bool {
        self.set(ticker_id, code, TickValue::Text(value.into()))
    }

    pub fn set_generic(&mut self, ticker_id: i32, code: i32, value: Decimal) -> bool {
        self.set(ticker_id, code, TickValue::Generic(value))
    }

    /// Store `value` under `code` if the code is known and its kind matches.
    /// Returns whether the value was stored.
    pub fn set(&mut self, ticker_id: i32, code: i32, value: TickValue) -> bool {
        let Some(tick_type) = TickType::from_code(code) else {
            tracing::warn!(ticker_id, code, "unknown tick type");
            return false;
        };
        if tick_type.kind() != value.kind() {
            tracing::warn!(
                ticker_id,
                ?tick_type,
                expected = ?tick_type.kind(),
                got = ?value.kind(),
                "tick value kind does not match tick type"
            );
            return false;
        }
        tracing::trace!(ticker_id, ?tick_type, ?value, "set tick value");
        self.values.insert(tick_type, value);
        true
    }

    pub fn refresh_update_time(&mut self) {
        self.updated_at = Some(Utc::now());
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn get(&self, tick_type: TickType) -> Option<&TickValue> {
        self.values.get(&tick_type)
    }

    pub fn price(&self, tick_type: TickType) -> Option<Decimal> {
        match self.values.get(&tick_type) {
            Some(TickValue::Price(p)) => Some(*p),
            _ => None,
        }
    }

    pub fn size(&self, tick_type: TickType) -> Option<Decimal> {
        match self.values.get(&tick_type) {
            Some(TickValue::Size(s)) => Some(*s),
            _ => None,
        }
    }

    pub fn text(&self, tick_type: TickType) -> Option<&str> {
        match self.values.get(&tick_type) {
            Some(TickValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn generic(&self, tick_type: TickType) -> Option<Decimal> {
        match self.values.get(&tick_type) {
            Some(TickValue::Generic(g)) => Some(*g),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn codes_round_trip_through_the_table() {
        for t in TickType::ALL {
            assert_eq!(TickType::from_code(t.code()), Some(*t));
        }
        assert_eq!(TickType::from_code(10), None);
        assert_eq!(TickType::from_code(-1), None);
    }

    #[test]
    fn values_are_stored_by_kind() {
        let mut tick = Tick::default();
        assert!(tick.set_price(7, 1, dec!(100.5), TickAttrib::default()));
        assert!(tick.set_size(7, 0, dec!(300)));
        assert!(tick.set_text(7, 32, "ARCA"));
        assert!(tick.set_generic(7, 49, dec!(0)));

        assert_eq!(tick.price(TickType::Bid), Some(dec!(100.5)));
        assert_eq!(tick.size(TickType::BidSize), Some(dec!(300)));
        assert_eq!(tick.text(TickType::BidExchange), Some("ARCA"));
        assert_eq!(tick.generic(TickType::Halted), Some(dec!(0)));
        assert_eq!(tick.len(), 4);
    }

    #[test]
    fn wrong_kind_and_unknown_code_are_ignored() {
        let mut tick = Tick::default();
        // Bid is a price, not a size.
        assert!(!tick.set_size(7, 1, dec!(5)));
        assert!(!tick.set_price(7, 999, dec!(5), TickAttrib::default()));
        assert!(tick.is_empty());
    }

    #[test]
    fn later_value_replaces_earlier_one() {
        let mut tick = Tick::default();
        tick.set_price(1, 4, dec!(10), TickAttrib::default());
        tick.set_price(1, 4, dec!(11), TickAttrib::default());
        assert_eq!(tick.price(TickType::Last), Some(dec!(11)));
    }
}
