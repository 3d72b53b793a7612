use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Contract;

// ---------------------------------------------------------------------------
// Positions, portfolio, PnL
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub account: String,
    pub contract: Contract,
    pub position: Decimal,
    pub avg_cost: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioLine {
    pub contract: Contract,
    pub position: Decimal,
    pub market_price: Option<Decimal>,
    pub market_value: Option<Decimal>,
    pub average_cost: Option<Decimal>,
    pub unrealized_pnl: Option<Decimal>,
    pub realized_pnl: Option<Decimal>,
    pub account: String,
}

/// Any member may be absent: the broker sends the unset sentinel for values
/// it has not computed yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pnl {
    pub position: Option<Decimal>,
    pub daily_pnl: Option<Decimal>,
    pub unrealized_pnl: Option<Decimal>,
    pub realized_pnl: Option<Decimal>,
    pub value: Option<Decimal>,
}

// ---------------------------------------------------------------------------
// Account summary tags
// ---------------------------------------------------------------------------

macro_rules! named_tags {
    ($(#[$meta:meta])* $enum_name:ident { $($variant:ident = $wire:literal,)+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $enum_name {
            $($variant,)+
        }

        impl $enum_name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($enum_name::$variant => $wire,)+
                }
            }

            pub fn parse(tag: &str) -> Option<Self> {
                match tag {
                    $($wire => Some($enum_name::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

named_tags! {
    /// Account-wide values. Each may be set once per summary.
    AccountTag {
        AccountType = "AccountType",
        NetLiquidation = "NetLiquidation",
        TotalCashValue = "TotalCashValue",
        SettledCash = "SettledCash",
        BuyingPower = "BuyingPower",
        EquityWithLoanValue = "EquityWithLoanValue",
        PreviousEquityWithLoanValue = "PreviousEquityWithLoanValue",
        GrossPositionValue = "GrossPositionValue",
        RegTEquity = "RegTEquity",
        RegTMargin = "RegTMargin",
        Sma = "SMA",
        InitMarginReq = "InitMarginReq",
        MaintMarginReq = "MaintMarginReq",
        AvailableFunds = "AvailableFunds",
        ExcessLiquidity = "ExcessLiquidity",
        Cushion = "Cushion",
        FullInitMarginReq = "FullInitMarginReq",
        FullMaintMarginReq = "FullMaintMarginReq",
        FullAvailableFunds = "FullAvailableFunds",
        FullExcessLiquidity = "FullExcessLiquidity",
        LookAheadNextChange = "LookAheadNextChange",
        LookAheadInitMarginReq = "LookAheadInitMarginReq",
        LookAheadMaintMarginReq = "LookAheadMaintMarginReq",
        LookAheadAvailableFunds = "LookAheadAvailableFunds",
        LookAheadExcessLiquidity = "LookAheadExcessLiquidity",
        HighestSeverity = "HighestSeverity",
        DayTradesRemaining = "DayTradesRemaining",
        Leverage = "Leverage",
    }
}

named_tags! {
    /// Values reported once per currency. Later reports overwrite.
    CurrencyTag {
        Currency = "Currency",
        RealCurrency = "RealCurrency",
        CashBalance = "CashBalance",
        TotalCashBalance = "TotalCashBalance",
        AccruedCash = "AccruedCash",
        StockMarketValue = "StockMarketValue",
        OptionMarketValue = "OptionMarketValue",
        FutureOptionValue = "FutureOptionValue",
        FuturesPnl = "FuturesPNL",
        NetLiquidationByCurrency = "NetLiquidationByCurrency",
        UnrealizedPnl = "UnrealizedPnL",
        RealizedPnl = "RealizedPnL",
        ExchangeRate = "ExchangeRate",
        FundValue = "FundValue",
        NetDividend = "NetDividend",
        MutualFundValue = "MutualFundValue",
        MoneyMarketFundValue = "MoneyMarketFundValue",
        CorporateBondValue = "CorporateBondValue",
        TBondValue = "TBondValue",
        TBillValue = "TBillValue",
        WarrantValue = "WarrantValue",
        FxCashBalance = "FxCashBalance",
        AccountOrGroup = "AccountOrGroup",
        IssuerOptionValue = "IssuerOptionValue",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SummaryTag {
    Account(AccountTag),
    Currency(CurrencyTag),
}

impl FromStr for SummaryTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccountTag::parse(s)
            .map(SummaryTag::Account)
            .or_else(|| CurrencyTag::parse(s).map(SummaryTag::Currency))
            .ok_or_else(|| s.to_string())
    }
}

impl fmt::Display for SummaryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryTag::Account(t) => f.write_str(t.as_str()),
            SummaryTag::Currency(t) => f.write_str(t.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SummaryValue {
    Text(String),
    Amount(Decimal),
    Count(i32),
    Instant(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SummaryError {
    #[error("account summary value is overwritten: {tag}")]
    AlreadySet { tag: String },
    #[error("invalid value for account summary tag {tag}: {value:?}")]
    InvalidValue { tag: String, value: String },
}

// ---------------------------------------------------------------------------
// AccountSummary
// ---------------------------------------------------------------------------

/// Accumulated `accountSummary` rows for one summary request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub account: String,
    values: BTreeMap<AccountTag, SummaryValue>,
    details: BTreeMap<String, BTreeMap<CurrencyTag, SummaryValue>>,
}

impl AccountSummary {
    /// Apply one `(tag, value, currency)` row.
    ///
    /// Returns `Ok(false)` when the tag is not one this summary knows about
    /// (logged and ignored). Setting an account-wide tag twice is an error.
    pub fn update(
        &mut self,
        account: &str,
        tag: &str,
        value: &str,
        currency: &str,
    ) -> Result<bool, SummaryError> {
        if self.account.is_empty() {
            self.account = account.to_string();
        }

        let Ok(parsed) = tag.parse::<SummaryTag>() else {
            tracing::warn!(tag, value, currency, "unknown account summary tag");
            return Ok(false);
        };

        match parsed {
            SummaryTag::Account(t) => {
                if self.values.contains_key(&t) {
                    return Err(SummaryError::AlreadySet {
                        tag: t.as_str().to_string(),
                    });
                }
                let v = parse_account_value(t, value)?;
                self.values.insert(t, v);
            }
            SummaryTag::Currency(t) => {
                let v = parse_currency_value(t, value)?;
                self.details
                    .entry(currency.to_string())
                    .or_default()
                    .insert(t, v);
            }
        }
        Ok(true)
    }

    pub fn get(&self, tag: AccountTag) -> Option<&SummaryValue> {
        self.values.get(&tag)
    }

    pub fn amount(&self, tag: AccountTag) -> Option<Decimal> {
        match self.values.get(&tag) {
            Some(SummaryValue::Amount(d)) => Some(*d),
            _ => None,
        }
    }

    pub fn currency_value(&self, currency: &str, tag: CurrencyTag) -> Option<&SummaryValue> {
        self.details.get(currency).and_then(|d| d.get(&tag))
    }

    pub fn currencies(&self) -> impl Iterator<Item = &str> {
        self.details.keys().map(String::as_str)
    }
}

fn invalid(tag: &str, value: &str) -> SummaryError {
    SummaryError::InvalidValue {
        tag: tag.to_string(),
        value: value.to_string(),
    }
}

fn parse_amount(tag: &str, value: &str) -> Result<Decimal, SummaryError> {
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .map_err(|_| invalid(tag, value))
}

fn parse_account_value(tag: AccountTag, value: &str) -> Result<SummaryValue, SummaryError> {
    let name = tag.as_str();
    match tag {
        AccountTag::AccountType => Ok(SummaryValue::Text(value.to_string())),
        AccountTag::HighestSeverity | AccountTag::DayTradesRemaining | AccountTag::Leverage => value
            .parse::<i32>()
            .map(SummaryValue::Count)
            .map_err(|_| invalid(name, value)),
        // Seconds since the epoch.
        AccountTag::LookAheadNextChange => {
            let secs: i64 = value.parse().map_err(|_| invalid(name, value))?;
            DateTime::from_timestamp(secs, 0)
                .map(SummaryValue::Instant)
                .ok_or_else(|| invalid(name, value))
        }
        _ => parse_amount(name, value).map(SummaryValue::Amount),
    }
}

fn parse_currency_value(tag: CurrencyTag, value: &str) -> Result<SummaryValue, SummaryError> {
    match tag {
        CurrencyTag::Currency | CurrencyTag::RealCurrency | CurrencyTag::AccountOrGroup => {
            Ok(SummaryValue::Text(value.to_string()))
        }
        _ => parse_amount(tag.as_str(), value).map(SummaryValue::Amount),
    }
}
