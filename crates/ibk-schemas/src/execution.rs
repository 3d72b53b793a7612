use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::Contract;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    pub order_id: i32,
    pub client_id: i32,
    pub exec_id: String,
    pub time: String,
    pub acct_number: String,
    pub exchange: String,
    pub side: String,
    pub shares: Decimal,
    pub price: Decimal,
    pub perm_id: i64,
    pub liquidation: i32,
    pub cum_qty: Decimal,
    pub avg_price: Decimal,
    pub order_ref: String,
    pub ev_rule: String,
    pub ev_multiplier: Option<Decimal>,
    pub model_code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionReport {
    pub exec_id: String,
    pub commission: Option<Decimal>,
    pub currency: String,
    pub realized_pnl: Option<Decimal>,
    pub yield_amount: Option<Decimal>,
    pub yield_redemption_date: i32,
}

/// An execution plus the commission that may (or may not) follow it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub contract: Contract,
    pub execution: Execution,
    pub commission: Option<CommissionReport>,
}

impl ExecutionReport {
    pub fn new(contract: Contract, execution: Execution) -> Self {
        Self {
            contract,
            execution,
            commission: None,
        }
    }

    pub fn exec_id(&self) -> &str {
        &self.execution.exec_id
    }
}
